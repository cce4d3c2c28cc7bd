//! Opaque message-field extraction and response synthesis.
//!
//! Decrypted Winbox payloads are nested attribute messages, but the
//! emulator never parses them structurally: like the protocol's original
//! observers it scans for fixed tag byte sequences and reads the field
//! that follows. The scan is wrapped in two small primitives - a
//! length-prefixed read and a fixed-width read past a tag - so each field
//! is declared rather than hand-scanned.
//!
//! Responses are synthesized from captured attribute skeletons with the
//! client's request identifier and password-hash field spliced back in
//! verbatim, which is all a pre-6.43 client checks.

use std::fmt;

use super::error::{Error, Result};

/// Tag preceding the length-prefixed username field.
pub const USERNAME_TAG: [u8; 4] = [0x01, 0x00, 0x00, 0x21];

/// Tag preceding the password-hash field.
pub const PASSWORD_HASH_TAG: [u8; 6] = [0x0a, 0x00, 0x00, 0x31, 0x11, 0x00];

/// Tag preceding the one-byte request identifier.
pub const REQUEST_ID_TAG: [u8; 4] = [0x06, 0x00, 0xff, 0x09];

/// Alternate request-identifier tag carrying a two-byte identifier.
pub const REQUEST_ID_ALT_TAG: [u8; 4] = [0x06, 0x00, 0xff, 0x08];

/// Password-hash digest length (MD5-sized).
pub const DIGEST_LEN: usize = 16;

/// Length of the echoed hash field: tag plus digest.
pub const HASH_FIELD_LEN: usize = PASSWORD_HASH_TAG.len() + DIGEST_LEN;

/// Fixed salt-exchange response. Advertises a zero-length salt, which
/// clients accept without complaint.
pub const SALT_RESPONSE: [u8; 45] = [
    0x4d, 0x32, 0x01, 0x00, 0xff, 0x88, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x0b, 0x00, 0x00, 0x00, 0x02, 0x00, 0xff, 0x88, 0x02, 0x00, 0x0d, 0x00,
    0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x03, 0x00, 0xff, 0x09, 0x02, 0x06,
    0x00, 0xff, 0x09, 0x02, 0x09, 0x00, 0x00, 0x31, 0x00,
];

/// Login acknowledgement skeleton up to the spliced request identifier.
const LOGIN_ACK_HEAD: [u8; 62] = [
    0x4d, 0x32, 0x01, 0x00, 0xff, 0x88, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x0b, 0x00, 0x00, 0x00, 0x02, 0x00, 0xff, 0x88, 0x02, 0x00, 0x0d, 0x00,
    0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x13, 0x00, 0x00, 0x00, 0x0b, 0x00,
    0x00, 0x08, 0xfe, 0xff, 0x07, 0x00, 0x0f, 0x00, 0x00, 0x09, 0x00, 0x10,
    0x00, 0x00, 0x09, 0x00, 0x01, 0x00, 0xfe, 0x09, 0x06, 0x03, 0x00, 0xff,
    0x09, 0x02,
];

/// Login acknowledgement skeleton between the request identifier and the
/// echoed hash field (version, architecture and board attributes).
const LOGIN_ACK_MID: [u8; 46] = [
    0x16, 0x00, 0x00, 0x21, 0x04, 0x33, 0x2e, 0x31, 0x31, 0x17, 0x00, 0x00,
    0x21, 0x03, 0x78, 0x38, 0x36, 0x15, 0x00, 0x00, 0x21, 0x03, 0x78, 0x38,
    0x36, 0x18, 0x00, 0x00, 0x21, 0x07, 0x64, 0x65, 0x66, 0x61, 0x75, 0x6c,
    0x74, 0x11, 0x00, 0x00, 0x21, 0x04, 0x69, 0x33, 0x38, 0x36,
];

/// Finds the first occurrence of a tag byte sequence.
pub fn find_tag(data: &[u8], tag: &[u8]) -> Option<usize> {
    if tag.is_empty() || data.len() < tag.len() {
        return None;
    }
    data.windows(tag.len()).position(|window| window == tag)
}

/// Reads a length-prefixed field: the tag, a one-byte length, then that
/// many bytes.
fn length_prefixed_field<'a>(
    data: &'a [u8],
    tag: &[u8],
    field: &'static str,
) -> Result<&'a [u8]> {
    let offset = find_tag(data, tag).ok_or(Error::TagNotFound(field))?;
    let len_at = offset + tag.len();
    let available = data.len() - len_at;
    if available < 1 {
        return Err(Error::Truncated {
            field,
            needed: 1,
            available,
        });
    }
    let len = data[len_at] as usize;
    if available - 1 < len {
        return Err(Error::Truncated {
            field,
            needed: 1 + len,
            available,
        });
    }
    Ok(&data[len_at + 1..len_at + 1 + len])
}

/// Reads a fixed-width field starting at the tag itself (tag included),
/// as the fields are echoed back tag and all.
fn tagged_field<'a>(
    data: &'a [u8],
    tag: &[u8],
    width: usize,
    field: &'static str,
) -> Result<&'a [u8]> {
    let offset = find_tag(data, tag).ok_or(Error::TagNotFound(field))?;
    let available = data.len() - offset;
    if available < width {
        return Err(Error::Truncated {
            field,
            needed: width,
            available,
        });
    }
    Ok(&data[offset..offset + width])
}

/// Credential captured from a login request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Username, UTF-8.
    pub username: String,
    /// Password-hash digest, 16 raw bytes.
    pub digest: [u8; DIGEST_LEN],
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("digest", &hex::encode(self.digest))
            .finish()
    }
}

/// Fields extracted from a decrypted login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// Captured credential.
    pub credential: Credential,
    /// Raw request-identifier field, echoed back verbatim (5 or 6 bytes
    /// depending on which tag the client used).
    pub request_id: Vec<u8>,
    /// Raw hash field including its tag, echoed back verbatim.
    pub hash_field: Vec<u8>,
}

/// Extracts the credential, request identifier and hash field from a
/// decrypted login payload.
///
/// # Errors
///
/// Any missing tag or short field is a protocol violation; the session is
/// torn down rather than guessed at.
///
/// # Example
///
/// ```rust
/// use krait_proto::winbox::message::parse_login;
///
/// let mut payload = vec![0x06, 0x00, 0xff, 0x09, 0x07];
/// payload.extend_from_slice(&[0x01, 0x00, 0x00, 0x21, 0x04]);
/// payload.extend_from_slice(b"mike");
/// payload.extend_from_slice(&[0x0a, 0x00, 0x00, 0x31, 0x11, 0x00]);
/// payload.extend_from_slice(&[0xAB; 16]);
///
/// let login = parse_login(&payload).unwrap();
/// assert_eq!(login.credential.username, "mike");
/// ```
pub fn parse_login(data: &[u8]) -> Result<LoginRequest> {
    let username_bytes = length_prefixed_field(data, &USERNAME_TAG, "username")?;
    let username = std::str::from_utf8(username_bytes)
        .map_err(|_| Error::InvalidUtf8("username"))?
        .to_string();

    let hash_field = tagged_field(data, &PASSWORD_HASH_TAG, HASH_FIELD_LEN, "password hash")?;
    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&hash_field[PASSWORD_HASH_TAG.len()..]);

    let request_id = match tagged_field(data, &REQUEST_ID_TAG, 5, "request id") {
        Ok(field) => field,
        Err(Error::TagNotFound(_)) => tagged_field(data, &REQUEST_ID_ALT_TAG, 6, "request id")?,
        Err(err) => return Err(err),
    };

    Ok(LoginRequest {
        credential: Credential { username, digest },
        request_id: request_id.to_vec(),
        hash_field: hash_field.to_vec(),
    })
}

/// Synthesizes the always-successful login acknowledgement.
///
/// Echoes the request identifier and the full hash field verbatim between
/// the fixed attribute skeletons.
pub fn login_response(request_id: &[u8], hash_field: &[u8]) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(LOGIN_ACK_HEAD.len() + request_id.len() + LOGIN_ACK_MID.len() + hash_field.len());
    out.extend_from_slice(&LOGIN_ACK_HEAD);
    out.extend_from_slice(request_id);
    out.extend_from_slice(&LOGIN_ACK_MID);
    out.extend_from_slice(hash_field);
    out
}
