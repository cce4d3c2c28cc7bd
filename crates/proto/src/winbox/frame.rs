//! Winbox wire framing.
//!
//! # Frame Format
//!
//! ```text
//! byte      length  (0x00..=0xFE; 0xFF is the continuation marker)
//! byte      handler identifier
//! byte[n]   payload (n = length)
//! ```
//!
//! Payloads larger than a single frame use the chunked form. The message
//! opens with the two bytes `0xFF, handler`, the first 255-byte slice
//! follows raw, and every further slice is preceded by a two-byte marker:
//! `0xFF 0xFF` for a full 255-byte slice, `len 0xFF` for the final shorter
//! one. The outer framing only bounds each chunk to 255 bytes; the
//! aggregate length travels inside the message's own header, so the reader
//! reassembles by concatenation until that embedded length is satisfied.
//!
//! Encrypted application messages (handler 0x05 after key installation)
//! wrap their ciphertext in an [`Envelope`]: a clear-text big-endian length
//! of the decrypted body, ten encrypted padding bytes, then the encrypted
//! body.
//!
//! # Example
//!
//! ```rust
//! use krait_proto::winbox::Frame;
//!
//! let frame = Frame::new(0x05, vec![1, 2, 3]);
//! let wire = frame.encode().unwrap();
//! assert_eq!(wire, vec![0x03, 0x05, 1, 2, 3]);
//! assert_eq!(Frame::decode(&wire).unwrap(), frame);
//! ```

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::cipher::PADDING_LEN;
use super::error::{Error, Result};

/// Handler identifier for file and package-listing operations (plaintext).
pub const HANDLER_FILE: u8 = 0x02;

/// Handler identifier for the DH exchange and encrypted session messages.
pub const HANDLER_DH: u8 = 0x05;

/// Handler identifier for the alternate ECSRP exchange. Ignoring it makes
/// the client fall back to the DH exchange.
pub const HANDLER_ECSRP: u8 = 0x06;

/// Reserved length value marking a chunked, multi-part frame.
pub const CONTINUATION: u8 = 0xFF;

/// Largest payload carried by a single non-chunked frame.
pub const MAX_SINGLE_PAYLOAD: usize = 0xFE;

/// Chunk size used by the continuation form.
const CHUNK_LEN: usize = 0xFF;

/// One non-chunked wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Handler identifier selecting the message's semantic type.
    pub handler: u8,
    /// Frame payload.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame.
    pub fn new(handler: u8, payload: Vec<u8>) -> Self {
        Self { handler, payload }
    }

    /// Serializes a single frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_SINGLE_PAYLOAD`] bytes; such payloads must use
    /// [`encode_chunked`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.payload.len() > MAX_SINGLE_PAYLOAD {
            return Err(Error::PayloadTooLarge(self.payload.len()));
        }
        let mut buf = BytesMut::with_capacity(2 + self.payload.len());
        buf.put_u8(self.payload.len() as u8);
        buf.put_u8(self.handler);
        buf.put_slice(&self.payload);
        Ok(buf.to_vec())
    }

    /// Parses a single frame from a complete buffer.
    ///
    /// # Errors
    ///
    /// - [`Error::UnexpectedContinuation`] if the length byte is the
    ///   continuation marker;
    /// - [`Error::Truncated`] / [`Error::InvalidLength`] if the buffer does
    ///   not hold exactly one frame.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::Truncated {
                field: "frame header",
                needed: 2,
                available: buf.len(),
            });
        }
        let length = buf[0];
        if length == CONTINUATION {
            return Err(Error::UnexpectedContinuation);
        }
        let expected = 2 + length as usize;
        if buf.len() != expected {
            return Err(Error::InvalidLength {
                expected,
                actual: buf.len(),
            });
        }
        Ok(Self {
            handler: buf[1],
            payload: buf[2..].to_vec(),
        })
    }
}

/// Serializes a payload using the chunked continuation form.
///
/// Used for payloads the single-frame form cannot carry, such as package
/// listings. The chunked form is only emitted for payloads that overflow a
/// single frame; shorter payloads are legal here but produce a single
/// chunk.
pub fn encode_chunked(handler: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(2 + payload.len() + 2 * (payload.len() / CHUNK_LEN + 1));
    buf.put_u8(CONTINUATION);
    buf.put_u8(handler);

    for (idx, chunk) in payload.chunks(CHUNK_LEN).enumerate() {
        if idx > 0 {
            if chunk.len() == CHUNK_LEN {
                buf.put_u8(CONTINUATION);
                buf.put_u8(CONTINUATION);
            } else {
                buf.put_u8(chunk.len() as u8);
                buf.put_u8(CONTINUATION);
            }
        }
        buf.put_slice(chunk);
    }

    // An empty payload still carries the two-byte header.
    buf.to_vec()
}

/// Parses a complete chunked message buffer back into a frame.
///
/// The first chunk's length is implied: `min(255, remaining)`. Subsequent
/// chunks are sized by their markers.
///
/// # Errors
///
/// Returns [`Error::InvalidContinuation`] on a malformed marker pair and
/// [`Error::Truncated`] if a chunk runs past the end of the buffer.
pub fn decode_chunked(buf: &[u8]) -> Result<Frame> {
    if buf.len() < 2 {
        return Err(Error::Truncated {
            field: "chunked header",
            needed: 2,
            available: buf.len(),
        });
    }
    if buf[0] != CONTINUATION {
        return Err(Error::InvalidContinuation {
            first: buf[0],
            second: buf[1],
        });
    }
    let handler = buf[1];
    let rest = &buf[2..];

    let mut payload = Vec::with_capacity(rest.len());
    let first = rest.len().min(CHUNK_LEN);
    payload.extend_from_slice(&rest[..first]);
    let mut pos = first;

    while pos < rest.len() {
        if rest.len() - pos < 2 {
            return Err(Error::Truncated {
                field: "continuation marker",
                needed: 2,
                available: rest.len() - pos,
            });
        }
        let (m0, m1) = (rest[pos], rest[pos + 1]);
        pos += 2;

        if m1 != CONTINUATION {
            return Err(Error::InvalidContinuation {
                first: m0,
                second: m1,
            });
        }
        let chunk = if m0 == CONTINUATION {
            CHUNK_LEN
        } else {
            m0 as usize
        };
        if rest.len() - pos < chunk {
            return Err(Error::Truncated {
                field: "continuation chunk",
                needed: chunk,
                available: rest.len() - pos,
            });
        }
        payload.extend_from_slice(&rest[pos..pos + chunk]);
        pos += chunk;
    }

    Ok(Frame { handler, payload })
}

/// Result of reading one frame header off the wire.
#[derive(Debug)]
pub enum WireFrame {
    /// A complete single frame.
    Single(Frame),
    /// Start of a chunked message; the chunks are still on the wire.
    ChunkedStart {
        /// Handler identifier of the chunked message.
        handler: u8,
    },
}

/// Reads one frame header (and, for single frames, the payload).
pub async fn read_wire<R>(reader: &mut R) -> Result<WireFrame>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 2];
    reader.read_exact(&mut header).await?;

    if header[0] == CONTINUATION {
        return Ok(WireFrame::ChunkedStart { handler: header[1] });
    }

    let mut payload = vec![0u8; header[0] as usize];
    reader.read_exact(&mut payload).await?;
    Ok(WireFrame::Single(Frame {
        handler: header[1],
        payload,
    }))
}

/// Reads one single frame, rejecting the chunked form.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame>
where
    R: AsyncRead + Unpin,
{
    match read_wire(reader).await? {
        WireFrame::Single(frame) => Ok(frame),
        WireFrame::ChunkedStart { .. } => Err(Error::UnexpectedContinuation),
    }
}

/// Reads the chunks of a chunked message after [`WireFrame::ChunkedStart`].
///
/// The chunked form is only used for payloads longer than one chunk, so the
/// first chunk is always full. `total_len` inspects that chunk (which holds
/// the message's own header) and returns the aggregate payload length;
/// chunks are then concatenated until it is satisfied.
pub async fn read_chunked_payload<R, F>(reader: &mut R, total_len: F) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    F: FnOnce(&[u8]) -> Result<usize>,
{
    let mut first = vec![0u8; CHUNK_LEN];
    reader.read_exact(&mut first).await?;

    let total = total_len(&first)?;
    if total < CHUNK_LEN {
        return Err(Error::InvalidLength {
            expected: CHUNK_LEN,
            actual: total,
        });
    }

    let mut payload = first;
    while payload.len() < total {
        let mut marker = [0u8; 2];
        reader.read_exact(&mut marker).await?;

        if marker[1] != CONTINUATION {
            return Err(Error::InvalidContinuation {
                first: marker[0],
                second: marker[1],
            });
        }
        let chunk_len = if marker[0] == CONTINUATION {
            CHUNK_LEN
        } else {
            marker[0] as usize
        };
        if payload.len() + chunk_len > total {
            return Err(Error::InvalidLength {
                expected: total - payload.len(),
                actual: chunk_len,
            });
        }

        let mut chunk = vec![0u8; chunk_len];
        reader.read_exact(&mut chunk).await?;
        payload.extend_from_slice(&chunk);
    }

    Ok(payload)
}

/// Writes a frame, choosing the single or chunked form by payload size.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let wire = if frame.payload.len() > MAX_SINGLE_PAYLOAD {
        encode_chunked(frame.handler, &frame.payload)
    } else {
        frame.encode()?
    };
    writer.write_all(&wire).await?;
    writer.flush().await?;
    Ok(())
}

/// Encrypted message envelope carried in a handler-0x05 frame payload.
///
/// ```text
/// u16 BE    length of the decrypted body (sent in the clear)
/// byte[10]  encrypted padding
/// byte[n]   encrypted body
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Clear-text length header (decrypted body length).
    pub inner_len: u16,
    /// Encrypted padding bytes.
    pub padding: [u8; PADDING_LEN],
    /// Encrypted body.
    pub body: Vec<u8>,
}

impl Envelope {
    /// Parses an envelope from a frame payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < 2 + PADDING_LEN {
            return Err(Error::Truncated {
                field: "envelope",
                needed: 2 + PADDING_LEN,
                available: payload.len(),
            });
        }
        let inner_len = u16::from_be_bytes([payload[0], payload[1]]);
        let mut padding = [0u8; PADDING_LEN];
        padding.copy_from_slice(&payload[2..2 + PADDING_LEN]);
        Ok(Self {
            inner_len,
            padding,
            body: payload[2 + PADDING_LEN..].to_vec(),
        })
    }

    /// Assembles the envelope from a cipher block output
    /// (`padding || body`) and the plaintext length it encodes.
    pub fn from_sealed(inner_len: u16, sealed: &[u8]) -> Self {
        let mut padding = [0u8; PADDING_LEN];
        padding.copy_from_slice(&sealed[..PADDING_LEN]);
        Self {
            inner_len,
            padding,
            body: sealed[PADDING_LEN..].to_vec(),
        }
    }

    /// Serializes the envelope into a frame payload.
    pub fn to_payload(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(2 + PADDING_LEN + self.body.len());
        buf.put_u16(self.inner_len);
        buf.put_slice(&self.padding);
        buf.put_slice(&self.body);
        buf.to_vec()
    }
}
