use crate::protocol::common::decode_hex;

/// Packet parse error.
#[derive(Debug, PartialEq, Eq)]
pub enum PacketParseError {
    ChecksumMismatched { checksum: u8, calculated: u8 },
    MissingChecksum,
    MalformedChecksum,
    UnexpectedHeader(u8),
}

impl core::fmt::Display for PacketParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use self::PacketParseError::*;
        match self {
            ChecksumMismatched {
                checksum,
                calculated,
            } => write!(
                f,
                "checksum mismatch (sent {:02x}, calculated {:02x})",
                checksum, calculated
            ),
            MissingChecksum => write!(f, "packet is missing its checksum"),
            MalformedChecksum => write!(f, "packet checksum is not a hex byte"),
            UnexpectedHeader(b) => write!(f, "unexpected packet header {:#04x}", b),
        }
    }
}

impl std::error::Error for PacketParseError {}

/// The 8-bit wrapping sum of every byte in `body`.
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |a, x| a.wrapping_add(*x))
}

/// A framed `$<body>#<checksum>` packet whose checksum has been validated.
#[derive(Debug, Clone)]
pub struct PacketBuf<'a> {
    buf: &'a [u8],
    body_range: core::ops::Range<usize>,
}

impl<'a> PacketBuf<'a> {
    /// Validate the contents of a raw `$...#xx` frame.
    ///
    /// The body itself is not interpreted: binary content is passed through
    /// untouched, and it is up to individual commands to reject it.
    pub fn new(pkt_buf: &'a [u8]) -> Result<PacketBuf<'a>, PacketParseError> {
        match pkt_buf.first() {
            Some(b'$') => {}
            Some(&b) => return Err(PacketParseError::UnexpectedHeader(b)),
            None => return Err(PacketParseError::MissingChecksum),
        }

        let hash = pkt_buf
            .iter()
            .position(|&b| b == b'#')
            .ok_or(PacketParseError::MissingChecksum)?;
        let body = &pkt_buf[1..hash];
        let checksum = pkt_buf
            .get(hash + 1..hash + 3)
            .ok_or(PacketParseError::MalformedChecksum)?;

        let checksum =
            decode_hex(checksum).map_err(|_| PacketParseError::MalformedChecksum)?;
        let calculated = self::checksum(body);
        if calculated != checksum {
            return Err(PacketParseError::ChecksumMismatched {
                checksum,
                calculated,
            });
        }

        Ok(PacketBuf {
            buf: pkt_buf,
            body_range: 1..hash,
        })
    }

    /// (used for tests) Create a packet buffer from a raw body buffer, skipping
    /// the header/checksum trimming stage.
    #[cfg(test)]
    pub fn new_with_raw_body(body: &'a [u8]) -> PacketBuf<'a> {
        PacketBuf {
            buf: body,
            body_range: 0..body.len(),
        }
    }

    pub fn trim_start_body_bytes(self, n: usize) -> Self {
        let start = (self.body_range.start + n).min(self.body_range.end);
        PacketBuf {
            buf: self.buf,
            body_range: start..self.body_range.end,
        }
    }

    /// If the body starts with `prefix`, trim it off and return `true`.
    pub fn strip_prefix(&mut self, prefix: &[u8]) -> bool {
        if self.as_body().starts_with(prefix) {
            self.body_range.start += prefix.len();
            true
        } else {
            false
        }
    }

    pub fn as_body(&self) -> &'a [u8] {
        &self.buf[self.body_range.clone()]
    }

    /// The body as text, with any non UTF-8 sequences replaced (for logging).
    pub fn body_lossy(&self) -> std::borrow::Cow<'a, str> {
        String::from_utf8_lossy(self.as_body())
    }
}
