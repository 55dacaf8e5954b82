#[cfg(feature = "trace-pkt")]
use log::trace;

use crate::conn::Connection;

/// Newtype around a Connection error. Having a newtype allows implementing a
/// `From<ResponseWriterError<C>> for GdbServerError<C>`, which keeps the error
/// handling in the dispatch loop down to a `?`.
#[derive(Debug, Clone)]
pub struct Error<C>(pub C);

/// A wrapper around [`Connection`] that frames a reply as `$<data>#<checksum>`.
///
/// The frame is assembled in memory and handed to the connection in a single
/// `write_all` on [`ResponseWriter::flush`].
pub struct ResponseWriter<'a, C: Connection> {
    inner: &'a mut C,
    buf: Vec<u8>,
    checksum: u8,
}

impl<'a, C: Connection + 'a> ResponseWriter<'a, C> {
    /// Creates a new ResponseWriter
    pub fn new(inner: &'a mut C) -> Self {
        Self {
            inner,
            buf: vec![b'$'],
            checksum: 0,
        }
    }

    /// Consumes self, writing out the frame with its final '#' and checksum
    pub fn flush(mut self) -> Result<(), Error<C::Error>> {
        // don't include the '#' in checksum calculation
        let checksum = self.checksum;
        self.buf.push(b'#');
        self.write_hex(checksum);

        #[cfg(feature = "trace-pkt")]
        trace!("--> {}", String::from_utf8_lossy(&self.buf));

        self.inner.write_all(&self.buf).map_err(Error)?;
        self.inner.flush().map_err(Error)
    }

    fn write(&mut self, byte: u8) {
        self.checksum = self.checksum.wrapping_add(byte);
        self.buf.push(byte);
    }

    /// Append an entire string to the reply.
    pub fn write_str(&mut self, s: &str) {
        for b in s.as_bytes().iter() {
            self.write(*b);
        }
    }

    /// Write a single byte as a hex string (two ascii chars)
    fn write_hex(&mut self, byte: u8) {
        for &digit in [(byte & 0xf0) >> 4, byte & 0x0f].iter() {
            let c = match digit {
                0..=9 => b'0' + digit,
                _ => b'a' + digit - 10,
            };
            self.buf.push(c);
        }
    }
}

/// Send a bare transport acknowledgement (`+` or `-`).
pub fn write_ack<C: Connection>(conn: &mut C, ack: bool) -> Result<(), Error<C::Error>> {
    conn.write(if ack { b'+' } else { b'-' }).map_err(Error)?;
    conn.flush().map_err(Error)
}
