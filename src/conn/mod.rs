//! Traits to perform in-order, serial, byte-wise I/O.

use std::time::Duration;

mod impls;

/// A trait to perform in-order, serial, byte-wise I/O.
///
/// Implemented for [`TcpStream`](std::net::TcpStream), and for `Vec<u8>` (as
/// a write-only sink, handy in tests).
pub trait Connection {
    /// Transport-specific error type.
    type Error;

    /// Write a single byte.
    fn write(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Write the entire buffer, blocking until complete.
    ///
    /// This method's default implementation calls `self.write()` on each byte
    /// in the buffer. This can be quite inefficient, so if a more efficient
    /// implementation exists (such as calling `write_all()` on an underlying
    /// `std::io::Write` object), this method should be overwritten.
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        for b in buf {
            self.write(*b)?;
        }
        Ok(())
    }

    /// Flush this Connection, ensuring that all intermediately buffered
    /// contents reach their destination.
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Called once a client has been accepted, _before_ any packets have been
    /// sent/received.
    ///
    /// This method's default implementation is a no-op.
    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Extends [`Connection`] with a bounded-wait `read`.
///
/// The dispatch loop never blocks on the connection for longer than a single
/// poll interval, which is how a shutdown request interrupts a session that is
/// waiting for the client.
pub trait ConnectionExt: Connection {
    /// Read whatever is available into `buf`, waiting at most `timeout` for
    /// data to arrive.
    ///
    /// Returns `Ok(None)` if the wait timed out, and `Ok(Some(0))` if the peer
    /// closed the connection.
    fn read_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<usize>, Self::Error>;
}
