use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use crate::conn::Connection;
use crate::conn::ConnectionExt;

impl Connection for TcpStream {
    type Error = std::io::Error;

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        use std::io::Write;

        Write::write_all(self, &[byte])
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        use std::io::Write;

        Write::write_all(self, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        use std::io::Write;

        Write::flush(self)
    }

    fn on_session_start(&mut self) -> Result<(), Self::Error> {
        // the protocol is lots of tiny packets, Nagle would only add latency
        self.set_nodelay(true)
    }
}

impl ConnectionExt for TcpStream {
    fn read_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<Option<usize>, Self::Error> {
        use std::io::Read;

        self.set_read_timeout(Some(timeout))?;

        match Read::read(self, buf) {
            Ok(n) => Ok(Some(n)),
            Err(ref e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
