use core::fmt::{self, Debug, Display};
use std::io;

use crate::protocol::ResponseWriterError;

/// An error which may occur while starting or running the debug server.
#[derive(Debug)]
#[non_exhaustive]
pub enum GdbServerError<C> {
    /// Could not create, bind or listen on the server socket.
    Bind(io::Error),
    /// Could not switch the listening socket to polled accepts.
    Listen(io::Error),
    /// Could not spawn the dispatch thread.
    Spawn(io::Error),
    /// Waiting for a client failed.
    Accept(io::Error),

    /// Connection Error while initializing the session.
    ConnectionInit(C),
    /// Connection Error while reading request.
    ConnectionRead(C),
    /// Connection Error while writing response.
    ConnectionWrite(C),
}

impl<C> From<ResponseWriterError<C>> for GdbServerError<C> {
    fn from(e: ResponseWriterError<C>) -> Self {
        GdbServerError::ConnectionWrite(e.0)
    }
}

impl<C> Display for GdbServerError<C>
where
    C: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::GdbServerError::*;
        match self {
            Bind(e) => write!(f, "Could not bind the GDB server socket: {}", e),
            Listen(e) => write!(f, "Could not listen on the GDB server socket: {}", e),
            Spawn(e) => write!(f, "Could not start the GDB server thread: {}", e),
            Accept(e) => write!(f, "Could not accept a GDB client: {}", e),

            ConnectionInit(e) => write!(
                f,
                "Connection Error while initializing the session: {:?}",
                e
            ),
            ConnectionRead(e) => write!(f, "Connection Error while reading request: {:?}", e),
            ConnectionWrite(e) => write!(f, "Connection Error while writing response: {:?}", e),
        }
    }
}

impl<C> std::error::Error for GdbServerError<C> where C: Debug {}

/// A recoverable error raised while handling a single command.
///
/// Never propagated past the dispatch loop: it is sent back to the client as
/// an `E<code>` reply, and the session carries on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlerError {
    Errno(u8),
}

impl HandlerError {
    /// The thread (or register) named by the command does not exist.
    pub const INVALID_THREAD: HandlerError = HandlerError::Errno(0x00);
    /// The address range named by the command is not usable.
    pub const INVALID_MEMORY: HandlerError = HandlerError::Errno(0xAA);
}

/// Extension trait to ease turning failed lookups into [`HandlerError`]s.
pub(crate) trait HandlerResultExt<V> {
    fn or_errno(self, err: HandlerError) -> Result<V, HandlerError>;
}

impl<V> HandlerResultExt<V> for Option<V> {
    fn or_errno(self, err: HandlerError) -> Result<V, HandlerError> {
        self.ok_or(err)
    }
}

impl HandlerResultExt<()> for bool {
    fn or_errno(self, err: HandlerError) -> Result<(), HandlerError> {
        if self {
            Ok(())
        } else {
            Err(err)
        }
    }
}
