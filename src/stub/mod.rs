//! The debug server: session dispatch, and the TCP listener that hosts it.
//!
//! Most users only need [`GdbServer`]: it binds a listening socket, serves a
//! single GDB client on a background thread, and can be stopped through the
//! returned [`ServerHandle`]. [`GdbStub`] runs one session over any
//! [`ConnectionExt`], on the calling thread.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::conn::{Connection, ConnectionExt};
use crate::protocol::RecvPacketFramer;
use crate::target::Target;

mod builder;
mod core_impl;
mod error;
mod server;

pub use builder::{GdbServerBuilder, GdbServerBuilderError};
pub use core_impl::DisconnectReason;
pub use error::GdbServerError;
pub use server::{GdbServer, ServerHandle};

use core_impl::State;
use GdbServerError as Error;

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 2159;

/// Timing and buffering knobs of a single debugging session.
///
/// Every wait the session performs is bounded by one of these intervals, after
/// which the termination flag is re-checked.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a single read waits for client data.
    pub read_poll_interval: Duration,
    /// How long a single wait for a thread status transition lasts.
    pub status_poll_interval: Duration,
    /// Delay between two scans for a thread halted at a breakpoint.
    pub breakpoint_poll_interval: Duration,
    /// Size of a single read from the connection.
    pub recv_chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            read_poll_interval: Duration::from_secs(1),
            status_poll_interval: Duration::from_millis(10),
            breakpoint_poll_interval: Duration::from_millis(100),
            recv_chunk_size: 1024,
        }
    }
}

/// Debug a [`Target`] over a single [`Connection`].
pub struct GdbStub<T: Target, C: Connection> {
    conn: C,
    framer: RecvPacketFramer,
    inner: core_impl::GdbStubImpl<T>,
}

impl<T: Target, C: ConnectionExt> GdbStub<T, C> {
    /// Create a session over `conn`. Raising `die` ends the session within
    /// one poll interval, without sending any further replies.
    pub fn new(conn: C, config: SessionConfig, die: Arc<AtomicBool>) -> GdbStub<T, C> {
        GdbStub {
            conn,
            framer: RecvPacketFramer::new(),
            inner: core_impl::GdbStubImpl::new(config, die),
        }
    }

    /// Serve the client until it disconnects, kills the session, or the
    /// termination flag is raised.
    pub fn run_blocking(mut self, target: &T) -> Result<DisconnectReason, Error<C::Error>> {
        self.conn.on_session_start().map_err(Error::ConnectionInit)?;

        let read_timeout = self.inner.config.read_poll_interval;
        let mut chunk = vec![0; self.inner.config.recv_chunk_size];
        loop {
            if self.inner.is_terminated() {
                return Ok(DisconnectReason::Terminated);
            }

            let n = match self
                .conn
                .read_timeout(&mut chunk, read_timeout)
                .map_err(Error::ConnectionRead)?
            {
                None => continue,
                Some(0) => return Ok(DisconnectReason::PeerClosed),
                Some(n) => n,
            };

            self.framer.push(&chunk[..n]);
            while let Some(frame) = self.framer.next_frame() {
                match self.inner.handle_frame(target, &mut self.conn, frame)? {
                    State::Pump => {}
                    State::Disconnect(reason) => return Ok(reason),
                }
            }
        }
    }
}
