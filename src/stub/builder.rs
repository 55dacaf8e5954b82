use std::fmt::{self, Display};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::server::GdbServer;
use super::{SessionConfig, DEFAULT_PORT};

/// An error which may occur when building a [`GdbServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GdbServerBuilderError {
    /// One of the poll intervals was zero.
    ZeroPollInterval,
    /// The receive chunk size was zero.
    ZeroChunkSize,
}

impl Display for GdbServerBuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::GdbServerBuilderError::*;
        match self {
            ZeroPollInterval => write!(f, "Poll intervals must be non-zero."),
            ZeroChunkSize => write!(f, "`recv_chunk_size` must be non-zero."),
        }
    }
}

impl std::error::Error for GdbServerBuilderError {}

/// Helper to construct and customize [`GdbServer`].
#[derive(Debug, Clone)]
pub struct GdbServerBuilder {
    bind_addr: IpAddr,
    port: u16,
    session: SessionConfig,
}

impl Default for GdbServerBuilder {
    fn default() -> GdbServerBuilder {
        GdbServerBuilder::new()
    }
}

impl GdbServerBuilder {
    /// Listen on every IPv4 interface, on [`DEFAULT_PORT`].
    pub fn new() -> GdbServerBuilder {
        GdbServerBuilder {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            session: SessionConfig::default(),
        }
    }

    /// Address to bind the listening socket to. Defaults to `0.0.0.0`.
    pub fn bind_addr(mut self, addr: impl Into<IpAddr>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Port to listen on. `0` lets the OS pick one, which can then be
    /// retrieved through [`ServerHandle::local_addr`](super::ServerHandle::local_addr).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// How long a single read (or accept) waits before the termination flag
    /// is re-checked. Defaults to 1 second.
    pub fn read_poll_interval(mut self, interval: Duration) -> Self {
        self.session.read_poll_interval = interval;
        self
    }

    /// Upper bound of a single wait for an emulated thread to change status.
    /// Defaults to 10 milliseconds.
    pub fn status_poll_interval(mut self, interval: Duration) -> Self {
        self.session.status_poll_interval = interval;
        self
    }

    /// Delay between two scans for a thread halted at a breakpoint while the
    /// process runs. Defaults to 100 milliseconds.
    pub fn breakpoint_poll_interval(mut self, interval: Duration) -> Self {
        self.session.breakpoint_poll_interval = interval;
        self
    }

    /// Size of a single read from the client connection. Defaults to 1024
    /// bytes.
    pub fn recv_chunk_size(mut self, size: usize) -> Self {
        self.session.recv_chunk_size = size;
        self
    }

    /// Build the GdbServer, returning an error if something went wrong.
    pub fn build(self) -> Result<GdbServer, GdbServerBuilderError> {
        let SessionConfig {
            read_poll_interval,
            status_poll_interval,
            breakpoint_poll_interval,
            recv_chunk_size,
        } = self.session;

        if [
            read_poll_interval,
            status_poll_interval,
            breakpoint_poll_interval,
        ]
        .contains(&Duration::ZERO)
        {
            return Err(GdbServerBuilderError::ZeroPollInterval);
        }

        if recv_chunk_size == 0 {
            return Err(GdbServerBuilderError::ZeroChunkSize);
        }

        Ok(GdbServer::from_parts(
            SocketAddr::new(self.bind_addr, self.port),
            self.session,
        ))
    }
}
