use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::*;

use super::builder::GdbServerBuilder;
use super::{DisconnectReason, GdbServerError, GdbStub, SessionConfig};
use crate::target::Target;

type SessionResult = Result<DisconnectReason, GdbServerError<io::Error>>;

/// A TCP debug server, serving a single GDB client at a time.
#[derive(Debug, Clone)]
pub struct GdbServer {
    addr: SocketAddr,
    session: SessionConfig,
}

impl GdbServer {
    /// Helper method to construct and customize a [`GdbServer`].
    pub fn builder() -> GdbServerBuilder {
        GdbServerBuilder::new()
    }

    /// A server listening on `0.0.0.0:2159`, with default timings.
    pub fn new() -> GdbServer {
        GdbServer::from_parts(
            SocketAddr::from(([0, 0, 0, 0], super::DEFAULT_PORT)),
            SessionConfig::default(),
        )
    }

    pub(super) fn from_parts(addr: SocketAddr, session: SessionConfig) -> GdbServer {
        GdbServer { addr, session }
    }

    /// Address the server will bind to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session
    }

    /// Bind the listening socket and start the dispatch thread.
    ///
    /// The dispatch thread accepts exactly one client, serves it, then closes
    /// the connection and the listener. Errors while binding or spawning are
    /// logged and returned; nothing is retried.
    pub fn listen<T: Target>(
        self,
        target: Arc<T>,
    ) -> Result<ServerHandle, GdbServerError<io::Error>> {
        info!("Starting GDB Server...");

        let listener = TcpListener::bind(self.addr).map_err(|e| {
            error!("GDB Server Failed: Could not bind {}: {}", self.addr, e);
            GdbServerError::Bind(e)
        })?;
        listener.set_nonblocking(true).map_err(|e| {
            error!("GDB Server Failed: Could not listen on socket: {}", e);
            GdbServerError::Listen(e)
        })?;
        let local_addr = listener.local_addr().map_err(GdbServerError::Listen)?;

        let die = Arc::new(AtomicBool::new(false));
        let thread = {
            let die = Arc::clone(&die);
            let config = self.session;
            thread::Builder::new()
                .name("gdb-server".into())
                .spawn(move || serve(listener, config, die, target))
                .map_err(|e| {
                    error!("GDB Server Failed: Could not start dispatch thread: {}", e);
                    GdbServerError::Spawn(e)
                })?
        };

        info!("GDB Server is listening on {}", local_addr);

        Ok(ServerHandle {
            die,
            local_addr,
            thread: Some(thread),
        })
    }
}

impl Default for GdbServer {
    fn default() -> GdbServer {
        GdbServer::new()
    }
}

/// Body of the dispatch thread.
fn serve<T: Target>(
    listener: TcpListener,
    config: SessionConfig,
    die: Arc<AtomicBool>,
    target: Arc<T>,
) -> SessionResult {
    let stream = loop {
        if die.load(Ordering::SeqCst) {
            return Ok(DisconnectReason::Terminated);
        }

        match listener.accept() {
            Ok((stream, peer)) => {
                info!("GDB Server Received Connection from {}", peer);
                break stream;
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                thread::sleep(config.read_poll_interval)
            }
            Err(e) => {
                error!("GDB Server Failed: Could not accept socket: {}", e);
                die.store(true, Ordering::SeqCst);
                return Err(GdbServerError::Accept(e));
            }
        }
    };

    // accepted sockets may inherit the listener's non-blocking mode
    let res = match stream.set_nonblocking(false) {
        Ok(()) => GdbStub::new(stream, config, Arc::clone(&die))
            .run_blocking(&*target),
        Err(e) => Err(GdbServerError::ConnectionInit(e)),
    };

    match &res {
        Ok(reason) => info!("GDB Server Connection Closed ({:?})", reason),
        Err(e) => error!("GDB Server Connection Closed: {}", e),
    }

    drop(listener);
    die.store(true, Ordering::SeqCst);
    res
}

/// Controls a running [`GdbServer`].
///
/// Dropping the handle shuts the server down.
#[derive(Debug)]
pub struct ServerHandle {
    die: Arc<AtomicBool>,
    local_addr: SocketAddr,
    thread: Option<JoinHandle<SessionResult>>,
}

impl ServerHandle {
    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The flag observed by every blocking loop of the server. Raising it is
    /// equivalent to calling [`ServerHandle::shutdown`] without the join.
    pub fn termination_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.die)
    }

    /// Whether the dispatch thread has exited, e.g: after the client detached
    /// or killed the session.
    pub fn is_finished(&self) -> bool {
        match &self.thread {
            Some(thread) => thread.is_finished(),
            None => true,
        }
    }

    /// Raise the termination flag, and wait for the dispatch thread to exit.
    ///
    /// Returns how the session ended, or `None` if it was already collected
    /// or if called from the dispatch thread itself.
    pub fn shutdown(&mut self) -> Option<SessionResult> {
        self.die.store(true, Ordering::SeqCst);
        self.join_thread()
    }

    /// Wait for the session to end on its own.
    pub fn join(mut self) -> Option<SessionResult> {
        self.join_thread()
    }

    fn join_thread(&mut self) -> Option<SessionResult> {
        let thread = self.thread.take()?;
        if thread.thread().id() == thread::current().id() {
            return None;
        }

        match thread.join() {
            Ok(res) => Some(res),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(Err(e)) = self.shutdown() {
            warn!("GDB Server exited with an error: {}", e);
        }
    }
}
