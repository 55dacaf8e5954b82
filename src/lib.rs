//! A GDB Remote Serial Protocol server for a multi-threaded 32-bit ARM process
//! emulator, plus the guest pointer translation it reads and writes memory
//! through.
//!
//! The emulator plugs in by implementing [`target::Target`] (the process),
//! [`target::GuestThread`] (its scheduler threads) and [`target::Cpu`] (a
//! thread's register file). Guest memory is described by a
//! [`mem::MemState`], which maps 32-bit guest addresses onto host memory
//! either flat or through a page table.
//!
//! ```no_run
//! # fn start<T: emu_gdbstub::target::Target>(emulator: std::sync::Arc<T>) {
//! use emu_gdbstub::stub::GdbServer;
//!
//! let mut handle = GdbServer::builder()
//!     .port(2159)
//!     .build()
//!     .unwrap()
//!     .listen(emulator)
//!     .unwrap();
//!
//! // ... run the emulator ...
//!
//! handle.shutdown();
//! # }
//! ```
//!
//! ## Features
//!
//! - `trace-pkt` (default): log every packet received and sent at `trace`
//!   level.

pub mod arch;
pub mod conn;
pub mod mem;
mod protocol;
pub mod stub;
pub mod target;

pub use stub::{GdbServer, GdbServerBuilder, GdbServerError, ServerHandle};
