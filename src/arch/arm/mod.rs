//! 32-bit ARM (ARMv7-A user mode with VFP), as seen by the GDB client.

pub mod reg;
