//! Register definitions for 32-bit ARM.

/// `RegId` definitions for ARM.
pub mod id;

pub use id::ArmCoreRegId;
