//! Architecture-specific register numbering.

use core::fmt::Debug;

pub mod arm;

/// Register identifier, as numbered by the GDB client in `p`/`P` packets and
/// ordered in `g`/`G` packets.
pub trait RegId: Sized + Debug + Copy {
    /// Map a raw GDB register number to a `RegId`.
    ///
    /// Returns `None` if the register is not available.
    fn from_raw_id(id: usize) -> Option<Self>;

    /// Inverse of [`RegId::from_raw_id`].
    fn to_raw_id(self) -> usize;
}
