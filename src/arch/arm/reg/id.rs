use crate::arch::RegId;

/// 32-bit ARM core register identifier.
///
/// The numbering must match the client's exactly: 0-12 general purpose, 13
/// SP, 14 LR, 15 PC, 16-23 single precision floating point, 24 FPSCR, 25
/// CPSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmCoreRegId {
    /// General purpose registers (R0-R12)
    Gpr(u8),
    /// Stack Pointer (R13)
    Sp,
    /// Link Register (R14)
    Lr,
    /// Program Counter (R15)
    Pc,
    /// Floating point registers (S0-S7)
    Fpr(u8),
    /// Floating point status and control register
    Fpscr,
    /// Current Program Status Register
    Cpsr,
}

impl ArmCoreRegId {
    /// Number of registers transferred by `g`/`G` packets.
    pub const COUNT: usize = 26;

    /// Every register, in `g`/`G` packet order.
    pub fn all() -> impl Iterator<Item = ArmCoreRegId> {
        (0..Self::COUNT).filter_map(Self::from_raw_id)
    }
}

impl RegId for ArmCoreRegId {
    fn from_raw_id(id: usize) -> Option<Self> {
        let reg = match id {
            0..=12 => Self::Gpr(id as u8),
            13 => Self::Sp,
            14 => Self::Lr,
            15 => Self::Pc,
            16..=23 => Self::Fpr((id - 16) as u8),
            24 => Self::Fpscr,
            25 => Self::Cpsr,
            _ => return None,
        };
        Some(reg)
    }

    fn to_raw_id(self) -> usize {
        match self {
            Self::Gpr(n) => n as usize,
            Self::Sp => 13,
            Self::Lr => 14,
            Self::Pc => 15,
            Self::Fpr(n) => 16 + n as usize,
            Self::Fpscr => 24,
            Self::Cpsr => 25,
        }
    }
}
