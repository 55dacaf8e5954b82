use log::*;

use crate::arch::arm::reg::ArmCoreRegId;
use crate::arch::RegId;

/// Register access primitives of an emulated ARM core.
pub trait Cpu {
    /// Read general purpose register `n` (R0-R12).
    fn read_reg(&self, n: usize) -> u32;
    fn write_reg(&mut self, n: usize, value: u32);

    fn read_sp(&self) -> u32;
    fn write_sp(&mut self, value: u32);

    fn read_lr(&self) -> u32;
    fn write_lr(&mut self, value: u32);

    fn read_pc(&self) -> u32;
    fn write_pc(&mut self, value: u32);

    /// Read single precision floating point register `n` (S0-S7).
    fn read_float_reg(&self, n: usize) -> f32;
    fn write_float_reg(&mut self, n: usize, value: f32);

    fn read_fpscr(&self) -> u32;
    fn write_fpscr(&mut self, value: u32);

    fn read_cpsr(&self) -> u32;
    fn write_cpsr(&mut self, value: u32);

    /// Whether execution stopped on an active breakpoint at the current PC.
    fn hit_breakpoint(&self) -> bool;
}

/// Read a register by its raw GDB number. Floating point registers are
/// returned as their raw bits.
///
/// Unknown register numbers are logged and read as zero.
pub fn fetch_reg<C: Cpu + ?Sized>(cpu: &C, reg: usize) -> u32 {
    let Some(id) = ArmCoreRegId::from_raw_id(reg) else {
        info!("GDB client queried invalid register {}", reg);
        return 0;
    };

    match id {
        ArmCoreRegId::Gpr(n) => cpu.read_reg(n as usize),
        ArmCoreRegId::Sp => cpu.read_sp(),
        ArmCoreRegId::Lr => cpu.read_lr(),
        ArmCoreRegId::Pc => cpu.read_pc(),
        ArmCoreRegId::Fpr(n) => cpu.read_float_reg(n as usize).to_bits(),
        ArmCoreRegId::Fpscr => cpu.read_fpscr(),
        ArmCoreRegId::Cpsr => cpu.read_cpsr(),
    }
}

/// Write a register by its raw GDB number. Floating point registers take
/// their raw bits.
///
/// Unknown register numbers are logged and ignored.
pub fn modify_reg<C: Cpu + ?Sized>(cpu: &mut C, reg: usize, value: u32) {
    let Some(id) = ArmCoreRegId::from_raw_id(reg) else {
        info!("GDB client modified invalid register {}", reg);
        return;
    };

    match id {
        ArmCoreRegId::Gpr(n) => cpu.write_reg(n as usize, value),
        ArmCoreRegId::Sp => cpu.write_sp(value),
        ArmCoreRegId::Lr => cpu.write_lr(value),
        ArmCoreRegId::Pc => cpu.write_pc(value),
        ArmCoreRegId::Fpr(n) => cpu.write_float_reg(n as usize, f32::from_bits(value)),
        ArmCoreRegId::Fpscr => cpu.write_fpscr(value),
        ArmCoreRegId::Cpsr => cpu.write_cpsr(value),
    }
}
