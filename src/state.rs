use std::cmp::Ordering;

use crate::image::Image;
use crate::memory::Memory;

/// Conventional address for user programs to start.
pub const PC_START: u16 = 0x3000;

/// Represents complete machine state during runtime.
pub struct RunState {
    /// System memory - 65536 words.
    pub(crate) mem: Memory,
    /// Program counter
    pub(crate) pc: u16,
    /// 8x 16-bit registers
    pub(crate) reg: [u16; 8],
    /// Condition code
    pub(crate) flag: RunFlag,
}

/// Condition code, set from the last value written to a register.
///
/// Discriminants match the `nzp` bits of a BR instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunFlag {
    N = 0b100,
    Z = 0b010,
    P = 0b001,
}

impl RunFlag {
    /// Condition of a value as a signed word.
    pub fn of(val: u16) -> Self {
        match (val as i16).cmp(&0) {
            Ordering::Less => RunFlag::N,
            Ordering::Equal => RunFlag::Z,
            Ordering::Greater => RunFlag::P,
        }
    }

    /// Whether a BR instruction with these `nzp` bits is taken.
    pub fn matches(self, cc: u16) -> bool {
        self as u16 & cc != 0
    }
}

impl RunState {
    /// Zeroed machine with the program counter at [`PC_START`].
    pub fn new() -> Self {
        Self {
            mem: Memory::new(),
            pc: PC_START,
            reg: [0; 8],
            flag: RunFlag::Z,
        }
    }

    /// Place an image in memory. Later loads overwrite earlier ones.
    pub fn load(&mut self, image: &Image) {
        self.mem.load(image.origin(), image.words());
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn reg(&self, reg: usize) -> u16 {
        self.reg[reg]
    }

    /// Set a register without touching the condition code.
    pub fn set_reg(&mut self, reg: usize, val: u16) {
        self.reg[reg] = val;
    }

    pub fn flag(&self) -> RunFlag {
        self.flag
    }

    pub fn mem(&self) -> &Memory {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    /// Write a register as an instruction result, updating the condition code.
    pub(crate) fn write_reg(&mut self, reg: usize, val: u16) {
        self.reg[reg] = val;
        self.update_flags(reg);
    }

    pub(crate) fn update_flags(&mut self, reg: usize) {
        self.flag = RunFlag::of(self.reg[reg]);
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_total() {
        let mut state = RunState::new();
        for val in 0..=u16::MAX {
            state.set_reg(3, val);
            state.update_flags(3);
            let expected = if val == 0 {
                RunFlag::Z
            } else if val & 0x8000 != 0 {
                RunFlag::N
            } else {
                RunFlag::P
            };
            assert_eq!(state.flag(), expected, "flag for 0x{val:04x}");
            // Exactly one bit set
            assert_eq!((state.flag() as u16).count_ones(), 1);
        }
    }

    #[test]
    fn initial_state() {
        let state = RunState::new();
        assert_eq!(state.pc(), 0x3000);
        assert_eq!(state.flag(), RunFlag::Z);
        assert!((0..8).all(|i| state.reg(i) == 0));
    }

    #[test]
    fn flag_matches_branch_bits() {
        assert!(RunFlag::N.matches(0b100));
        assert!(RunFlag::Z.matches(0b011));
        assert!(!RunFlag::P.matches(0b110));
        assert!(!RunFlag::Z.matches(0b000));
    }
}
