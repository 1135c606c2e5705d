//! Register file.
use crate::constants::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub v: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address.
    pub i: Address,
    /// Program counter pointing to the current position in the bytecode.
    pub pc: Address,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            v: [0; REGISTER_COUNT],
            i: 0,
            pc: MEM_START as Address,
        }
    }
}

impl Registers {
    #[inline(always)]
    pub fn get(&self, vx: u8) -> u8 {
        self.v[vx as usize & 0xF]
    }

    #[inline(always)]
    pub fn set(&mut self, vx: u8, value: u8) {
        self.v[vx as usize & 0xF] = value;
    }

    /// Write the flag register.
    ///
    /// Must be called after all operands have been read,
    /// since VF doubles as a general purpose register.
    #[inline(always)]
    pub fn set_flag(&mut self, flag: bool) {
        self.v[FLAG_REGISTER] = flag as u8;
    }

    #[inline(always)]
    pub fn flag(&self) -> u8 {
        self.v[FLAG_REGISTER]
    }
}
