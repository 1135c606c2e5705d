//! Instruction decoding.
use std::fmt;

use crate::constants::Address;

/// A single 16-bit instruction word, as read from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Instructions are stored big-endian.
    #[inline(always)]
    pub fn from_bytes([a, b]: [u8; 2]) -> Self {
        Self(((a as u16) << 8) | b as u16)
    }

    /// Opcode identity in the first 4-bit nibble.
    #[inline(always)]
    pub fn group(self) -> u8 {
        (self.0 >> 12) as u8 // 0xF000
    }

    #[inline(always)]
    pub fn x(self) -> u8 {
        ((self.0 >> 8) & 0xF) as u8 // 0x0F00
    }

    #[inline(always)]
    pub fn y(self) -> u8 {
        ((self.0 >> 4) & 0xF) as u8 // 0x00F0
    }

    #[inline(always)]
    pub fn n(self) -> u8 {
        (self.0 & 0xF) as u8 // 0x000F
    }

    #[inline(always)]
    pub fn nn(self) -> u8 {
        (self.0 & 0xFF) as u8 // 0x00FF
    }

    #[inline(always)]
    pub fn nnn(self) -> Address {
        self.0 & 0xFFF // 0x0FFF
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Decoded operation.
///
/// Each variant is executed by exactly one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// 00E0 (CLS)
    ///
    /// Clear the screen.
    ClearScreen,
    /// 00EE (RET)
    ///
    /// Return from the sub-routine.
    Return,
    /// 1nnn (JP addr)
    ///
    /// Jump to the address in `nnn`.
    Jump { address: Address },
    /// 2nnn (CALL addr)
    ///
    /// Call the sub-routine at address `nnn`.
    Call { address: Address },
    /// 3xnn (SE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` equals value `nn`
    SkipEqByte { vx: u8, nn: u8 },
    /// 4xnn (SNE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` does not equal value `nn`.
    SkipNotEqByte { vx: u8, nn: u8 },
    /// 5xy0 (SE Vx, Vy)
    ///
    /// Skip the next instruction if register `Vx` equals register `Vy`.
    SkipEq { vx: u8, vy: u8 },
    /// 6xnn (LD Vx, byte)
    LoadByte { vx: u8, nn: u8 },
    /// 7xnn (ADD Vx, byte)
    ///
    /// Add byte to the value in register `Vx`, store the result in `Vx`.
    /// Carry flag is not set.
    AddByte { vx: u8, nn: u8 },

    // ------------------------------------------------------------------------
    // Math
    /// 8xy0 (LD Vx, Vy)
    Load { vx: u8, vy: u8 },
    /// 8xy1 (OR Vx, Vy)
    Or { vx: u8, vy: u8 },
    /// 8xy2 (AND Vx, Vy)
    And { vx: u8, vy: u8 },
    /// 8xy3 (XOR Vx, Vy)
    Xor { vx: u8, vy: u8 },
    /// 8xy4 (ADD Vx, Vy)
    ///
    /// Overflow is wrapped. If overflowed, set VF to 1, else 0.
    Add { vx: u8, vy: u8 },
    /// 8xy5 (SUB Vx, Vy)
    ///
    /// VF is set to 0 when there is a borrow, set to 1 when there isn't.
    Sub { vx: u8, vy: u8 },
    /// 8xy6 (SHR Vx)
    ///
    /// VF is set to the least-significant bit of Vx before the shift. VY is unused.
    ShiftRight { vx: u8 },
    /// 8xy7 (SUBN Vx, Vy)
    ///
    /// Subtracts VX from VY, and stores the result in VX.
    SubReverse { vx: u8, vy: u8 },
    /// 8xyE (SHL Vx)
    ///
    /// VF is set to the most-significant bit of Vx before the shift. VY is unused.
    ShiftLeft { vx: u8 },

    /// 9xy0 (SNE Vx, Vy)
    SkipNotEq { vx: u8, vy: u8 },
    /// Annn (LD I, addr)
    ///
    /// Load address into register `I`.
    LoadAddress { address: Address },
    /// Bnnn (JP V0, addr)
    ///
    /// Jump to location nnn + V0.
    JumpOffset { address: Address },
    /// Cxnn (RND Vx, byte)
    Random { vx: u8, nn: u8 },
    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer.
    Draw { vx: u8, vy: u8, n: u8 },

    // ------------------------------------------------------------------------
    // Keyboard
    /// Ex9E (SKP Vx)
    SkipKey { vx: u8 },
    /// ExA1 (SKNP Vx)
    SkipNotKey { vx: u8 },

    // ------------------------------------------------------------------------
    // Miscellaneous
    /// Fx07 (LD Vx, DT)
    LoadDelay { vx: u8 },
    /// Fx0A (LD Vx, K)
    WaitKey { vx: u8 },
    /// Fx15 (LD DT, Vx)
    SetDelay { vx: u8 },
    /// Fx18 (LD ST, Vx)
    SetSound { vx: u8 },
    /// Fx1E (ADD I, Vx)
    AddAddress { vx: u8 },
    /// Fx29 (LD F, Vx)
    LoadGlyph { vx: u8 },
    /// Fx33 (LD B, Vx)
    StoreBcd { vx: u8 },
    /// Fx55 (LD [I], Vx)
    StoreRegisters { vx: u8 },
    /// Fx65 (LD Vx, [I])
    LoadRegisters { vx: u8 },
}

impl Op {
    /// Classify an instruction word.
    ///
    /// Returns `None` when the group or sub-code is not part of the instruction set.
    pub fn decode(opcode: Opcode) -> Option<Op> {
        let (vx, vy, n, nn, address) = (
            opcode.x(),
            opcode.y(),
            opcode.n(),
            opcode.nn(),
            opcode.nnn(),
        );

        let op = match opcode.group() {
            0x0 => match opcode.0 {
                0x00E0 => Op::ClearScreen,
                0x00EE => Op::Return,
                _ => return None,
            },
            0x1 => Op::Jump { address },
            0x2 => Op::Call { address },
            0x3 => Op::SkipEqByte { vx, nn },
            0x4 => Op::SkipNotEqByte { vx, nn },
            0x5 if n == 0 => Op::SkipEq { vx, vy },
            0x6 => Op::LoadByte { vx, nn },
            0x7 => Op::AddByte { vx, nn },
            0x8 => match n {
                0x0 => Op::Load { vx, vy },
                0x1 => Op::Or { vx, vy },
                0x2 => Op::And { vx, vy },
                0x3 => Op::Xor { vx, vy },
                0x4 => Op::Add { vx, vy },
                0x5 => Op::Sub { vx, vy },
                0x6 => Op::ShiftRight { vx },
                0x7 => Op::SubReverse { vx, vy },
                0xE => Op::ShiftLeft { vx },
                _ => return None,
            },
            0x9 if n == 0 => Op::SkipNotEq { vx, vy },
            0xA => Op::LoadAddress { address },
            0xB => Op::JumpOffset { address },
            0xC => Op::Random { vx, nn },
            0xD => Op::Draw { vx, vy, n },
            0xE => match nn {
                0x9E => Op::SkipKey { vx },
                0xA1 => Op::SkipNotKey { vx },
                _ => return None,
            },
            0xF => match nn {
                0x07 => Op::LoadDelay { vx },
                0x0A => Op::WaitKey { vx },
                0x15 => Op::SetDelay { vx },
                0x18 => Op::SetSound { vx },
                0x1E => Op::AddAddress { vx },
                0x29 => Op::LoadGlyph { vx },
                0x33 => Op::StoreBcd { vx },
                0x55 => Op::StoreRegisters { vx },
                0x65 => Op::LoadRegisters { vx },
                _ => return None,
            },
            _ => return None,
        };

        Some(op)
    }
}

/// Assembly mnemonic representation.
impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Op::ClearScreen => write!(f, "CLS"),
            Op::Return => write!(f, "RET"),
            Op::Jump { address } => write!(f, "JP 0x{address:03X}"),
            Op::Call { address } => write!(f, "CALL 0x{address:03X}"),
            Op::SkipEqByte { vx, nn } => write!(f, "SE v{vx:X}, {nn}"),
            Op::SkipNotEqByte { vx, nn } => write!(f, "SNE v{vx:X}, {nn}"),
            Op::SkipEq { vx, vy } => write!(f, "SE v{vx:X}, v{vy:X}"),
            Op::LoadByte { vx, nn } => write!(f, "LD v{vx:X}, {nn}"),
            Op::AddByte { vx, nn } => write!(f, "ADD v{vx:X}, {nn}"),
            // ------
            Op::Load { vx, vy } => write!(f, "LD v{vx:X}, v{vy:X}"),
            Op::Or { vx, vy } => write!(f, "OR v{vx:X}, v{vy:X}"),
            Op::And { vx, vy } => write!(f, "AND v{vx:X}, v{vy:X}"),
            Op::Xor { vx, vy } => write!(f, "XOR v{vx:X}, v{vy:X}"),
            Op::Add { vx, vy } => write!(f, "ADD v{vx:X}, v{vy:X}"),
            Op::Sub { vx, vy } => write!(f, "SUB v{vx:X}, v{vy:X}"),
            Op::ShiftRight { vx } => write!(f, "SHR v{vx:X}"),
            Op::SubReverse { vx, vy } => write!(f, "SUBN v{vx:X}, v{vy:X}"),
            Op::ShiftLeft { vx } => write!(f, "SHL v{vx:X}"),
            // ------
            Op::SkipNotEq { vx, vy } => write!(f, "SNE v{vx:X}, v{vy:X}"),
            Op::LoadAddress { address } => write!(f, "LD I, 0x{address:03X}"),
            Op::JumpOffset { address } => write!(f, "JP v0, 0x{address:03X}"),
            Op::Random { vx, nn } => write!(f, "RND v{vx:X}, {nn}"),
            Op::Draw { vx, vy, n } => write!(f, "DRW v{vx:X}, v{vy:X}, {n}"),
            // ------
            Op::SkipKey { vx } => write!(f, "SKP v{vx:X}"),
            Op::SkipNotKey { vx } => write!(f, "SKNP v{vx:X}"),
            // ------
            Op::LoadDelay { vx } => write!(f, "LD v{vx:X}, DT"),
            Op::WaitKey { vx } => write!(f, "LD v{vx:X}, K"),
            Op::SetDelay { vx } => write!(f, "LD DT, v{vx:X}"),
            Op::SetSound { vx } => write!(f, "LD ST, v{vx:X}"),
            Op::AddAddress { vx } => write!(f, "ADD I, v{vx:X}"),
            Op::LoadGlyph { vx } => write!(f, "LD F, v{vx:X}"),
            Op::StoreBcd { vx } => write!(f, "LD B, v{vx:X}"),
            Op::StoreRegisters { vx } => write!(f, "LD [I], v{vx:X}"),
            Op::LoadRegisters { vx } => write!(f, "LD v{vx:X}, [I]"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fields() {
        let op = Opcode(0xD12F);
        assert_eq!(op.group(), 0xD);
        assert_eq!(op.x(), 0x1);
        assert_eq!(op.y(), 0x2);
        assert_eq!(op.n(), 0xF);
        assert_eq!(op.nn(), 0x2F);
        assert_eq!(op.nnn(), 0x12F);

        assert_eq!(Opcode::from_bytes([0x12, 0x34]), Opcode(0x1234));
    }

    #[test]
    fn test_decode() {
        assert_eq!(Op::decode(Opcode(0x00E0)), Some(Op::ClearScreen));
        assert_eq!(Op::decode(Opcode(0x00EE)), Some(Op::Return));
        assert_eq!(Op::decode(Opcode(0x2ABC)), Some(Op::Call { address: 0xABC }));
        assert_eq!(Op::decode(Opcode(0x5120)), Some(Op::SkipEq { vx: 1, vy: 2 }));
        assert_eq!(Op::decode(Opcode(0x8AB6)), Some(Op::ShiftRight { vx: 0xA }));
        assert_eq!(Op::decode(Opcode(0xE3A1)), Some(Op::SkipNotKey { vx: 3 }));

        // Shared dispatch buckets stay distinct.
        assert_eq!(Op::decode(Opcode(0xF429)), Some(Op::LoadGlyph { vx: 4 }));
        assert_eq!(Op::decode(Opcode(0xF433)), Some(Op::StoreBcd { vx: 4 }));
        assert_eq!(Op::decode(Opcode(0xF455)), Some(Op::StoreRegisters { vx: 4 }));
        assert_eq!(Op::decode(Opcode(0xF465)), Some(Op::LoadRegisters { vx: 4 }));
    }

    #[test]
    fn test_decode_invalid() {
        for word in [0x0000, 0x0123, 0x5AAA, 0x9121, 0x8128, 0xE19F, 0xF0FF] {
            assert_eq!(Op::decode(Opcode(word)), None, "{word:04X}");
        }
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Op::LoadAddress { address: 0x2A0 }.to_string(), "LD I, 0x2A0");
        assert_eq!(Op::Draw { vx: 0, vy: 1, n: 5 }.to_string(), "DRW v0, v1, 5");
        assert_eq!(Op::StoreRegisters { vx: 0xF }.to_string(), "LD [I], vF");
    }
}
