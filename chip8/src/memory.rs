//! Flat address space.
use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// Main memory of the machine.
///
/// Font glyphs live at the bottom of the address space,
/// and programs are loaded at [`MEM_START`].
pub struct Memory {
    ram: Box<[u8; MEM_SIZE]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            ram: Box::new([0; MEM_SIZE]),
        }
    }
}

impl Memory {
    pub fn new() -> Self {
        Default::default()
    }

    /// Copy the given bytes into memory, starting at `offset`.
    pub fn load(&mut self, bytes: &[u8], offset: usize) -> Chip8Result<()> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= MEM_SIZE)
            .ok_or(Chip8Error::RomTooLarge { size: bytes.len() })?;

        self.ram[offset..end].copy_from_slice(bytes);

        Ok(())
    }

    #[inline(always)]
    pub fn read8(&self, address: usize) -> Chip8Result<u8> {
        self.ram
            .get(address)
            .copied()
            .ok_or(Chip8Error::OutOfBounds { address })
    }

    #[inline(always)]
    pub fn write8(&mut self, address: usize, value: u8) -> Chip8Result<()> {
        match self.ram.get_mut(address) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Chip8Error::OutOfBounds { address }),
        }
    }

    /// Read a big-endian instruction word.
    #[inline(always)]
    pub fn read16(&self, address: usize) -> Chip8Result<[u8; 2]> {
        Ok([self.read8(address)?, self.read8(address + 1)?])
    }

    /// Borrow `len` bytes starting at `address`.
    pub fn read_range(&self, address: usize, len: usize) -> Chip8Result<&[u8]> {
        let range = Self::range(address, len)?;
        Ok(&self.ram[range])
    }

    /// Copy the bytes into memory starting at `address`.
    ///
    /// Nothing is written when the range doesn't fit.
    pub fn write_range(&mut self, address: usize, bytes: &[u8]) -> Chip8Result<()> {
        let range = Self::range(address, bytes.len())?;
        self.ram[range].copy_from_slice(bytes);
        Ok(())
    }

    fn range(address: usize, len: usize) -> Chip8Result<std::ops::Range<usize>> {
        match address.checked_add(len) {
            Some(end) if end <= MEM_SIZE => Ok(address..end),
            _ => Err(Chip8Error::OutOfBounds {
                address: address.max(MEM_SIZE),
            }),
        }
    }

    /// Erase all memory.
    pub fn clear(&mut self) {
        self.ram.fill(0);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.ram[..]
    }
}
