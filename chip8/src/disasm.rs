//! Disassembler.
use std::collections::BTreeSet;
use std::fmt::{self, Write as FmtWrite};

use crate::{
    bytecode::{Op, Opcode},
    constants::*,
};

/// Renders program bytecode as one line per instruction word.
///
/// Lines have the form `0x0200  00E0  CLS`. Words that don't decode
/// to an operation are rendered as data, since programs commonly
/// interleave sprites with code. Addresses targeted by jumps and calls
/// are marked with a label line.
pub struct Disassembler<'a> {
    bytecode: &'a [u8],
    /// Address the first byte is loaded at.
    origin: Address,
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self {
            bytecode,
            origin: MEM_START as Address,
        }
    }

    /// Disassemble as if the bytecode was loaded at the given address.
    pub fn with_origin(mut self, origin: Address) -> Self {
        self.origin = origin;
        self
    }

    /// Iterate the bytecode as whole instruction words, with their addresses.
    ///
    /// A trailing odd byte is not included.
    pub fn words(&self) -> impl Iterator<Item = (Address, Opcode)> + 'a {
        let origin = self.origin;
        self.bytecode
            .chunks_exact(2)
            .enumerate()
            .map(move |(index, pair)| {
                let address = origin.wrapping_add((index * 2) as Address);
                (address, Opcode::from_bytes([pair[0], pair[1]]))
            })
    }

    /// Addresses that are the destination of a jump or subroutine call.
    pub fn branch_targets(&self) -> BTreeSet<Address> {
        self.words()
            .filter_map(|(_, opcode)| match Op::decode(opcode) {
                Some(Op::Jump { address }) | Some(Op::Call { address }) => Some(address),
                _ => None,
            })
            .collect()
    }

    /// Write the whole program to the given writer.
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        let targets = self.branch_targets();

        for (address, opcode) in self.words() {
            if targets.contains(&address) {
                writeln!(w, "L{address:03X}:")?;
            }

            match Op::decode(opcode) {
                Some(op) => writeln!(w, "0x{address:04X}  {opcode}  {op}")?,
                None => writeln!(w, "0x{address:04X}  {opcode}  DW 0x{opcode}")?,
            }
        }

        if self.bytecode.len() % 2 != 0 {
            let address = self.origin.wrapping_add(self.bytecode.len() as Address - 1);
            if let Some(byte) = self.bytecode.last() {
                writeln!(w, "0x{address:04X}  {byte:02X}    DB 0x{byte:02X}")?;
            }
        }

        Ok(())
    }

    pub fn to_text(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        self.disassemble(&mut buf)?;
        Ok(buf)
    }
}
