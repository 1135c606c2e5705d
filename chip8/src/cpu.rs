//! CPU and memory state.
use crate::{
    bytecode::Opcode, display::Framebuffer, error::Chip8Result, memory::Memory,
    registers::Registers, stack::CallStack, timer::Timers,
};

/// Core state for a chip8 interpreter.
///
/// Everything the instructions can observe or mutate lives here,
/// exclusively owned by the virtual machine.
#[derive(Default)]
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    pub registers: Registers,
    /// Delay and sound timers.
    pub timers: Timers,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub ram: Memory,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub stack: CallStack,
    /// Screen buffer that is drawn too.
    pub display: Framebuffer,
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Erase the contents of the memory buffers `ram`, `stack` and `display`.
    pub(crate) fn clear_memory(&mut self) {
        self.ram.clear();
        self.stack.clear();
        self.display.clear();
    }

    /// Restore registers, stack, display and timers, leaving RAM intact.
    pub(crate) fn reset(&mut self) {
        self.registers = Registers::default();
        self.timers.reset();
        self.stack.clear();
        self.display.clear();
    }

    /// Extract the instruction at the current program counter.
    #[inline(always)]
    pub fn fetch(&self) -> Chip8Result<Opcode> {
        self.ram
            .read16(self.registers.pc as usize)
            .map(Opcode::from_bytes)
    }

    /// Advance the program counter past one instruction.
    #[inline(always)]
    pub(crate) fn advance(&mut self) {
        self.registers.pc = self.registers.pc.wrapping_add(2);
    }
}
