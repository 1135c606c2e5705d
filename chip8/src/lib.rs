mod bytecode;
mod clock;
pub mod constants;
mod cpu;
mod devices;
mod disasm;
mod display;
mod error;
mod memory;
mod registers;
mod scheduler;
mod stack;
mod timer;
mod vm;

pub use self::{
    devices::{InvalidKeyCode, KeyCode},
    vm::Hz,
};

/// Version of this interpreter implementation.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        bytecode::{Op, Opcode},
        cpu::Chip8Cpu,
        devices::{Devices, KeyCode, Keyboard, Keypad, Screen, Speaker},
        disasm::Disassembler,
        display::Framebuffer,
        error::{Chip8Error, Chip8Result},
        memory::Memory,
        registers::Registers,
        scheduler::{Report, Scheduler},
        stack::CallStack,
        timer::Timers,
        vm::{Chip8Conf, Chip8Vm, Flow, Hz, VmState},
    };
}
