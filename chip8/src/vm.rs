//! Virtual machine.
use std::{
    fmt::{self, Write},
    time::Duration,
};

use log::{debug, error, info};
use rand::prelude::*;

use crate::{
    bytecode::{Op, Opcode},
    constants::*,
    cpu::Chip8Cpu,
    devices::{KeyCode, Keyboard},
    display::Framebuffer,
    error::{Chip8Error, Chip8Result},
    memory::Memory,
    registers::Registers,
    timer::Timers,
};

/// Instruction execution engine.
pub struct Chip8Vm {
    cpu: Chip8Cpu,
    state: VmState,
    rng: StdRng,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Chip8Vm {
            cpu: Chip8Cpu::new(),
            state: VmState::Running,
            rng,
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    pub fn load_builtin_font(&mut self) -> Chip8Result<()> {
        self.load_font(&FONTSET)
    }

    pub fn load_font(&mut self, fontset: &[u8]) -> Chip8Result<()> {
        if fontset.len() != FONTSET_DATA_LENGTH {
            return Err(Chip8Error::Font(format!(
                "fontset data must be {FONTSET_DATA_LENGTH} bytes, got {}",
                fontset.len()
            )));
        }

        self.cpu.ram.load(fontset, FONTSET_START)
    }

    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if bytecode.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::RomTooLarge {
                size: bytecode.len(),
            });
        }

        // Start with clean memory to avoid leaking previous program.
        self.cpu.clear_memory();

        // Reset fonts
        self.load_builtin_font()?;

        // Load program into virtual RAM
        self.cpu.ram.load(bytecode, MEM_START)?;

        // Reset the program counter to prepare for execution.
        self.reset();

        info!("loaded program of {} bytes", bytecode.len());

        Ok(())
    }

    /// Restore the machine to its power-on state, keeping the loaded memory.
    ///
    /// Cancels a pending key wait and clears a halted state.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.state = VmState::Running;
    }
}

/// Accessors
impl Chip8Vm {
    pub fn state(&self) -> &VmState {
        &self.state
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, VmState::Halted(_))
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, VmState::KeyWait { .. })
    }

    /// The fault that halted the machine.
    pub fn error(&self) -> Option<&Chip8Error> {
        match &self.state {
            VmState::Halted(err) => Some(err),
            _ => None,
        }
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.cpu.display
    }

    pub fn registers(&self) -> &Registers {
        &self.cpu.registers
    }

    pub fn timers(&self) -> &Timers {
        &self.cpu.timers
    }

    pub fn memory(&self) -> &Memory {
        &self.cpu.ram
    }

    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    /// Direct access to machine state, for debuggers and tests.
    pub fn cpu_mut(&mut self) -> &mut Chip8Cpu {
        &mut self.cpu
    }
}

/// Execution state of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmState {
    Running,
    /// Suspended by `Fx0A (LD Vx, K)` until a key press arrives.
    ///
    /// The wait has no timeout. Only a reset or a new program cancels it.
    KeyWait { vx: u8 },
    /// Terminal state after a fault. No further instructions are executed.
    Halted(Chip8Error),
}

/// Outcome of a single cycle, used by the caller to drive devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// Display was cleared.
    Clear,
    /// A sprite was drawn to the display buffer.
    Draw,
    /// Sound timer was set.
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
    /// The machine is halted and won't execute.
    Halted,
}

/// VM Configuration Parameters.
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Chip8Conf {
    /// Target instruction rate. Defaults to [`DEFAULT_CLOCK_FREQUENCY`].
    pub clock_frequency: Option<Hz>,
    /// Gate each instruction on an external step signal instead of the clock.
    pub step_mode: bool,
    /// Seed for the random number generator, for reproducible runs.
    pub seed: Option<u64>,
}

/// CPU clock frequency, in hertz (per second)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(transparent))]
pub struct Hz(pub u64);

impl Default for Hz {
    fn default() -> Self {
        Hz(DEFAULT_CLOCK_FREQUENCY)
    }
}

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Interpreter
impl Chip8Vm {
    /// Execute a single instruction.
    ///
    /// A fault halts the machine and is returned once. Afterwards
    /// every step returns [`Flow::Halted`] without executing.
    pub fn step<K>(&mut self, keyboard: &mut K) -> Chip8Result<Flow>
    where
        K: Keyboard + ?Sized,
    {
        match self.state {
            VmState::Running => {}
            VmState::KeyWait { vx } => return Ok(self.resume_key_wait(vx, keyboard)),
            VmState::Halted(_) => return Ok(Flow::Halted),
        }

        match self.exec_next(keyboard) {
            Ok(flow) => Ok(flow),
            Err(err) => {
                error!(
                    "halting VM at 0x{:04X}: {err}",
                    self.cpu.registers.pc
                );
                self.state = VmState::Halted(err.clone());
                Err(err)
            }
        }
    }

    /// Execute up to `step_count` instructions, stopping early when the machine halts.
    pub fn run_steps<K>(&mut self, step_count: usize, keyboard: &mut K) -> Chip8Result<Flow>
    where
        K: Keyboard + ?Sized,
    {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step(keyboard)?;
            if flow == Flow::Halted {
                break;
            }
        }

        Ok(flow)
    }

    /// Count down the delay and sound timers. Called at 60Hz.
    pub fn tick_timers(&mut self) {
        self.cpu.timers.tick();
    }

    /// Returns the new buzzer state if it changed since the last call.
    pub fn buzzer_change(&mut self) -> Option<bool> {
        self.cpu.timers.buzzer_change()
    }

    fn resume_key_wait<K>(&mut self, vx: u8, keyboard: &mut K) -> Flow
    where
        K: Keyboard + ?Sized,
    {
        match keyboard.poll_key_press() {
            Some(key) => {
                debug!("key wait satisfied by {key}");
                self.cpu.registers.set(vx, key.as_u8());
                self.state = VmState::Running;
                Flow::Ok
            }
            None => Flow::KeyWait,
        }
    }

    fn exec_next<K>(&mut self, keyboard: &mut K) -> Chip8Result<Flow>
    where
        K: Keyboard + ?Sized,
    {
        let address = self.cpu.registers.pc;
        let opcode = self.cpu.fetch()?;
        let op = Op::decode(opcode).ok_or(Chip8Error::InvalidOpcode {
            opcode: opcode.0,
            address,
        })?;

        op_trace(address, opcode, op);

        // Jumps overwrite the program counter, skips advance it again.
        self.cpu.advance();

        match op {
            Op::ClearScreen | Op::Return | Op::Jump { .. } | Op::Call { .. } => {
                self.exec_flow(op)
            }
            Op::Load { .. }
            | Op::Or { .. }
            | Op::And { .. }
            | Op::Xor { .. }
            | Op::Add { .. }
            | Op::Sub { .. }
            | Op::ShiftRight { .. }
            | Op::SubReverse { .. }
            | Op::ShiftLeft { .. } => {
                self.exec_math(op);
                Ok(Flow::Ok)
            }
            Op::Draw { vx, vy, n } => self.exec_draw(vx, vy, n),
            _ => self.exec_misc(op, keyboard),
        }
    }

    /// Execute a control flow instruction.
    #[inline]
    fn exec_flow(&mut self, op: Op) -> Chip8Result<Flow> {
        let cpu = &mut self.cpu;

        match op {
            // 00E0 (CLS)
            Op::ClearScreen => {
                cpu.display.clear();
                Ok(Flow::Clear)
            }
            // 00EE (RET)
            //
            // Set the program counter to the address at the top of the stack.
            Op::Return => {
                cpu.registers.pc = cpu.stack.pop()?;
                Ok(Flow::Jump)
            }
            // 1NNN (JP addr)
            Op::Jump { address } => {
                cpu.registers.pc = address;
                Ok(Flow::Jump)
            }
            // 2NNN (CALL addr)
            //
            // The program counter already points to the next instruction,
            // which is where the subroutine returns to.
            Op::Call { address } => {
                cpu.stack.push(cpu.registers.pc)?;
                cpu.registers.pc = address;
                Ok(Flow::Jump)
            }
            _ => unreachable!("not a control flow instruction: {op:?}"),
        }
    }

    /// Execute an arithmetic instruction.
    ///
    /// Operands are read before anything is written, and VF is
    /// always written last so it can also be used as an operand.
    #[inline]
    fn exec_math(&mut self, op: Op) {
        let regs = &mut self.cpu.registers;

        match op {
            // 8XY0 (LD Vx, Vy)
            Op::Load { vx, vy } => regs.set(vx, regs.get(vy)),
            // 8XY1 (OR Vx, Vy)
            Op::Or { vx, vy } => regs.set(vx, regs.get(vx) | regs.get(vy)),
            // 8XY2 (AND Vx, Vy)
            Op::And { vx, vy } => regs.set(vx, regs.get(vx) & regs.get(vy)),
            // 8XY3 (XOR Vx, Vy)
            Op::Xor { vx, vy } => regs.set(vx, regs.get(vx) ^ regs.get(vy)),
            // 8XY4 (ADD Vx, Vy)
            Op::Add { vx, vy } => {
                let (result, carry) = regs.get(vx).overflowing_add(regs.get(vy));
                regs.set(vx, result);
                regs.set_flag(carry);
            }
            // 8XY5 (SUB Vx, Vy)
            Op::Sub { vx, vy } => {
                let (x, y) = (regs.get(vx), regs.get(vy));
                regs.set(vx, x.wrapping_sub(y));
                regs.set_flag(x >= y);
            }
            // 8XY6 (SHR Vx)
            Op::ShiftRight { vx } => {
                let x = regs.get(vx);
                regs.set(vx, x >> 1);
                regs.set_flag(x & 1 == 1);
            }
            // 8XY7 (SUBN Vx, Vy)
            Op::SubReverse { vx, vy } => {
                let (x, y) = (regs.get(vx), regs.get(vy));
                regs.set(vx, y.wrapping_sub(x));
                regs.set_flag(y >= x);
            }
            // 8XYE (SHL Vx)
            Op::ShiftLeft { vx } => {
                let x = regs.get(vx);
                regs.set(vx, x << 1);
                regs.set_flag(x >> 7 == 1);
            }
            _ => unreachable!("not an arithmetic instruction: {op:?}"),
        }
    }

    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
    /// Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
    /// memory pointed to by address register I.
    ///
    /// If the sprite is drawn outside of the display area, it is wrapped around to the other side.
    ///
    /// If the drawing operation erases existing pixels in the display buffer, register VF is set to
    /// 1, and set to 0 if no display bits are unset. This is used for collision detection.
    #[inline]
    fn exec_draw(&mut self, vx: u8, vy: u8, n: u8) -> Chip8Result<Flow> {
        let cpu = &mut self.cpu;
        let (x, y) = (
            cpu.registers.get(vx) as usize,
            cpu.registers.get(vy) as usize,
        );

        let sprite = cpu.ram.read_range(cpu.registers.i as usize, n as usize)?;
        let is_erased = cpu.display.blit(x, y, sprite);

        cpu.registers.set_flag(is_erased);

        Ok(Flow::Draw)
    }

    /// Execute a miscellaneous instruction.
    #[inline]
    fn exec_misc<K>(&mut self, op: Op, keyboard: &mut K) -> Chip8Result<Flow>
    where
        K: Keyboard + ?Sized,
    {
        let cpu = &mut self.cpu;
        let mut control_flow = Flow::Ok;

        match op {
            // 3XNN (SE Vx, byte)
            Op::SkipEqByte { vx, nn } => {
                if cpu.registers.get(vx) == nn {
                    cpu.advance();
                }
            }
            // 4XNN (SNE Vx, byte)
            Op::SkipNotEqByte { vx, nn } => {
                if cpu.registers.get(vx) != nn {
                    cpu.advance();
                }
            }
            // 5XY0 (SE Vx, Vy)
            Op::SkipEq { vx, vy } => {
                if cpu.registers.get(vx) == cpu.registers.get(vy) {
                    cpu.advance();
                }
            }
            // 9XY0 (SNE Vx, Vy)
            Op::SkipNotEq { vx, vy } => {
                if cpu.registers.get(vx) != cpu.registers.get(vy) {
                    cpu.advance();
                }
            }
            // 6XNN (LD Vx, byte)
            Op::LoadByte { vx, nn } => cpu.registers.set(vx, nn),
            // 7XNN (ADD Vx, byte)
            Op::AddByte { vx, nn } => {
                let x = cpu.registers.get(vx);
                cpu.registers.set(vx, x.wrapping_add(nn));
            }
            // ANNN (LD I, addr)
            Op::LoadAddress { address } => cpu.registers.i = address,
            // BNNN (JP V0, addr)
            //
            // May land beyond the end of memory, which faults on the next fetch.
            Op::JumpOffset { address } => {
                cpu.registers.pc = address + cpu.registers.get(0) as Address;
                control_flow = Flow::Jump;
            }
            // CXNN (RND Vx, byte)
            Op::Random { vx, nn } => {
                let value = nn & self.rng.gen::<u8>();
                cpu.registers.set(vx, value);
            }
            // ----------------------------------------------------------------
            // Ex9E (SKP Vx)
            Op::SkipKey { vx } => {
                if is_key_pressed(keyboard, cpu.registers.get(vx)) {
                    cpu.advance();
                }
            }
            // ExA1 (SKNP Vx)
            Op::SkipNotKey { vx } => {
                if !is_key_pressed(keyboard, cpu.registers.get(vx)) {
                    cpu.advance();
                }
            }
            // ----------------------------------------------------------------
            // Fx07 (LD Vx, DT)
            Op::LoadDelay { vx } => cpu.registers.set(vx, cpu.timers.delay),
            // Fx0A (LD Vx, K)
            //
            // All execution stops until a key is pressed, then the value of that key is stored in Vx.
            // The program counter already points past this instruction.
            Op::WaitKey { vx } => {
                // Presses from before the wait don't count.
                while keyboard.poll_key_press().is_some() {}
                debug!("waiting for key press into v{vx:X}");
                self.state = VmState::KeyWait { vx };
                control_flow = Flow::KeyWait;
            }
            // Fx15 (LD DT, Vx)
            Op::SetDelay { vx } => cpu.timers.delay = cpu.registers.get(vx),
            // Fx18 (LD ST, Vx)
            Op::SetSound { vx } => {
                cpu.timers.sound = cpu.registers.get(vx);
                control_flow = Flow::Sound;
            }
            // Fx1E (ADD I, Vx)
            Op::AddAddress { vx } => {
                let x = cpu.registers.get(vx) as Address;
                cpu.registers.i = cpu.registers.i.wrapping_add(x);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            Op::LoadGlyph { vx } => {
                let x = cpu.registers.get(vx) as usize;
                cpu.registers.i = (FONTSET_START + x * FONTSET_HEIGHT) as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            Op::StoreBcd { vx } => {
                let x = cpu.registers.get(vx);
                let digits = [x / 100, x / 10 % 10, x % 10];
                cpu.ram.write_range(cpu.registers.i as usize, &digits)?;
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            Op::StoreRegisters { vx } => {
                let count = vx as usize + 1;
                cpu.ram
                    .write_range(cpu.registers.i as usize, &cpu.registers.v[..count])?;
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            Op::LoadRegisters { vx } => {
                let count = vx as usize + 1;
                let bytes = cpu.ram.read_range(cpu.registers.i as usize, count)?;
                cpu.registers.v[..count].copy_from_slice(bytes);
            }
            _ => unreachable!("instruction dispatched to the wrong handler: {op:?}"),
        }

        Ok(control_flow)
    }
}

/// Key values above 0xF can't be pressed.
#[inline]
fn is_key_pressed<K>(keyboard: &K, key_id: u8) -> bool
where
    K: Keyboard + ?Sized,
{
    KeyCode::try_from(key_id)
        .map(|key| keyboard.is_pressed(key))
        .unwrap_or(false)
}

/// Troubleshooting
#[doc(hidden)]
impl Chip8Vm {
    /// Returns the contents of the program memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let ram = self.cpu.ram.as_slice();
        let end = (MEM_START + count).min(MEM_SIZE);
        let mut buf = String::new();

        for (i, pair) in ram[MEM_START..end].chunks(2).enumerate() {
            write!(buf, "{:04X}:", MEM_START + i * 2)?;
            for byte in pair {
                write!(buf, " {byte:02X}")?;
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        self.cpu.display.dump()
    }

    /// Register state on a single line.
    pub fn dump_registers(&self) -> Result<String, fmt::Error> {
        let regs = &self.cpu.registers;
        let mut buf = String::new();

        write!(buf, "PC: {:04X} | I: {:04X} |", regs.pc, regs.i)?;
        for (i, v) in regs.v.iter().enumerate() {
            write!(buf, " V{i:X}: {v:02X}")?;
        }
        write!(
            buf,
            " | DT: {:02X} ST: {:02X} | SP: {}",
            self.cpu.timers.delay,
            self.cpu.timers.sound,
            self.cpu.stack.len()
        )?;

        Ok(buf)
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(address: Address, opcode: Opcode, op: Op) {
    log::trace!("{address:04X}: {opcode} {op}");
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: Address, _: Opcode, _: Op) {}
