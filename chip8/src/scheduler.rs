//! Cooperative scheduling of the CPU and timer cadences.
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::{
    clock::Clock,
    constants::*,
    devices::Devices,
    error::{Chip8Error, Chip8Result},
    vm::{Chip8Conf, Chip8Vm, Flow, Hz},
};

/// Drives the virtual machine from elapsed wall clock time.
///
/// Two cadences are multiplexed on the caller's thread: the instruction
/// clock, which runs one VM cycle per period, and the 60Hz timer, which
/// counts down the delay and sound timers and redraws the screen.
/// Both are fed from the same elapsed time, and events are processed in
/// the order they fall due.
#[derive(Debug)]
pub struct Scheduler {
    cpu_clock: Clock,
    timer: Clock,
    /// Cycles are gated on [`Scheduler::step_signal`] instead of the CPU clock.
    step_mode: bool,
    pending_steps: usize,
    last_poll: Option<Instant>,
}

/// Work done during one scheduler update.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Number of VM cycles issued.
    pub cycles: usize,
    /// Number of 60Hz timer ticks, each followed by a redraw.
    pub timer_ticks: usize,
}

impl Scheduler {
    pub fn new(conf: &Chip8Conf) -> Chip8Result<Self> {
        let Hz(frequency) = conf.clock_frequency.unwrap_or_default();
        if frequency == 0 {
            return Err(Chip8Error::InvalidConfig("clock frequency must be non-zero"));
        }

        info!(
            "scheduler at {frequency}Hz{}",
            if conf.step_mode { ", step mode" } else { "" }
        );

        Ok(Self {
            cpu_clock: Clock::new(frequency),
            timer: Clock::new(DELAY_FREQUENCY),
            step_mode: conf.step_mode,
            pending_steps: 0,
            last_poll: None,
        })
    }

    /// Instruction rate of the CPU clock.
    pub fn clock_frequency(&self) -> Hz {
        Hz(self.cpu_clock.frequency())
    }

    pub fn is_step_mode(&self) -> bool {
        self.step_mode
    }

    /// Allow one more cycle to run when in step mode.
    pub fn step_signal(&mut self) {
        self.pending_steps += 1;
    }

    /// Discard accumulated time, pending steps and the poll timestamp.
    pub fn reset(&mut self) {
        self.cpu_clock.reset();
        self.timer.reset();
        self.pending_steps = 0;
        self.last_poll = None;
    }

    /// Advance by the time elapsed since the previous poll, measured with a monotonic clock.
    ///
    /// The first poll only starts the measurement.
    pub fn poll<D>(&mut self, vm: &mut Chip8Vm, devices: &mut D) -> Chip8Result<Report>
    where
        D: Devices + ?Sized,
    {
        let now = Instant::now();
        let elapsed = self
            .last_poll
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        self.last_poll = Some(now);

        self.update(vm, devices, elapsed)
    }

    /// Advance simulated time.
    ///
    /// Returns the fault if the VM halts during this update. Once halted,
    /// no more cycles are issued, but the timers keep running, including
    /// over the rest of the update that faulted.
    pub fn update<D>(
        &mut self,
        vm: &mut Chip8Vm,
        devices: &mut D,
        elapsed: Duration,
    ) -> Chip8Result<Report>
    where
        D: Devices + ?Sized,
    {
        let mut report = Report::default();
        let mut fault = None;

        if self.step_mode {
            while self.pending_steps > 0 {
                self.pending_steps -= 1;
                if let Err(err) = self.cycle(vm, devices, &mut report) {
                    fault = Some(err);
                }
            }

            for _ in 0..self.timer.advance(elapsed) {
                self.tick(vm, devices, &mut report);
            }

            return fault.map_or(Ok(report), Err);
        }

        let mut remaining = elapsed;
        while !remaining.is_zero() {
            // Slice time at the next event of either cadence, so cycles
            // and ticks interleave in the order they fall due.
            let slice = remaining
                .min(self.cpu_clock.until_next())
                .min(self.timer.until_next());
            remaining -= slice;

            for _ in 0..self.cpu_clock.advance(slice) {
                // Halted VMs skip the cycle, so only one fault is seen.
                if let Err(err) = self.cycle(vm, devices, &mut report) {
                    fault = Some(err);
                }
            }

            for _ in 0..self.timer.advance(slice) {
                self.tick(vm, devices, &mut report);
            }
        }

        fault.map_or(Ok(report), Err)
    }

    fn cycle<D>(&mut self, vm: &mut Chip8Vm, devices: &mut D, report: &mut Report) -> Chip8Result<()>
    where
        D: Devices + ?Sized,
    {
        if vm.is_halted() {
            debug!("cycle skipped, VM is halted");
            return Ok(());
        }

        let flow = vm.step(devices)?;
        report.cycles += 1;

        if flow == Flow::Clear {
            devices.clear();
        }

        if let Some(state) = vm.buzzer_change() {
            devices.buzz(state);
        }

        Ok(())
    }

    fn tick<D>(&mut self, vm: &mut Chip8Vm, devices: &mut D, report: &mut Report)
    where
        D: Devices + ?Sized,
    {
        vm.tick_timers();
        report.timer_ticks += 1;

        // Buzzer should be on while sound timer counts down,
        // then turned off when the timer reaches zero.
        if let Some(state) = vm.buzzer_change() {
            devices.buzz(state);
        }

        devices.draw(vm.framebuffer());
    }
}
