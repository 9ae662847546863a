//! Troubleshooting and paused stepping.
use std::fmt::{self, Write};

use crate::{
    constants::*,
    devices::{Devices, KeyCode, Keypad},
    error::Chip8Result,
    vm::{Chip8Vm, Flow},
};

/// Drives a paused machine one instruction at a time, forwards and backwards.
///
/// Frames are simulated by counting steps, so the timers keep counting down
/// at the same rate relative to the program as when running at full speed.
pub struct Stepper<'a, D: Devices> {
    vm: &'a mut Chip8Vm<D>,
    /// Steps left until the next frame boundary.
    countdown: usize,
}

impl<'a, D: Devices> Stepper<'a, D> {
    pub fn new(vm: &'a mut Chip8Vm<D>) -> Self {
        let countdown = frame_length(vm);
        Self { vm, countdown }
    }

    pub fn vm(&self) -> &Chip8Vm<D> {
        &*self.vm
    }

    /// Steps left until the timers count down.
    pub fn countdown(&self) -> usize {
        self.countdown
    }

    /// Execute one instruction, ending the frame when enough steps have passed.
    pub fn step_forward(&mut self) -> Chip8Result<Flow> {
        let flow = self.vm.step()?;

        self.countdown -= 1;
        if self.countdown == 0 {
            self.vm.end_frame();
            self.countdown = frame_length(self.vm);
        }

        Ok(flow)
    }

    /// Undo the most recent step.
    ///
    /// Returns `false` when there is nothing left to undo.
    pub fn step_backward(&mut self) -> bool {
        if !self.vm.rewind() {
            return false;
        }

        self.countdown = (self.countdown + 1).min(frame_length(self.vm));
        true
    }
}

/// Steps per simulated frame. Never zero, so slow clocks still tick the timers.
fn frame_length<D: Devices>(vm: &Chip8Vm<D>) -> usize {
    vm.instructions_per_frame().max(1)
}

/// Troubleshooting
impl<D: Devices> Chip8Vm<D> {
    /// Returns the contents of the memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let ram = self.cpu().ram();
        let iter = ram
            .iter()
            .enumerate()
            .skip(MEM_START)
            .take(count)
            .step_by(2);
        let mut buf = String::new();

        for (i, op) in iter {
            let next = ram.get(i + 1).copied().unwrap_or_default();
            writeln!(buf, "{:04X}: {:02X}{:02X}", i, op, next)?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        self.cpu().display().dump()
    }

    pub fn dump_registers(&self) -> Result<String, fmt::Error> {
        let cpu = self.cpu();
        let mut buf = String::new();

        for (i, v) in cpu.registers().iter().enumerate() {
            write!(buf, "V{i:X}={v:02X} ")?;
        }
        writeln!(buf)?;
        write!(
            buf,
            "I={:04X} PC={:04X} SP={:X} DT={:02X} ST={:02X}",
            cpu.address(),
            cpu.pc(),
            cpu.sp(),
            cpu.delay_timer(),
            cpu.sound_timer()
        )?;
        if let Some(vx) = cpu.key_wait() {
            write!(buf, " K=V{vx:X}")?;
        }

        Ok(buf)
    }
}

/// List the pressed keys of a keypad.
pub fn dump_keys(keypad: &Keypad) -> Result<String, fmt::Error> {
    let mut buf = String::new();

    if keypad.any() {
        write!(buf, "keys:")?;
        for key in KeyCode::all().filter(|key| keypad.is_pressed(*key)) {
            write!(buf, " {key}")?;
        }
    }

    Ok(buf)
}
