//! Virtual machine.
use std::{fs, path::Path, time::Duration};

use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    bytecode::*,
    constants::*,
    cpu::Chip8Cpu,
    devices::{Devices, HeadlessDevices, KeyCode},
    error::{Chip8Error, Chip8Result},
    snapshot::{History, Snapshot},
};

/// Callback invoked whenever the machine state changes.
pub type StateObserver = Box<dyn FnMut(StateEvent, &Chip8Cpu)>;

pub struct Chip8Vm<D: Devices = HeadlessDevices> {
    cpu: Chip8Cpu,
    devices: D,
    history: History,
    rng: StdRng,
    observers: Vec<StateObserver>,
    /// Set when a fatal error stopped the machine.
    halted: bool,
    conf: Chip8Conf,
}

impl Chip8Vm<HeadlessDevices> {
    /// Create a VM without any real IO attached.
    pub fn headless(conf: Chip8Conf) -> Self {
        Self::new(conf, HeadlessDevices::new())
    }
}

impl<D: Devices> Chip8Vm<D> {
    pub fn new(conf: Chip8Conf, devices: D) -> Self {
        let rng = match conf.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Chip8Vm {
            cpu: Chip8Cpu::new(),
            devices,
            history: History::new(conf.history_capacity),
            rng,
            observers: Vec::new(),
            halted: false,
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    pub fn devices(&self) -> &D {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut D {
        &mut self.devices
    }

    /// Whether a fatal error stopped the machine.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Reset the machine and load a program at `MEM_START`.
    ///
    /// Clears the rewind history and any fatal error. A program that does not
    /// fit halts the machine.
    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if let Err(err) = self.cpu.install_program(bytecode) {
            self.halt(&err);
            return Err(err);
        }
        self.history.clear();
        self.halted = false;

        debug!("loaded program of {} bytes", bytecode.len());

        Ok(())
    }

    /// Read a ROM file and load it.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Chip8Result<()> {
        let bytecode = fs::read(path.as_ref())?;
        self.load_bytecode(&bytecode)
    }

    /// Number of instructions executed between two display frames.
    pub fn instructions_per_frame(&self) -> usize {
        (self.conf.clock_frequency.unwrap_or_default().0 / DELAY_FREQUENCY) as usize
    }

    /// Register a callback that is notified after every change to the machine state.
    pub fn on_state_changed<F>(&mut self, callback: F)
    where
        F: FnMut(StateEvent, &Chip8Cpu) + 'static,
    {
        self.observers.push(Box::new(callback));
    }

    fn notify(&mut self, event: StateEvent) {
        for observer in self.observers.iter_mut() {
            observer(event, &self.cpu);
        }
    }

    fn halt(&mut self, err: &Chip8Error) {
        warn!("machine halted: {err}");
        self.halted = true;
        self.devices.report_error(err);
    }
}

/// State capture and rewind
impl<D: Devices> Chip8Vm<D> {
    /// Capture a copy of the complete machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.cpu)
    }

    /// Replace the complete machine state with the snapshot.
    pub fn restore_snapshot(&mut self, snapshot: &Snapshot) {
        snapshot.restore_into(&mut self.cpu);
        self.devices.draw(&self.cpu.display);
        self.notify(StateEvent::Restored);
    }

    /// Step backwards, restoring the state from before the most recent step.
    ///
    /// Returns `false` when there is no history left.
    pub fn rewind(&mut self) -> bool {
        match self.history.pop() {
            Some(snapshot) => {
                self.cpu = snapshot.into_state();
                debug!(
                    "rewound to {:04X}, {} steps left in history",
                    self.cpu.pc,
                    self.history.len()
                );
                self.devices.draw(&self.cpu.display);
                self.notify(StateEvent::Restored);
                true
            }
            None => false,
        }
    }

    /// Number of steps that can be rewound.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Result of a single step.
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
    Draw,
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    /// While waiting, each step only polls the keyboard.
    KeyWait,
}

/// Kind of state change reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// A step completed.
    Retired,
    /// The state was replaced by a snapshot.
    Restored,
    /// Timers ticked and the display was presented.
    FrameEnd,
}

/// VM Configuration Parameters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Chip8Conf {
    /// Instructions executed per second.
    pub clock_frequency: Option<Hz>,
    /// Number of steps that can be rewound.
    pub history_capacity: usize,
    /// Seed for the random number instruction, for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for Chip8Conf {
    fn default() -> Self {
        Self {
            clock_frequency: None,
            history_capacity: HISTORY_CAPACITY,
            rng_seed: None,
        }
    }
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

/// Frame scheduler
impl<D: Devices> Chip8Vm<D> {
    /// Execute one display frame at the configured clock frequency.
    pub fn run_frame(&mut self) -> Chip8Result<Flow> {
        self.tick(self.instructions_per_frame())
    }

    /// Execute a batch of instructions, then end the frame.
    ///
    /// After the last instruction the timers count down, the buzzer is cued while
    /// the sound timer is running, and the display is presented.
    /// A fatal error aborts the batch without ending the frame.
    pub fn tick(&mut self, instructions: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..instructions {
            flow = self.step()?;
        }

        self.end_frame();

        Ok(flow)
    }

    /// Execute the given number of steps without any frame processing.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step()?;
        }

        Ok(flow)
    }

    /// Count down the timers once and present the display.
    pub(crate) fn end_frame(&mut self) {
        self.cpu.tick_delay();
        self.cpu.tick_sound();

        // Buzzer plays for the remainder of the sound timer.
        if self.cpu.sound_timer > 0 {
            self.devices.audio_cue(sound_duration_ms(self.cpu.sound_timer));
        }

        self.devices.draw(&self.cpu.display);
        self.notify(StateEvent::FrameEnd);
    }
}

/// Milliseconds left for a sound timer value counting down at 60Hz.
fn sound_duration_ms(sound_timer: u8) -> u32 {
    sound_timer as u32 * 1000 / DELAY_FREQUENCY as u32
}

/// Interpreter
impl<D: Devices> Chip8Vm<D> {
    /// Execute a single instruction.
    ///
    /// While waiting for a keypress, the step only polls the keyboard.
    /// Every successful step can be undone with [`Chip8Vm::rewind`].
    pub fn step(&mut self) -> Chip8Result<Flow> {
        if self.halted {
            return Err(Chip8Error::Halted);
        }

        let snapshot = if self.history.capacity() > 0 {
            Some(Snapshot::capture(&self.cpu))
        } else {
            None
        };

        match self.execute() {
            Ok(flow) => {
                if let Some(snapshot) = snapshot {
                    self.history.push(snapshot);
                }
                self.notify(StateEvent::Retired);
                Ok(flow)
            }
            Err(err) => {
                if err.is_fatal() {
                    self.halt(&err);
                }
                Err(err)
            }
        }
    }

    fn execute(&mut self) -> Chip8Result<Flow> {
        if let Some(vx) = self.cpu.key_wait {
            return Ok(self.poll_key(vx));
        }

        let address = self.cpu.pc;
        let word = fetch(&*self.cpu.ram, address as usize);

        // Advance before dispatch, so control flow overwrites the counter.
        self.cpu.pc = address.wrapping_add(2);

        match Instr::decode(word) {
            Some(instr) => {
                op_trace(address, &instr);
                self.exec(instr, address)
            }
            None => {
                // Leave the counter on the offending instruction.
                self.cpu.pc = address;
                Err(Chip8Error::Decode {
                    opcode: word,
                    address,
                })
            }
        }
    }

    fn exec(&mut self, instr: Instr, address: Address) -> Chip8Result<Flow> {
        use Instr::*;

        let cpu = &mut self.cpu;
        let mut control_flow = Flow::Ok;

        match instr {
            // 00E0 (CLS)
            //
            // Clear display
            Cls => {
                cpu.display.clear();
                control_flow = Flow::Draw;
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Pop the program counter from the top of the stack.
            Ret => match cpu.pop_return() {
                Some(ret) => {
                    cpu.pc = ret;
                    control_flow = Flow::Jump;
                }
                None => {
                    cpu.pc = address;
                    return Err(Chip8Error::StackUnderflow { address });
                }
            },
            // 1NNN (JP addr)
            //
            // Jump to address.
            Jp(nnn) => {
                cpu.pc = nnn;
                control_flow = Flow::Jump;
            }
            // 2NNN (CALL addr)
            //
            // Call subroutine at NNN.
            // The return address is the instruction following the call.
            Call(nnn) => {
                if !cpu.push_return(cpu.pc) {
                    cpu.pc = address;
                    return Err(Chip8Error::StackOverflow { address });
                }
                cpu.pc = nnn;
                control_flow = Flow::Jump;
            }
            // 3XNN (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value NN.
            SeByte(vx, nn) => {
                if cpu.register(vx) == nn {
                    cpu.pc = cpu.pc.wrapping_add(2);
                }
            }
            // 4XNN (SNE Vx, byte)
            //
            // Skip the next instruction if register VX does not equal value NN.
            SneByte(vx, nn) => {
                if cpu.register(vx) != nn {
                    cpu.pc = cpu.pc.wrapping_add(2);
                }
            }
            // 5XY0 (SE Vx, Vy)
            //
            // Skip the next instruction if register VX equals value VY.
            SeReg(vx, vy) => {
                if cpu.register(vx) == cpu.register(vy) {
                    cpu.pc = cpu.pc.wrapping_add(2);
                }
            }
            // 6XNN (LD Vx, byte)
            //
            // Set register VX to value NN.
            LdByte(vx, nn) => cpu.set_register(vx, nn as u16),
            // 7xnn (ADD Vx, byte)
            //
            // Add value NN to register VX. Carry flag is not set.
            AddByte(vx, nn) => cpu.set_register(vx, cpu.register(vx) as u16 + nn as u16),
            // 8XY0 (LD Vx, Vy)
            LdReg(vx, vy) => cpu.set_register(vx, cpu.register(vy) as u16),
            // 8XY1 (OR Vx, Vy)
            Or(vx, vy) => cpu.set_register(vx, (cpu.register(vx) | cpu.register(vy)) as u16),
            // 8XY2 (AND Vx, Vy)
            And(vx, vy) => cpu.set_register(vx, (cpu.register(vx) & cpu.register(vy)) as u16),
            // 8XY3 (XOR Vx, Vy)
            Xor(vx, vy) => cpu.set_register(vx, (cpu.register(vx) ^ cpu.register(vy)) as u16),
            // 8XY4 (ADD Vx, Vy)
            //
            // ADDs VY to VX, and stores the result in VX.
            // Overflow is wrapped.
            // If overflow, set VF to 1, else 0.
            AddReg(vx, vy) => {
                let result = cpu.register(vx) as u16 + cpu.register(vy) as u16;
                cpu.set_register(vx, result);
                cpu.set_flag(result > 0xFF);
            }
            // 8XY5 (SUB Vx, Vy)
            //
            // Subtracts VY from VX, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Sub(vx, vy) => {
                let (x, y) = (cpu.register(vx), cpu.register(vy));
                cpu.set_register(vx, x.wrapping_sub(y) as u16);
                cpu.set_flag(x >= y);
            }
            // 8XY6 (SHR Vx, Vy)
            //
            // Store VY shifted right by 1 in VX.
            // VF is set to the least-significant bit of VY before the shift.
            Shr(vx, vy) => {
                let y = cpu.register(vy);
                cpu.set_register(vx, (y >> 1) as u16);
                cpu.set_flag(y & 1 == 1);
            }
            // 8XY7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Subn(vx, vy) => {
                let (x, y) = (cpu.register(vx), cpu.register(vy));
                cpu.set_register(vx, y.wrapping_sub(x) as u16);
                cpu.set_flag(y >= x);
            }
            // 8XYE (SHL Vx, Vy)
            //
            // Store VY shifted left by 1 in VX.
            // VF is set to the most-significant bit of VY before the shift.
            Shl(vx, vy) => {
                let y = cpu.register(vy);
                cpu.set_register(vx, (y as u16) << 1);
                cpu.set_flag(y >> 7 == 1);
            }
            // 9xy0 (SNE Vx, Vy)
            //
            // Skip next instruction if Vx != Vy.
            SneReg(vx, vy) => {
                if cpu.register(vx) != cpu.register(vy) {
                    cpu.pc = cpu.pc.wrapping_add(2);
                }
            }
            // Annn (LD I, addr)
            //
            // Set address register I to value NNN.
            LdI(nnn) => cpu.address = nnn,
            // Bnnn (JP V0, addr)
            //
            // Jump to address NNN offset by V0.
            JpV0(nnn) => {
                cpu.pc = nnn + cpu.register(0) as Address;
                control_flow = Flow::Jump;
            }
            // CXNN (RND Vx, byte)
            //
            // Generate random number.
            // Set register VX to the result of bitwise AND between a random number and NN.
            Rnd(vx, nn) => {
                let value = self.rng.gen::<u8>() & nn;
                cpu.set_register(vx, value as u16);
            }
            // Dxyn (DRW Vx, Vy, nibble)
            //
            // Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
            // Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
            // memory pointed to by address register I.
            //
            // If the drawing operation erases existing pixels in the display buffer, register VF is set to
            // 1, and set to 0 if no display bits are unset. This is used for collision detection.
            Drw(vx, vy, n) => {
                let (x, y) = (cpu.register(vx) as usize, cpu.register(vy) as usize);

                let mut rows = [0u8; 0x10];
                for (r, row) in rows.iter_mut().enumerate().take(n as usize) {
                    *row = cpu.ram[cpu.i_addr(r)];
                }

                let is_erased = cpu.display.draw_sprite(x, y, rows[..n as usize].iter().copied());
                cpu.set_flag(is_erased);
                control_flow = Flow::Draw;
            }
            // Ex9E (SKP Vx)
            //
            // Skip next instruction if the key with the value of Vx is pressed.
            Skp(vx) => {
                if self.key_pressed(vx) {
                    let cpu = &mut self.cpu;
                    cpu.pc = cpu.pc.wrapping_add(2);
                }
            }
            // ExA1 (SKNP Vx)
            //
            // Skip next instruction if the key with the value of Vx is not pressed.
            Sknp(vx) => {
                if !self.key_pressed(vx) {
                    let cpu = &mut self.cpu;
                    cpu.pc = cpu.pc.wrapping_add(2);
                }
            }
            // Fx07 (LD Vx, DT)
            //
            // Set Vx = delay timer value.
            LdVxDt(vx) => cpu.set_register(vx, cpu.delay_timer as u16),
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // All execution stops until a key is pressed, then the value of that key is stored in Vx.
            LdVxK(vx) => {
                // Stall on this instruction until the key arrives.
                cpu.pc = address;
                cpu.key_wait = Some(vx);
                control_flow = self.poll_key(vx);
            }
            // Fx15 (LD DT, Vx)
            //
            // Set delay timer = Vx.
            LdDtVx(vx) => cpu.delay_timer = cpu.register(vx),
            // Fx18 (LD ST, Vx)
            //
            // Set sound timer = Vx.
            LdStVx(vx) => {
                cpu.sound_timer = cpu.register(vx);
                if cpu.sound_timer > 0 {
                    let duration = sound_duration_ms(cpu.sound_timer);
                    self.devices.audio_cue(duration);
                }
                control_flow = Flow::Sound;
            }
            // Fx1E (ADD I, Vx)
            //
            // Add Vx to I
            AddI(vx) => cpu.address = cpu.address.wrapping_add(cpu.register(vx) as Address),
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            LdF(vx) => {
                let digit = (cpu.register(vx) & 0xF) as Address;
                cpu.address = FONTSET_START + digit * FONTSET_HEIGHT;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            LdB(vx) => {
                let x = cpu.register(vx);
                let (hundreds, tens, ones) = (cpu.i_addr(0), cpu.i_addr(1), cpu.i_addr(2));
                cpu.ram[hundreds] = x / 100 % 10;
                cpu.ram[tens]     = x / 10  % 10;
                cpu.ram[ones]     = x       % 10;
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            // I is left pointing past the last stored byte.
            LdIVx(vx) => {
                for v in 0..=vx as usize {
                    let addr = cpu.i_addr(v);
                    cpu.ram[addr] = cpu.registers[v];
                }
                cpu.address = cpu.address.wrapping_add(vx as Address + 1);
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            // I is left pointing past the last loaded byte.
            LdVxI(vx) => {
                for v in 0..=vx as usize {
                    cpu.registers[v] = cpu.ram[cpu.i_addr(v)];
                }
                cpu.address = cpu.address.wrapping_add(vx as Address + 1);
            }
        }

        Ok(control_flow)
    }

    fn key_pressed(&self, vx: u8) -> bool {
        // Only the lower nibble names a key.
        match KeyCode::try_from(self.cpu.register(vx) & 0xF) {
            Ok(key) => self.devices.is_pressed(key),
            Err(_) => false,
        }
    }

    /// Check for a keypress while suspended on `Fx0A`.
    ///
    /// The key is consumed, so holding it down does not satisfy the next wait.
    fn poll_key(&mut self, vx: u8) -> Flow {
        match self.devices.first_pressed() {
            Some(key) => {
                self.devices.release_key(key);
                self.cpu.set_register(vx, key.as_u8() as u16);
                self.cpu.key_wait = None;
                self.cpu.pc = self.cpu.pc.wrapping_add(2);
                Flow::Ok
            }
            None => Flow::KeyWait,
        }
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(address: Address, instr: &Instr) {
    log::trace!("{address:04X}: {instr}");
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: Address, _: &Instr) {}
