mod bytecode;
mod clock;
pub mod constants;
mod cpu;
pub mod debug;
mod devices;
mod display;
mod error;
mod snapshot;
mod vm;

pub use self::{
    bytecode::Instr,
    vm::{Hz, StateEvent, StateObserver},
};

pub mod prelude {
    pub use super::{
        clock::FrameClock,
        cpu::Chip8Cpu,
        debug::Stepper,
        devices::{Devices, HeadlessDevices, InvalidKeyCode, KeyCode, Keypad},
        display::Framebuffer,
        error::{Chip8Error, Chip8Result},
        snapshot::{History, Snapshot},
        vm::{Chip8Conf, Chip8Vm, Flow},
    };
}
