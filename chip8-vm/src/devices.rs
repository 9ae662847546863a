//! IO device interface
use crate::{constants::*, display::Framebuffer, error::Chip8Error};

/// Hooks to provide IO devices to the virtual machine.
///
/// The machine never waits on a device. Keyboard state is pulled when an
/// instruction needs it, and output is pushed at frame boundaries.
pub trait Devices {
    /// Checks immediately whether the given key is currently pressed.
    fn is_pressed(&self, key: KeyCode) -> bool;

    /// Mark a key as released after it was consumed by a key wait.
    fn release_key(&mut self, key: KeyCode);

    /// Blit the display buffer to screen output.
    fn draw(&mut self, display: &Framebuffer);

    /// Play the buzzer for the given duration.
    fn audio_cue(&mut self, duration_ms: u32);

    /// The machine stopped on a fatal error.
    fn report_error(&mut self, err: &Chip8Error);

    /// Retrieve the first key that is pressed down.
    fn first_pressed(&self) -> Option<KeyCode> {
        KeyCode::all().find(|key| self.is_pressed(*key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(try_from = "u8"))]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// All keys in ascending order.
    pub fn all() -> impl Iterator<Item = KeyCode> {
        (0..KEY_COUNT).filter_map(|k| KeyCode::try_from(k).ok())
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        match key_id {
            0 => Ok(Self::Key0),
            1 => Ok(Self::Key1),
            2 => Ok(Self::Key2),
            3 => Ok(Self::Key3),
            4 => Ok(Self::Key4),
            5 => Ok(Self::Key5),
            6 => Ok(Self::Key6),
            7 => Ok(Self::Key7),
            8 => Ok(Self::Key8),
            9 => Ok(Self::Key9),
            10 => Ok(Self::KeyA),
            11 => Ok(Self::KeyB),
            12 => Ok(Self::KeyC),
            13 => Ok(Self::KeyD),
            14 => Ok(Self::KeyE),
            15 => Ok(Self::KeyF),
            _ => Err(InvalidKeyCode),
        }
    }
}

#[derive(Debug)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

/// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Keypad(u16);

impl Keypad {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.0 |= 1 << key.as_u8();
        } else {
            self.0 &= !(1 << key.as_u8());
        }
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.0 & (1 << key.as_u8()) != 0
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any(&self) -> bool {
        self.0 != 0
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn bits(&self) -> u16 {
        self.0
    }
}

/// Devices without any real IO, recording everything the machine outputs.
///
/// Used for headless runs and tests.
#[derive(Default)]
pub struct HeadlessDevices {
    pub keypad: Keypad,
    /// Most recent frame that was drawn.
    pub frame: Option<Framebuffer>,
    /// Number of frames drawn so far.
    pub frame_count: usize,
    /// Durations of every audio cue, in milliseconds.
    pub audio_cues: Vec<u32>,
    /// Messages of reported fatal errors.
    pub errors: Vec<String>,
}

impl HeadlessDevices {
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the keyboard key input state.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.keypad.set(key, pressed);
    }
}

impl Devices for HeadlessDevices {
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.keypad.is_pressed(key)
    }

    fn release_key(&mut self, key: KeyCode) {
        self.keypad.set(key, false);
    }

    fn draw(&mut self, display: &Framebuffer) {
        match self.frame.as_mut() {
            Some(frame) => frame.clone_from(display),
            None => self.frame = Some(display.clone()),
        }
        self.frame_count += 1;
    }

    fn audio_cue(&mut self, duration_ms: u32) {
        self.audio_cues.push(duration_ms);
    }

    fn report_error(&mut self, err: &Chip8Error) {
        self.errors.push(err.to_string());
    }
}
