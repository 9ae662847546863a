//! Run configuration and scripted input.
use std::fs;

use chip8_vm::prelude::*;
use serde::Deserialize;

/// Contents of the optional YAML file passed to `chip8 run`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub vm: Chip8Conf,
    /// Number of frames to run before printing the machine state.
    pub frames: usize,
    /// Run the frames at 60Hz instead of as fast as possible.
    pub throttle: bool,
    pub keys: Vec<KeyEvent>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            vm: Chip8Conf::default(),
            frames: 600,
            throttle: false,
            keys: Vec::new(),
        }
    }
}

/// Key press or release applied before the given frame runs.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyEvent {
    pub frame: usize,
    pub key: KeyCode,
    #[serde(default = "pressed_default")]
    pub pressed: bool,
}

fn pressed_default() -> bool {
    true
}

impl RunConfig {
    pub fn from_file(filepath: &str) -> Chip8Result<Self> {
        let source = fs::read_to_string(filepath)?;
        let config = Self::from_yaml(&source)?;
        log::debug!("loaded run configuration: {:#?}", config);
        Ok(config)
    }

    pub fn from_yaml(source: &str) -> Chip8Result<Self> {
        serde_yaml::from_str(source).map_err(|err| Chip8Error::Config(err.to_string()))
    }

    /// Key events scripted for the given frame, in file order.
    pub fn keys_at(&self, frame: usize) -> impl Iterator<Item = &KeyEvent> {
        self.keys.iter().filter(move |event| event.frame == frame)
    }
}
