//! Machine state snapshots for stepping backwards.
use std::collections::VecDeque;

use crate::cpu::Chip8Cpu;

/// Frozen copy of the complete machine state.
///
/// Covers memory, registers, I, PC, the call stack, display, timers and
/// the key wait register.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    state: Chip8Cpu,
}

impl Snapshot {
    pub(crate) fn capture(cpu: &Chip8Cpu) -> Self {
        Self { state: cpu.clone() }
    }

    /// Overwrite the live machine state with this snapshot.
    pub(crate) fn restore_into(&self, cpu: &mut Chip8Cpu) {
        cpu.clone_from(&self.state);
    }

    pub(crate) fn into_state(self) -> Chip8Cpu {
        self.state
    }

    /// Read-only view of the captured state.
    pub fn state(&self) -> &Chip8Cpu {
        &self.state
    }
}

/// Bounded history of snapshots, newest at the back.
///
/// When full, the oldest snapshot is dropped to make room.
pub struct History {
    states: VecDeque<Snapshot>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            // Grows on demand, a full history is several megabytes.
            states: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        if self.capacity == 0 {
            return;
        }
        while self.states.len() >= self.capacity {
            self.states.pop_front();
        }
        self.states.push_back(snapshot);
    }

    /// Remove and return the most recent snapshot.
    pub fn pop(&mut self) -> Option<Snapshot> {
        self.states.pop_back()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}
