//! Real-time frame clock for host loops.
use std::{
    thread,
    time::{Duration, Instant},
};

use crate::{constants::*, vm::Hz};

/// Timer to synchronize a host thread with the 60Hz display frames.
///
/// The machine itself has no notion of time. A host driving it in real time
/// waits on this clock between calls to `run_frame`. Time spent by the host
/// between waits counts towards the next frame.
pub struct FrameClock {
    last: Instant,
    interval: Duration,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(Hz(DELAY_FREQUENCY))
    }
}

impl FrameClock {
    /// Creates a new clock with the current time as internal state.
    pub fn new(frequency: Hz) -> Self {
        Self {
            last: Instant::now(),
            interval: frequency.into(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// Block the current thread until the next frame.
    pub fn wait(&mut self) {
        loop {
            let elapsed = self.last.elapsed();
            if elapsed < self.interval {
                // Sleep does not have enough resolution, and causes
                // the clock to run at 30 FPS.
                //
                // Yielding in a loop is the best alternative.
                thread::yield_now();
            } else {
                // Reset back to zero, rather than trying to catch up.
                //
                // If the VM was paused for debugging, and a large
                // amount of time has elapsed until it is resumed,
                // it should simply continue at the next cycle running
                // at its usual speed.
                self.reset();
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frame_interval() {
        let clock = FrameClock::default();
        assert_eq!(clock.interval().as_nanos() as u64, CLOCK_CYCLE_TIME);
    }

    #[test]
    fn test_wait_blocks_for_interval() {
        let mut clock = FrameClock::new(Hz(200));
        let start = Instant::now();
        clock.wait();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
