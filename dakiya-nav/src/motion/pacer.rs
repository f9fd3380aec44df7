//! Time pacing between issued primitives

use parking_lot::Mutex;
use std::thread;
use std::time::Duration;

/// Blocks the executing thread while a primitive runs on the device
pub trait Pacer: Send + Sync {
    fn wait(&self, duration: Duration);
}

/// Wall-clock pacing
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn wait(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Returns immediately and records every requested wait
///
/// Used for dry runs and tests of execution timing.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.waits.lock().iter().sum()
    }
}

impl Pacer for RecordingPacer {
    fn wait(&self, duration: Duration) {
        self.waits.lock().push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_pacer() {
        let pacer = RecordingPacer::new();
        pacer.wait(Duration::from_millis(10));
        pacer.wait(Duration::from_millis(15));
        assert_eq!(pacer.waits().len(), 2);
        assert_eq!(pacer.total(), Duration::from_millis(25));
    }
}
