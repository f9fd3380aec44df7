//! Mock board for tests
//!
//! Every mock peripheral is a cheap clonable handle over shared state, so a
//! test keeps a clone of [`MockBoard`] after handing the original to the
//! firmware and drives time, sensors and serial input from the outside.

use super::{
    Board, Clock, MotorDriver, Peripherals, RangeSensorId, RangeSensors, Result, SerialLine,
    StatusLeds, TableLed, TiltSensor,
};
use crate::error::PlatformError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Manually advanced clock
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now_ms: Arc<AtomicU64>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance time by `ms`
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Motor driver that records every write
#[derive(Debug, Clone, Default)]
pub struct MockMotors {
    writes: Arc<Mutex<Vec<(i16, i16)>>>,
}

impl MockMotors {
    /// Last commanded speeds, `(0, 0)` if never written
    pub fn speeds(&self) -> (i16, i16) {
        self.writes.lock().last().copied().unwrap_or((0, 0))
    }

    /// Number of writes so far
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// All writes in order
    pub fn history(&self) -> Vec<(i16, i16)> {
        self.writes.lock().clone()
    }
}

impl MotorDriver for MockMotors {
    fn set_speeds(&mut self, left: i16, right: i16) {
        self.writes.lock().push((left, right));
    }
}

/// Tilt sensor with a settable reading
#[derive(Debug, Clone, Default)]
pub struct MockTilt {
    state: Arc<Mutex<Option<f32>>>,
}

impl MockTilt {
    /// Reading returned from now on
    pub fn set(&self, degrees: f32) {
        *self.state.lock() = Some(degrees);
    }

    /// Make subsequent reads fail
    pub fn fail(&self) {
        *self.state.lock() = None;
    }
}

impl TiltSensor for MockTilt {
    fn read_tilt(&mut self) -> Result<f32> {
        (*self.state.lock())
            .ok_or_else(|| PlatformError::SensorRead("mock tilt unavailable".to_string()))
    }
}

/// Range sensors reporting fixed distances
#[derive(Debug, Clone)]
pub struct MockRanges {
    distances_cm: Arc<Mutex<[Option<f32>; 3]>>,
    us_per_cm: f32,
}

impl MockRanges {
    /// Every sensor starts far away (300 cm)
    pub fn new(us_per_cm: f32) -> Self {
        Self {
            distances_cm: Arc::new(Mutex::new([Some(300.0); 3])),
            us_per_cm,
        }
    }

    /// Set one sensor's distance
    pub fn set(&self, sensor: RangeSensorId, cm: f32) {
        self.distances_cm.lock()[sensor.index()] = Some(cm);
    }

    /// Set every sensor's distance
    pub fn set_all(&self, cm: f32) {
        *self.distances_cm.lock() = [Some(cm); 3];
    }

    /// Make one sensor time out
    pub fn set_timeout(&self, sensor: RangeSensorId) {
        self.distances_cm.lock()[sensor.index()] = None;
    }
}

impl RangeSensors for MockRanges {
    fn echo_pulse_us(&mut self, sensor: RangeSensorId) -> Result<u32> {
        match self.distances_cm.lock()[sensor.index()] {
            Some(cm) => Ok((cm * self.us_per_cm).round() as u32),
            None => Err(PlatformError::Timeout),
        }
    }
}

/// LED bank remembering the last state of each LED
#[derive(Debug, Clone, Default)]
pub struct MockLeds {
    state: Arc<Mutex<HashMap<(u8, TableLed), bool>>>,
}

impl MockLeds {
    pub fn is_on(&self, table: u8, led: TableLed) -> bool {
        self.state.lock().get(&(table, led)).copied().unwrap_or(false)
    }
}

impl StatusLeds for MockLeds {
    fn set(&mut self, table: u8, led: TableLed, on: bool) {
        self.state.lock().insert((table, led), on);
    }
}

#[derive(Debug, Default)]
struct SerialBuffers {
    rx: VecDeque<u8>,
    tx: Vec<String>,
}

/// Serial line with an injectable receive queue and a captured transmit log
#[derive(Debug, Clone, Default)]
pub struct MockSerial {
    buffers: Arc<Mutex<SerialBuffers>>,
}

impl MockSerial {
    /// Queue raw bytes as if sent by the host
    pub fn inject(&self, bytes: &[u8]) {
        self.buffers.lock().rx.extend(bytes.iter().copied());
    }

    /// Queue one host line (newline appended)
    pub fn inject_line(&self, line: &str) {
        self.inject(line.as_bytes());
        self.inject(b"\n");
    }

    /// Drain every line written by the firmware
    pub fn take_lines(&self) -> Vec<String> {
        std::mem::take(&mut self.buffers.lock().tx)
    }
}

impl SerialLine for MockSerial {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut buffers = self.buffers.lock();
        let n = buf.len().min(buffers.rx.len());
        for (slot, byte) in buf.iter_mut().zip(buffers.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.buffers.lock().tx.push(line.to_string());
        Ok(())
    }
}

/// Board built from mock peripherals
///
/// Clone it before passing it to the firmware to keep access to the mocks.
#[derive(Debug, Clone)]
pub struct MockBoard {
    pub clock: MockClock,
    pub motors: MockMotors,
    pub tilt: MockTilt,
    pub ranges: MockRanges,
    pub leds: MockLeds,
    pub serial: MockSerial,
}

impl MockBoard {
    /// Level tilt, clear range sensors, clock at zero
    pub fn new() -> Self {
        let tilt = MockTilt::default();
        tilt.set(0.0);
        Self {
            clock: MockClock::new(),
            motors: MockMotors::default(),
            tilt,
            ranges: MockRanges::new(58.0),
            leds: MockLeds::default(),
            serial: MockSerial::default(),
        }
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl Board for MockBoard {
    type Clock = MockClock;
    type Motors = MockMotors;
    type Tilt = MockTilt;
    type Ranges = MockRanges;
    type Leds = MockLeds;
    type Serial = MockSerial;

    fn init(self) -> Result<Peripherals<Self>> {
        Ok(Peripherals {
            clock: self.clock,
            motors: self.motors,
            tilt: self.tilt,
            ranges: self.ranges,
            leds: self.leds,
            serial: self.serial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_shared_between_clones() {
        let clock = MockClock::new();
        let other = clock.clone();
        clock.advance(250);
        other.advance(250);
        assert_eq!(clock.now_ms(), 500);
    }

    #[test]
    fn test_ranges_convert_to_pulse() {
        let mut ranges = MockRanges::new(58.0);
        ranges.set(RangeSensorId::Center, 10.0);
        assert_eq!(ranges.echo_pulse_us(RangeSensorId::Center).unwrap(), 580);
        ranges.set_timeout(RangeSensorId::Left);
        assert_eq!(
            ranges.echo_pulse_us(RangeSensorId::Left),
            Err(PlatformError::Timeout)
        );
    }

    #[test]
    fn test_serial_partial_reads() {
        let mut serial = MockSerial::default();
        serial.inject_line("STOP");
        let mut buf = [0u8; 3];
        assert_eq!(serial.read_available(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"STO");
        assert_eq!(serial.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"P\n");
        assert_eq!(serial.read_available(&mut buf).unwrap(), 0);
    }
}
