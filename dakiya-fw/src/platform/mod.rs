//! Board abstraction
//!
//! The firmware logic is written against these traits so the same
//! controller runs on hardware, on the mock board in tests and on the
//! simulated board. A [`Board`] names one concrete type per peripheral via
//! associated types and hands them over as [`Peripherals`] on init.

pub mod mock;
pub mod serial;

use crate::error::PlatformError;

/// Result type for peripheral operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Monotonic millisecond clock
pub trait Clock {
    /// Milliseconds since an arbitrary epoch (boot)
    fn now_ms(&self) -> u64;
}

/// Differential drive motor outputs
///
/// Speeds are signed PWM duty values; negative drives the wheel backwards.
pub trait MotorDriver {
    /// Set left and right wheel PWM
    fn set_speeds(&mut self, left: i16, right: i16);

    /// Stop both wheels
    fn stop(&mut self) {
        self.set_speeds(0, 0);
    }
}

/// Accelerometer-derived tilt (roll) in degrees, positive when leaning right
pub trait TiltSensor {
    fn read_tilt(&mut self) -> Result<f32>;
}

/// Ultrasonic sensor position on the chassis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeSensorId {
    Left,
    Center,
    Right,
}

impl RangeSensorId {
    /// All sensors in sampling order
    pub const ALL: [RangeSensorId; 3] = [Self::Left, Self::Center, Self::Right];

    /// Index into per-sensor arrays
    pub fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Center => 1,
            Self::Right => 2,
        }
    }
}

/// Ultrasonic range sensors
pub trait RangeSensors {
    /// Trigger one ping and return the echo pulse width in microseconds
    ///
    /// Returns [`PlatformError::Timeout`] when no echo arrives.
    fn echo_pulse_us(&mut self, sensor: RangeSensorId) -> Result<u32>;
}

/// Which notification LED of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableLed {
    Arrived,
    Received,
}

/// Per-table notification LEDs
pub trait StatusLeds {
    fn set(&mut self, table: u8, led: TableLed, on: bool);
}

/// Byte-level serial line to the host
pub trait SerialLine {
    /// Read whatever bytes are available without blocking; 0 means none
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write one line; the newline is appended by the implementation
    fn write_line(&mut self, line: &str) -> Result<()>;
}

/// A concrete board
///
/// Implementations provide one type per peripheral and bring them up in
/// [`Board::init`].
///
/// ```ignore
/// impl Board for MyBoard {
///     type Clock = SysTick;
///     type Motors = L298n;
///     // ...
///     fn init(self) -> Result<Peripherals<Self>> {
///         // configure timers, PWM, GPIO
///     }
/// }
/// ```
pub trait Board: Sized {
    type Clock: Clock;
    type Motors: MotorDriver;
    type Tilt: TiltSensor;
    type Ranges: RangeSensors;
    type Leds: StatusLeds;
    type Serial: SerialLine;

    /// Bring up the peripherals
    fn init(self) -> Result<Peripherals<Self>>;
}

/// Initialized peripherals owned by the firmware loop
pub struct Peripherals<B: Board> {
    pub clock: B::Clock,
    pub motors: B::Motors,
    pub tilt: B::Tilt,
    pub ranges: B::Ranges,
    pub leds: B::Leds,
    pub serial: B::Serial,
}
