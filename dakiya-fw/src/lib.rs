//! Dakiya firmware logic
//!
//! Device side of the Dakiya delivery robot: a single-threaded control loop
//! that parses host commands, executes one motion primitive at a time with
//! tilt trim, and pauses straight moves while an obstacle is latched.
//!
//! The logic is board-agnostic. [`platform::Board`] abstracts the
//! peripherals; [`platform::mock::MockBoard`] drives it in tests and
//! [`sim::SimBoard`] runs it against a wall clock with noisy sensors.
//!
//! ```text
//!  serial bytes ─► LineAssembler ─► HostCommand ─► MotionController ─► motors
//!                                                      ▲
//!  range sensors ─► ObstacleMonitor (median + latch) ──┘
//!  tilt sensor ───────────────────────────────────────► TiltTrim
//! ```

pub mod config;
pub mod error;
pub mod firmware;
pub mod motion;
pub mod obstacle;
pub mod platform;
pub mod sim;

pub use config::FirmwareConfig;
pub use error::{FirmwareError, PlatformError, Result};
pub use firmware::Firmware;
pub use motion::{DeviceMotionState, MotionController, MotionState};
pub use obstacle::{ObstacleLatch, ObstacleMonitor};
pub use sim::{ObstacleControl, SimulatedDevice};
