//! Dakiya wire protocol
//!
//! Newline-terminated ASCII protocol spoken between the host navigator
//! (`dakiya-nav`) and the robot firmware (`dakiya-fw`).
//!
//! ## Host → device
//!
//! | Line | Meaning |
//! |------|---------|
//! | `MOVE_DISTANCE:<inches>` | Drive forward N inches (2 decimals) |
//! | `TURN_ANGLE:<degrees>` | Turn in place, sign = direction (1 decimal) |
//! | `FORWARD` / `LEFT` / `RIGHT` / `STOP` | Legacy fixed-duration primitives |
//! | `RESET` | Force the motion state machine back to idle |
//! | `TABLE<n>_ARRIVED` / `TABLE<n>_RECEIVED` | Notification LEDs |
//! | `CALIBRATE:<in/s>,<deg/s>,<base>,<precision>` | Motion calibration sync |
//!
//! ## Device → host
//!
//! | Line | Meaning |
//! |------|---------|
//! | `RECEIVED:<command>` | Command echo |
//! | `MOVEMENT_COMPLETE:<status>` | Primitive finished |
//! | `OBSTACLE:DETECTED` / `OBSTACLE:CLEARED` | Obstacle latch transition |
//! | `MOVEMENT_PAUSED:OBSTACLE` / `MOVEMENT_RESUMED` | Pause/resume during a move |
//! | `BLOCKED:<reason>` | Command rejected |
//! | anything else | Diagnostics, decoded as [`DeviceEvent::Unknown`] |

pub mod calibration;
pub mod command;
pub mod error;
pub mod event;
pub mod framing;

pub use calibration::MotionCalibration;
pub use command::HostCommand;
pub use error::{Result, WireError};
pub use event::{CompletionStatus, DeviceEvent};
pub use framing::LineAssembler;
