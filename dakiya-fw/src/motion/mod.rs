//! Motion control subsystem

pub mod controller;
pub mod trim;

pub use controller::{
    ActiveCommand, ActiveMotion, DeviceMotionState, MotionController, MotionState, MotionTarget,
};
pub use trim::TiltTrim;
