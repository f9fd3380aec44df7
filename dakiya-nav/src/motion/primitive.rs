//! Motion primitives

use dakiya_wire::{HostCommand, MotionCalibration};
use std::fmt;
use std::time::Duration;

/// Device-level motion step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionPrimitive {
    /// Turn in place, degrees (positive = clockwise)
    Turn(i32),
    /// Drive straight, inches
    Move(f32),
}

impl MotionPrimitive {
    pub fn to_command(&self) -> HostCommand {
        match *self {
            MotionPrimitive::Turn(degrees) => HostCommand::TurnAngle(degrees as f32),
            MotionPrimitive::Move(inches) => HostCommand::MoveDistance(inches),
        }
    }

    /// Expected execution time under `calibration`
    pub fn duration(&self, calibration: &MotionCalibration) -> Duration {
        match *self {
            MotionPrimitive::Turn(degrees) => calibration.turn_duration(degrees as f32),
            MotionPrimitive::Move(inches) => calibration.move_duration(inches),
        }
    }
}

impl fmt::Display for MotionPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionPrimitive::Turn(degrees) => write!(f, "Turn({})", degrees),
            MotionPrimitive::Move(inches) => write!(f, "Move({:.2})", inches),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands() {
        assert_eq!(MotionPrimitive::Move(24.0).to_command().encode(), "MOVE_DISTANCE:24.00");
        assert_eq!(MotionPrimitive::Turn(90).to_command().encode(), "TURN_ANGLE:90.0");
        assert_eq!(MotionPrimitive::Turn(-180).to_command().encode(), "TURN_ANGLE:-180.0");
    }

    #[test]
    fn test_durations_use_magnitude() {
        let cal = MotionCalibration::default();
        assert_eq!(MotionPrimitive::Move(24.0).duration(&cal), Duration::from_secs(6));
        assert_eq!(MotionPrimitive::Turn(90).duration(&cal), Duration::from_millis(500));
        assert_eq!(MotionPrimitive::Turn(-90).duration(&cal), Duration::from_millis(500));
        assert_eq!(MotionPrimitive::Turn(-180).duration(&cal), Duration::from_secs(1));
    }
}
