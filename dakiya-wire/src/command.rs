//! Host → device commands
//!
//! Every command is a single ASCII line. [`HostCommand::encode`] produces the
//! line without the trailing newline; the transport appends it.

use crate::calibration::MotionCalibration;
use crate::error::{Result, WireError};
use std::fmt;

const MOVE_DISTANCE: &str = "MOVE_DISTANCE";
const TURN_ANGLE: &str = "TURN_ANGLE";
const CALIBRATE: &str = "CALIBRATE";
const TABLE_PREFIX: &str = "TABLE";
const ARRIVED_SUFFIX: &str = "_ARRIVED";
const RECEIVED_SUFFIX: &str = "_RECEIVED";

/// Commands understood by the firmware
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    /// Drive forward the given distance in inches
    MoveDistance(f32),
    /// Turn in place by the given angle in degrees (positive = clockwise)
    TurnAngle(f32),
    /// Legacy fixed-duration forward drive
    Forward,
    /// Legacy fixed-duration left turn
    Left,
    /// Legacy fixed-duration right turn
    Right,
    /// Stop the active primitive
    Stop,
    /// Force the motion state machine to idle
    Reset,
    /// Light the "arrived" LED for a table
    TableArrived(u8),
    /// Light the "received" LED for a table
    TableReceived(u8),
    /// Replace the firmware's motion calibration
    Calibrate(MotionCalibration),
}

impl HostCommand {
    /// Serialize to a protocol line (no newline)
    pub fn encode(&self) -> String {
        match self {
            Self::MoveDistance(inches) => format!("{}:{:.2}", MOVE_DISTANCE, inches),
            Self::TurnAngle(degrees) => format!("{}:{:.1}", TURN_ANGLE, degrees),
            Self::Forward => "FORWARD".to_string(),
            Self::Left => "LEFT".to_string(),
            Self::Right => "RIGHT".to_string(),
            Self::Stop => "STOP".to_string(),
            Self::Reset => "RESET".to_string(),
            Self::TableArrived(table) => format!("{}{}{}", TABLE_PREFIX, table, ARRIVED_SUFFIX),
            Self::TableReceived(table) => {
                format!("{}{}{}", TABLE_PREFIX, table, RECEIVED_SUFFIX)
            }
            Self::Calibrate(cal) => format!(
                "{}:{:.2},{:.1},{},{}",
                CALIBRATE,
                cal.inches_per_second,
                cal.degrees_per_second,
                cal.base_speed_pwm,
                cal.precision_speed_pwm
            ),
        }
    }

    /// Parse a protocol line received by the firmware
    ///
    /// Surrounding whitespace (including a stray `\r`) is ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();

        if let Some((keyword, arg)) = line.split_once(':') {
            return match keyword {
                MOVE_DISTANCE => Ok(Self::MoveDistance(parse_number(MOVE_DISTANCE, arg)?)),
                TURN_ANGLE => Ok(Self::TurnAngle(parse_number(TURN_ANGLE, arg)?)),
                CALIBRATE => parse_calibration(arg).map(Self::Calibrate),
                _ => Err(WireError::UnknownCommand(line.to_string())),
            };
        }

        match line {
            "FORWARD" => Ok(Self::Forward),
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            "STOP" => Ok(Self::Stop),
            "RESET" => Ok(Self::Reset),
            _ => parse_table(line),
        }
    }

    /// Whether this command starts a motion primitive on the device
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            Self::MoveDistance(_) | Self::TurnAngle(_) | Self::Forward | Self::Left | Self::Right
        )
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_number(command: &'static str, arg: &str) -> Result<f32> {
    let value: f32 = arg.trim().parse().map_err(|_| WireError::InvalidArgument {
        command,
        value: arg.to_string(),
    })?;
    if !value.is_finite() {
        return Err(WireError::InvalidArgument {
            command,
            value: arg.to_string(),
        });
    }
    Ok(value)
}

fn parse_calibration(arg: &str) -> Result<MotionCalibration> {
    let invalid = || WireError::InvalidArgument {
        command: CALIBRATE,
        value: arg.to_string(),
    };

    let fields: Vec<&str> = arg.split(',').map(str::trim).collect();
    let [ips, dps, base, precision] = fields.as_slice() else {
        return Err(invalid());
    };

    let calibration = MotionCalibration {
        inches_per_second: ips.parse().map_err(|_| invalid())?,
        degrees_per_second: dps.parse().map_err(|_| invalid())?,
        base_speed_pwm: base.parse().map_err(|_| invalid())?,
        precision_speed_pwm: precision.parse().map_err(|_| invalid())?,
    };
    calibration.validate()?;
    Ok(calibration)
}

fn parse_table(line: &str) -> Result<HostCommand> {
    let Some(rest) = line.strip_prefix(TABLE_PREFIX) else {
        return Err(WireError::UnknownCommand(line.to_string()));
    };

    let (digits, ctor): (&str, fn(u8) -> HostCommand) =
        if let Some(digits) = rest.strip_suffix(ARRIVED_SUFFIX) {
            (digits, HostCommand::TableArrived)
        } else if let Some(digits) = rest.strip_suffix(RECEIVED_SUFFIX) {
            (digits, HostCommand::TableReceived)
        } else {
            return Err(WireError::UnknownCommand(line.to_string()));
        };

    match digits.parse::<u8>() {
        Ok(table) if table > 0 => Ok(ctor(table)),
        _ => Err(WireError::InvalidTable(line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_formats() {
        assert_eq!(HostCommand::MoveDistance(24.0).encode(), "MOVE_DISTANCE:24.00");
        assert_eq!(HostCommand::TurnAngle(-90.0).encode(), "TURN_ANGLE:-90.0");
        assert_eq!(HostCommand::TableArrived(3).encode(), "TABLE3_ARRIVED");
        assert_eq!(HostCommand::TableReceived(1).encode(), "TABLE1_RECEIVED");
        assert_eq!(
            HostCommand::Calibrate(MotionCalibration::default()).encode(),
            "CALIBRATE:4.00,180.0,200,150"
        );
        assert_eq!(HostCommand::Reset.to_string(), "RESET");
    }

    #[test]
    fn test_move_distance_keeps_two_decimals() {
        for inches in [0.5_f32, 12.345, 24.0, 47.999, 120.125] {
            let line = HostCommand::MoveDistance(inches).encode();
            let HostCommand::MoveDistance(parsed) = HostCommand::parse(&line).unwrap() else {
                panic!("expected MoveDistance from {}", line);
            };
            assert!(
                (parsed - inches).abs() <= 0.005 + 1e-4,
                "{} decoded as {}",
                inches,
                parsed
            );
        }
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(HostCommand::parse("FORWARD").unwrap(), HostCommand::Forward);
        assert_eq!(HostCommand::parse("LEFT\r").unwrap(), HostCommand::Left);
        assert_eq!(HostCommand::parse(" RIGHT ").unwrap(), HostCommand::Right);
        assert_eq!(HostCommand::parse("STOP").unwrap(), HostCommand::Stop);
        assert_eq!(HostCommand::parse("RESET").unwrap(), HostCommand::Reset);
        assert_eq!(
            HostCommand::parse("TURN_ANGLE:180.0").unwrap(),
            HostCommand::TurnAngle(180.0)
        );
    }

    #[test]
    fn test_parse_tables() {
        assert_eq!(
            HostCommand::parse("TABLE2_ARRIVED").unwrap(),
            HostCommand::TableArrived(2)
        );
        assert_eq!(
            HostCommand::parse("TABLE12_RECEIVED").unwrap(),
            HostCommand::TableReceived(12)
        );
        assert!(matches!(
            HostCommand::parse("TABLE0_ARRIVED"),
            Err(WireError::InvalidTable(_))
        ));
        assert!(matches!(
            HostCommand::parse("TABLEX_ARRIVED"),
            Err(WireError::InvalidTable(_))
        ));
        assert!(matches!(
            HostCommand::parse("TABLE1_LEFT"),
            Err(WireError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            HostCommand::parse("JUMP"),
            Err(WireError::UnknownCommand(_))
        ));
        assert!(matches!(
            HostCommand::parse("MOVE_DISTANCE:abc"),
            Err(WireError::InvalidArgument { .. })
        ));
        assert!(matches!(
            HostCommand::parse("MOVE_DISTANCE:inf"),
            Err(WireError::InvalidArgument { .. })
        ));
        assert!(matches!(
            HostCommand::parse("CALIBRATE:4.0,180.0"),
            Err(WireError::InvalidArgument { .. })
        ));
        assert!(matches!(
            HostCommand::parse("CALIBRATE:0.0,180.0,200,150"),
            Err(WireError::InvalidCalibration(_))
        ));
    }

    #[test]
    fn test_parse_calibration() {
        let parsed = HostCommand::parse("CALIBRATE:5.50,120.0,210,160").unwrap();
        let HostCommand::Calibrate(cal) = parsed else {
            panic!("expected calibration");
        };
        assert_eq!(cal.inches_per_second, 5.5);
        assert_eq!(cal.degrees_per_second, 120.0);
        assert_eq!(cal.base_speed_pwm, 210);
        assert_eq!(cal.precision_speed_pwm, 160);
    }

    #[test]
    fn test_is_motion() {
        assert!(HostCommand::MoveDistance(1.0).is_motion());
        assert!(HostCommand::Left.is_motion());
        assert!(!HostCommand::Stop.is_motion());
        assert!(!HostCommand::TableArrived(1).is_motion());
    }
}
