//! Device → host telemetry events
//!
//! Decoding is total: any line that is not recognized becomes
//! [`DeviceEvent::Unknown`] so diagnostics can be logged without being
//! treated as protocol errors.

use std::fmt;

const RECEIVED: &str = "RECEIVED";
const MOVEMENT_COMPLETE: &str = "MOVEMENT_COMPLETE";
const OBSTACLE: &str = "OBSTACLE";
const MOVEMENT_PAUSED: &str = "MOVEMENT_PAUSED";
const MOVEMENT_RESUMED: &str = "MOVEMENT_RESUMED";
const BLOCKED: &str = "BLOCKED";

/// How a motion primitive ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Target distance/angle reached
    Success,
    /// Ended early by `STOP`
    Stopped,
    /// Ended early by `RESET`
    Reset,
    /// Status string this version does not know
    Other(String),
}

impl CompletionStatus {
    fn as_str(&self) -> &str {
        match self {
            Self::Success => "SUCCESS",
            Self::Stopped => "STOPPED",
            Self::Reset => "RESET",
            Self::Other(s) => s,
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "SUCCESS" => Self::Success,
            "STOPPED" => Self::Stopped,
            "RESET" => Self::Reset,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry emitted by the firmware
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Firmware echoed a command it accepted for processing
    ReceivedEcho(String),
    /// A motion primitive finished
    MovementComplete(CompletionStatus),
    /// Obstacle latch engaged
    ObstacleDetected,
    /// Obstacle latch released
    ObstacleCleared,
    /// Active move paused because of an obstacle
    MovementPaused,
    /// Paused move resumed
    MovementResumed,
    /// Command rejected (usually because a primitive is still running)
    Blocked(String),
    /// Any other line (boot banner, diagnostics)
    Unknown(String),
}

impl DeviceEvent {
    /// Decode one telemetry line
    pub fn decode(line: &str) -> Self {
        let line = line.trim();

        if let Some((keyword, arg)) = line.split_once(':') {
            match (keyword, arg) {
                (RECEIVED, cmd) => return Self::ReceivedEcho(cmd.to_string()),
                (MOVEMENT_COMPLETE, status) => {
                    return Self::MovementComplete(CompletionStatus::parse(status));
                }
                (OBSTACLE, "DETECTED") => return Self::ObstacleDetected,
                (OBSTACLE, "CLEARED") => return Self::ObstacleCleared,
                (MOVEMENT_PAUSED, _) => return Self::MovementPaused,
                (BLOCKED, reason) => return Self::Blocked(reason.to_string()),
                _ => {}
            }
        }

        match line {
            MOVEMENT_RESUMED => Self::MovementResumed,
            MOVEMENT_PAUSED => Self::MovementPaused,
            _ => Self::Unknown(line.to_string()),
        }
    }

    /// Serialize to a telemetry line (no newline)
    pub fn encode(&self) -> String {
        match self {
            Self::ReceivedEcho(cmd) => format!("{}:{}", RECEIVED, cmd),
            Self::MovementComplete(status) => format!("{}:{}", MOVEMENT_COMPLETE, status),
            Self::ObstacleDetected => format!("{}:DETECTED", OBSTACLE),
            Self::ObstacleCleared => format!("{}:CLEARED", OBSTACLE),
            Self::MovementPaused => format!("{}:OBSTACLE", MOVEMENT_PAUSED),
            Self::MovementResumed => MOVEMENT_RESUMED.to_string(),
            Self::Blocked(reason) => format!("{}:{}", BLOCKED, reason),
            Self::Unknown(raw) => raw.clone(),
        }
    }

    /// Whether this event reports an obstacle pause or resume
    pub fn is_obstacle_related(&self) -> bool {
        matches!(
            self,
            Self::ObstacleDetected
                | Self::ObstacleCleared
                | Self::MovementPaused
                | Self::MovementResumed
        )
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
