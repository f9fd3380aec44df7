//! Error types for the wire protocol

/// Result type alias
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors raised while parsing host command lines
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WireError {
    /// Line is not a known command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Command is known but its argument is missing or malformed
    #[error("Invalid argument for {command}: {value:?}")]
    InvalidArgument {
        /// Command keyword
        command: &'static str,
        /// Raw argument text
        value: String,
    },

    /// Table notification with an id outside 1..=255
    #[error("Invalid table id in {0}")]
    InvalidTable(String),

    /// Calibration values out of range
    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),
}
