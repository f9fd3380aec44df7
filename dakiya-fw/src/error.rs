//! Error types for the firmware crate

/// Result type alias
pub type Result<T> = std::result::Result<T, FirmwareError>;

/// Errors raised by board peripherals
///
/// Board implementations map their driver-specific failures to these variants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlatformError {
    /// Sensor returned no usable value
    #[error("Sensor read failed: {0}")]
    SensorRead(String),

    /// Sensor or bus did not answer in time
    #[error("Peripheral timeout")]
    Timeout,

    /// Serial line failure
    #[error("Serial error: {0}")]
    Serial(String),

    /// Board bring-up failed
    #[error("Board initialization failed: {0}")]
    Init(String),
}

/// Firmware-level errors
#[derive(Debug, thiserror::Error)]
pub enum FirmwareError {
    /// Peripheral failure during bring-up
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serial port could not be opened
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for FirmwareError {
    fn from(e: toml::de::Error) -> Self {
        FirmwareError::Config(e.to_string())
    }
}
