//! Serial link to the firmware
//!
//! [`LinkTransport`] owns one [`LinkPort`] at a time and runs two threads on
//! it: a reader that frames incoming bytes into lines and broadcasts decoded
//! telemetry, and a writer that serializes outgoing command lines. The port
//! sits behind a shared mutex so both threads take turns on it.
//!
//! ```text
//!  send("MOVE_DISTANCE:24.00") ──► writer thread ──┐
//!                                                  ▼
//!                                    Arc<Mutex<Box<dyn LinkPort>>>
//!                                                  │
//!  subscribe() ◄── LinkEvent ◄── reader thread ◄───┘
//! ```

mod mock;
mod serial;
#[cfg(feature = "sim")]
mod sim;
mod transport;

pub use mock::MockLinkPort;
pub use serial::SerialLinkPort;
#[cfg(feature = "sim")]
pub use sim::SimulatedLinkPort;
pub use transport::LinkTransport;

use dakiya_wire::DeviceEvent;
use std::fmt;
use std::io;

/// Byte stream to the device
///
/// `read` must return promptly: `Ok(0)` when nothing arrived within a short
/// poll window. Any other error ends the connection.
pub trait LinkPort: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Where to connect
#[derive(Debug, Clone)]
pub enum Endpoint {
    Serial { path: String, baud_rate: u32 },
    /// Firmware running on a thread inside this process
    #[cfg(feature = "sim")]
    Simulated(Box<dakiya_fw::FirmwareConfig>),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Serial { path, baud_rate } => write!(f, "{}@{}", path, baud_rate),
            #[cfg(feature = "sim")]
            Endpoint::Simulated(_) => f.write_str("simulated"),
        }
    }
}

/// Connection state changes and device telemetry
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Telemetry(DeviceEvent),
}
