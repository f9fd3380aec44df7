//! Serial line backed by a real (or pseudo-terminal) serial port

use super::{Result, SerialLine};
use crate::error::PlatformError;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// [`SerialLine`] over the `serialport` crate
pub struct SerialPortLine {
    port: Box<dyn SerialPort>,
}

impl SerialPortLine {
    /// Open `path` at `baud_rate`, 8N1, no flow control
    pub fn open(path: &str, baud_rate: u32) -> std::result::Result<Self, serialport::Error> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(1))
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);
        Ok(Self { port })
    }
}

impl SerialLine for SerialPortLine {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| PlatformError::Serial(e.to_string()))?;
        if pending == 0 {
            return Ok(0);
        }
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(PlatformError::Serial(e.to_string())),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.port
            .write_all(line.as_bytes())
            .and_then(|_| self.port.write_all(b"\n"))
            .and_then(|_| self.port.flush())
            .map_err(|e| PlatformError::Serial(e.to_string()))
    }
}
