//! In-process simulated device as a link

use super::LinkPort;
use dakiya_fw::{FirmwareConfig, ObstacleControl, SimulatedDevice};
use std::io;
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Link backed by the simulated firmware
pub struct SimulatedLinkPort {
    device: SimulatedDevice,
}

impl SimulatedLinkPort {
    pub fn spawn(config: FirmwareConfig) -> dakiya_fw::Result<Self> {
        Ok(Self {
            device: SimulatedDevice::spawn(config)?,
        })
    }

    /// Handle for placing an obstacle in front of the simulated robot
    pub fn obstacle(&self) -> ObstacleControl {
        self.device.obstacle()
    }
}

impl LinkPort for SimulatedLinkPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.device.read(buf, READ_TIMEOUT)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.device.write(bytes)
    }
}
