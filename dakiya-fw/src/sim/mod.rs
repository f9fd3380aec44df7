//! Simulated board and in-process device
//!
//! [`SimBoard`] runs the firmware against a wall clock with noisy tilt and
//! range sensors. It is generic over the serial line so the same board backs
//! both the in-process [`SimulatedDevice`] (byte channels to the host) and
//! the `dakiya-fw-sim` binary (a real serial port or pty).

pub mod noise;

use crate::config::{FirmwareConfig, SimConfig};
use crate::error::{PlatformError, Result};
use crate::firmware::Firmware;
use crate::platform::{
    self, Board, Clock, MotorDriver, Peripherals, RangeSensorId, RangeSensors, SerialLine,
    StatusLeds, TableLed, TiltSensor,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use noise::SensorNoise;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Shortest distance an ultrasonic sensor can report (cm)
const MIN_RANGE_CM: f32 = 2.0;

/// Wall clock measured from board init
pub struct SystemClock {
    start: Instant,
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Motor outputs shared with the simulated tilt sensor
pub struct SimMotors {
    speeds: Arc<Mutex<(i16, i16)>>,
}

impl MotorDriver for SimMotors {
    fn set_speeds(&mut self, left: i16, right: i16) {
        let mut speeds = self.speeds.lock();
        if *speeds != (left, right) {
            log::debug!("Sim motors: left={} right={}", left, right);
        }
        *speeds = (left, right);
    }
}

/// Tilt that leans by a constant bias whenever the wheels are driving
pub struct SimTilt {
    speeds: Arc<Mutex<(i16, i16)>>,
    noise: Arc<Mutex<SensorNoise>>,
    config: SimConfig,
}

impl TiltSensor for SimTilt {
    fn read_tilt(&mut self) -> platform::Result<f32> {
        let mut noise = self.noise.lock();
        if noise.chance(self.config.tilt_failure_rate) {
            return Err(PlatformError::SensorRead("simulated I2C NACK".to_string()));
        }
        let driving = *self.speeds.lock() != (0, 0);
        let bias = if driving { self.config.tilt_bias_deg } else { 0.0 };
        Ok(bias + noise.gaussian(self.config.tilt_noise_deg))
    }
}

/// Handle for placing an obstacle in front of the simulated robot
#[derive(Clone, Default)]
pub struct ObstacleControl {
    distance_cm: Arc<Mutex<Option<f32>>>,
}

impl ObstacleControl {
    /// Put an obstacle `cm` in front of the center sensor, or remove it with `None`
    pub fn set(&self, cm: Option<f32>) {
        log::info!("Sim obstacle: {:?} cm", cm);
        *self.distance_cm.lock() = cm;
    }

    pub fn get(&self) -> Option<f32> {
        *self.distance_cm.lock()
    }
}

/// Noisy range sensors; only the center sensor sees the placed obstacle
pub struct SimRanges {
    obstacle: ObstacleControl,
    noise: Arc<Mutex<SensorNoise>>,
    config: SimConfig,
    us_per_cm: f32,
}

impl RangeSensors for SimRanges {
    fn echo_pulse_us(&mut self, sensor: RangeSensorId) -> platform::Result<u32> {
        let mut noise = self.noise.lock();
        if noise.chance(self.config.echo_dropout) {
            return Err(PlatformError::Timeout);
        }
        let true_cm = match (sensor, self.obstacle.get()) {
            (RangeSensorId::Center, Some(cm)) => cm,
            _ => self.config.open_floor_cm,
        };
        let cm = (true_cm + noise.gaussian(self.config.range_noise_cm)).max(MIN_RANGE_CM);
        Ok((cm * self.us_per_cm).round() as u32)
    }
}

/// LEDs that only log
pub struct SimLeds;

impl StatusLeds for SimLeds {
    fn set(&mut self, table: u8, led: TableLed, on: bool) {
        log::info!(
            "Table {} {:?} LED {}",
            table,
            led,
            if on { "on" } else { "off" }
        );
    }
}

/// Simulated board over any serial line
pub struct SimBoard<S: SerialLine> {
    serial: S,
    sim: SimConfig,
    us_per_cm: f32,
    obstacle: ObstacleControl,
}

impl<S: SerialLine> SimBoard<S> {
    pub fn new(serial: S, config: &FirmwareConfig) -> Self {
        Self {
            serial,
            sim: config.sim.clone(),
            us_per_cm: config.obstacle.us_per_cm,
            obstacle: ObstacleControl::default(),
        }
    }

    /// Obstacle handle that stays valid after the board is handed to the firmware
    pub fn obstacle(&self) -> ObstacleControl {
        self.obstacle.clone()
    }
}

impl<S: SerialLine> Board for SimBoard<S> {
    type Clock = SystemClock;
    type Motors = SimMotors;
    type Tilt = SimTilt;
    type Ranges = SimRanges;
    type Leds = SimLeds;
    type Serial = S;

    fn init(self) -> platform::Result<Peripherals<Self>> {
        let speeds = Arc::new(Mutex::new((0, 0)));
        let noise = Arc::new(Mutex::new(SensorNoise::new(self.sim.seed)));
        Ok(Peripherals {
            clock: SystemClock {
                start: Instant::now(),
            },
            motors: SimMotors {
                speeds: Arc::clone(&speeds),
            },
            tilt: SimTilt {
                speeds,
                noise: Arc::clone(&noise),
                config: self.sim.clone(),
            },
            ranges: SimRanges {
                obstacle: self.obstacle,
                noise,
                config: self.sim,
                us_per_cm: self.us_per_cm,
            },
            leds: SimLeds,
            serial: self.serial,
        })
    }
}

/// Serial line over in-process byte channels
pub struct ChannelLine {
    rx: Receiver<Vec<u8>>,
    tx: Sender<Vec<u8>>,
    pending: Vec<u8>,
}

impl SerialLine for ChannelLine {
    fn read_available(&mut self, buf: &mut [u8]) -> platform::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending = chunk,
                Err(TryRecvError::Empty) => return Ok(0),
                Err(TryRecvError::Disconnected) => {
                    return Err(PlatformError::Serial("host side closed".to_string()));
                }
            }
        }
        Ok(drain_into(&mut self.pending, buf))
    }

    fn write_line(&mut self, line: &str) -> platform::Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.tx
            .send(bytes)
            .map_err(|_| PlatformError::Serial("host side closed".to_string()))
    }
}

fn drain_into(pending: &mut Vec<u8>, buf: &mut [u8]) -> usize {
    let n = buf.len().min(pending.len());
    buf[..n].copy_from_slice(&pending[..n]);
    pending.drain(..n);
    n
}

/// Firmware running on its own thread against a [`SimBoard`]
///
/// The host side talks to it through [`write`](Self::write) and
/// [`read`](Self::read) exactly as it would through a serial port.
pub struct SimulatedDevice {
    to_device: Sender<Vec<u8>>,
    from_device: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    obstacle: ObstacleControl,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SimulatedDevice {
    /// Boot the firmware on a background thread
    pub fn spawn(config: FirmwareConfig) -> Result<Self> {
        let (to_device, device_rx) = crossbeam_channel::unbounded();
        let (device_tx, from_device) = crossbeam_channel::unbounded();

        let line = ChannelLine {
            rx: device_rx,
            tx: device_tx,
            pending: Vec::new(),
        };
        let board = SimBoard::new(line, &config);
        let obstacle = board.obstacle();
        let mut firmware = Firmware::new(board, config)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let thread = thread::Builder::new()
            .name("dakiya-fw-sim".to_string())
            .spawn(move || firmware.run(&flag))?;

        log::info!("Simulated device started");
        Ok(Self {
            to_device,
            from_device,
            pending: Vec::new(),
            obstacle,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Send raw bytes to the firmware
    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        self.to_device
            .send(bytes.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "simulated device stopped"))
    }

    /// Read firmware output, waiting at most `timeout`; 0 means nothing arrived
    pub fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.from_device.recv_timeout(timeout) {
                Ok(chunk) => self.pending = chunk,
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "simulated device stopped",
                    ));
                }
            }
        }
        Ok(drain_into(&mut self.pending, buf))
    }

    /// Handle for placing obstacles in front of the robot
    pub fn obstacle(&self) -> ObstacleControl {
        self.obstacle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the firmware thread and wait for it
    pub fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Simulated device thread panicked");
            }
            log::info!("Simulated device stopped");
        }
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}
