//! Firmware control loop
//!
//! One [`Firmware::tick`] does all the work of a control cycle without
//! blocking: drain serial input and dispatch commands, sample the range
//! sensors when the sample interval has elapsed, then advance the motion
//! controller. A primitive's duration is realised as many short ticks, so
//! obstacle detection and command intake stay live during a move.

use crate::config::FirmwareConfig;
use crate::error::Result;
use crate::motion::{DeviceMotionState, MotionController};
use crate::obstacle::{ObstacleLatch, ObstacleMonitor, ObstacleTransition};
use crate::platform::{
    Board, Clock, MotorDriver, Peripherals, SerialLine, StatusLeds, TableLed,
};
use dakiya_wire::{DeviceEvent, HostCommand, LineAssembler, WireError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Boot banner
pub const READY: &str = "READY";

const SERIAL_CHUNK: usize = 64;

/// Device firmware bound to a board
pub struct Firmware<B: Board> {
    p: Peripherals<B>,
    config: FirmwareConfig,
    assembler: LineAssembler,
    controller: MotionController,
    obstacles: ObstacleMonitor,
    last_sample_ms: Option<u64>,
}

impl<B: Board> Firmware<B> {
    /// Bring up the board, stop the motors and announce `READY`
    pub fn new(board: B, config: FirmwareConfig) -> Result<Self> {
        config.validate()?;
        let mut p = board.init()?;
        p.motors.stop();

        let controller = MotionController::new(
            config.calibration,
            config.trim.clone(),
            config.legacy.clone(),
        );
        let obstacles = ObstacleMonitor::new(config.obstacle.clone());

        let mut firmware = Self {
            p,
            config,
            assembler: LineAssembler::new(),
            controller,
            obstacles,
            last_sample_ms: None,
        };
        firmware.emit_line(READY);
        log::info!("Firmware ready");
        Ok(firmware)
    }

    pub fn controller(&self) -> &MotionController {
        &self.controller
    }

    pub fn motion_snapshot(&self) -> DeviceMotionState {
        self.controller.snapshot()
    }

    pub fn obstacle_latch(&self) -> ObstacleLatch {
        self.obstacles.latch()
    }

    /// Run one control cycle
    pub fn tick(&mut self) {
        self.poll_serial();

        let now = self.p.clock.now_ms();
        let sample_due = self
            .last_sample_ms
            .is_none_or(|last| now.saturating_sub(last) >= self.config.obstacle.sample_interval_ms);
        if sample_due {
            self.last_sample_ms = Some(now);
            if let Some(transition) = self.obstacles.sample(&mut self.p.ranges) {
                let event = match transition {
                    ObstacleTransition::Detected => DeviceEvent::ObstacleDetected,
                    ObstacleTransition::Cleared => DeviceEvent::ObstacleCleared,
                };
                self.emit(&event);
            }
        }

        let latched = self.obstacles.is_latched();
        if let Some(event) =
            self.controller
                .update(now, latched, &mut self.p.motors, &mut self.p.tilt)
        {
            self.emit(&event);
        }
    }

    /// Tick until `shutdown` is set, then stop the motors
    pub fn run(&mut self, shutdown: &AtomicBool) {
        let interval = Duration::from_millis(self.config.board.tick_interval_ms);
        while !shutdown.load(Ordering::Relaxed) {
            self.tick();
            thread::sleep(interval);
        }
        self.p.motors.stop();
        log::info!("Firmware loop exiting");
    }

    fn poll_serial(&mut self) {
        let mut buf = [0u8; SERIAL_CHUNK];
        loop {
            match self.p.serial.read_available(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    for line in self.assembler.push(&buf[..n]) {
                        self.handle_line(&line);
                    }
                }
                Err(e) => {
                    log::warn!("Serial read failed: {}", e);
                    break;
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let command = match HostCommand::parse(line) {
            Ok(command) => command,
            Err(WireError::InvalidArgument { .. } | WireError::InvalidCalibration(_)) => {
                log::warn!("Invalid argument in {:?}", line);
                self.emit(&DeviceEvent::ReceivedEcho(line.to_string()));
                self.emit(&DeviceEvent::Blocked("INVALID_ARGUMENT".to_string()));
                return;
            }
            Err(e) => {
                log::warn!("Unparsed line {:?}: {}", line, e);
                self.emit_line(&format!("ERROR:UNKNOWN_COMMAND:{}", line));
                return;
            }
        };

        log::debug!("Command: {}", command);
        self.emit(&DeviceEvent::ReceivedEcho(line.to_string()));
        let now = self.p.clock.now_ms();

        let reply = match command {
            HostCommand::MoveDistance(inches) => {
                self.controller.start_move(inches, now, &mut self.p.motors)
            }
            HostCommand::TurnAngle(degrees) => {
                self.controller.start_turn(degrees, now, &mut self.p.motors)
            }
            HostCommand::Forward => self.controller.start_forward(now, &mut self.p.motors),
            HostCommand::Left => {
                self.controller
                    .start_quarter_turn(false, now, &mut self.p.motors)
            }
            HostCommand::Right => {
                self.controller
                    .start_quarter_turn(true, now, &mut self.p.motors)
            }
            HostCommand::Stop => self.controller.stop(&mut self.p.motors),
            HostCommand::Reset => self.controller.reset(&mut self.p.motors),
            HostCommand::TableArrived(table) => {
                self.set_table_leds(table, TableLed::Arrived);
                None
            }
            HostCommand::TableReceived(table) => {
                self.set_table_leds(table, TableLed::Received);
                None
            }
            HostCommand::Calibrate(calibration) => {
                self.controller.set_calibration(calibration);
                None
            }
        };

        if let Some(event) = reply {
            self.emit(&event);
        }
    }

    /// Light one LED of a table and turn its other LED off
    fn set_table_leds(&mut self, table: u8, lit: TableLed) {
        if table == 0 || table > self.config.board.table_count {
            log::warn!("No LEDs for table {}", table);
            self.emit_line(&format!("ERROR:UNKNOWN_TABLE:{}", table));
            return;
        }
        let other = match lit {
            TableLed::Arrived => TableLed::Received,
            TableLed::Received => TableLed::Arrived,
        };
        self.p.leds.set(table, other, false);
        self.p.leds.set(table, lit, true);
    }

    fn emit(&mut self, event: &DeviceEvent) {
        self.emit_line(&event.encode());
    }

    fn emit_line(&mut self, line: &str) {
        if let Err(e) = self.p.serial.write_line(line) {
            log::warn!("Failed to send {:?}: {}", line, e);
        }
    }
}
