//! Precision motion state machine
//!
//! Executes one primitive at a time. Completion is decided by elapsed time
//! against the calibrated target duration, with time spent paused for an
//! obstacle excluded. The state enum is the single source of truth: the
//! snapshot handed to callers is derived from it.

use super::trim::TiltTrim;
use crate::config::{LegacyConfig, TrimConfig};
use crate::platform::{MotorDriver, TiltSensor};
use dakiya_wire::{CompletionStatus, DeviceEvent, MotionCalibration};

const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";

/// Progress log throttle (ms)
const PROGRESS_LOG_INTERVAL_MS: u64 = 1000;

/// What the active primitive is aiming for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionTarget {
    /// Straight drive, inches
    Distance(f32),
    /// In-place turn, degrees (positive = clockwise)
    Angle(f32),
}

/// Bookkeeping for the primitive currently executing
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveMotion {
    pub target: MotionTarget,
    pub started_ms: u64,
    /// Effective run time needed to reach the target
    pub target_ms: u64,
    pub paused_accumulated_ms: u64,
    /// Planned left/right PWM before any trim
    pub planned_speeds: (i16, i16),
}

impl ActiveMotion {
    /// Run time so far, excluding pauses
    pub fn effective_elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms
            .saturating_sub(self.started_ms)
            .saturating_sub(self.paused_accumulated_ms)
    }

    fn is_complete(&self, now_ms: u64) -> bool {
        self.effective_elapsed_ms(now_ms) >= self.target_ms
    }
}

/// Controller state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MotionState {
    #[default]
    Idle,
    Moving(ActiveMotion),
    Turning(ActiveMotion),
    PausedForObstacle {
        motion: ActiveMotion,
        paused_at_ms: u64,
    },
}

impl MotionState {
    /// Upper-case name used in `BLOCKED:BUSY_<NAME>`
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Moving(_) => "MOVING",
            Self::Turning(_) => "TURNING",
            Self::PausedForObstacle { .. } => "PAUSED",
        }
    }

    /// The primitive in progress, if any (a paused move is still active)
    pub fn active(&self) -> Option<&ActiveMotion> {
        match self {
            Self::Idle => None,
            Self::Moving(motion) | Self::Turning(motion) => Some(motion),
            Self::PausedForObstacle { motion, .. } => Some(motion),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Kind of primitive reported in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveCommand {
    None,
    Move,
    Turn,
}

/// Read-only view of the controller state
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMotionState {
    pub is_moving: bool,
    pub active_command: ActiveCommand,
    pub start_timestamp_ms: u64,
    pub target: Option<MotionTarget>,
    pub paused_accumulated_ms: u64,
}

/// Motion primitive executor
pub struct MotionController {
    state: MotionState,
    calibration: MotionCalibration,
    trim: TiltTrim,
    legacy: LegacyConfig,
    last_progress_log_ms: Option<u64>,
}

impl MotionController {
    pub fn new(calibration: MotionCalibration, trim: TrimConfig, legacy: LegacyConfig) -> Self {
        log::debug!(
            "MotionController: {:.2} in/s, {:.1} deg/s, base pwm {}, precision pwm {}",
            calibration.inches_per_second,
            calibration.degrees_per_second,
            calibration.base_speed_pwm,
            calibration.precision_speed_pwm
        );
        Self {
            state: MotionState::Idle,
            calibration,
            trim: TiltTrim::new(trim),
            legacy,
            last_progress_log_ms: None,
        }
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    pub fn calibration(&self) -> &MotionCalibration {
        &self.calibration
    }

    /// Replace the calibration; the active primitive keeps its target time
    pub fn set_calibration(&mut self, calibration: MotionCalibration) {
        log::info!(
            "MotionController: calibration updated to {:.2} in/s, {:.1} deg/s",
            calibration.inches_per_second,
            calibration.degrees_per_second
        );
        self.calibration = calibration;
    }

    /// Snapshot of the current state
    pub fn snapshot(&self) -> DeviceMotionState {
        let active_command = match self.state {
            MotionState::Idle => ActiveCommand::None,
            MotionState::Moving(_) | MotionState::PausedForObstacle { .. } => ActiveCommand::Move,
            MotionState::Turning(_) => ActiveCommand::Turn,
        };
        let motion = self.state.active();
        DeviceMotionState {
            is_moving: motion.is_some(),
            active_command,
            start_timestamp_ms: motion.map_or(0, |m| m.started_ms),
            target: motion.map(|m| m.target),
            paused_accumulated_ms: motion.map_or(0, |m| m.paused_accumulated_ms),
        }
    }

    /// Start a calibrated straight move (`MOVE_DISTANCE`)
    pub fn start_move<M: MotorDriver>(
        &mut self,
        inches: f32,
        now_ms: u64,
        motors: &mut M,
    ) -> Option<DeviceEvent> {
        if let Some(rejection) = self.reject_if_busy() {
            return Some(rejection);
        }
        if !inches.is_finite() || inches <= 0.0 {
            log::warn!("MotionController: rejecting move of {} in", inches);
            return Some(DeviceEvent::Blocked(INVALID_ARGUMENT.to_string()));
        }

        let pwm = i16::from(self.calibration.precision_speed_pwm);
        let motion = ActiveMotion {
            target: MotionTarget::Distance(inches),
            started_ms: now_ms,
            target_ms: self.calibration.move_duration_ms(inches),
            paused_accumulated_ms: 0,
            planned_speeds: (pwm, pwm),
        };
        log::info!(
            "MotionController: Move {:.2} in (target {} ms)",
            inches,
            motion.target_ms
        );
        self.begin(MotionState::Moving(motion), motors);
        None
    }

    /// Start a calibrated in-place turn (`TURN_ANGLE`)
    pub fn start_turn<M: MotorDriver>(
        &mut self,
        degrees: f32,
        now_ms: u64,
        motors: &mut M,
    ) -> Option<DeviceEvent> {
        if let Some(rejection) = self.reject_if_busy() {
            return Some(rejection);
        }
        if !degrees.is_finite() {
            log::warn!("MotionController: rejecting turn of {} deg", degrees);
            return Some(DeviceEvent::Blocked(INVALID_ARGUMENT.to_string()));
        }

        let target_ms = self.calibration.turn_duration_ms(degrees);
        self.begin_turn(degrees, target_ms, now_ms, motors);
        None
    }

    /// Legacy `FORWARD`: fixed duration at base PWM
    pub fn start_forward<M: MotorDriver>(
        &mut self,
        now_ms: u64,
        motors: &mut M,
    ) -> Option<DeviceEvent> {
        if let Some(rejection) = self.reject_if_busy() {
            return Some(rejection);
        }

        let pwm = i16::from(self.calibration.base_speed_pwm);
        let inches = self.calibration.inches_per_second * self.legacy.forward_ms as f32 / 1000.0;
        let motion = ActiveMotion {
            target: MotionTarget::Distance(inches),
            started_ms: now_ms,
            target_ms: self.legacy.forward_ms,
            paused_accumulated_ms: 0,
            planned_speeds: (pwm, pwm),
        };
        log::info!("MotionController: Forward for {} ms", motion.target_ms);
        self.begin(MotionState::Moving(motion), motors);
        None
    }

    /// Legacy `LEFT` / `RIGHT`: fixed-duration quarter turn
    pub fn start_quarter_turn<M: MotorDriver>(
        &mut self,
        clockwise: bool,
        now_ms: u64,
        motors: &mut M,
    ) -> Option<DeviceEvent> {
        if let Some(rejection) = self.reject_if_busy() {
            return Some(rejection);
        }

        let degrees = if clockwise { 90.0 } else { -90.0 };
        self.begin_turn(degrees, self.legacy.turn_ms, now_ms, motors);
        None
    }

    /// `STOP`: halt motors, report `STOPPED` if a primitive was running
    pub fn stop<M: MotorDriver>(&mut self, motors: &mut M) -> Option<DeviceEvent> {
        motors.stop();
        if self.state.is_idle() {
            return None;
        }
        log::info!("MotionController: Stop while {}", self.state.name());
        self.finish();
        Some(DeviceEvent::MovementComplete(CompletionStatus::Stopped))
    }

    /// `RESET`: force idle; does nothing at all when already idle
    pub fn reset<M: MotorDriver>(&mut self, motors: &mut M) -> Option<DeviceEvent> {
        if self.state.is_idle() {
            log::debug!("MotionController: Reset while idle");
            return None;
        }
        log::info!("MotionController: Reset while {}", self.state.name());
        motors.stop();
        self.finish();
        Some(DeviceEvent::MovementComplete(CompletionStatus::Reset))
    }

    /// Advance the state machine by one control tick
    ///
    /// Applies the obstacle latch (pause/resume), checks completion and
    /// refreshes the tilt trim. Returns at most one telemetry event.
    pub fn update<M: MotorDriver, T: TiltSensor>(
        &mut self,
        now_ms: u64,
        obstacle_latched: bool,
        motors: &mut M,
        tilt: &mut T,
    ) -> Option<DeviceEvent> {
        match std::mem::take(&mut self.state) {
            MotionState::Idle => None,
            MotionState::Moving(motion) => {
                if obstacle_latched {
                    motors.stop();
                    log::info!(
                        "MotionController: Paused for obstacle after {} of {} ms",
                        motion.effective_elapsed_ms(now_ms),
                        motion.target_ms
                    );
                    self.state = MotionState::PausedForObstacle {
                        motion,
                        paused_at_ms: now_ms,
                    };
                    return Some(DeviceEvent::MovementPaused);
                }
                if motion.is_complete(now_ms) {
                    return self.complete(&motion, now_ms, motors);
                }

                let base = motion.planned_speeds.0;
                let (left, right) = match tilt.read_tilt() {
                    Ok(tilt_deg) => self.trim.apply(base, tilt_deg),
                    Err(e) => {
                        log::debug!("MotionController: tilt unavailable ({}), no trim", e);
                        self.trim.uncorrected(base)
                    }
                };
                motors.set_speeds(left, right);
                self.log_progress(&motion, now_ms);
                self.state = MotionState::Moving(motion);
                None
            }
            MotionState::Turning(motion) => {
                if motion.is_complete(now_ms) {
                    return self.complete(&motion, now_ms, motors);
                }
                self.log_progress(&motion, now_ms);
                self.state = MotionState::Turning(motion);
                None
            }
            MotionState::PausedForObstacle {
                mut motion,
                paused_at_ms,
            } => {
                if obstacle_latched {
                    self.state = MotionState::PausedForObstacle {
                        motion,
                        paused_at_ms,
                    };
                    return None;
                }
                let paused_for = now_ms.saturating_sub(paused_at_ms);
                motion.paused_accumulated_ms += paused_for;
                let (left, right) = motion.planned_speeds;
                motors.set_speeds(left, right);
                log::info!(
                    "MotionController: Resumed after {} ms pause ({} ms paused in total)",
                    paused_for,
                    motion.paused_accumulated_ms
                );
                self.state = MotionState::Moving(motion);
                Some(DeviceEvent::MovementResumed)
            }
        }
    }

    fn reject_if_busy(&self) -> Option<DeviceEvent> {
        if self.state.is_idle() {
            return None;
        }
        log::warn!(
            "MotionController: command rejected while {}",
            self.state.name()
        );
        Some(DeviceEvent::Blocked(format!("BUSY_{}", self.state.name())))
    }

    fn begin_turn<M: MotorDriver>(
        &mut self,
        degrees: f32,
        target_ms: u64,
        now_ms: u64,
        motors: &mut M,
    ) {
        let pwm = i16::from(self.calibration.base_speed_pwm);
        let planned_speeds = if degrees >= 0.0 { (pwm, -pwm) } else { (-pwm, pwm) };
        let motion = ActiveMotion {
            target: MotionTarget::Angle(degrees),
            started_ms: now_ms,
            target_ms,
            paused_accumulated_ms: 0,
            planned_speeds,
        };
        log::info!(
            "MotionController: Turn {:.1} deg (target {} ms)",
            degrees,
            target_ms
        );
        self.begin(MotionState::Turning(motion), motors);
    }

    fn begin<M: MotorDriver>(&mut self, state: MotionState, motors: &mut M) {
        if let Some(motion) = state.active() {
            let (left, right) = motion.planned_speeds;
            motors.set_speeds(left, right);
        }
        self.state = state;
        self.last_progress_log_ms = None;
    }

    fn complete<M: MotorDriver>(
        &mut self,
        motion: &ActiveMotion,
        now_ms: u64,
        motors: &mut M,
    ) -> Option<DeviceEvent> {
        motors.stop();
        match motion.target {
            MotionTarget::Distance(inches) => log::info!(
                "MotionController: Move complete - {:.2} in in {} ms ({} ms paused)",
                inches,
                now_ms.saturating_sub(motion.started_ms),
                motion.paused_accumulated_ms
            ),
            MotionTarget::Angle(degrees) => log::info!(
                "MotionController: Turn complete - {:.1} deg in {} ms",
                degrees,
                now_ms.saturating_sub(motion.started_ms)
            ),
        }
        self.finish();
        Some(DeviceEvent::MovementComplete(CompletionStatus::Success))
    }

    fn finish(&mut self) {
        self.state = MotionState::Idle;
        self.last_progress_log_ms = None;
    }

    fn log_progress(&mut self, motion: &ActiveMotion, now_ms: u64) {
        let due = self
            .last_progress_log_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= PROGRESS_LOG_INTERVAL_MS);
        if !due {
            return;
        }
        log::debug!(
            "MotionController: progress {}/{} ms",
            motion.effective_elapsed_ms(now_ms),
            motion.target_ms
        );
        self.last_progress_log_ms = Some(now_ms);
    }
}
