//! Robot context shared by the session and its worker threads
//!
//! Holds the optimistic pose, the active calibration and the link handle.
//! Callers share it as [`SharedContext`] and hold the lock only to read or
//! update state. Link writes happen on a cloned link handle after the lock
//! is released, so a stalled write never blocks pose readers.

use crate::error::{NavError, Result};
use crate::link::LinkTransport;
use crate::pose::Pose;
use dakiya_wire::{HostCommand, MotionCalibration};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

pub type SharedContext = Arc<Mutex<RobotContext>>;

pub struct RobotContext {
    pose: Pose,
    calibration: MotionCalibration,
    link: Arc<LinkTransport>,
}

impl RobotContext {
    pub fn new(pose: Pose, calibration: MotionCalibration, link: Arc<LinkTransport>) -> Self {
        Self {
            pose,
            calibration,
            link,
        }
    }

    pub fn into_shared(self) -> SharedContext {
        Arc::new(Mutex::new(self))
    }

    /// Last pose implied by issued commands
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    pub fn calibration(&self) -> MotionCalibration {
        self.calibration
    }

    pub fn link(&self) -> &Arc<LinkTransport> {
        &self.link
    }

    /// Validate and adopt a new calibration without sending it
    ///
    /// Takes effect on the next primitive.
    pub fn set_calibration(&mut self, calibration: MotionCalibration) -> Result<()> {
        calibration
            .validate()
            .map_err(|e| NavError::Config(format!("calibration: {}", e)))?;
        self.calibration = calibration;
        info!(
            ips = calibration.inches_per_second,
            dps = calibration.degrees_per_second,
            "Calibration updated"
        );
        Ok(())
    }
}

/// Adopt a new calibration and push it to the firmware
///
/// The context lock is released before the CALIBRATE write.
pub fn update_calibration(
    ctx: &Mutex<RobotContext>,
    calibration: MotionCalibration,
) -> Result<()> {
    let link = {
        let mut ctx = ctx.lock();
        ctx.set_calibration(calibration)?;
        Arc::clone(ctx.link())
    };
    link.issue(&HostCommand::Calibrate(calibration));
    Ok(())
}
