//! Path-to-primitive motion planning
//!
//! The firmware reports completion but the host paces itself on time: each
//! issued primitive is followed by a wait of its calibrated duration plus a
//! safety buffer. Pose is updated optimistically when a primitive is issued.

pub mod pacer;
pub mod planner;
pub mod primitive;

pub use pacer::{Pacer, RecordingPacer, ThreadPacer};
pub use planner::{ExecutionOutcome, MotionPlanner};
pub use primitive::MotionPrimitive;
