//! Translate cell paths into turn/move primitives and execute them

use super::pacer::Pacer;
use super::primitive::MotionPrimitive;
use crate::config::MotionConfig;
use crate::context::RobotContext;
use crate::planning::Cell;
use crate::pose::{Heading, Pose, turn_angle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a path execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Every segment was issued; carries the final pose
    Completed(Pose),
    /// Cancel was observed between segments; carries the pose at that point
    Cancelled(Pose),
}

impl ExecutionOutcome {
    pub fn pose(&self) -> Pose {
        match *self {
            ExecutionOutcome::Completed(pose) | ExecutionOutcome::Cancelled(pose) => pose,
        }
    }
}

/// One straight segment of a path
#[derive(Debug, Clone, Copy)]
struct Segment {
    turn: i32,
    heading: Heading,
    cells: i32,
}

/// Open-loop, time-paced motion planner
#[derive(Debug, Clone)]
pub struct MotionPlanner {
    grid_unit_inches: f32,
    safety_buffer: Duration,
}

impl MotionPlanner {
    pub fn new(grid_unit_inches: f32, safety_buffer: Duration) -> Self {
        Self {
            grid_unit_inches,
            safety_buffer,
        }
    }

    pub fn from_config(config: &MotionConfig) -> Self {
        Self::new(
            config.grid_unit_inches,
            Duration::from_millis(config.safety_buffer_ms),
        )
    }

    pub fn grid_unit_inches(&self) -> f32 {
        self.grid_unit_inches
    }

    pub fn safety_buffer(&self) -> Duration {
        self.safety_buffer
    }

    /// Primitives for `path` starting from `start`, and the resulting pose
    ///
    /// Pure: nothing is sent. Diagonal or repeated cells are skipped.
    pub fn plan_path(&self, start: Pose, path: &[Cell]) -> (Vec<MotionPrimitive>, Pose) {
        let mut primitives = Vec::new();
        let mut pose = start;
        for pair in path.windows(2) {
            let Some(segment) = self.segment(pose.facing, pair[0], pair[1]) else {
                continue;
            };
            if segment.turn != 0 {
                primitives.push(MotionPrimitive::Turn(segment.turn));
                pose = pose.apply_turn(segment.turn);
            }
            primitives.push(self.move_for(&segment));
            pose = Pose::at(pair[1], segment.heading);
        }
        (primitives, pose)
    }

    /// Issue `path` through the robot context, pacing each primitive
    ///
    /// `cancel` is checked before each segment; a segment already started
    /// runs to the end of its wait. The context lock is never held across a
    /// link write or a wait.
    pub fn execute_path(
        &self,
        ctx: &Mutex<RobotContext>,
        path: &[Cell],
        cancel: &AtomicBool,
        pacer: &dyn Pacer,
    ) -> ExecutionOutcome {
        for pair in path.windows(2) {
            if cancel.load(Ordering::SeqCst) {
                let pose = ctx.lock().pose();
                info!(%pose, "Path execution cancelled");
                return ExecutionOutcome::Cancelled(pose);
            }

            let (from, to) = (pair[0], pair[1]);
            let facing = ctx.lock().pose().facing;
            let Some(segment) = self.segment(facing, from, to) else {
                continue;
            };

            if segment.turn != 0 {
                let turn = segment.turn;
                self.perform(ctx, MotionPrimitive::Turn(turn), |pose| pose.apply_turn(turn), pacer);
            }
            self.perform(
                ctx,
                self.move_for(&segment),
                |_| Pose::at(to, segment.heading),
                pacer,
            );
        }

        let pose = ctx.lock().pose();
        debug!(%pose, "Path executed");
        ExecutionOutcome::Completed(pose)
    }

    /// Host-side wait after issuing `primitive`
    pub fn wait_for(&self, primitive: &MotionPrimitive, ctx: &RobotContext) -> Duration {
        primitive.duration(&ctx.calibration()) + self.safety_buffer
    }

    fn perform(
        &self,
        ctx: &Mutex<RobotContext>,
        primitive: MotionPrimitive,
        next_pose: impl FnOnce(Pose) -> Pose,
        pacer: &dyn Pacer,
    ) {
        let (link, wait) = {
            let mut ctx = ctx.lock();
            let pose = next_pose(ctx.pose());
            ctx.set_pose(pose);
            (Arc::clone(ctx.link()), self.wait_for(&primitive, &ctx))
        };
        link.issue(&primitive.to_command());
        debug!(%primitive, ?wait, "Primitive issued");
        pacer.wait(wait);
    }

    fn move_for(&self, segment: &Segment) -> MotionPrimitive {
        MotionPrimitive::Move(self.grid_unit_inches * segment.cells as f32)
    }

    fn segment(&self, facing: Heading, from: Cell, to: Cell) -> Option<Segment> {
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        let Some(heading) = Heading::from_delta(dx, dy) else {
            if dx != 0 || dy != 0 {
                warn!(%from, %to, "Skipping diagonal segment");
            }
            return None;
        };
        Some(Segment {
            turn: turn_angle(facing, heading),
            heading,
            cells: dx.abs() + dy.abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> MotionPlanner {
        MotionPlanner::new(24.0, Duration::from_millis(200))
    }

    fn cells(points: &[(i32, i32)]) -> Vec<Cell> {
        points.iter().map(|&p| Cell::from(p)).collect()
    }

    #[test]
    fn test_straight_then_right() {
        let start = Pose::new(2, 4, Heading::North);
        let (primitives, end) = planner().plan_path(start, &cells(&[(2, 4), (2, 3), (3, 3)]));
        assert_eq!(
            primitives,
            vec![
                MotionPrimitive::Move(24.0),
                MotionPrimitive::Turn(90),
                MotionPrimitive::Move(24.0)
            ]
        );
        assert_eq!(end, Pose::new(3, 3, Heading::East));
    }

    #[test]
    fn test_reversal_is_single_turn() {
        let start = Pose::new(2, 3, Heading::North);
        let (primitives, end) = planner().plan_path(start, &cells(&[(2, 3), (2, 4)]));
        assert_eq!(
            primitives,
            vec![MotionPrimitive::Turn(-180), MotionPrimitive::Move(24.0)]
        );
        assert_eq!(end, Pose::new(2, 4, Heading::South));
    }

    #[test]
    fn test_degenerate_paths() {
        let start = Pose::new(2, 4, Heading::North);
        let (primitives, end) = planner().plan_path(start, &cells(&[(2, 4)]));
        assert!(primitives.is_empty());
        assert_eq!(end, start);

        let (primitives, end) = planner().plan_path(start, &[]);
        assert!(primitives.is_empty());
        assert_eq!(end, start);
    }

    #[test]
    fn test_diagonal_and_repeated_cells_skipped() {
        let start = Pose::new(0, 0, Heading::East);
        let (primitives, end) =
            planner().plan_path(start, &cells(&[(0, 0), (0, 0), (1, 0), (2, 1)]));
        assert_eq!(primitives, vec![MotionPrimitive::Move(24.0)]);
        assert_eq!(end, Pose::new(1, 0, Heading::East));
    }

    #[test]
    fn test_multi_cell_straight_segment() {
        let start = Pose::new(0, 0, Heading::South);
        let (primitives, end) = planner().plan_path(start, &cells(&[(0, 0), (0, 3)]));
        assert_eq!(primitives, vec![MotionPrimitive::Move(72.0)]);
        assert_eq!(end, Pose::new(0, 3, Heading::South));
    }

    #[test]
    fn test_turns_only_where_heading_changes() {
        let start = Pose::new(0, 4, Heading::North);
        let path = cells(&[(0, 4), (0, 3), (1, 3), (2, 3), (2, 2), (1, 2)]);
        let (primitives, end) = planner().plan_path(start, &path);
        let turns: Vec<i32> = primitives
            .iter()
            .filter_map(|p| match p {
                MotionPrimitive::Turn(d) => Some(*d),
                _ => None,
            })
            .collect();
        assert_eq!(turns, vec![90, -90, -90]);
        assert_eq!(end, Pose::new(1, 2, Heading::West));
    }
}
