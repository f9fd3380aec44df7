//! Grid pose of the robot
//!
//! Cells are addressed `(x, y)` with `x` growing east and `y` growing south,
//! so North is `(0, -1)`. Headings carry an index in clockwise order, which
//! makes turn arithmetic a modular difference.

use crate::planning::Cell;
use serde::Deserialize;
use std::fmt;

/// One of the four grid directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    /// Clockwise order, index 0 is North
    pub const ALL: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

    pub fn index(self) -> i32 {
        match self {
            Heading::North => 0,
            Heading::East => 1,
            Heading::South => 2,
            Heading::West => 3,
        }
    }

    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(4) as usize]
    }

    /// Unit step `(dx, dy)` for this heading
    pub fn delta(self) -> (i32, i32) {
        match self {
            Heading::North => (0, -1),
            Heading::East => (1, 0),
            Heading::South => (0, 1),
            Heading::West => (-1, 0),
        }
    }

    /// Heading of a straight displacement of any length
    ///
    /// Returns `None` for zero or diagonal displacements.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Some(Heading::North),
            (1, 0) => Some(Heading::East),
            (0, 1) => Some(Heading::South),
            (-1, 0) => Some(Heading::West),
            _ => None,
        }
    }

    /// Heading after turning by a multiple of 90° (positive = clockwise)
    pub fn rotated(self, degrees: i32) -> Self {
        Self::from_index(self.index() + degrees.div_euclid(90))
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Heading::North => "N",
            Heading::East => "E",
            Heading::South => "S",
            Heading::West => "W",
        };
        f.write_str(name)
    }
}

/// Signed turn from `current` to `target`, one of {-180, -90, 0, 90}
///
/// Reversal is reported as -180 and is issued as a single turn command.
pub fn turn_angle(current: Heading, target: Heading) -> i32 {
    ((target.index() - current.index() + 2).rem_euclid(4) - 2) * 90
}

/// Position and facing on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pose {
    pub x: i32,
    pub y: i32,
    pub facing: Heading,
}

impl Pose {
    pub fn new(x: i32, y: i32, facing: Heading) -> Self {
        Self { x, y, facing }
    }

    pub fn at(cell: Cell, facing: Heading) -> Self {
        Self::new(cell.x, cell.y, facing)
    }

    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }

    /// Step one cell along `direction`, taking that direction as facing
    pub fn apply_move(self, direction: Heading) -> Self {
        self.advance(direction, 1)
    }

    /// Step `cells` cells along `direction`, taking that direction as facing
    pub fn advance(self, direction: Heading, cells: i32) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx * cells,
            y: self.y + dy * cells,
            facing: direction,
        }
    }

    /// Rotate in place by a multiple of 90°
    pub fn apply_turn(self, degrees: i32) -> Self {
        Self {
            facing: self.facing.rotated(degrees),
            ..self
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.facing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_angle_table() {
        use Heading::*;
        assert_eq!(turn_angle(North, North), 0);
        assert_eq!(turn_angle(North, East), 90);
        assert_eq!(turn_angle(East, North), -90);
        assert_eq!(turn_angle(North, West), -90);
        assert_eq!(turn_angle(West, North), 90);
        assert_eq!(turn_angle(North, South), -180);
        assert_eq!(turn_angle(East, West), -180);
    }

    #[test]
    fn test_turn_closes_on_target() {
        for current in Heading::ALL {
            for target in Heading::ALL {
                let angle = turn_angle(current, target);
                assert!([-180, -90, 0, 90].contains(&angle));
                assert_eq!(current.rotated(angle), target, "{current} -> {target}");
            }
        }
    }

    #[test]
    fn test_turn_then_inverse_restores_heading() {
        for heading in Heading::ALL {
            for angle in [90, -90, 180] {
                let pose = Pose::new(1, 1, heading);
                assert_eq!(pose.apply_turn(angle).apply_turn(-angle), pose);
                assert_eq!(heading.rotated(angle).rotated(-angle), heading);
            }
        }
    }

    #[test]
    fn test_opposite_turns_cancel() {
        for current in Heading::ALL {
            for target in Heading::ALL {
                let there = turn_angle(current, target);
                let back = turn_angle(target, current);
                assert_eq!(current.rotated(there).rotated(back), current);
                if there.abs() == 90 {
                    assert_eq!(there, -back);
                }
            }
        }
    }

    #[test]
    fn test_from_delta() {
        assert_eq!(Heading::from_delta(0, -1), Some(Heading::North));
        assert_eq!(Heading::from_delta(3, 0), Some(Heading::East));
        assert_eq!(Heading::from_delta(0, 0), None);
        assert_eq!(Heading::from_delta(1, 1), None);
        for heading in Heading::ALL {
            let (dx, dy) = heading.delta();
            assert_eq!(Heading::from_delta(dx, dy), Some(heading));
        }
    }

    #[test]
    fn test_pose_updates() {
        let pose = Pose::new(2, 4, Heading::North);
        let moved = pose.apply_move(Heading::North);
        assert_eq!(moved, Pose::new(2, 3, Heading::North));
        let turned = moved.apply_turn(90);
        assert_eq!(turned.facing, Heading::East);
        assert_eq!(turned.cell(), Cell::new(2, 3));
        assert_eq!(turned.apply_turn(-180).facing, Heading::West);
        assert_eq!(turned.advance(Heading::South, 2), Pose::new(2, 5, Heading::South));
    }
}
