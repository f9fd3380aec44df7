//! Floor grid

use crate::error::PlanError;
use crate::pose::Heading;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Integer grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "(i32, i32)")]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbor one step along `heading`
    pub fn step(self, heading: Heading) -> Self {
        let (dx, dy) = heading.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A table and the cell it occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TablePlacement {
    pub id: u8,
    pub cell: Cell,
}

/// Restaurant floor as a grid
///
/// Table cells are never traversable; the robot serves a table from one of
/// its free 4-neighbors. Every free cell costs 1 to enter unless weighted.
#[derive(Debug, Clone)]
pub struct FloorPlan {
    width: i32,
    height: i32,
    blocked: HashSet<Cell>,
    weights: HashMap<Cell, u32>,
    tables: Vec<TablePlacement>,
    origin: Cell,
    facing: Heading,
}

impl FloorPlan {
    /// Empty floor with the robot's home cell and facing
    pub fn new(width: i32, height: i32, origin: Cell, facing: Heading) -> Result<Self, PlanError> {
        let plan = Self {
            width,
            height,
            blocked: HashSet::new(),
            weights: HashMap::new(),
            tables: Vec::new(),
            origin,
            facing,
        };
        plan.check_bounds(origin)?;
        Ok(plan)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn origin(&self) -> Cell {
        self.origin
    }

    pub fn facing(&self) -> Heading {
        self.facing
    }

    pub fn tables(&self) -> &[TablePlacement] {
        &self.tables
    }

    /// Mark a cell as impassable
    pub fn block(&mut self, cell: Cell) -> Result<(), PlanError> {
        self.check_bounds(cell)?;
        self.blocked.insert(cell);
        Ok(())
    }

    /// Set the cost of entering a cell (minimum 1)
    pub fn set_weight(&mut self, cell: Cell, cost: u32) -> Result<(), PlanError> {
        self.check_bounds(cell)?;
        self.weights.insert(cell, cost.max(1));
        Ok(())
    }

    /// Place a table, replacing any earlier placement with the same id
    pub fn place_table(&mut self, id: u8, cell: Cell) -> Result<(), PlanError> {
        self.check_bounds(cell)?;
        self.tables.retain(|t| t.id != id);
        self.tables.push(TablePlacement { id, cell });
        Ok(())
    }

    pub fn table(&self, id: u8) -> Option<Cell> {
        self.tables.iter().find(|t| t.id == id).map(|t| t.cell)
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    pub fn is_traversable(&self, cell: Cell) -> bool {
        self.in_bounds(cell)
            && !self.blocked.contains(&cell)
            && !self.tables.iter().any(|t| t.cell == cell)
    }

    /// Cost of entering `cell`
    pub fn cost(&self, cell: Cell) -> u32 {
        self.weights.get(&cell).copied().unwrap_or(1)
    }

    /// Sum of entry costs along a path (the first cell is free), saturating
    pub fn path_cost(&self, path: &[Cell]) -> u32 {
        path.iter()
            .skip(1)
            .fold(0u32, |total, &c| total.saturating_add(self.cost(c)))
    }

    /// Check a hand-built path before it is driven from `start`
    ///
    /// The path must begin at `start`, and every hop must run along one axis
    /// through traversable cells, intermediate cells of multi-cell hops
    /// included. An empty path is trivially valid.
    pub fn check_path(&self, start: Cell, path: &[Cell]) -> Result<(), PlanError> {
        let Some(&first) = path.first() else {
            return Ok(());
        };
        if first != start {
            return Err(PlanError::Detached {
                pose: start,
                start: first,
            });
        }
        for pair in path.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if from == to {
                continue;
            }
            let Some(heading) = Heading::from_delta(to.x - from.x, to.y - from.y) else {
                return Err(PlanError::NotStraight { from, to });
            };
            let mut cell = from;
            while cell != to {
                cell = cell.step(heading);
                self.check_bounds(cell)?;
                if !self.is_traversable(cell) {
                    return Err(PlanError::Blocked(cell));
                }
            }
        }
        Ok(())
    }

    /// Traversable 4-neighbors in N, E, S, W order
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        Heading::ALL
            .into_iter()
            .map(move |h| cell.step(h))
            .filter(|&n| self.is_traversable(n))
    }

    pub(crate) fn check_bounds(&self, cell: Cell) -> Result<(), PlanError> {
        if self.in_bounds(cell) {
            Ok(())
        } else {
            Err(PlanError::OutOfBounds(cell))
        }
    }
}
