//! Multi-stop delivery routes

use super::grid::Cell;

/// A table visit along a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteStop {
    pub table: u8,
    /// Free cell next to the table where the robot stops
    pub approach: Cell,
    /// Position of `approach` in [`Route::cells`]
    pub index: usize,
}

/// Connected cell path with the table stops marked on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub cells: Vec<Cell>,
    pub stops: Vec<RouteStop>,
}

impl Route {
    pub fn start(&self) -> Option<Cell> {
        self.cells.first().copied()
    }

    pub fn end(&self) -> Option<Cell> {
        self.cells.last().copied()
    }

    /// Sub-paths between consecutive stops, ending with the leg home
    ///
    /// Adjacent legs share their boundary cell. A stop served from the cell
    /// the robot is already on yields a single-cell leg.
    pub fn legs(&self) -> Vec<&[Cell]> {
        let mut legs = Vec::with_capacity(self.stops.len() + 1);
        let mut from = 0;
        for stop in &self.stops {
            legs.push(&self.cells[from..=stop.index]);
            from = stop.index;
        }
        if !self.cells.is_empty() {
            legs.push(&self.cells[from..]);
        }
        legs
    }
}
