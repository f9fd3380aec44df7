//! Floor plan and route planning
//!
//! - [`grid`]: the floor as a 4-connected grid of cells with blocked and
//!   weighted cells and table placements
//! - [`astar`]: shortest paths between two cells
//! - [`route`]: multi-stop delivery routes that return to the origin

pub mod astar;
pub mod grid;
pub mod route;

pub use astar::{GridPathfinder, PathfinderConfig};
pub use grid::{Cell, FloorPlan, TablePlacement};
pub use route::{Route, RouteStop};
