//! A* search on the floor grid
//!
//! 4-connected moves, Manhattan heuristic, integer costs. Ties on `f` are
//! broken by the smaller heuristic and then by cell order, so equal-cost
//! alternatives always resolve to the same path.

use super::grid::{Cell, FloorPlan};
use super::route::{Route, RouteStop};
use crate::error::{NavError, PlanError};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::{debug, trace};

#[derive(Clone, Debug, PartialEq, Eq)]
struct Node {
    cell: Cell,
    g_cost: u32,
    f_cost: u32,
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| self.g_cost.cmp(&other.g_cost))
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Search limits
#[derive(Clone, Debug)]
pub struct PathfinderConfig {
    /// Nodes to expand before giving up
    pub max_expansions: usize,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            max_expansions: 10_000,
        }
    }
}

/// Pathfinder bound to a floor plan
pub struct GridPathfinder<'a> {
    plan: &'a FloorPlan,
    config: PathfinderConfig,
}

impl<'a> GridPathfinder<'a> {
    pub fn new(plan: &'a FloorPlan, config: PathfinderConfig) -> Self {
        Self { plan, config }
    }

    pub fn with_defaults(plan: &'a FloorPlan) -> Self {
        Self::new(plan, PathfinderConfig::default())
    }

    /// Cheapest path from `start` to `goal`, both ends included
    pub fn find_path(&self, start: Cell, goal: Cell) -> Result<Vec<Cell>, PlanError> {
        trace!(%start, %goal, "find_path");
        for cell in [start, goal] {
            self.plan.check_bounds(cell)?;
            if !self.plan.is_traversable(cell) {
                return Err(PlanError::Blocked(cell));
            }
        }
        if start == goal {
            return Ok(vec![start]);
        }

        let mut open = BinaryHeap::new();
        let mut closed: HashSet<Cell> = HashSet::new();
        let mut g_score: HashMap<Cell, u32> = HashMap::new();
        let mut came_from: HashMap<Cell, Cell> = HashMap::new();

        g_score.insert(start, 0);
        open.push(Node {
            cell: start,
            g_cost: 0,
            f_cost: start.manhattan(goal),
        });

        let mut expanded = 0usize;
        while let Some(current) = open.pop() {
            if current.cell == goal {
                let path = reconstruct(&came_from, goal);
                debug!(
                    %start,
                    %goal,
                    cells = path.len(),
                    cost = current.g_cost,
                    expanded,
                    "Path found"
                );
                return Ok(path);
            }
            if !closed.insert(current.cell) {
                continue;
            }

            expanded += 1;
            if expanded > self.config.max_expansions {
                return Err(PlanError::ExpansionLimit(self.config.max_expansions));
            }

            for next in self.plan.neighbors(current.cell) {
                if closed.contains(&next) {
                    continue;
                }
                let tentative = current.g_cost.saturating_add(self.plan.cost(next));
                if g_score.get(&next).is_some_and(|&g| tentative >= g) {
                    continue;
                }
                g_score.insert(next, tentative);
                came_from.insert(next, current.cell);
                open.push(Node {
                    cell: next,
                    g_cost: tentative,
                    f_cost: tentative.saturating_add(next.manhattan(goal)),
                });
            }
        }

        debug!(%start, %goal, expanded, "No path");
        Err(PlanError::NoPath {
            from: start,
            to: goal,
        })
    }

    /// Route from `start` through each table in order, then back to the origin
    ///
    /// Each table is served from its cheapest reachable free neighbor, with
    /// N, E, S, W order deciding ties. Fails with
    /// [`NavError::UnreachableTarget`] naming the first table that has no
    /// reachable approach cell.
    pub fn find_route(&self, start: Cell, tables: &[u8]) -> Result<Route, NavError> {
        let mut cells = vec![start];
        let mut stops = Vec::with_capacity(tables.len());
        let mut current = start;

        for &table in tables {
            let table_cell = self.plan.table(table).ok_or(NavError::UnknownTable(table))?;
            let (approach, leg) = self
                .approach(current, table_cell)
                .ok_or(NavError::UnreachableTarget {
                    table,
                    from: current,
                })?;
            cells.extend(leg.into_iter().skip(1));
            stops.push(RouteStop {
                table,
                approach,
                index: cells.len() - 1,
            });
            current = approach;
        }

        let home = self.find_path(current, self.plan.origin())?;
        cells.extend(home.into_iter().skip(1));

        debug!(stops = stops.len(), cells = cells.len(), "Route planned");
        Ok(Route { cells, stops })
    }

    /// Cheapest free neighbor of `table_cell` reachable from `from`, with its path
    fn approach(&self, from: Cell, table_cell: Cell) -> Option<(Cell, Vec<Cell>)> {
        let mut best: Option<(u32, Cell, Vec<Cell>)> = None;
        for candidate in self.plan.neighbors(table_cell) {
            let Ok(path) = self.find_path(from, candidate) else {
                continue;
            };
            let cost = self.plan.path_cost(&path);
            if best.as_ref().is_none_or(|(c, _, _)| cost < *c) {
                best = Some((cost, candidate, path));
            }
        }
        best.map(|(_, cell, path)| (cell, path))
    }
}

fn reconstruct(came_from: &HashMap<Cell, Cell>, goal: Cell) -> Vec<Cell> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Heading;

    fn open_floor() -> FloorPlan {
        FloorPlan::new(5, 6, Cell::new(2, 4), Heading::North).unwrap()
    }

    fn is_connected(path: &[Cell]) -> bool {
        path.windows(2).all(|w| w[0].manhattan(w[1]) == 1)
    }

    #[test]
    fn test_straight_path() {
        let plan = open_floor();
        let finder = GridPathfinder::with_defaults(&plan);
        let path = finder.find_path(Cell::new(2, 4), Cell::new(2, 1)).unwrap();
        assert_eq!(
            path,
            vec![Cell::new(2, 4), Cell::new(2, 3), Cell::new(2, 2), Cell::new(2, 1)]
        );
    }

    #[test]
    fn test_start_equals_goal() {
        let plan = open_floor();
        let finder = GridPathfinder::with_defaults(&plan);
        assert_eq!(
            finder.find_path(Cell::new(1, 1), Cell::new(1, 1)).unwrap(),
            vec![Cell::new(1, 1)]
        );
    }

    #[test]
    fn test_detours_around_wall() {
        let mut plan = open_floor();
        for x in 0..4 {
            plan.block(Cell::new(x, 2)).unwrap();
        }
        let finder = GridPathfinder::with_defaults(&plan);
        let path = finder.find_path(Cell::new(0, 4), Cell::new(0, 0)).unwrap();
        assert!(is_connected(&path));
        assert!(path.contains(&Cell::new(4, 2)));
        // Shortest detour: 4 east, 4 north, 4 west
        assert_eq!(path.len(), 13);
        assert!(path.iter().all(|&c| plan.is_traversable(c)));
    }

    #[test]
    fn test_prefers_cheaper_cells() {
        let mut plan = open_floor();
        plan.set_weight(Cell::new(2, 3), 10).unwrap();
        let finder = GridPathfinder::with_defaults(&plan);
        let path = finder.find_path(Cell::new(2, 4), Cell::new(2, 2)).unwrap();
        assert!(!path.contains(&Cell::new(2, 3)));
        assert_eq!(plan.path_cost(&path), 4);
    }

    #[test]
    fn test_extreme_weights_do_not_overflow() {
        let mut plan = open_floor();
        plan.set_weight(Cell::new(2, 3), u32::MAX).unwrap();
        plan.set_weight(Cell::new(2, 2), u32::MAX).unwrap();
        let finder = GridPathfinder::with_defaults(&plan);
        let path = finder.find_path(Cell::new(2, 4), Cell::new(2, 1)).unwrap();
        assert!(is_connected(&path));
        assert!(!path.contains(&Cell::new(2, 3)));
        assert!(!path.contains(&Cell::new(2, 2)));
    }

    #[test]
    fn test_deterministic_tie_break() {
        let plan = open_floor();
        let finder = GridPathfinder::with_defaults(&plan);
        let first = finder.find_path(Cell::new(0, 0), Cell::new(3, 3)).unwrap();
        for _ in 0..5 {
            assert_eq!(finder.find_path(Cell::new(0, 0), Cell::new(3, 3)).unwrap(), first);
        }
        assert_eq!(first.len(), 7);
    }

    #[test]
    fn test_failures() {
        let mut plan = open_floor();
        plan.block(Cell::new(1, 0)).unwrap();
        plan.block(Cell::new(0, 1)).unwrap();
        let finder = GridPathfinder::with_defaults(&plan);

        assert_eq!(
            finder.find_path(Cell::new(2, 4), Cell::new(0, 0)),
            Err(PlanError::NoPath {
                from: Cell::new(2, 4),
                to: Cell::new(0, 0)
            })
        );
        assert_eq!(
            finder.find_path(Cell::new(2, 4), Cell::new(1, 0)),
            Err(PlanError::Blocked(Cell::new(1, 0)))
        );
        assert_eq!(
            finder.find_path(Cell::new(2, 4), Cell::new(7, 0)),
            Err(PlanError::OutOfBounds(Cell::new(7, 0)))
        );
    }

    #[test]
    fn test_expansion_limit() {
        let plan = open_floor();
        let finder = GridPathfinder::new(&plan, PathfinderConfig { max_expansions: 2 });
        assert_eq!(
            finder.find_path(Cell::new(0, 0), Cell::new(4, 5)),
            Err(PlanError::ExpansionLimit(2))
        );
    }
}
