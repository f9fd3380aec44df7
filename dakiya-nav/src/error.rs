//! Error types for the navigator

use crate::planning::Cell;
use std::time::Duration;
use thiserror::Error;

/// Link-level failures
///
/// Only `open_at`/`reconnect` and hard write errors surface these; the
/// motion layer logs them and carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Send timed out after {0:?}")]
    SendTimeout(Duration),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Link disconnected")]
    Disconnected,
}

/// Pathfinding failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Cell {0} is outside the floor plan")]
    OutOfBounds(Cell),

    #[error("Cell {0} is not traversable")]
    Blocked(Cell),

    #[error("No path from {from} to {to}")]
    NoPath { from: Cell, to: Cell },

    #[error("Search gave up after {0} expansions")]
    ExpansionLimit(usize),

    #[error("Path starts at {start} but the robot is at {pose}")]
    Detached { pose: Cell, start: Cell },

    #[error("Step from {from} to {to} is not along a grid axis")]
    NotStraight { from: Cell, to: Cell },
}

/// Navigator error type
#[derive(Error, Debug)]
pub enum NavError {
    #[error("Table {table} is unreachable from {from}")]
    UnreachableTarget { table: u8, from: Cell },

    #[error("Unknown table {0}")]
    UnknownTable(u8),

    #[error("Planning error: {0}")]
    Planning(#[from] PlanError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
