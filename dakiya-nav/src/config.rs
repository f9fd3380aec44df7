//! Configuration loading for the navigator

use crate::error::{NavError, Result};
use crate::planning::{Cell, FloorPlan};
use crate::pose::Heading;
use dakiya_wire::MotionCalibration;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
pub struct DakiyaConfig {
    pub link: LinkConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub floor: FloorConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Firmware settings for the in-process simulator
    #[cfg(feature = "sim")]
    #[serde(default)]
    pub simulator: dakiya_fw::FirmwareConfig,
}

/// Serial link settings
#[derive(Clone, Debug, Deserialize)]
pub struct LinkConfig {
    /// Serial device path
    #[serde(default = "default_port")]
    pub port: String,

    /// Baud rate; must match the firmware, so there is no default
    pub baud_rate: u32,

    /// Longest wait for a single command write (default: 5000)
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

/// Motion planning parameters
#[derive(Clone, Debug, Deserialize)]
pub struct MotionConfig {
    /// Calibration pushed to the firmware and used for host-side pacing
    #[serde(default)]
    pub calibration: MotionCalibration,

    /// Edge length of one grid cell in inches (default: 24.0)
    #[serde(default = "default_grid_unit")]
    pub grid_unit_inches: f32,

    /// Extra wait after each primitive's expected duration (default: 250)
    #[serde(default = "default_safety_buffer")]
    pub safety_buffer_ms: u64,
}

/// A cell with a non-default entry cost
#[derive(Clone, Debug, Deserialize)]
pub struct WeightedCell {
    pub cell: Cell,
    pub cost: u32,
}

/// A table on the floor
#[derive(Clone, Debug, Deserialize)]
pub struct TableConfig {
    pub id: u8,
    pub cell: Cell,
}

/// Floor layout
#[derive(Clone, Debug, Deserialize)]
pub struct FloorConfig {
    #[serde(default = "default_width")]
    pub width: i32,

    #[serde(default = "default_height")]
    pub height: i32,

    /// Home cell where deliveries start and end
    #[serde(default = "default_origin")]
    pub origin: Cell,

    /// Facing at the home cell
    #[serde(default = "default_facing")]
    pub facing: Heading,

    #[serde(default)]
    pub obstacles: Vec<Cell>,

    #[serde(default)]
    pub weighted: Vec<WeightedCell>,

    #[serde(default = "default_tables")]
    pub tables: Vec<TableConfig>,
}

/// Delivery behavior
#[derive(Clone, Debug, Deserialize)]
pub struct DeliveryConfig {
    /// Time spent at each table after signalling arrival (default: 3000)
    #[serde(default = "default_dwell")]
    pub dwell_ms: u64,

    /// Send RESET when the firmware rejects a command as busy
    #[serde(default)]
    pub reset_on_blocked: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            calibration: MotionCalibration::default(),
            grid_unit_inches: default_grid_unit(),
            safety_buffer_ms: default_safety_buffer(),
        }
    }
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            origin: default_origin(),
            facing: default_facing(),
            obstacles: Vec::new(),
            weighted: Vec::new(),
            tables: default_tables(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            dwell_ms: default_dwell(),
            reset_on_blocked: false,
        }
    }
}

// Default value functions
fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_write_timeout() -> u64 {
    5000
}
fn default_grid_unit() -> f32 {
    24.0
}
fn default_safety_buffer() -> u64 {
    250
}
fn default_width() -> i32 {
    5
}
fn default_height() -> i32 {
    6
}
fn default_origin() -> Cell {
    Cell::new(2, 4)
}
fn default_facing() -> Heading {
    Heading::North
}
fn default_tables() -> Vec<TableConfig> {
    [(1, (0, 0)), (2, (4, 0)), (3, (0, 2)), (4, (4, 2))]
        .into_iter()
        .map(|(id, cell)| TableConfig {
            id,
            cell: Cell::from(cell),
        })
        .collect()
}
fn default_dwell() -> u64 {
    3000
}

impl DakiyaConfig {
    /// Load and validate a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: DakiyaConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.link.baud_rate == 0 {
            return Err(NavError::Config("link.baud_rate must be positive".into()));
        }
        if self.link.write_timeout_ms == 0 {
            return Err(NavError::Config("link.write_timeout_ms must be positive".into()));
        }
        let unit = self.motion.grid_unit_inches;
        if !unit.is_finite() || unit <= 0.0 {
            return Err(NavError::Config("motion.grid_unit_inches must be positive".into()));
        }
        self.motion
            .calibration
            .validate()
            .map_err(|e| NavError::Config(format!("motion.calibration: {}", e)))?;
        self.floor.build()?;
        Ok(())
    }
}

impl FloorConfig {
    /// Build the floor plan this layout describes
    pub fn build(&self) -> Result<FloorPlan> {
        if self.width <= 0 || self.height <= 0 {
            return Err(NavError::Config(format!(
                "floor must have positive size, got {}x{}",
                self.width, self.height
            )));
        }
        let mut plan = FloorPlan::new(self.width, self.height, self.origin, self.facing)?;
        for &cell in &self.obstacles {
            plan.block(cell)?;
        }
        for weighted in &self.weighted {
            plan.set_weight(weighted.cell, weighted.cost)?;
        }

        let mut ids = HashSet::new();
        for table in &self.tables {
            if table.id == 0 || !ids.insert(table.id) {
                return Err(NavError::Config(format!("invalid or duplicate table id {}", table.id)));
            }
            plan.place_table(table.id, table.cell)?;
        }

        if !plan.is_traversable(self.origin) {
            return Err(NavError::Config(format!("origin {} is not free", self.origin)));
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config("[link]\nbaud_rate = 115200\n");
        let config = DakiyaConfig::load(file.path()).unwrap();
        assert_eq!(config.link.port, "/dev/ttyUSB0");
        assert_eq!(config.link.write_timeout_ms, 5000);
        assert_eq!(config.motion.grid_unit_inches, 24.0);
        assert_eq!(config.motion.calibration.inches_per_second, 4.0);
        assert_eq!(config.floor.origin, Cell::new(2, 4));
        assert_eq!(config.floor.facing, Heading::North);
        assert_eq!(config.floor.tables.len(), 4);
        assert!(!config.delivery.reset_on_blocked);
    }

    #[test]
    fn test_baud_rate_is_required() {
        let file = write_config("[link]\nport = \"/dev/ttyS1\"\n");
        assert!(matches!(DakiyaConfig::load(file.path()), Err(NavError::Config(_))));
    }

    #[test]
    fn test_floor_layout() {
        let file = write_config(
            r#"
[link]
baud_rate = 9600

[floor]
width = 4
height = 4
origin = [0, 3]
facing = "east"
obstacles = [[1, 1], [2, 1]]
weighted = [{ cell = [0, 1], cost = 4 }]
tables = [{ id = 7, cell = [3, 0] }]
"#,
        );
        let config = DakiyaConfig::load(file.path()).unwrap();
        let plan = config.floor.build().unwrap();
        assert_eq!(plan.origin(), Cell::new(0, 3));
        assert_eq!(plan.facing(), Heading::East);
        assert!(!plan.is_traversable(Cell::new(1, 1)));
        assert_eq!(plan.cost(Cell::new(0, 1)), 4);
        assert_eq!(plan.table(7), Some(Cell::new(3, 0)));
        assert_eq!(plan.table(1), None);
    }

    #[test]
    fn test_invalid_floors_rejected() {
        let mut floor = FloorConfig::default();
        floor.obstacles.push(floor.origin);
        assert!(floor.build().is_err());

        let mut floor = FloorConfig::default();
        floor.tables.push(TableConfig {
            id: 1,
            cell: Cell::new(1, 1),
        });
        assert!(floor.build().is_err());

        let mut floor = FloorConfig::default();
        floor.tables[0].cell = Cell::new(40, 0);
        assert!(matches!(floor.build(), Err(NavError::Planning(_))));
    }
}
