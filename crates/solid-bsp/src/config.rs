//! Compiler tuning parameters.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Contents};

const DEFAULT_SPLIT_EPSILON: f64 = 0.0002;
const DEFAULT_ROOT_MARGIN: f64 = 32.0;
const DEFAULT_MAX_WORLD_EXTENT: f64 = 16384.0;
const DEFAULT_MAX_SECTOR_SIZE: f64 = 512.0;
const DEFAULT_SECTOR_EPSILON: f64 = 1.0;
const DEFAULT_MAX_AREAS: usize = 1024;
const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Tolerance used when clipping polygons and portals.
    pub split_epsilon: f64,
    /// Padding added around the world box before portalizing.
    pub root_margin: f64,
    /// Full width of the largest map the compiler accepts. Geometry must fit
    /// within `±max_world_extent / 2` on every axis.
    pub max_world_extent: f64,
    /// Sectors are bisected until no axis exceeds this size.
    pub max_sector_size: f64,
    /// Tolerance used when sorting triangles into sector halves.
    pub sector_epsilon: f64,
    pub max_areas: usize,
    /// Contents classes whose models take part in the tree build. Only the
    /// visible classes among them ever supply split planes.
    pub tree_contents: Contents,
    /// Rebuild the tree after a sealed flood, preferring interior split planes.
    pub optimize_outside: bool,
    /// Work units between progress events.
    pub progress_interval: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            split_epsilon: DEFAULT_SPLIT_EPSILON,
            root_margin: DEFAULT_ROOT_MARGIN,
            max_world_extent: DEFAULT_MAX_WORLD_EXTENT,
            max_sector_size: DEFAULT_MAX_SECTOR_SIZE,
            sector_epsilon: DEFAULT_SECTOR_EPSILON,
            max_areas: DEFAULT_MAX_AREAS,
            tree_contents: Contents::all(),
            optimize_outside: true,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl CompileConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CompileConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("split_epsilon", self.split_epsilon),
            ("max_world_extent", self.max_world_extent),
            ("max_sector_size", self.max_sector_size),
            ("sector_epsilon", self.sector_epsilon),
            ("max_areas", self.max_areas as f64),
            ("progress_interval", self.progress_interval as f64),
        ];
        for (field, value) in positive {
            if !(value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        if self.root_margin < 0.0 {
            return Err(ConfigError::NotPositive {
                field: "root_margin",
                value: self.root_margin,
            });
        }
        if !self.tree_contents.intersects(Contents::VISIBLE) {
            return Err(ConfigError::NoTreeContents);
        }
        Ok(())
    }
}
