//! Region: a named world volume plus its settings document.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::host::WorldId;
use crate::math::{BlockPos, Cuboid, Vec3};
use crate::protector::settings::Settings;

/// The persisted region document: one JSON file per region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    /// `None` for the global region.
    pub world: Option<WorldId>,
    /// `None` for the global and per-world regions, which have no volume.
    pub cuboid: Option<Cuboid>,
    /// Resolution precedence; higher wins, insertion order breaks ties.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone)]
pub struct Region {
    config: RegionConfig,
    /// Where this region's document lives on disk.
    path: PathBuf,
}

impl Region {
    pub fn new(config: RegionConfig, path: PathBuf) -> Self {
        Self { config, path }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn world(&self) -> Option<WorldId> {
        self.config.world
    }

    pub fn cuboid(&self) -> Option<&Cuboid> {
        self.config.cuboid.as_ref()
    }

    pub fn priority(&self) -> i32 {
        self.config.priority
    }

    pub fn settings(&self) -> &Settings {
        &self.config.settings
    }

    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    pub(crate) fn config_mut(&mut self) -> &mut RegionConfig {
        &mut self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the region covers a block position. Regions without a volume
    /// (global, per-world) cover everything in their scope.
    pub fn contains_block(&self, pos: &BlockPos) -> bool {
        match &self.config.cuboid {
            None => true,
            Some(cuboid) => cuboid.contains(pos),
        }
    }

    /// Whether the region covers a player position, probing feet, body and
    /// eye height so shallow regions still catch a standing player.
    pub fn contains_body(&self, pos: &Vec3) -> bool {
        match &self.config.cuboid {
            None => true,
            Some(cuboid) => {
                cuboid.contains(&pos.block())
                    || cuboid.contains(&pos.add_y(1.0).block())
                    || cuboid.contains(&pos.add_y(1.8).block())
            }
        }
    }
}
