//! Engine configuration, loaded and saved as one TOML document.

use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{BlockwardError, BlockwardResult};
use crate::locker::types::ProtectionFlag;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockwardConfig {
    pub locker: LockerConfig,
    pub protector: ProtectorConfig,
}

impl BlockwardConfig {
    pub fn load(path: &Path) -> BlockwardResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| BlockwardError::Config(e.to_string()))
    }

    /// Loads the config, writing out defaults when the file is missing.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(BlockwardError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("could not write default config: {e}");
                }
                config
            }
            Err(e) => {
                warn!("invalid config, falling back to defaults: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> BlockwardResult<()> {
        let text =
            toml::to_string_pretty(self).map_err(|e| BlockwardError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockerConfig {
    pub allow_key_books: bool,
    pub auto_close_enable: bool,
    pub auto_close_seconds: u32,
    /// Locks untouched for this many days are eligible for purging.
    pub cleanup_age_days: u32,
    /// Only enforce protections while their owner is offline.
    pub protect_when_only_offline: bool,
    /// Only enforce protections while their owner is online.
    pub protect_when_only_online: bool,
    pub open_iron_door_with_click: bool,
    pub block_protections: Vec<ProtectionDefaults>,
    pub entity_protections: Vec<ProtectionDefaults>,
}

impl Default for LockerConfig {
    fn default() -> Self {
        Self {
            allow_key_books: true,
            auto_close_enable: true,
            auto_close_seconds: 3,
            cleanup_age_days: 90,
            protect_when_only_offline: false,
            protect_when_only_online: false,
            open_iron_door_with_click: false,
            block_protections: vec![
                ProtectionDefaults::new("minecraft:chest"),
                ProtectionDefaults::new("minecraft:trapped_chest"),
                ProtectionDefaults::with_flags("minecraft:iron_door", &["autoclose"]),
            ],
            entity_protections: vec![ProtectionDefaults::new("minecraft:horse")],
        }
    }
}

/// Per block/entity type defaults applied when a lock is created on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionDefaults {
    /// Block-type or entity-type id.
    pub type_id: String,
    /// Flag names from [`ProtectionFlag::name`] applied on creation.
    pub default_flags: Vec<String>,
}

impl Default for ProtectionDefaults {
    fn default() -> Self {
        Self {
            type_id: String::new(),
            default_flags: Vec::new(),
        }
    }
}

impl ProtectionDefaults {
    pub fn new(type_id: &str) -> Self {
        Self {
            type_id: type_id.into(),
            default_flags: Vec::new(),
        }
    }

    pub fn with_flags(type_id: &str, flags: &[&str]) -> Self {
        Self {
            type_id: type_id.into(),
            default_flags: flags.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Resolves the flag names to a flag word; unknown names are logged and
    /// skipped.
    pub fn flag_bits(&self) -> u16 {
        self.default_flags
            .iter()
            .filter_map(|name| {
                let flag = ProtectionFlag::by_name(name);
                if flag.is_none() {
                    warn!("unknown protection flag in config: {name}");
                }
                flag
            })
            .fold(0, |acc, flag| acc | flag.bit())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectorConfig {
    /// Directory holding the per-world region documents.
    pub regions_path: PathBuf,
}

impl Default for ProtectorConfig {
    fn default() -> Self {
        Self {
            regions_path: PathBuf::from("regions"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trip() {
        let config = BlockwardConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: BlockwardConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.locker.auto_close_seconds, 3);
        assert!(back.locker.allow_key_books);
        assert_eq!(back.protector.regions_path, PathBuf::from("regions"));
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config: BlockwardConfig =
            toml::from_str("[locker]\nauto_close_seconds = 10\n").unwrap();
        assert_eq!(config.locker.auto_close_seconds, 10);
        assert!(config.locker.allow_key_books);
    }

    #[test]
    fn test_flag_bits_resolution() {
        let defaults = ProtectionDefaults::with_flags("minecraft:chest", &["notify", "hopperIn"]);
        let bits = defaults.flag_bits();
        assert_eq!(
            bits,
            ProtectionFlag::NotifyAccess.bit() | ProtectionFlag::HopperIn.bit()
        );
    }

    #[test]
    fn test_load_or_default_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockward.toml");
        let config = BlockwardConfig::load_or_default(&path);
        assert!(path.exists());
        assert!(config.locker.allow_key_books);
    }
}
