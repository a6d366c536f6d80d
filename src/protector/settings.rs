//! The tri-state permission matrix of a region.
//!
//! Every field defaults to `Undefined`; a region only ever speaks about the
//! settings its operators actually configured. Maps are keyed by host
//! registry ids (block, item, entity types) or command aliases.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::events::MoveKind;
use crate::protector::tristate::Tristate;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub build: Tristate,
    pub r#move: MoveSettings,
    #[serde(rename = "use")]
    pub use_: UseSettings,
    pub spawn: SpawnSettings,
    pub block_damage: BlockDamageSettings,
    pub entity_damage: EntityDamageSettings,
    pub player_damage: PlayerDamageSettings,
    /// Commands denied (or explicitly allowed) inside the region, by alias.
    pub blocked_commands: HashMap<String, Tristate>,
    /// Kills all redstone circuits in the region.
    pub dead_circuit: Tristate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveSettings {
    pub r#move: Tristate,
    pub enter: Tristate,
    pub exit: Tristate,
    pub teleport: Tristate,
    pub teleport_portal: Tristate,
}

/// Movement checks; the enter/exit checks exist only on the resolver side,
/// the rest correspond to event [`MoveKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveCheck {
    Move,
    Enter,
    Exit,
    Teleport,
    TeleportPortal,
}

impl From<MoveKind> for MoveCheck {
    fn from(kind: MoveKind) -> Self {
        match kind {
            MoveKind::Move => MoveCheck::Move,
            MoveKind::Teleport => MoveCheck::Teleport,
            MoveKind::TeleportPortal => MoveCheck::TeleportPortal,
        }
    }
}

impl MoveSettings {
    pub fn for_check(&self, check: MoveCheck) -> Tristate {
        match check {
            MoveCheck::Move => self.r#move,
            MoveCheck::Enter => self.enter,
            MoveCheck::Exit => self.exit,
            MoveCheck::Teleport => self.teleport,
            MoveCheck::TeleportPortal => self.teleport_portal,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UseSettings {
    pub all: UseAllSettings,
    /// Per block-type overrides.
    pub block: HashMap<String, Tristate>,
    /// Per item-type overrides.
    pub item: HashMap<String, Tristate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UseAllSettings {
    pub block: Tristate,
    pub item: Tristate,
    pub container: Tristate,
    pub open: Tristate,
    pub redstone: Tristate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnSettings {
    pub naturally: HashMap<String, Tristate>,
    pub player: HashMap<String, Tristate>,
    pub plugin: HashMap<String, Tristate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockDamageSettings {
    pub all_explosion: Tristate,
    pub player_explosion: Tristate,
    pub monster: Tristate,
    pub lightning: Tristate,
    /// Damage caused by specific block types (fire, pistons, ...).
    pub block: HashMap<String, Tristate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityDamageSettings {
    pub all: Tristate,
    pub by_living: Tristate,
    pub by_entity: HashMap<String, Tristate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerDamageSettings {
    pub all: Tristate,
    pub by_living: Tristate,
    pub pvp: Tristate,
    pub ai_targeting: Tristate,
}

/// Map editing helper: `Undefined` removes the key instead of storing a
/// no-opinion entry.
pub fn set_or_unset(map: &mut HashMap<String, Tristate>, key: &str, value: Tristate) {
    if value == Tristate::Undefined {
        map.remove(key);
    } else {
        map.insert(key.to_string(), value);
    }
}

/// Map lookup defaulting to `Undefined`.
pub fn lookup(map: &HashMap<String, Tristate>, key: &str) -> Tristate {
    map.get(key).copied().unwrap_or(Tristate::Undefined)
}
