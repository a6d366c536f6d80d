//! Permission node identifiers checked against the host permission service.
//!
//! Nodes are flat strings; the host is expected to have registered them
//! (with wildcard support) on its side.

// locker overrides
pub const LOCKER_ACCESS_OTHER: &str = "blockward.locker.access-other";
pub const LOCKER_SHOW_OWNER: &str = "blockward.locker.show-owner";
pub const LOCKER_BREAK_OTHER: &str = "blockward.locker.break-other";
pub const LOCKER_REMOVE_OTHER: &str = "blockward.locker.remove-other";
pub const LOCKER_MODIFY_OTHER: &str = "blockward.locker.modify-other";
pub const LOCKER_INFO_OTHER: &str = "blockward.locker.info-other";
pub const LOCKER_PREVENT_NOTIFY: &str = "blockward.locker.prevent-notify";

// protector bypasses
pub const BYPASS_BUILD: &str = "blockward.protector.bypass.build";
pub const BYPASS_MOVE_MOVE: &str = "blockward.protector.bypass.move.move";
pub const BYPASS_MOVE_EXIT: &str = "blockward.protector.bypass.move.exit";
pub const BYPASS_MOVE_ENTER: &str = "blockward.protector.bypass.move.enter";
pub const BYPASS_MOVE_TELEPORT: &str = "blockward.protector.bypass.move.teleport";
pub const BYPASS_MOVE_TELEPORT_PORTAL: &str = "blockward.protector.bypass.move.teleport-portal";
pub const BYPASS_USE_ALL_BLOCK: &str = "blockward.protector.bypass.use-all.block";
pub const BYPASS_USE_ALL_ITEM: &str = "blockward.protector.bypass.use-all.item";
pub const BYPASS_USE_ALL_CONTAINER: &str = "blockward.protector.bypass.use-all.container";
pub const BYPASS_USE_ALL_OPEN: &str = "blockward.protector.bypass.use-all.open";
pub const BYPASS_USE_ALL_REDSTONE: &str = "blockward.protector.bypass.use-all.redstone";
pub const BYPASS_SPAWN_PLAYER: &str = "blockward.protector.bypass.spawn.player";
pub const BYPASS_EXPLODE_PLAYER: &str = "blockward.protector.bypass.blockdamage.explode.player";
pub const BYPASS_COMMAND: &str = "blockward.protector.bypass.command";
pub const BYPASS_ENTITY_DAMAGE_ALL: &str = "blockward.protector.bypass.entity-damage.all";
pub const BYPASS_ENTITY_DAMAGE_LIVING: &str = "blockward.protector.bypass.entity-damage.living";
pub const BYPASS_PLAYER_DAMAGE_ALL: &str = "blockward.protector.bypass.player-damage.all";
pub const BYPASS_PLAYER_DAMAGE_LIVING: &str = "blockward.protector.bypass.player-damage.living";
pub const BYPASS_PLAYER_DAMAGE_PVP: &str = "blockward.protector.bypass.player-damage.pvp";
pub const BYPASS_PLAYER_TARGETING: &str = "blockward.protector.bypass.player-targeting";
