//! Event entry points for the region axis.
//!
//! Each handler resolves the applicable regions at the event location(s)
//! and folds the relevant settings through the resolver. Dependent checks
//! chain their defaults (the use-all opinion seeds the per-type check, the
//! damage-all opinion seeds the by-living and per-entity checks) exactly
//! in that order.

use crate::events::{
    BlockChangeCause, BlockChangeEvent, Cancellable, DamageEntityEvent, ExecuteCommandEvent,
    InteractBlockEvent, InteractItemEvent, MoveEvent, MoveKind, NotifyNeighborEvent,
    SpawnEntityEvent, SpawnCause, TargetPlayerEvent,
};
use crate::host::{Feedback, HostContext};
use crate::host::perms;
use crate::protector::manager::RegionManager;
use crate::protector::resolver::{check_move, check_setting};
use crate::protector::settings::{lookup, MoveCheck};
use crate::protector::tristate::Tristate;

fn use_block_node(block_type: &str) -> String {
    format!("blockward.protector.bypass.use.{block_type}")
}

fn use_item_node(item_type: &str) -> String {
    format!("blockward.protector.bypass.use-item.{item_type}")
}

/// Build gating plus block-damage causes (explosion, monster, block,
/// lightning), dispatched on the change cause.
pub fn on_block_change(
    manager: &mut RegionManager,
    event: &mut BlockChangeEvent,
    host: &HostContext,
) {
    let world = event.world;
    match event.cause.clone() {
        BlockChangeCause::Player => {
            let Some(actor) = event.actor else {
                return;
            };
            if host.perms.has_permission(actor, perms::BYPASS_BUILD) {
                return;
            }
            for (pos, _) in event.transactions.clone() {
                let regions = manager.regions_at(world, pos);
                let result = check_setting(
                    event,
                    Some(actor),
                    &regions,
                    None,
                    |s| s.build,
                    Tristate::Undefined,
                    host.perms,
                );
                if result == Tristate::False {
                    host.messenger.send(actor, Feedback::DeniedBuild);
                    return;
                }
            }
        }
        BlockChangeCause::Explosion { igniter } => {
            let player = event.actor.or(igniter);
            for (pos, _) in event.transactions.clone() {
                let regions = manager.regions_at(world, pos);
                check_setting(
                    event,
                    None,
                    &regions,
                    None,
                    |s| s.block_damage.all_explosion,
                    Tristate::Undefined,
                    host.perms,
                );
                if let Some(player) = player {
                    check_setting(
                        event,
                        Some(player),
                        &regions,
                        Some(perms::BYPASS_EXPLODE_PLAYER),
                        |s| s.block_damage.player_explosion,
                        Tristate::Undefined,
                        host.perms,
                    );
                    if event.is_cancelled() {
                        host.messenger.send(player, Feedback::DeniedExplosion);
                    }
                }
                if event.is_cancelled() {
                    return;
                }
            }
        }
        BlockChangeCause::Monster => {
            for (pos, _) in event.transactions.clone() {
                let regions = manager.regions_at(world, pos);
                if check_setting(
                    event,
                    None,
                    &regions,
                    None,
                    |s| s.block_damage.monster,
                    Tristate::Undefined,
                    host.perms,
                ) == Tristate::False
                {
                    return;
                }
            }
        }
        BlockChangeCause::Block(block_type) => {
            for (pos, _) in event.transactions.clone() {
                let regions = manager.regions_at(world, pos);
                if check_setting(
                    event,
                    None,
                    &regions,
                    None,
                    |s| lookup(&s.block_damage.block, &block_type),
                    Tristate::Undefined,
                    host.perms,
                ) == Tristate::False
                {
                    return;
                }
            }
        }
        BlockChangeCause::Lightning => {
            for (pos, _) in event.transactions.clone() {
                let regions = manager.regions_at(world, pos);
                if check_setting(
                    event,
                    None,
                    &regions,
                    None,
                    |s| s.block_damage.lightning,
                    Tristate::Undefined,
                    host.perms,
                ) == Tristate::False
                {
                    return;
                }
            }
        }
    }
}

/// Block interaction: the use-all opinions (block, open, redstone,
/// container) chain into the per-block-type opinion; a held item then
/// resolves separately.
pub fn on_use_block(
    manager: &mut RegionManager,
    event: &mut InteractBlockEvent,
    host: &HostContext,
) {
    let actor = event.actor;
    let regions = manager.regions_at(event.world, event.pos);
    let block_type = event.block_type.clone();
    let traits = event.traits;

    let mut set = check_setting(
        event,
        Some(actor),
        &regions,
        Some(perms::BYPASS_USE_ALL_BLOCK),
        |s| s.use_.all.block,
        Tristate::Undefined,
        host.perms,
    );
    if traits.openable {
        set = check_setting(
            event,
            Some(actor),
            &regions,
            Some(perms::BYPASS_USE_ALL_OPEN),
            |s| s.use_.all.open,
            set,
            host.perms,
        );
    }
    if traits.powerable {
        set = check_setting(
            event,
            Some(actor),
            &regions,
            Some(perms::BYPASS_USE_ALL_REDSTONE),
            |s| s.use_.all.redstone,
            set,
            host.perms,
        );
    }
    if traits.container {
        set = check_setting(
            event,
            Some(actor),
            &regions,
            Some(perms::BYPASS_USE_ALL_CONTAINER),
            |s| s.use_.all.container,
            set,
            host.perms,
        );
    }

    let node = use_block_node(&block_type);
    let set = check_setting(
        event,
        Some(actor),
        &regions,
        Some(&node),
        |s| lookup(&s.use_.block, &block_type),
        set,
        host.perms,
    );
    if set == Tristate::False {
        host.messenger.send(actor, Feedback::DeniedUse);
        return;
    }

    if let Some(item) = event.item_in_hand.clone() {
        let set = check_setting(
            event,
            Some(actor),
            &regions,
            Some(perms::BYPASS_USE_ALL_ITEM),
            |s| s.use_.all.item,
            Tristate::Undefined,
            host.perms,
        );
        let node = use_item_node(&item);
        if check_setting(
            event,
            Some(actor),
            &regions,
            Some(&node),
            |s| lookup(&s.use_.item, &item),
            set,
            host.perms,
        ) == Tristate::False
        {
            host.messenger.send(actor, Feedback::DeniedUseItem);
        }
    }
}

/// Bare item use (no block target).
pub fn on_use_item(
    manager: &mut RegionManager,
    event: &mut InteractItemEvent,
    host: &HostContext,
) {
    let actor = event.actor;
    let regions = manager.regions_at(event.world, event.pos);
    let item = event.item.clone();

    let set = check_setting(
        event,
        Some(actor),
        &regions,
        Some(perms::BYPASS_USE_ALL_ITEM),
        |s| s.use_.all.item,
        Tristate::Undefined,
        host.perms,
    );
    let node = use_item_node(&item);
    if check_setting(
        event,
        Some(actor),
        &regions,
        Some(&node),
        |s| lookup(&s.use_.item, &item),
        set,
        host.perms,
    ) == Tristate::False
    {
        host.messenger.send(actor, Feedback::DeniedUseItem);
    }
}

/// Entity spawns, resolved against the matrix matching their cause.
pub fn on_spawn(manager: &mut RegionManager, event: &mut SpawnEntityEvent, host: &HostContext) {
    let regions = manager.regions_at(event.world, event.pos);
    let entity_type = event.entity_type.clone();

    match event.cause.clone() {
        SpawnCause::Player(player) | SpawnCause::Plugin {
            player: Some(player),
        } => {
            if check_setting(
                event,
                Some(player),
                &regions,
                Some(perms::BYPASS_SPAWN_PLAYER),
                |s| lookup(&s.spawn.player, &entity_type),
                Tristate::Undefined,
                host.perms,
            ) == Tristate::False
            {
                host.messenger.send(player, Feedback::DeniedSpawn);
            }
        }
        SpawnCause::Plugin { player: None } => {
            check_setting(
                event,
                None,
                &regions,
                None,
                |s| lookup(&s.spawn.plugin, &entity_type),
                Tristate::Undefined,
                host.perms,
            );
        }
        SpawnCause::Natural => {
            check_setting(
                event,
                None,
                &regions,
                None,
                |s| lookup(&s.spawn.naturally, &entity_type),
                Tristate::Undefined,
                host.perms,
            );
        }
    }
}

/// Entity damage: the all-opinion seeds by-living which seeds the
/// per-source checks; player victims resolve the player-damage matrix
/// (with pvp for player attackers).
pub fn on_damage_entity(
    manager: &mut RegionManager,
    event: &mut DamageEntityEvent,
    host: &HostContext,
) {
    let regions = manager.regions_at(event.world, event.pos);
    let source = event.source.clone();

    if let Some(target) = event.target_player {
        let mut default_to = check_setting(
            event,
            Some(target),
            &regions,
            Some(perms::BYPASS_PLAYER_DAMAGE_ALL),
            |s| s.player_damage.all,
            Tristate::Undefined,
            host.perms,
        );
        if source.living {
            default_to = check_setting(
                event,
                Some(target),
                &regions,
                Some(perms::BYPASS_PLAYER_DAMAGE_LIVING),
                |s| s.player_damage.by_living,
                default_to,
                host.perms,
            );
        }
        if source.player.is_some() {
            check_setting(
                event,
                Some(target),
                &regions,
                Some(perms::BYPASS_PLAYER_DAMAGE_PVP),
                |s| s.player_damage.pvp,
                default_to,
                host.perms,
            );
        }
        return;
    }

    let mut default_to = check_setting(
        event,
        source.player,
        &regions,
        Some(perms::BYPASS_ENTITY_DAMAGE_ALL),
        |s| s.entity_damage.all,
        Tristate::Undefined,
        host.perms,
    );
    if source.living {
        default_to = check_setting(
            event,
            source.player,
            &regions,
            Some(perms::BYPASS_ENTITY_DAMAGE_LIVING),
            |s| s.entity_damage.by_living,
            default_to,
            host.perms,
        );
    }
    if let Some(source_type) = source.entity_type {
        check_setting(
            event,
            None,
            &regions,
            None,
            |s| lookup(&s.entity_damage.by_entity, &source_type),
            default_to,
            host.perms,
        );
    }
}

/// Hostile AI acquiring a player target.
pub fn on_target_player(
    manager: &mut RegionManager,
    event: &mut TargetPlayerEvent,
    host: &HostContext,
) {
    let target = event.target;
    let regions = manager.regions_at(event.world, event.pos);
    check_setting(
        event,
        Some(target),
        &regions,
        Some(perms::BYPASS_PLAYER_TARGETING),
        |s| s.player_damage.ai_targeting,
        Tristate::Undefined,
        host.perms,
    );
}

/// Commands blocked inside regions; every alias of the executed command is
/// folded before the region list moves on.
pub fn on_command(
    manager: &mut RegionManager,
    event: &mut ExecuteCommandEvent,
    host: &HostContext,
) {
    let actor = event.actor;
    let regions = manager.regions_at(event.world, event.pos);
    let aliases: Vec<String> = event.aliases.iter().map(|a| a.to_lowercase()).collect();

    if check_setting(
        event,
        Some(actor),
        &regions,
        Some(perms::BYPASS_COMMAND),
        |s| {
            let mut value = Tristate::Undefined;
            for alias in &aliases {
                value = value.and(lookup(&s.blocked_commands, alias));
                if value.is_defined() {
                    break;
                }
            }
            value
        },
        Tristate::Undefined,
        host.perms,
    ) == Tristate::False
    {
        host.messenger.send(actor, Feedback::DeniedCommand);
    }
}

/// Dead-circuit regions kill redstone propagation wholesale.
pub fn on_notify_neighbor(
    manager: &mut RegionManager,
    event: &mut NotifyNeighborEvent,
    host: &HostContext,
) {
    for (pos, redstone) in event.neighbors.clone() {
        if !redstone {
            continue;
        }
        let regions = manager.regions_at(event.world, pos);
        if check_setting(
            event,
            None,
            &regions,
            None,
            |s| s.dead_circuit,
            Tristate::Undefined,
            host.perms,
        ) == Tristate::False
        {
            return;
        }
    }
}

/// Movement: teleports check exit then entry; walking checks move, exit
/// and enter, with the contain rule suppressing exit/enter inside
/// overlapping region sets.
pub fn on_move(manager: &mut RegionManager, event: &mut MoveEvent, host: &HostContext) {
    let from_block = event.from.block();
    let to_block = event.to.block();
    if from_block == to_block {
        return;
    }
    let actor = event.actor;
    let from = manager.regions_at(event.world, from_block);
    let to = manager.regions_at(event.world, to_block);

    match event.kind {
        MoveKind::Teleport | MoveKind::TeleportPortal => {
            let check = MoveCheck::from(event.kind);
            if check_move(event, actor, &from, &to, check, false, host.perms) {
                return; // teleport out denied
            }
            check_move(event, actor, &to, &from, check, false, host.perms);
        }
        MoveKind::Move => {
            if check_move(event, actor, &from, &to, MoveCheck::Move, false, host.perms) {
                host.messenger.send(actor, Feedback::DeniedMove);
                return;
            }
            if check_move(event, actor, &from, &to, MoveCheck::Exit, true, host.perms) {
                host.messenger.send(actor, Feedback::DeniedExit);
                return;
            }
            if check_move(event, actor, &to, &from, MoveCheck::Enter, true, host.perms) {
                host.messenger.send(actor, Feedback::DeniedEnter);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_operations::{DbOperations, StorageWriter};
    use crate::host::{Messenger, PermissionProvider, PlayerDirectory, UserId};
    use crate::math::{BlockPos, Cuboid, Vec3};
    use std::cell::RefCell;
    use uuid::Uuid;

    struct NoPerms;
    impl PermissionProvider for NoPerms {
        fn has_permission(&self, _: UserId, _: &str) -> bool {
            false
        }
    }

    struct Online;
    impl PlayerDirectory for Online {
        fn is_online(&self, _: UserId) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<Vec<(UserId, Feedback)>>,
    }
    impl Messenger for Recorder {
        fn send(&self, to: UserId, feedback: Feedback) {
            self.sent.borrow_mut().push((to, feedback));
        }
    }

    fn manager() -> (RegionManager, StorageWriter, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let sled = sled::Config::new()
            .path(dir.path().join("db"))
            .temporary(true)
            .open()
            .unwrap();
        let db = DbOperations::new(sled).unwrap();
        let (handle, writer) = StorageWriter::spawn(db);
        let manager = RegionManager::new(dir.path().join("regions"), handle).unwrap();
        (manager, writer, dir)
    }

    fn volume() -> Cuboid {
        Cuboid::new(BlockPos::new(0, 0, 0), BlockPos::new(15, 255, 15))
    }

    #[test]
    fn test_build_denied_inside_region() {
        let (mut m, _w, _d) = manager();
        let world = Uuid::new_v4();
        let actor = Uuid::new_v4();
        m.define(world, "spawn", volume(), 0).unwrap();
        m.update_region(world, "spawn", |c| c.settings.build = Tristate::False)
            .unwrap();

        let recorder = Recorder::default();
        let host = HostContext::new(&NoPerms, &Online, &recorder);

        let mut event = BlockChangeEvent::single(
            world,
            Some(actor),
            BlockChangeCause::Player,
            BlockPos::new(8, 64, 8),
            "minecraft:stone",
        );
        on_block_change(&mut m, &mut event, &host);
        assert!(event.is_cancelled());
        assert!(recorder
            .sent
            .borrow()
            .contains(&(actor, Feedback::DeniedBuild)));

        // Outside the region the host default applies.
        let mut event = BlockChangeEvent::single(
            world,
            Some(actor),
            BlockChangeCause::Player,
            BlockPos::new(100, 64, 100),
            "minecraft:stone",
        );
        on_block_change(&mut m, &mut event, &host);
        assert!(!event.is_cancelled());
    }

    #[test]
    fn test_explosion_true_revives_block_damage() {
        // Host delivers explosion block damage pre-cancelled; a region
        // explicitly allowing explosions un-cancels it.
        let (mut m, _w, _d) = manager();
        let world = Uuid::new_v4();
        m.define(world, "warzone", volume(), 0).unwrap();
        m.update_region(world, "warzone", |c| {
            c.settings.block_damage.all_explosion = Tristate::True;
        })
        .unwrap();

        let recorder = Recorder::default();
        let host = HostContext::new(&NoPerms, &Online, &recorder);

        let mut event = BlockChangeEvent::single(
            world,
            None,
            BlockChangeCause::Explosion { igniter: None },
            BlockPos::new(8, 64, 8),
            "minecraft:stone",
        );
        event.set_cancelled(true);
        on_block_change(&mut m, &mut event, &host);
        assert!(!event.is_cancelled());
    }

    #[test]
    fn test_use_all_chains_into_per_block() {
        let (mut m, _w, _d) = manager();
        let world = Uuid::new_v4();
        let actor = Uuid::new_v4();
        m.define(world, "spawn", volume(), 0).unwrap();
        m.update_region(world, "spawn", |c| {
            c.settings.use_.all.block = Tristate::False;
            c.settings
                .use_
                .block
                .insert("minecraft:lever".into(), Tristate::True);
        })
        .unwrap();

        let recorder = Recorder::default();
        let host = HostContext::new(&NoPerms, &Online, &recorder);

        // The lever has a per-type allow overriding the blanket deny.
        let mut event = InteractBlockEvent {
            world,
            pos: BlockPos::new(8, 64, 8),
            actor,
            block_type: "minecraft:lever".into(),
            traits: Default::default(),
            item_in_hand: None,
            cancelled: false,
        };
        on_use_block(&mut m, &mut event, &host);
        assert!(!event.is_cancelled());

        // Other blocks fall under the blanket deny.
        let mut event = InteractBlockEvent {
            world,
            pos: BlockPos::new(8, 64, 8),
            actor,
            block_type: "minecraft:stone_button".into(),
            traits: Default::default(),
            item_in_hand: None,
            cancelled: false,
        };
        on_use_block(&mut m, &mut event, &host);
        assert!(event.is_cancelled());
        assert!(recorder
            .sent
            .borrow()
            .contains(&(actor, Feedback::DeniedUse)));
    }

    #[test]
    fn test_natural_spawn_suppressed() {
        let (mut m, _w, _d) = manager();
        let world = Uuid::new_v4();
        m.define(world, "sanctum", volume(), 0).unwrap();
        m.update_region(world, "sanctum", |c| {
            c.settings
                .spawn
                .naturally
                .insert("minecraft:zombie".into(), Tristate::False);
        })
        .unwrap();

        let recorder = Recorder::default();
        let host = HostContext::new(&NoPerms, &Online, &recorder);

        let mut event = SpawnEntityEvent {
            world,
            pos: BlockPos::new(8, 64, 8),
            entity_type: "minecraft:zombie".into(),
            cause: SpawnCause::Natural,
            cancelled: false,
        };
        on_spawn(&mut m, &mut event, &host);
        assert!(event.is_cancelled());

        // Other entity types are unaffected.
        let mut event = SpawnEntityEvent {
            world,
            pos: BlockPos::new(8, 64, 8),
            entity_type: "minecraft:cow".into(),
            cause: SpawnCause::Natural,
            cancelled: false,
        };
        on_spawn(&mut m, &mut event, &host);
        assert!(!event.is_cancelled());
    }

    #[test]
    fn test_pvp_denied_via_damage_chain() {
        let (mut m, _w, _d) = manager();
        let world = Uuid::new_v4();
        m.define(world, "haven", volume(), 0).unwrap();
        m.update_region(world, "haven", |c| {
            c.settings.player_damage.pvp = Tristate::False;
        })
        .unwrap();

        let recorder = Recorder::default();
        let host = HostContext::new(&NoPerms, &Online, &recorder);

        let victim = Uuid::new_v4();
        let attacker = Uuid::new_v4();
        let mut event = DamageEntityEvent {
            world,
            pos: BlockPos::new(8, 64, 8),
            entity: Uuid::new_v4(),
            entity_type: "minecraft:player".into(),
            target_player: Some(victim),
            source: crate::events::DamageSource {
                player: Some(attacker),
                living: true,
                ..Default::default()
            },
            cancelled: false,
        };
        on_damage_entity(&mut m, &mut event, &host);
        assert!(event.is_cancelled());
    }

    #[test]
    fn test_command_blocked_by_alias() {
        let (mut m, _w, _d) = manager();
        let world = Uuid::new_v4();
        let actor = Uuid::new_v4();
        m.define(world, "adventure", volume(), 0).unwrap();
        m.update_region(world, "adventure", |c| {
            c.settings
                .blocked_commands
                .insert("sethome".into(), Tristate::False);
        })
        .unwrap();

        let recorder = Recorder::default();
        let host = HostContext::new(&NoPerms, &Online, &recorder);

        let mut event = ExecuteCommandEvent {
            world,
            pos: BlockPos::new(8, 64, 8),
            actor,
            aliases: vec!["home:sethome".into(), "SetHome".into()],
            cancelled: false,
        };
        on_command(&mut m, &mut event, &host);
        assert!(event.is_cancelled());
        assert!(recorder
            .sent
            .borrow()
            .contains(&(actor, Feedback::DeniedCommand)));
    }

    #[test]
    fn test_move_exit_suppressed_inside_overlap() {
        let (mut m, _w, _d) = manager();
        let world = Uuid::new_v4();
        let actor = Uuid::new_v4();
        // One region spanning both positions: walking within it is not an
        // exit even though exit is denied.
        m.define(world, "camp", volume(), 0).unwrap();
        m.update_region(world, "camp", |c| {
            c.settings.r#move.exit = Tristate::False;
        })
        .unwrap();

        let recorder = Recorder::default();
        let host = HostContext::new(&NoPerms, &Online, &recorder);

        let mut event = MoveEvent {
            world,
            actor,
            from: Vec3::new(4.5, 64.0, 4.5),
            to: Vec3::new(8.5, 64.0, 8.5),
            kind: MoveKind::Move,
            cancelled: false,
        };
        on_move(&mut m, &mut event, &host);
        assert!(!event.is_cancelled());

        // Stepping outside the region is a real exit and is denied.
        let mut event = MoveEvent {
            world,
            actor,
            from: Vec3::new(8.5, 64.0, 8.5),
            to: Vec3::new(40.5, 64.0, 40.5),
            kind: MoveKind::Move,
            cancelled: false,
        };
        on_move(&mut m, &mut event, &host);
        assert!(event.is_cancelled());
        assert!(recorder
            .sent
            .borrow()
            .contains(&(actor, Feedback::DeniedExit)));
    }

    #[test]
    fn test_dead_circuit_blocks_redstone() {
        let (mut m, _w, _d) = manager();
        let world = Uuid::new_v4();
        m.define(world, "quiet", volume(), 0).unwrap();
        m.update_region(world, "quiet", |c| {
            c.settings.dead_circuit = Tristate::False;
        })
        .unwrap();

        let recorder = Recorder::default();
        let host = HostContext::new(&NoPerms, &Online, &recorder);

        let mut event = NotifyNeighborEvent {
            world,
            source: BlockPos::new(7, 64, 8),
            neighbors: vec![(BlockPos::new(8, 64, 8), true)],
            cancelled: false,
        };
        on_notify_neighbor(&mut m, &mut event, &host);
        assert!(event.is_cancelled());
    }
}
