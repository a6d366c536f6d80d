//! Event entry points for the lock axis.
//!
//! The host adapter calls these with its translated events; they look up
//! the lock, run the resolver and apply cancellation, last-access bumps,
//! notifications and KeyBook side effects. Anything without a lock at the
//! event location returns untouched ("no protection found" is never an
//! error here).

use chrono::Utc;
use log::debug;

use crate::events::{
    BlockChangeCause, BlockChangeEvent, Cancellable, DamageEntityEvent, InteractBlockEvent,
    InteractEntityEvent, NotifyNeighborEvent,
};
use crate::host::{Feedback, HostContext, UserId};
use crate::host::perms;
use crate::locker::keybook::KeyBook;
use crate::locker::manager::LockManager;
use crate::locker::resolver::{decide, ActorState, LockAction};
use crate::locker::types::{LockId, ProtectedType, ProtectionFlag};
use crate::math::BlockPos;

/// Result of an allowed door use, for the host to apply to the blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorToggle {
    pub lock_id: LockId,
    /// New open state.
    pub open: bool,
    pub positions: Vec<BlockPos>,
}

fn actor_state<'a>(
    manager: &mut LockManager,
    id: LockId,
    actor: UserId,
    key_book: Option<&'a KeyBook>,
    host: &HostContext,
) -> ActorState<'a> {
    ActorState {
        access: manager.access_for(id, actor),
        unlocked: manager.has_unlocked(actor, id),
        key_book,
        bypass: host.perms.has_permission(actor, perms::LOCKER_ACCESS_OTHER),
        show_owner: host.perms.has_permission(actor, perms::LOCKER_SHOW_OWNER),
    }
}

/// Applies the side effects common to every resolved access.
fn apply_decision(
    manager: &mut LockManager,
    id: LockId,
    actor: UserId,
    decision: &crate::locker::resolver::AccessDecision,
    key_book: Option<&mut KeyBook>,
    host: &HostContext,
) {
    let now = Utc::now();
    if decision.invalidate_key_book {
        if let Some(book) = key_book {
            book.invalidate();
        }
    }
    if let Some(feedback) = &decision.feedback {
        host.messenger.send(actor, feedback.clone());
    }
    if decision.allow {
        if let Some(lock) = manager.get_lock_mut(id) {
            lock.touch_access(now);
        }
        if decision.key_book_used {
            host.messenger.send(actor, Feedback::KeyBookUnlocks);
            manager.notify_key_usage(id, actor, now, host);
        }
    }
    if decision.notify_owner {
        manager.notify_usage(id, actor, now, host);
    }
}

/// A player right-clicked a block: containers, doors and plain protected
/// blocks each resolve their own way. Returns the door toggle to perform
/// when a protected door was opened or closed.
pub fn on_interact_block(
    manager: &mut LockManager,
    event: &mut InteractBlockEvent,
    mut key_book: Option<&mut KeyBook>,
    host: &HostContext,
) -> Option<DoorToggle> {
    let id = manager.lock_id_at(event.world, &event.pos)?;
    let lock = manager.get_lock(id)?;
    if !manager.is_enforced(lock, host) {
        debug!("lock {id} not enforced (owner online-state config)");
        return None;
    }
    let kind = lock.kind();
    let owner = lock.owner;
    let actor = event.actor;

    let state = actor_state(manager, id, actor, key_book.as_deref(), host);
    if state.show_owner && actor != owner {
        host.messenger.send(actor, Feedback::ProtectedBy { owner });
    }

    match kind {
        ProtectedType::Container => {
            let take = decide(manager.get_lock(id)?, LockAction::Take, actor, state);
            let put = decide(manager.get_lock(id)?, LockAction::Put, actor, state);
            // Opening is allowed as soon as either direction is; the host's
            // inventory layer enforces the per-direction bits.
            let decision = if take.allow { take } else { put };
            if !decision.allow {
                event.set_cancelled(true);
            }
            apply_decision(manager, id, actor, &decision, key_book.take(), host);
            None
        }
        ProtectedType::Door => {
            let decision = decide(manager.get_lock(id)?, LockAction::Door, actor, state);
            if !decision.allow {
                event.set_cancelled(true);
                apply_decision(manager, id, actor, &decision, key_book.take(), host);
                return None;
            }
            apply_decision(manager, id, actor, &decision, key_book.take(), host);

            if event.block_type == "minecraft:iron_door"
                && !manager.config().open_iron_door_with_click
            {
                host.messenger.send(actor, Feedback::HeavyDoor);
                return None;
            }
            let open = !event.traits.is_open;
            manager.note_door_use(id, open, Utc::now());
            let positions = manager.get_lock(id)?.locations().to_vec();
            Some(DoorToggle {
                lock_id: id,
                open,
                positions,
            })
        }
        _ => {
            let decision = decide(manager.get_lock(id)?, LockAction::BlockInteract, actor, state);
            if !decision.allow {
                event.set_cancelled(true);
            }
            apply_decision(manager, id, actor, &decision, key_book.take(), host);
            None
        }
    }
}

/// A player interacted with an entity; container entities resolve like
/// inventories, everything else as a plain entity interaction.
pub fn on_interact_entity(
    manager: &mut LockManager,
    event: &mut InteractEntityEvent,
    mut key_book: Option<&mut KeyBook>,
    host: &HostContext,
) {
    let Some(id) = manager.entity_lock_id(&event.entity) else {
        return;
    };
    let Some(lock) = manager.get_lock(id) else {
        return;
    };
    if !manager.is_enforced(lock, host) {
        return;
    }
    let kind = lock.kind();
    let owner = lock.owner;
    let actor = event.actor;

    let state = actor_state(manager, id, actor, key_book.as_deref(), host);
    if state.show_owner && actor != owner {
        host.messenger.send(actor, Feedback::ProtectedBy { owner });
    }

    let action = if kind.is_container() {
        LockAction::Take
    } else {
        LockAction::EntityInteract
    };
    let Some(lock) = manager.get_lock(id) else {
        return;
    };
    let decision = if kind.is_container() {
        let take = decide(lock, action, actor, state);
        if take.allow {
            take
        } else {
            decide(lock, LockAction::Put, actor, state)
        }
    } else {
        decide(lock, action, actor, state)
    };
    if !decision.allow {
        event.set_cancelled(true);
    }
    apply_decision(manager, id, actor, &decision, key_book.take(), host);
}

/// Block changes: breaking a protected block deletes the lock for its
/// owner (or an override holder) and is cancelled for everyone else,
/// players and environment alike.
pub fn on_block_change(
    manager: &mut LockManager,
    event: &mut BlockChangeEvent,
    host: &HostContext,
) {
    let world = event.world;
    for (pos, _) in event.transactions.clone() {
        let Some(id) = manager.lock_id_at(world, &pos) else {
            continue;
        };
        let Some(lock) = manager.get_lock(id) else {
            continue;
        };
        if !manager.is_enforced(lock, host) {
            continue;
        }
        let owner = lock.owner;

        match (&event.cause, event.actor) {
            (BlockChangeCause::Player, Some(actor)) => {
                if actor == owner
                    || host.perms.has_permission(actor, perms::LOCKER_BREAK_OTHER)
                {
                    manager.remove_lock(id, Some(actor), true, host);
                } else {
                    event.set_cancelled(true);
                    host.messenger.send(actor, Feedback::DeniedBreak);
                    return;
                }
            }
            // Explosions, mobs and block causes never break protections.
            _ => {
                event.set_cancelled(true);
                return;
            }
        }
    }
}

/// Damage to protected entities mirrors block breaking.
pub fn on_damage_entity(
    manager: &mut LockManager,
    event: &mut DamageEntityEvent,
    host: &HostContext,
) {
    let Some(id) = manager.entity_lock_id(&event.entity) else {
        return;
    };
    let Some(lock) = manager.get_lock(id) else {
        return;
    };
    if !manager.is_enforced(lock, host) {
        return;
    }
    let owner = lock.owner;

    match event.source.player {
        Some(actor)
            if actor == owner
                || host.perms.has_permission(actor, perms::LOCKER_BREAK_OTHER) =>
        {
            host.messenger.send(actor, Feedback::OwnerHitProtectedEntity);
        }
        Some(actor) => {
            event.set_cancelled(true);
            host.messenger.send(actor, Feedback::DeniedEntityDamage);
        }
        None => {
            event.set_cancelled(true);
        }
    }
}

/// A protected entity despawned or died; its lock goes with it.
pub fn on_entity_destroyed(
    manager: &mut LockManager,
    entity: &crate::host::EntityId,
    host: &HostContext,
) {
    if let Some(id) = manager.entity_lock_id(entity) {
        manager.remove_lock(id, None, true, host);
    }
}

/// Redstone suppression: locks carrying BLOCK_REDSTONE ignore incoming
/// redstone changes.
pub fn on_notify_neighbor(
    manager: &mut LockManager,
    event: &mut NotifyNeighborEvent,
    _host: &HostContext,
) {
    for (pos, redstone) in event.neighbors.clone() {
        if !redstone {
            continue;
        }
        if let Some(lock) = manager
            .lock_id_at(event.world, &pos)
            .and_then(|id| manager.get_lock(id))
        {
            if lock.has_flag(ProtectionFlag::BlockRedstone) {
                event.set_cancelled(true);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockerConfig;
    use crate::db_operations::{DbOperations, StorageWriter};
    use crate::events::BlockTraits;
    use crate::host::{Messenger, PermissionProvider, PlayerDirectory};
    use crate::locker::types::{AccessLevel, LockType};
    use std::cell::RefCell;
    use std::collections::HashSet;
    use uuid::Uuid;

    struct PermSet(HashSet<(Uuid, &'static str)>);
    impl PermissionProvider for PermSet {
        fn has_permission(&self, user: Uuid, node: &str) -> bool {
            self.0.iter().any(|(u, n)| *u == user && *n == node)
        }
    }

    struct Online;
    impl PlayerDirectory for Online {
        fn is_online(&self, _: Uuid) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: RefCell<Vec<(Uuid, Feedback)>>,
    }
    impl Messenger for Recorder {
        fn send(&self, to: Uuid, feedback: Feedback) {
            self.sent.borrow_mut().push((to, feedback));
        }
    }

    struct Fixture {
        manager: LockManager,
        _writer: StorageWriter,
        world: Uuid,
        owner: Uuid,
    }

    fn fixture() -> (Fixture, Recorder, Online) {
        let dir = tempfile::tempdir().unwrap().into_path();
        let sled = sled::Config::new()
            .path(dir)
            .temporary(true)
            .open()
            .unwrap();
        let db = DbOperations::new(sled).unwrap();
        let (handle, writer) = StorageWriter::spawn(db.clone());
        let manager = LockManager::new(db, handle, LockerConfig::default());
        (
            Fixture {
                manager,
                _writer: writer,
                world: Uuid::new_v4(),
                owner: Uuid::new_v4(),
            },
            Recorder::default(),
            Online,
        )
    }

    fn chest_event(fixture: &Fixture, actor: Uuid, pos: BlockPos) -> InteractBlockEvent {
        InteractBlockEvent {
            world: fixture.world,
            pos,
            actor,
            block_type: "minecraft:chest".into(),
            traits: BlockTraits {
                container: true,
                ..Default::default()
            },
            item_in_hand: None,
            cancelled: false,
        }
    }

    #[test]
    fn test_private_chest_grant_flow() {
        // A PRIVATE chest lock owned by A at (10,64,10); B without access
        // is denied, then granted TAKE and allowed to withdraw while
        // deposits stay denied.
        let (mut f, recorder, online) = fixture();
        let user_b = Uuid::new_v4();
        let pos = BlockPos::new(10, 64, 10);

        let no_perms = PermSet(HashSet::new());
        let host = HostContext::new(&no_perms, &online, &recorder);
        let id = f
            .manager
            .create_lock(
                f.world,
                vec![pos],
                "minecraft:chest",
                f.owner,
                LockType::Private,
                None,
                &host,
            )
            .unwrap();

        let mut event = chest_event(&f, user_b, pos);
        on_interact_block(&mut f.manager, &mut event, None, &host);
        assert!(event.is_cancelled());
        assert!(recorder
            .sent
            .borrow()
            .contains(&(user_b, Feedback::DeniedInventory { owner: None })));

        // A grants B TAKE.
        f.manager
            .set_access(id, f.owner, user_b, true, AccessLevel::TAKE, &host)
            .unwrap();

        let mut event = chest_event(&f, user_b, pos);
        on_interact_block(&mut f.manager, &mut event, None, &host);
        assert!(!event.is_cancelled());

        // Direct resolution confirms PUT is still denied.
        let state = ActorState {
            access: f.manager.access_for(id, user_b),
            ..Default::default()
        };
        assert!(!decide(f.manager.get_lock(id).unwrap(), LockAction::Put, user_b, state).allow);
    }

    #[test]
    fn test_show_owner_denial_reveals_owner() {
        let (mut f, recorder, online) = fixture();
        let user_b = Uuid::new_v4();
        let pos = BlockPos::new(1, 64, 1);

        let perms = PermSet(HashSet::from([(user_b, perms::LOCKER_SHOW_OWNER)]));
        let host = HostContext::new(&perms, &online, &recorder);
        f.manager
            .create_lock(
                f.world,
                vec![pos],
                "minecraft:chest",
                f.owner,
                LockType::Private,
                None,
                &host,
            )
            .unwrap();

        let mut event = chest_event(&f, user_b, pos);
        on_interact_block(&mut f.manager, &mut event, None, &host);
        assert!(event.is_cancelled());
        let sent = recorder.sent.borrow();
        assert!(sent.contains(&(user_b, Feedback::ProtectedBy { owner: f.owner })));
        assert!(sent.contains(&(
            user_b,
            Feedback::DeniedInventory {
                owner: Some(f.owner)
            }
        )));
    }

    #[test]
    fn test_owner_opens_without_noise() {
        let (mut f, recorder, online) = fixture();
        let pos = BlockPos::new(2, 64, 2);
        let no_perms = PermSet(HashSet::new());
        let host = HostContext::new(&no_perms, &online, &recorder);
        f.manager
            .create_lock(
                f.world,
                vec![pos],
                "minecraft:chest",
                f.owner,
                LockType::Private,
                None,
                &host,
            )
            .unwrap();
        recorder.sent.borrow_mut().clear();

        let mut event = chest_event(&f, f.owner, pos);
        on_interact_block(&mut f.manager, &mut event, None, &host);
        assert!(!event.is_cancelled());
        assert!(recorder.sent.borrow().is_empty());
    }

    #[test]
    fn test_stale_key_book_is_destroyed_once() {
        let (mut f, recorder, online) = fixture();
        let user_b = Uuid::new_v4();
        let pos = BlockPos::new(3, 64, 3);
        let no_perms = PermSet(HashSet::new());
        let host = HostContext::new(&no_perms, &online, &recorder);
        let id = f
            .manager
            .create_lock(
                f.world,
                vec![pos],
                "minecraft:chest",
                f.owner,
                LockType::Private,
                None,
                &host,
            )
            .unwrap();

        let mut book = KeyBook::issue(f.manager.get_lock(id).unwrap());
        f.manager.get_lock_mut(id).unwrap().invalidate_key_books();

        let mut event = chest_event(&f, user_b, pos);
        on_interact_block(&mut f.manager, &mut event, Some(&mut book), &host);
        assert!(event.is_cancelled());
        assert!(book.broken);
        assert!(recorder
            .sent
            .borrow()
            .contains(&(user_b, Feedback::KeyBookBroken)));

        // Presenting the broken book again falls through to the normal
        // denial; no second punishment.
        recorder.sent.borrow_mut().clear();
        let mut event = chest_event(&f, user_b, pos);
        on_interact_block(&mut f.manager, &mut event, Some(&mut book), &host);
        assert!(event.is_cancelled());
        assert!(!recorder
            .sent
            .borrow()
            .contains(&(user_b, Feedback::KeyBookBroken)));
    }

    #[test]
    fn test_break_protected_block() {
        let (mut f, recorder, online) = fixture();
        let vandal = Uuid::new_v4();
        let pos = BlockPos::new(4, 64, 4);
        let no_perms = PermSet(HashSet::new());
        let host = HostContext::new(&no_perms, &online, &recorder);
        let id = f
            .manager
            .create_lock(
                f.world,
                vec![pos],
                "minecraft:chest",
                f.owner,
                LockType::Private,
                None,
                &host,
            )
            .unwrap();

        let mut event = BlockChangeEvent::single(
            f.world,
            Some(vandal),
            BlockChangeCause::Player,
            pos,
            "minecraft:chest",
        );
        on_block_change(&mut f.manager, &mut event, &host);
        assert!(event.is_cancelled());
        assert!(f.manager.get_lock(id).is_some());

        // The owner breaking it deletes the protection.
        let mut event = BlockChangeEvent::single(
            f.world,
            Some(f.owner),
            BlockChangeCause::Player,
            pos,
            "minecraft:chest",
        );
        on_block_change(&mut f.manager, &mut event, &host);
        assert!(!event.is_cancelled());
        assert!(f.manager.get_lock(id).is_none());
    }

    #[test]
    fn test_explosion_never_breaks_locks() {
        let (mut f, recorder, online) = fixture();
        let pos = BlockPos::new(5, 64, 5);
        let no_perms = PermSet(HashSet::new());
        let host = HostContext::new(&no_perms, &online, &recorder);
        f.manager
            .create_lock(
                f.world,
                vec![pos],
                "minecraft:chest",
                f.owner,
                LockType::Private,
                None,
                &host,
            )
            .unwrap();

        let mut event = BlockChangeEvent::single(
            f.world,
            None,
            BlockChangeCause::Explosion { igniter: None },
            pos,
            "minecraft:chest",
        );
        on_block_change(&mut f.manager, &mut event, &host);
        assert!(event.is_cancelled());
    }

    #[test]
    fn test_door_toggle_allowed_and_denied() {
        let (mut f, recorder, online) = fixture();
        let pos = BlockPos::new(6, 64, 6);
        let upper = BlockPos::new(6, 65, 6);
        let no_perms = PermSet(HashSet::new());
        let host = HostContext::new(&no_perms, &online, &recorder);
        let id = f
            .manager
            .create_lock(
                f.world,
                vec![pos, upper],
                "minecraft:oak_door",
                f.owner,
                LockType::Private,
                None,
                &host,
            )
            .unwrap();

        let mut event = InteractBlockEvent {
            world: f.world,
            pos,
            actor: f.owner,
            block_type: "minecraft:oak_door".into(),
            traits: BlockTraits {
                openable: true,
                is_open: false,
                ..Default::default()
            },
            item_in_hand: None,
            cancelled: false,
        };
        let toggle = on_interact_block(&mut f.manager, &mut event, None, &host).unwrap();
        assert_eq!(
            toggle,
            DoorToggle {
                lock_id: id,
                open: true,
                positions: vec![pos, upper],
            }
        );

        // A stranger cannot toggle it.
        let stranger = Uuid::new_v4();
        let mut event = InteractBlockEvent {
            world: f.world,
            pos,
            actor: stranger,
            block_type: "minecraft:oak_door".into(),
            traits: BlockTraits {
                openable: true,
                is_open: true,
                ..Default::default()
            },
            item_in_hand: None,
            cancelled: false,
        };
        assert!(on_interact_block(&mut f.manager, &mut event, None, &host).is_none());
        assert!(event.is_cancelled());
    }

    #[test]
    fn test_protected_entity_damage() {
        let (mut f, recorder, online) = fixture();
        let entity = Uuid::new_v4();
        let no_perms = PermSet(HashSet::new());
        let host = HostContext::new(&no_perms, &online, &recorder);
        f.manager
            .create_entity_lock(
                entity,
                "minecraft:horse",
                true,
                false,
                f.owner,
                LockType::Private,
                None,
                &host,
            )
            .unwrap();

        let attacker = Uuid::new_v4();
        let mut event = DamageEntityEvent {
            world: f.world,
            pos: BlockPos::new(0, 64, 0),
            entity,
            entity_type: "minecraft:horse".into(),
            target_player: None,
            source: crate::events::DamageSource {
                player: Some(attacker),
                living: true,
                ..Default::default()
            },
            cancelled: false,
        };
        on_damage_entity(&mut f.manager, &mut event, &host);
        assert!(event.is_cancelled());
        assert!(recorder
            .sent
            .borrow()
            .contains(&(attacker, Feedback::DeniedEntityDamage)));
    }

    #[test]
    fn test_redstone_flag_blocks_notify() {
        let (mut f, recorder, online) = fixture();
        let pos = BlockPos::new(7, 64, 7);
        let no_perms = PermSet(HashSet::new());
        let host = HostContext::new(&no_perms, &online, &recorder);
        let id = f
            .manager
            .create_lock(
                f.world,
                vec![pos],
                "minecraft:iron_door",
                f.owner,
                LockType::Private,
                None,
                &host,
            )
            .unwrap();
        let flags = ProtectionFlag::BlockRedstone.bit();
        f.manager.get_lock_mut(id).unwrap().set_flags(flags);

        let mut event = NotifyNeighborEvent {
            world: f.world,
            source: BlockPos::new(8, 64, 7),
            neighbors: vec![(pos, true)],
            cancelled: false,
        };
        on_notify_neighbor(&mut f.manager, &mut event, &host);
        assert!(event.is_cancelled());
    }
}
