//! Collaborator interfaces provided by the server host.
//!
//! The engine never talks to the game directly. Permission checks, player
//! presence and outgoing feedback all go through these traits; hosts adapt
//! them onto their own services. Formatting, localization and sounds are
//! host concerns, which is why [`Feedback`] is a typed payload rather than
//! text.

use uuid::Uuid;

use crate::locker::types::{LockId, LockType};
use crate::math::BlockPos;

pub mod perms;

/// A player or other actor identity. Non-player causes are represented by
/// `Option<UserId>` on the events instead of a sentinel id.
pub type UserId = Uuid;

/// A world identity.
pub type WorldId = Uuid;

/// A protected entity identity.
pub type EntityId = Uuid;

/// Permission lookup against the host's permission service.
pub trait PermissionProvider {
    fn has_permission(&self, user: UserId, node: &str) -> bool;
}

/// Player presence, used by the owner-online protection toggles.
pub trait PlayerDirectory {
    fn is_online(&self, user: UserId) -> bool;
}

/// Outgoing feedback sink. Implementations translate payloads into chat
/// lines, action-bar messages, sounds or damage as they see fit.
pub trait Messenger {
    fn send(&self, to: UserId, feedback: Feedback);
}

/// Everything the engine needs from the host for one event, passed
/// explicitly into the listeners (no global state, no runtime attachments).
pub struct HostContext<'a> {
    pub perms: &'a dyn PermissionProvider,
    pub players: &'a dyn PlayerDirectory,
    pub messenger: &'a dyn Messenger,
}

impl<'a> HostContext<'a> {
    pub fn new(
        perms: &'a dyn PermissionProvider,
        players: &'a dyn PlayerDirectory,
        messenger: &'a dyn Messenger,
    ) -> Self {
        Self {
            perms,
            players,
            messenger,
        }
    }
}

/// Typed feedback payloads sent to actors and owners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    // locker: creation and lifecycle
    LockCreated(LockType),
    AlreadyProtected,
    LockRemoved,
    NotYourProtection,

    // locker: denials. `owner` is populated only for actors holding the
    // show-owner privilege.
    ProtectedBy { owner: UserId },
    DeniedDoor { owner: Option<UserId> },
    DeniedInventory { owner: Option<UserId> },
    DeniedEntity { owner: Option<UserId> },
    DeniedBlockInteract,
    DeniedBreak,
    DeniedEntityDamage,
    OwnerHitProtectedEntity,

    // locker: passwords and KeyBooks
    UnlockSuccess,
    UnlockWrongPassword,
    UnlockNoPassword,
    KeyBookNothingHappens,
    KeyBookBroken,
    KeyBookUnlocks,

    // locker: owner notifications (rate limited)
    AccessNotification {
        accessor: UserId,
        lock_id: LockId,
        location: Option<(WorldId, BlockPos)>,
    },
    KeyUsageNotification { accessor: UserId },

    // locker: config-dependent notices
    HeavyDoor,

    // protector denials
    DeniedBuild,
    DeniedUse,
    DeniedUseItem,
    DeniedSpawn,
    DeniedExplosion,
    DeniedCommand,
    DeniedMove,
    DeniedExit,
    DeniedEnter,
}
