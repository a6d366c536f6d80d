//! Cancellable gameplay events delivered by the host event bus.
//!
//! Each event carries the actor identity (absent for non-player causes),
//! the affected location(s) and a cancel flag the engine may set - or
//! clear, since some host events (explosion block damage) arrive
//! pre-cancelled and a definite `True` region opinion must be able to
//! revive them.

use uuid::Uuid;

use crate::host::{EntityId, UserId, WorldId};
use crate::math::{BlockPos, Vec3};

/// Common cancel-flag access for all events.
pub trait Cancellable {
    fn is_cancelled(&self) -> bool;
    fn set_cancelled(&mut self, cancelled: bool);
}

macro_rules! impl_cancellable {
    ($($event:ty),* $(,)?) => {
        $(impl Cancellable for $event {
            fn is_cancelled(&self) -> bool {
                self.cancelled
            }
            fn set_cancelled(&mut self, cancelled: bool) {
                self.cancelled = cancelled;
            }
        })*
    };
}

/// What caused a set of blocks to change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockChangeCause {
    /// A player placing or breaking blocks directly.
    Player,
    /// An explosion; `igniter` is the player responsible, when known.
    Explosion { igniter: Option<UserId> },
    /// A hostile mob (enderman pickup, creeper step-on, ...).
    Monster,
    /// Another block (piston, fire, falling block), by block-type id.
    Block(String),
    Lightning,
}

/// Blocks being placed, broken or otherwise rewritten.
#[derive(Debug, Clone)]
pub struct BlockChangeEvent {
    pub world: WorldId,
    pub actor: Option<UserId>,
    pub cause: BlockChangeCause,
    /// One entry per affected block, with its pre-change type id.
    pub transactions: Vec<(BlockPos, String)>,
    pub cancelled: bool,
}

/// Capabilities of the clicked block, precomputed by the host from block
/// state (the engine has no block registry).
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockTraits {
    /// Doors, gates, trapdoors.
    pub openable: bool,
    /// Current open state of an openable block.
    pub is_open: bool,
    /// Levers, buttons, pressure-sensitive blocks.
    pub powerable: bool,
    /// Backed by an inventory.
    pub container: bool,
}

/// A player right-clicking a block, possibly with an item in hand.
#[derive(Debug, Clone)]
pub struct InteractBlockEvent {
    pub world: WorldId,
    pub pos: BlockPos,
    pub actor: UserId,
    pub block_type: String,
    pub traits: BlockTraits,
    pub item_in_hand: Option<String>,
    pub cancelled: bool,
}

/// A player using an item without a block target.
#[derive(Debug, Clone)]
pub struct InteractItemEvent {
    pub world: WorldId,
    pub pos: BlockPos,
    pub actor: UserId,
    pub item: String,
    pub cancelled: bool,
}

/// A player interacting with an entity.
#[derive(Debug, Clone)]
pub struct InteractEntityEvent {
    pub world: WorldId,
    pub pos: BlockPos,
    pub actor: UserId,
    pub entity: EntityId,
    pub entity_type: String,
    pub cancelled: bool,
}

/// The source of entity damage, reduced to what the resolvers distinguish.
#[derive(Debug, Clone, Default)]
pub struct DamageSource {
    pub entity: Option<EntityId>,
    pub entity_type: Option<String>,
    pub living: bool,
    /// Set when the (possibly indirect) source is a player.
    pub player: Option<UserId>,
}

/// An entity taking damage.
#[derive(Debug, Clone)]
pub struct DamageEntityEvent {
    pub world: WorldId,
    pub pos: BlockPos,
    pub entity: EntityId,
    pub entity_type: String,
    /// The damaged entity, when it is a player.
    pub target_player: Option<UserId>,
    pub source: DamageSource,
    pub cancelled: bool,
}

/// Why an entity is spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnCause {
    Natural,
    Player(UserId),
    Plugin { player: Option<UserId> },
}

/// An entity spawning into the world.
#[derive(Debug, Clone)]
pub struct SpawnEntityEvent {
    pub world: WorldId,
    pub pos: BlockPos,
    pub entity_type: String,
    pub cause: SpawnCause,
    pub cancelled: bool,
}

/// Movement flavor; teleports resolve against different settings and
/// bypass nodes than walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Move,
    Teleport,
    TeleportPortal,
}

/// A player moving or teleporting between two positions.
#[derive(Debug, Clone)]
pub struct MoveEvent {
    pub world: WorldId,
    pub actor: UserId,
    pub from: Vec3,
    pub to: Vec3,
    pub kind: MoveKind,
    pub cancelled: bool,
}

/// A hostile mob acquiring a player as its AI target.
#[derive(Debug, Clone)]
pub struct TargetPlayerEvent {
    pub world: WorldId,
    pub pos: BlockPos,
    pub target: UserId,
    pub cancelled: bool,
}

/// A block notifying neighbors, as used for redstone suppression.
#[derive(Debug, Clone)]
pub struct NotifyNeighborEvent {
    pub world: WorldId,
    pub source: BlockPos,
    /// Notified positions with whether the neighbor reacts to redstone.
    pub neighbors: Vec<(BlockPos, bool)>,
    pub cancelled: bool,
}

/// A player executing a command.
#[derive(Debug, Clone)]
pub struct ExecuteCommandEvent {
    pub world: WorldId,
    pub pos: BlockPos,
    pub actor: UserId,
    /// All aliases the host resolves for the executed command.
    pub aliases: Vec<String>,
    pub cancelled: bool,
}

impl_cancellable!(
    BlockChangeEvent,
    InteractBlockEvent,
    InteractItemEvent,
    InteractEntityEvent,
    DamageEntityEvent,
    SpawnEntityEvent,
    MoveEvent,
    TargetPlayerEvent,
    NotifyNeighborEvent,
    ExecuteCommandEvent,
);

/// Convenience constructor for the common single-block change.
impl BlockChangeEvent {
    pub fn single(
        world: WorldId,
        actor: Option<Uuid>,
        cause: BlockChangeCause,
        pos: BlockPos,
        block_type: impl Into<String>,
    ) -> Self {
        Self {
            world,
            actor,
            cause,
            transactions: vec![(pos, block_type.into())],
            cancelled: false,
        }
    }
}
