//! Lock classification: protection kinds, lock types, flags and access
//! levels.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Lock identifier, allocated by the storage layer.
pub type LockId = u64;

/// What a lock protects. The kind constrains which [`LockType`]s and
/// [`ProtectionFlag`]s are valid for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtectedType {
    Container,
    Door,
    Block,
    EntityContainer,
    EntityLiving,
    EntityVehicle,
    Entity,
    EntityContainerLiving,
}

impl ProtectedType {
    pub fn id(&self) -> i8 {
        match self {
            ProtectedType::Container => 1,
            ProtectedType::Door => 2,
            ProtectedType::Block => 3,
            ProtectedType::EntityContainer => 4,
            ProtectedType::EntityLiving => 5,
            ProtectedType::EntityVehicle => 6,
            ProtectedType::Entity => 7,
            ProtectedType::EntityContainerLiving => 8,
        }
    }

    pub fn from_id(id: i8) -> Option<ProtectedType> {
        match id {
            1 => Some(ProtectedType::Container),
            2 => Some(ProtectedType::Door),
            3 => Some(ProtectedType::Block),
            4 => Some(ProtectedType::EntityContainer),
            5 => Some(ProtectedType::EntityLiving),
            6 => Some(ProtectedType::EntityVehicle),
            7 => Some(ProtectedType::Entity),
            8 => Some(ProtectedType::EntityContainerLiving),
            _ => None,
        }
    }

    /// Whether this kind carries an inventory (in/out access semantics).
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ProtectedType::Container
                | ProtectedType::EntityContainer
                | ProtectedType::EntityContainerLiving
        )
    }

    pub fn is_entity(&self) -> bool {
        matches!(
            self,
            ProtectedType::EntityContainer
                | ProtectedType::EntityLiving
                | ProtectedType::EntityVehicle
                | ProtectedType::Entity
                | ProtectedType::EntityContainerLiving
        )
    }

    /// Flags that make sense for this kind.
    pub fn supported_flags(&self) -> &'static [ProtectionFlag] {
        use ProtectionFlag::*;
        match self {
            ProtectedType::Container => &[
                HopperIn,
                HopperMinecartIn,
                HopperMinecartOut,
                HopperOut,
                BlockRedstone,
                NotifyAccess,
            ],
            ProtectedType::Door => &[BlockRedstone, Autoclose, NotifyAccess],
            ProtectedType::Block => &[BlockRedstone, NotifyAccess],
            ProtectedType::EntityContainer | ProtectedType::EntityContainerLiving => &[
                HopperIn,
                HopperMinecartIn,
                HopperMinecartOut,
                HopperOut,
                NotifyAccess,
            ],
            _ => &[NotifyAccess],
        }
    }

    /// Classifies a block-type id, defaulting to a plain block.
    pub fn for_block(block_type: &str) -> ProtectedType {
        BLOCK_KINDS
            .get(block_type)
            .copied()
            .unwrap_or(ProtectedType::Block)
    }

    /// Classifies an entity-type id. Unknown living types protect as
    /// living entities; anything else is not protectable.
    pub fn for_entity(entity_type: &str, living: bool, hostile: bool) -> Option<ProtectedType> {
        if let Some(kind) = ENTITY_KINDS.get(entity_type) {
            return Some(*kind);
        }
        if living && !hostile {
            return Some(ProtectedType::EntityLiving);
        }
        None
    }
}

static BLOCK_KINDS: Lazy<HashMap<&'static str, ProtectedType>> = Lazy::new(|| {
    use ProtectedType::*;
    let mut map = HashMap::new();
    for id in [
        "minecraft:chest",
        "minecraft:trapped_chest",
        "minecraft:dispenser",
        "minecraft:dropper",
        "minecraft:furnace",
        "minecraft:blast_furnace",
        "minecraft:smoker",
        "minecraft:brewing_stand",
        "minecraft:beacon",
        "minecraft:hopper",
        "minecraft:barrel",
        "minecraft:shulker_box",
    ] {
        map.insert(id, Container);
    }
    for id in [
        "minecraft:oak_door",
        "minecraft:spruce_door",
        "minecraft:birch_door",
        "minecraft:jungle_door",
        "minecraft:acacia_door",
        "minecraft:dark_oak_door",
        "minecraft:iron_door",
        "minecraft:oak_fence_gate",
        "minecraft:spruce_fence_gate",
        "minecraft:birch_fence_gate",
        "minecraft:jungle_fence_gate",
        "minecraft:acacia_fence_gate",
        "minecraft:dark_oak_fence_gate",
        "minecraft:oak_trapdoor",
        "minecraft:iron_trapdoor",
    ] {
        map.insert(id, Door);
    }
    map
});

static ENTITY_KINDS: Lazy<HashMap<&'static str, ProtectedType>> = Lazy::new(|| {
    use ProtectedType::*;
    let mut map = HashMap::new();
    map.insert("minecraft:chest_minecart", EntityContainer);
    map.insert("minecraft:hopper_minecart", EntityContainer);
    map.insert("minecraft:horse", EntityContainerLiving);
    map.insert("minecraft:donkey", EntityContainerLiving);
    map.insert("minecraft:mule", EntityContainerLiving);
    map.insert("minecraft:leash_knot", Entity);
    map.insert("minecraft:painting", Entity);
    map.insert("minecraft:item_frame", Entity);
    map.insert("minecraft:furnace_minecart", Entity);
    map.insert("minecraft:tnt_minecart", Entity);
    map.insert("minecraft:spawner_minecart", Entity);
    map.insert("minecraft:boat", EntityVehicle);
    map.insert("minecraft:minecart", EntityVehicle);
    map
});

/// Default in/out semantics of a lock, independent of its access list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockType {
    Private,
    Public,
    Guarded,
    Donation,
    Free,
}

impl LockType {
    pub fn id(&self) -> i8 {
        match self {
            LockType::Private => 1,
            LockType::Public => 2,
            LockType::Guarded => 3,
            LockType::Donation => 4,
            LockType::Free => 5,
        }
    }

    pub fn from_id(id: i8) -> Option<LockType> {
        match id {
            1 => Some(LockType::Private),
            2 => Some(LockType::Public),
            3 => Some(LockType::Guarded),
            4 => Some(LockType::Donation),
            5 => Some(LockType::Free),
            _ => None,
        }
    }

    /// Kinds this lock type may protect. Guarded, donation and free locks
    /// only make sense on inventories.
    pub fn supports(&self, kind: ProtectedType) -> bool {
        match self {
            LockType::Private | LockType::Public => true,
            LockType::Guarded | LockType::Donation | LockType::Free => kind.is_container(),
        }
    }
}

/// Flags a protection can carry, packed into the persisted flag word.
///
/// Only [`ProtectionFlag::Autoclose`] and [`ProtectionFlag::NotifyAccess`]
/// have engine behavior; the hopper and redstone flags are carried,
/// validated and exposed for the host listeners that filter those systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtectionFlag {
    /// Ignore redstone changes to the protected block.
    BlockRedstone,
    /// Close doors again after the configured delay.
    Autoclose,
    /// Allow hopper blocks to push items in.
    HopperIn,
    /// Allow hopper blocks to pull items out.
    HopperOut,
    /// Allow hopper minecarts to pull items out.
    HopperMinecartOut,
    /// Allow hopper minecarts to push items in.
    HopperMinecartIn,
    /// Notify the owner when someone else accesses the protection.
    NotifyAccess,
}

impl ProtectionFlag {
    pub const NONE: u16 = 0;

    pub fn bit(&self) -> u16 {
        match self {
            ProtectionFlag::BlockRedstone => 1,
            ProtectionFlag::Autoclose => 1 << 1,
            ProtectionFlag::HopperIn => 1 << 2,
            ProtectionFlag::HopperOut => 1 << 3,
            ProtectionFlag::HopperMinecartOut => 1 << 4,
            ProtectionFlag::HopperMinecartIn => 1 << 5,
            ProtectionFlag::NotifyAccess => 1 << 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProtectionFlag::BlockRedstone => "blockredstone",
            ProtectionFlag::Autoclose => "autoclose",
            ProtectionFlag::HopperIn => "hopperIn",
            ProtectionFlag::HopperOut => "hopperOut",
            ProtectionFlag::HopperMinecartOut => "minecartOut",
            ProtectionFlag::HopperMinecartIn => "minecartIn",
            ProtectionFlag::NotifyAccess => "notify",
        }
    }

    pub fn all() -> &'static [ProtectionFlag] {
        &[
            ProtectionFlag::BlockRedstone,
            ProtectionFlag::Autoclose,
            ProtectionFlag::HopperIn,
            ProtectionFlag::HopperOut,
            ProtectionFlag::HopperMinecartOut,
            ProtectionFlag::HopperMinecartIn,
            ProtectionFlag::NotifyAccess,
        ]
    }

    pub fn by_name(name: &str) -> Option<ProtectionFlag> {
        FLAGS_BY_NAME.get(name).copied()
    }
}

static FLAGS_BY_NAME: Lazy<HashMap<&'static str, ProtectionFlag>> = Lazy::new(|| {
    ProtectionFlag::all()
        .iter()
        .map(|flag| (flag.name(), *flag))
        .collect()
});

/// Per-user grant bits on a lock or on all of an owner's locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLevel(pub u16);

impl AccessLevel {
    /// Take items out of an inventory.
    pub const TAKE: AccessLevel = AccessLevel(1);
    /// Put items into an inventory.
    pub const PUT: AccessLevel = AccessLevel(1 << 1);
    /// Manage the access list.
    pub const ADMIN: AccessLevel = AccessLevel(1 << 2);
    pub const FULL: AccessLevel = AccessLevel(Self::TAKE.0 | Self::PUT.0);
    pub const ALL: AccessLevel = AccessLevel(Self::FULL.0 | Self::ADMIN.0);

    pub fn contains(&self, other: AccessLevel) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn can_in(&self) -> bool {
        self.contains(Self::PUT)
    }

    pub fn can_out(&self) -> bool {
        self.contains(Self::TAKE)
    }

    pub fn is_admin(&self) -> bool {
        self.contains(Self::ADMIN)
    }
}
