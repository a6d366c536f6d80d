//! Persisted row shapes and their tree keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::host::{EntityId, UserId, WorldId};
use crate::locker::types::LockId;
use crate::math::BlockPos;

/// One protection record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRow {
    pub id: LockId,
    pub owner_id: UserId,
    pub flags: u16,
    pub protected_type: i8,
    pub lock_type: i8,
    /// Password digest or KeyBook color pass.
    #[serde(with = "hex_bytes")]
    pub secret: Vec<u8>,
    pub entity_uid: Option<EntityId>,
    pub last_access: DateTime<Utc>,
    pub created: DateTime<Utc>,
}

impl LockRow {
    pub fn key(id: LockId) -> String {
        format!("lock:{:020}", id)
    }

    /// Secondary index key mapping a protected entity to its lock.
    pub fn entity_key(entity: &EntityId) -> String {
        format!("entity:{}", entity)
    }
}

/// One covered block position of a block lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockLocationRow {
    pub lock_id: LockId,
    pub world_id: WorldId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub chunk_x: i32,
    pub chunk_z: i32,
}

impl LockLocationRow {
    pub fn new(lock_id: LockId, world_id: WorldId, pos: BlockPos) -> Self {
        let chunk = pos.chunk();
        Self {
            lock_id,
            world_id,
            x: pos.x,
            y: pos.y,
            z: pos.z,
            chunk_x: chunk.x,
            chunk_z: chunk.z,
        }
    }

    pub fn pos(&self) -> BlockPos {
        BlockPos::new(self.x, self.y, self.z)
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.world_id, &self.pos())
    }

    pub fn key_for(world: &WorldId, pos: &BlockPos) -> String {
        format!("loc:{}:{}:{}:{}", world, pos.x, pos.y, pos.z)
    }

    pub fn world_prefix(world: &WorldId) -> String {
        format!("loc:{}:", world)
    }
}

/// Scope of an access entry: one lock, or all locks of one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessScope {
    Lock { lock_id: LockId, user: UserId },
    Owner { owner: UserId, user: UserId },
}

impl AccessScope {
    pub fn key(&self) -> String {
        match self {
            AccessScope::Lock { lock_id, user } => {
                format!("acc:lock:{:020}:{}", lock_id, user)
            }
            AccessScope::Owner { owner, user } => format!("acc:owner:{}:{}", owner, user),
        }
    }

    pub fn lock_prefix(lock_id: LockId) -> String {
        format!("acc:lock:{:020}:", lock_id)
    }

    pub fn owner_prefix(owner: &UserId) -> String {
        format!("acc:owner:{}:", owner)
    }
}

/// One access-list entry. Uniqueness per scope is enforced by the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRow {
    pub scope: AccessScope,
    pub level: u16,
}

impl AccessRow {
    pub fn key(&self) -> String {
        self.scope.key()
    }

    pub fn user(&self) -> UserId {
        match self.scope {
            AccessScope::Lock { user, .. } | AccessScope::Owner { user, .. } => user,
        }
    }
}

/// Secrets are persisted hex-encoded so dumps stay readable.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(&encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_lock_row_json_round_trip() {
        let row = LockRow {
            id: 42,
            owner_id: Uuid::new_v4(),
            flags: 0b100_0010,
            protected_type: 1,
            lock_type: 1,
            secret: vec![0xde, 0xad, 0xbe, 0xef],
            entity_uid: None,
            last_access: Utc::now(),
            created: Utc::now(),
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("deadbeef"));
        let back: LockRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_lock_keys_sort_numerically() {
        assert!(LockRow::key(9) < LockRow::key(10));
        assert!(LockRow::key(99) < LockRow::key(100));
    }

    #[test]
    fn test_location_row_derives_chunk() {
        let row = LockLocationRow::new(1, Uuid::new_v4(), BlockPos::new(17, 64, -3));
        assert_eq!(row.chunk_x, 1);
        assert_eq!(row.chunk_z, -1);
        assert_eq!(row.pos(), BlockPos::new(17, 64, -3));
    }

    #[test]
    fn test_access_scope_keys_disjoint() {
        let user = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let lock_scope = AccessScope::Lock { lock_id: 1, user };
        let owner_scope = AccessScope::Owner { owner, user };
        assert_ne!(lock_scope.key(), owner_scope.key());
        assert!(lock_scope.key().starts_with(&AccessScope::lock_prefix(1)));
        assert!(owner_scope
            .key()
            .starts_with(&AccessScope::owner_prefix(&owner)));
    }
}
