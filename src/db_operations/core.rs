//! Read facade over the sled database.
//!
//! Opens and caches the named trees once and exposes typed queries for the
//! managers. Generic helpers serialize through `serde_json`; every
//! persisted value is a JSON document.

use serde::{de::DeserializeOwned, Serialize};

use crate::db_operations::rows::{AccessRow, AccessScope, LockLocationRow, LockRow};
use crate::error::{BlockwardError, BlockwardResult};
use crate::host::{EntityId, UserId, WorldId};
use crate::locker::types::LockId;
use crate::math::ChunkPos;

#[derive(Clone)]
pub struct DbOperations {
    db: sled::Db,
    pub(crate) locks_tree: sled::Tree,
    pub(crate) locations_tree: sled::Tree,
    pub(crate) access_tree: sled::Tree,
}

impl DbOperations {
    pub fn new(db: sled::Db) -> BlockwardResult<Self> {
        let locks_tree = db.open_tree("locks")?;
        let locations_tree = db.open_tree("lock_locations")?;
        let access_tree = db.open_tree("access_list")?;
        Ok(Self {
            db,
            locks_tree,
            locations_tree,
            access_tree,
        })
    }

    /// Allocates a fresh lock id.
    pub fn next_lock_id(&self) -> BlockwardResult<LockId> {
        Ok(self.db.generate_id()?)
    }

    pub(crate) fn store_in_tree<T: Serialize>(
        tree: &sled::Tree,
        key: &str,
        item: &T,
    ) -> BlockwardResult<()> {
        let bytes = serde_json::to_vec(item)?;
        tree.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    pub(crate) fn get_from_tree<T: DeserializeOwned>(
        tree: &sled::Tree,
        key: &str,
    ) -> BlockwardResult<Option<T>> {
        match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn delete_from_tree(tree: &sled::Tree, key: &str) -> BlockwardResult<bool> {
        Ok(tree.remove(key.as_bytes())?.is_some())
    }

    fn scan_values<T: DeserializeOwned>(
        tree: &sled::Tree,
        prefix: &str,
    ) -> BlockwardResult<Vec<T>> {
        let mut items = Vec::new();
        for entry in tree.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }

    pub fn get_lock(&self, id: LockId) -> BlockwardResult<Option<LockRow>> {
        Self::get_from_tree(&self.locks_tree, &LockRow::key(id))
    }

    /// Resolves an entity-bound lock through the secondary index.
    pub fn get_entity_lock(&self, entity: &EntityId) -> BlockwardResult<Option<LockRow>> {
        let key = LockRow::entity_key(entity);
        let Some(bytes) = self.locks_tree.get(key.as_bytes())? else {
            return Ok(None);
        };
        let id_text = String::from_utf8(bytes.to_vec())
            .map_err(|e| BlockwardError::InvalidData(format!("entity index: {e}")))?;
        let id: LockId = id_text
            .parse()
            .map_err(|e| BlockwardError::InvalidData(format!("entity index: {e}")))?;
        self.get_lock(id)
    }

    pub fn all_locks(&self) -> BlockwardResult<Vec<LockRow>> {
        Self::scan_values(&self.locks_tree, "lock:")
    }

    /// Location rows of one world, optionally restricted to a chunk
    /// rectangle (inclusive corners).
    pub fn locations_in_world(
        &self,
        world: &WorldId,
        chunk_rect: Option<(ChunkPos, ChunkPos)>,
    ) -> BlockwardResult<Vec<LockLocationRow>> {
        let rows: Vec<LockLocationRow> =
            Self::scan_values(&self.locations_tree, &LockLocationRow::world_prefix(world))?;
        Ok(match chunk_rect {
            None => rows,
            Some((min, max)) => rows
                .into_iter()
                .filter(|row| {
                    row.chunk_x >= min.x
                        && row.chunk_x <= max.x
                        && row.chunk_z >= min.z
                        && row.chunk_z <= max.z
                })
                .collect(),
        })
    }

    pub fn lock_access_rows(&self, lock_id: LockId) -> BlockwardResult<Vec<AccessRow>> {
        Self::scan_values(&self.access_tree, &AccessScope::lock_prefix(lock_id))
    }

    pub fn owner_access_rows(&self, owner: &UserId) -> BlockwardResult<Vec<AccessRow>> {
        Self::scan_values(&self.access_tree, &AccessScope::owner_prefix(owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::BlockPos;
    use chrono::Utc;
    use uuid::Uuid;

    fn db() -> DbOperations {
        let dir = tempfile::tempdir().unwrap().into_path();
        let sled = sled::Config::new().path(dir).temporary(true).open().unwrap();
        DbOperations::new(sled).unwrap()
    }

    fn lock_row(id: LockId) -> LockRow {
        LockRow {
            id,
            owner_id: Uuid::new_v4(),
            flags: 0,
            protected_type: 1,
            lock_type: 1,
            secret: vec![1, 2, 3, 4],
            entity_uid: None,
            last_access: Utc::now(),
            created: Utc::now(),
        }
    }

    #[test]
    fn test_lock_store_and_get() {
        let ops = db();
        let row = lock_row(5);
        DbOperations::store_in_tree(&ops.locks_tree, &LockRow::key(5), &row).unwrap();
        assert_eq!(ops.get_lock(5).unwrap(), Some(row));
        assert_eq!(ops.get_lock(6).unwrap(), None);
    }

    #[test]
    fn test_locations_chunk_filter() {
        let ops = db();
        let world = Uuid::new_v4();
        for (id, pos) in [
            (1, BlockPos::new(5, 64, 5)),     // chunk 0,0
            (2, BlockPos::new(40, 64, 5)),    // chunk 2,0
            (3, BlockPos::new(-20, 64, -20)), // chunk -2,-2
        ] {
            let row = LockLocationRow::new(id, world, pos);
            DbOperations::store_in_tree(&ops.locations_tree, &row.key(), &row).unwrap();
        }

        let all = ops.locations_in_world(&world, None).unwrap();
        assert_eq!(all.len(), 3);

        let window = ops
            .locations_in_world(&world, Some((ChunkPos::new(0, 0), ChunkPos::new(2, 0))))
            .unwrap();
        let ids: Vec<_> = window.iter().map(|row| row.lock_id).collect();
        assert_eq!(window.len(), 2);
        assert!(ids.contains(&1) && ids.contains(&2));
    }

    #[test]
    fn test_entity_index() {
        let ops = db();
        let entity = Uuid::new_v4();
        let mut row = lock_row(9);
        row.entity_uid = Some(entity);
        DbOperations::store_in_tree(&ops.locks_tree, &LockRow::key(9), &row).unwrap();
        ops.locks_tree
            .insert(LockRow::entity_key(&entity).as_bytes(), b"9".to_vec())
            .unwrap();

        assert_eq!(ops.get_entity_lock(&entity).unwrap(), Some(row));
        assert_eq!(ops.get_entity_lock(&Uuid::new_v4()).unwrap(), None);
    }
}
