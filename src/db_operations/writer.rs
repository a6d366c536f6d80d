//! Background write funnel.
//!
//! Gameplay threads mutate the in-memory managers synchronously and queue a
//! [`WriteOp`] here; a dedicated writer thread applies the ops to sled and
//! flushes. Failures are logged and never propagate back - the in-memory
//! state already moved on, which is the accepted consistency trade-off.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};

use crate::db_operations::core::DbOperations;
use crate::db_operations::rows::{AccessRow, AccessScope, LockLocationRow, LockRow};
use crate::error::BlockwardResult;
use crate::host::{EntityId, WorldId};
use crate::locker::types::LockId;
use crate::math::BlockPos;

/// A single persistence mutation.
#[derive(Debug, Clone)]
pub enum WriteOp {
    UpsertLock(LockRow),
    /// Removes the lock row, its entity index entry and all of its
    /// lock-scoped access rows.
    DeleteLock {
        id: LockId,
        entity: Option<EntityId>,
    },
    PutLocation(LockLocationRow),
    DeleteLocation {
        world: WorldId,
        pos: BlockPos,
    },
    UpsertAccess(AccessRow),
    DeleteAccess(AccessScope),
    /// Whole-file region document save (the document is already encoded).
    SaveRegionDoc {
        path: PathBuf,
        contents: Vec<u8>,
    },
    DeleteRegionDoc {
        path: PathBuf,
    },
}

/// Cloneable submission handle used by the managers.
#[derive(Clone)]
pub struct StorageHandle {
    tx: Sender<WriteOp>,
}

impl StorageHandle {
    /// Fire-and-forget submission. A disconnected writer (engine shutting
    /// down) is logged, not propagated.
    pub fn submit(&self, op: WriteOp) {
        if self.tx.send(op).is_err() {
            error!("storage writer is gone; dropping write op");
        }
    }
}

/// The writer thread. Dropping every [`StorageHandle`] lets it drain its
/// queue and exit; `join` waits for that.
pub struct StorageWriter {
    handle: Option<JoinHandle<()>>,
}

impl StorageWriter {
    /// Spawns the writer over clones of the database trees.
    pub fn spawn(ops: DbOperations) -> (StorageHandle, StorageWriter) {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("blockward-storage".into())
            .spawn(move || run(ops, rx))
            .expect("failed to spawn storage writer thread");
        (
            StorageHandle { tx },
            StorageWriter {
                handle: Some(handle),
            },
        )
    }

    /// Waits for the writer to drain and exit. Call after dropping all
    /// handles (and the managers holding them).
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

fn run(ops: DbOperations, rx: Receiver<WriteOp>) {
    info!("storage writer started");
    while let Ok(op) = rx.recv() {
        if let Err(e) = apply(&ops, &op) {
            error!("persistence failure (state not rolled back): {e}");
        }
    }
    if let Err(e) = flush(&ops) {
        error!("final flush failed: {e}");
    }
    info!("storage writer stopped");
}

fn flush(ops: &DbOperations) -> BlockwardResult<()> {
    ops.locks_tree.flush()?;
    ops.locations_tree.flush()?;
    ops.access_tree.flush()?;
    Ok(())
}

fn apply(ops: &DbOperations, op: &WriteOp) -> BlockwardResult<()> {
    match op {
        WriteOp::UpsertLock(row) => {
            DbOperations::store_in_tree(&ops.locks_tree, &LockRow::key(row.id), row)?;
            if let Some(entity) = &row.entity_uid {
                ops.locks_tree.insert(
                    LockRow::entity_key(entity).as_bytes(),
                    row.id.to_string().into_bytes(),
                )?;
            }
            ops.locks_tree.flush()?;
        }
        WriteOp::DeleteLock { id, entity } => {
            DbOperations::delete_from_tree(&ops.locks_tree, &LockRow::key(*id))?;
            if let Some(entity) = entity {
                DbOperations::delete_from_tree(&ops.locks_tree, &LockRow::entity_key(entity))?;
            }
            let prefix = AccessScope::lock_prefix(*id);
            let stale: Vec<_> = ops
                .access_tree
                .scan_prefix(prefix.as_bytes())
                .keys()
                .collect::<Result<_, _>>()?;
            for key in stale {
                ops.access_tree.remove(key)?;
            }
            ops.locks_tree.flush()?;
            ops.access_tree.flush()?;
        }
        WriteOp::PutLocation(row) => {
            DbOperations::store_in_tree(&ops.locations_tree, &row.key(), row)?;
            ops.locations_tree.flush()?;
        }
        WriteOp::DeleteLocation { world, pos } => {
            DbOperations::delete_from_tree(
                &ops.locations_tree,
                &LockLocationRow::key_for(world, pos),
            )?;
            ops.locations_tree.flush()?;
        }
        WriteOp::UpsertAccess(row) => {
            DbOperations::store_in_tree(&ops.access_tree, &row.key(), row)?;
            ops.access_tree.flush()?;
        }
        WriteOp::DeleteAccess(scope) => {
            DbOperations::delete_from_tree(&ops.access_tree, &scope.key())?;
            ops.access_tree.flush()?;
        }
        WriteOp::SaveRegionDoc { path, contents } => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
            debug!("saved region document {}", path.display());
        }
        WriteOp::DeleteRegionDoc { path } => {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            debug!("deleted region document {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn db() -> DbOperations {
        let dir = tempfile::tempdir().unwrap().into_path();
        let sled = sled::Config::new()
            .path(dir)
            .temporary(true)
            .open()
            .unwrap();
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
    fn test_writer_applies_queued_ops_before_join() {
        let ops = db();
        let (handle, writer) = StorageWriter::spawn(ops.clone());

        let row = lock_row(1);
        let world = Uuid::new_v4();
        handle.submit(WriteOp::UpsertLock(row.clone()));
        handle.submit(WriteOp::PutLocation(LockLocationRow::new(
            1,
            world,
            BlockPos::new(10, 64, 10),
        )));
        handle.submit(WriteOp::UpsertAccess(AccessRow {
            scope: AccessScope::Lock {
                lock_id: 1,
                user: Uuid::new_v4(),
            },
            level: 3,
        }));

        drop(handle);
        writer.join();

        assert_eq!(ops.get_lock(1).unwrap(), Some(row));
        assert_eq!(ops.locations_in_world(&world, None).unwrap().len(), 1);
        assert_eq!(ops.lock_access_rows(1).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_lock_sweeps_access_rows() {
        let ops = db();
        let (handle, writer) = StorageWriter::spawn(ops.clone());

        let entity = Uuid::new_v4();
        let mut row = lock_row(2);
        row.entity_uid = Some(entity);
        handle.submit(WriteOp::UpsertLock(row));
        for _ in 0..3 {
            handle.submit(WriteOp::UpsertAccess(AccessRow {
                scope: AccessScope::Lock {
                    lock_id: 2,
                    user: Uuid::new_v4(),
                },
                level: 1,
            }));
        }
        handle.submit(WriteOp::DeleteLock {
            id: 2,
            entity: Some(entity),
        });

        drop(handle);
        writer.join();

        assert_eq!(ops.get_lock(2).unwrap(), None);
        assert_eq!(ops.get_entity_lock(&entity).unwrap(), None);
        assert!(ops.lock_access_rows(2).unwrap().is_empty());
    }
}
