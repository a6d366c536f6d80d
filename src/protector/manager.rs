//! Region lifecycle, spatial lookup and document persistence.
//!
//! Regions live in chunk buckets per world plus a per-point result cache
//! that is invalidated wholesale on any region mutation. Every lookup
//! resolves global region, world region and containing named regions, in
//! descending priority with insertion order breaking ties. Documents are
//! saved whole through the storage writer, one JSON file per region.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use uuid::Uuid;

use crate::db_operations::{StorageHandle, WriteOp};
use crate::error::{BlockwardError, BlockwardResult};
use crate::host::{UserId, WorldId};
use crate::math::{BlockPos, Cuboid, Vec3};
use crate::protector::region::{Region, RegionConfig};
use crate::protector::settings::Settings;

pub struct RegionManager {
    regions_path: PathBuf,
    storage: StorageHandle,

    global: Arc<Region>,
    world_regions: HashMap<WorldId, Arc<Region>>,
    /// Named regions per world, in insertion order.
    named: HashMap<WorldId, Vec<Arc<Region>>>,
    /// Chunk buckets of named region names per world.
    by_chunk: HashMap<WorldId, HashMap<u64, Vec<String>>>,

    /// Per-point resolution cache, cleared by [`RegionManager::mark_dirty`].
    cache: HashMap<WorldId, HashMap<BlockPos, Vec<Arc<Region>>>>,

    /// Region a command source last selected; session-scoped convenience
    /// for the command layer.
    active_region: HashMap<UserId, (WorldId, String)>,
}

impl RegionManager {
    /// Opens the manager over a region document directory, loading the
    /// global region (created on first use) and every named region on disk.
    pub fn new(regions_path: impl Into<PathBuf>, storage: StorageHandle) -> BlockwardResult<Self> {
        let regions_path = regions_path.into();
        std::fs::create_dir_all(&regions_path)?;

        let global_path = regions_path.join("global.json");
        let global = Arc::new(Region::new(
            load_or_init_config(&global_path, "global", None, None)?,
            global_path,
        ));

        let mut manager = Self {
            regions_path,
            storage,
            global,
            world_regions: HashMap::new(),
            named: HashMap::new(),
            by_chunk: HashMap::new(),
            cache: HashMap::new(),
            active_region: HashMap::new(),
        };
        manager.reload()?;
        Ok(manager)
    }

    /// Re-reads every named region document from disk, rebuilding all
    /// indexes.
    pub fn reload(&mut self) -> BlockwardResult<()> {
        self.named.clear();
        self.by_chunk.clear();
        self.mark_dirty();

        for world_dir in std::fs::read_dir(&self.regions_path)? {
            let world_dir = world_dir?;
            if !world_dir.file_type()?.is_dir() {
                continue;
            }
            let Ok(world) = world_dir.file_name().to_string_lossy().parse::<Uuid>() else {
                warn!(
                    "skipping region directory with non-world name {:?}",
                    world_dir.file_name()
                );
                continue;
            };
            let mut entries: Vec<PathBuf> = std::fs::read_dir(world_dir.path())?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .filter(|p| p.file_name().is_some_and(|name| name != "world.json"))
                .collect();
            // Deterministic insertion order across restarts.
            entries.sort();

            for path in entries {
                match read_config(&path) {
                    Ok(config) => {
                        let region = Arc::new(Region::new(config, path));
                        self.index_region(world, region);
                    }
                    Err(e) => warn!("skipping unreadable region {}: {e}", path.display()),
                }
            }
        }
        info!("loaded {} regions", self.region_count());
        Ok(())
    }

    fn index_region(&mut self, world: WorldId, region: Arc<Region>) {
        if let Some(cuboid) = region.cuboid() {
            let buckets = self.by_chunk.entry(world).or_default();
            for chunk in cuboid.chunks() {
                buckets
                    .entry(chunk.chunk_key())
                    .or_default()
                    .push(region.name().to_lowercase());
            }
        }
        self.named.entry(world).or_default().push(region);
    }

    // ---- lookup -----------------------------------------------------------

    pub fn global_region(&self) -> &Arc<Region> {
        &self.global
    }

    /// The always-present per-world region, created (and persisted) on
    /// first use.
    pub fn world_region(&mut self, world: WorldId) -> Arc<Region> {
        if let Some(region) = self.world_regions.get(&world) {
            return region.clone();
        }
        let path = self.regions_path.join(world.to_string()).join("world.json");
        let config = match load_or_init_config(&path, "world", Some(world), None) {
            Ok(config) => config,
            Err(e) => {
                warn!("could not load world region, using defaults: {e}");
                RegionConfig {
                    name: "world".into(),
                    world: Some(world),
                    cuboid: None,
                    priority: 0,
                    settings: Settings::default(),
                }
            }
        };
        let region = Arc::new(Region::new(config, path));
        self.save_region(&region);
        self.world_regions.insert(world, region.clone());
        region
    }

    pub fn get_region(&self, world: WorldId, name: &str) -> Option<&Arc<Region>> {
        let lower = name.to_lowercase();
        self.named
            .get(&world)?
            .iter()
            .find(|region| region.name().to_lowercase() == lower)
    }

    pub fn has_region(&self, world: WorldId, name: &str) -> bool {
        self.get_region(world, name).is_some()
    }

    pub fn regions(&self, world: WorldId) -> &[Arc<Region>] {
        self.named.get(&world).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn region_count(&self) -> usize {
        self.named.values().map(Vec::len).sum()
    }

    /// All regions applicable at a position: global, world region, then
    /// every named region containing the point; the whole list ordered by
    /// priority (descending, stable).
    ///
    /// Results are cached per block position until the next mutation.
    pub fn regions_at(&mut self, world: WorldId, pos: BlockPos) -> Vec<Arc<Region>> {
        if let Some(hit) = self.cache.get(&world).and_then(|c| c.get(&pos)) {
            return hit.clone();
        }
        let resolved = self.resolve(world, pos);
        self.cache
            .entry(world)
            .or_default()
            .insert(pos, resolved.clone());
        resolved
    }

    fn resolve(&mut self, world: WorldId, pos: BlockPos) -> Vec<Arc<Region>> {
        let mut result = vec![self.global.clone(), self.world_region(world)];

        let probe = Vec3::new(pos.x as f64, pos.y as f64, pos.z as f64);
        let bucket = self
            .by_chunk
            .get(&world)
            .and_then(|buckets| buckets.get(&pos.chunk().chunk_key()));
        if let Some(names) = bucket {
            let named = self.named.get(&world).map(Vec::as_slice).unwrap_or(&[]);
            for region in named {
                if names.contains(&region.name().to_lowercase())
                    && region.contains_body(&probe)
                {
                    result.push(region.clone());
                }
            }
        }

        // Stable: equal priorities keep global/world first and named
        // regions in insertion order.
        result.sort_by_key(|region| std::cmp::Reverse(region.priority()));
        result
    }

    /// Drops every cached lookup. Called after any region mutation.
    pub fn mark_dirty(&mut self) {
        self.cache.clear();
    }

    // ---- lifecycle --------------------------------------------------------

    /// Defines a new named region and persists its document.
    pub fn define(
        &mut self,
        world: WorldId,
        name: &str,
        cuboid: Cuboid,
        priority: i32,
    ) -> BlockwardResult<Arc<Region>> {
        if name.eq_ignore_ascii_case("global") || name.eq_ignore_ascii_case("world") {
            return Err(BlockwardError::InvalidData(format!(
                "region name {name} is reserved"
            )));
        }
        if self.has_region(world, name) {
            return Err(BlockwardError::InvalidData(format!(
                "region {name} already exists"
            )));
        }
        let path = self
            .regions_path
            .join(world.to_string())
            .join(format!("{}.json", name.to_lowercase()));
        let config = RegionConfig {
            name: name.to_string(),
            world: Some(world),
            cuboid: Some(cuboid),
            priority,
            settings: Settings::default(),
        };
        let region = Arc::new(Region::new(config, path));
        self.save_region(&region);
        self.index_region(world, region.clone());
        self.mark_dirty();
        info!("defined region {name}");
        Ok(region)
    }

    /// Deletes a named region, its document and every index entry.
    pub fn delete(&mut self, world: WorldId, name: &str) -> bool {
        let lower = name.to_lowercase();
        let Some(regions) = self.named.get_mut(&world) else {
            return false;
        };
        let Some(index) = regions
            .iter()
            .position(|region| region.name().to_lowercase() == lower)
        else {
            return false;
        };
        let region = regions.remove(index);
        if let Some(buckets) = self.by_chunk.get_mut(&world) {
            for names in buckets.values_mut() {
                names.retain(|candidate| candidate != &lower);
            }
        }
        self.storage.submit(WriteOp::DeleteRegionDoc {
            path: region.path().to_path_buf(),
        });
        self.mark_dirty();
        info!("deleted region {name}");
        true
    }

    /// Mutates a region's settings (or priority) through a closure, then
    /// saves the document and invalidates lookups.
    pub fn update_region(
        &mut self,
        world: WorldId,
        name: &str,
        mutate: impl FnOnce(&mut RegionConfig),
    ) -> BlockwardResult<()> {
        let lower = name.to_lowercase();

        if lower == "global" {
            let region = Arc::make_mut(&mut self.global);
            mutate(region.config_mut());
            let snapshot = self.global.clone();
            self.save_region(&snapshot);
            self.mark_dirty();
            return Ok(());
        }
        if lower == "world" {
            self.world_region(world);
            let region = self.world_regions.get_mut(&world).expect("created above");
            mutate(Arc::make_mut(region).config_mut());
            let snapshot = region.clone();
            self.save_region(&snapshot);
            self.mark_dirty();
            return Ok(());
        }

        let regions = self
            .named
            .get_mut(&world)
            .ok_or_else(|| BlockwardError::RegionNotFound(name.to_string()))?;
        let region = regions
            .iter_mut()
            .find(|region| region.name().to_lowercase() == lower)
            .ok_or_else(|| BlockwardError::RegionNotFound(name.to_string()))?;
        mutate(Arc::make_mut(region).config_mut());
        let snapshot = region.clone();
        self.save_region(&snapshot);
        self.mark_dirty();
        Ok(())
    }

    fn save_region(&self, region: &Region) {
        match serde_json::to_vec_pretty(region.config()) {
            Ok(contents) => self.storage.submit(WriteOp::SaveRegionDoc {
                path: region.path().to_path_buf(),
                contents,
            }),
            Err(e) => warn!("could not encode region {}: {e}", region.name()),
        }
    }

    // ---- command-source state ---------------------------------------------

    pub fn set_active_region(&mut self, source: UserId, world: WorldId, name: &str) {
        self.active_region.insert(source, (world, name.to_string()));
    }

    pub fn active_region(&self, source: UserId) -> Option<&(WorldId, String)> {
        self.active_region.get(&source)
    }

    pub fn clear_active_region(&mut self, source: UserId) {
        self.active_region.remove(&source);
    }
}

fn read_config(path: &Path) -> BlockwardResult<RegionConfig> {
    let text = std::fs::read(path)?;
    Ok(serde_json::from_slice(&text)?)
}

fn load_or_init_config(
    path: &Path,
    name: &str,
    world: Option<WorldId>,
    cuboid: Option<Cuboid>,
) -> BlockwardResult<RegionConfig> {
    match read_config(path) {
        Ok(config) => Ok(config),
        Err(BlockwardError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(RegionConfig {
            name: name.to_string(),
            world,
            cuboid,
            priority: 0,
            settings: Settings::default(),
        }),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_operations::{DbOperations, StorageWriter};
    use crate::protector::tristate::Tristate;

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

    fn cuboid(min: (i32, i32, i32), max: (i32, i32, i32)) -> Cuboid {
        Cuboid::new(
            BlockPos::new(min.0, min.1, min.2),
            BlockPos::new(max.0, max.1, max.2),
        )
    }

    #[test]
    fn test_global_and_world_always_resolve() {
        let (mut manager, _writer, _dir) = manager();
        let world = Uuid::new_v4();
        let regions = manager.regions_at(world, BlockPos::new(0, 64, 0));
        let names: Vec<_> = regions.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["global", "world"]);
    }

    #[test]
    fn test_disjoint_regions_resolve_exactly() {
        let (mut manager, _writer, _dir) = manager();
        let world = Uuid::new_v4();
        manager
            .define(world, "a", cuboid((0, 0, 0), (15, 255, 15)), 0)
            .unwrap();
        manager
            .define(world, "b", cuboid((32, 0, 32), (47, 255, 47)), 0)
            .unwrap();

        let at_a = manager.regions_at(world, BlockPos::new(8, 64, 8));
        assert!(at_a.iter().any(|r| r.name() == "a"));
        assert!(!at_a.iter().any(|r| r.name() == "b"));

        let outside = manager.regions_at(world, BlockPos::new(100, 64, 100));
        assert!(!outside.iter().any(|r| r.name() == "a" || r.name() == "b"));
    }

    #[test]
    fn test_priority_orders_overlapping_regions() {
        let (mut manager, _writer, _dir) = manager();
        let world = Uuid::new_v4();
        let volume = cuboid((0, 0, 0), (15, 255, 15));
        manager.define(world, "low", volume, 0).unwrap();
        manager.define(world, "high", volume, 10).unwrap();

        let regions = manager.regions_at(world, BlockPos::new(8, 64, 8));
        let names: Vec<_> = regions.iter().map(|r| r.name().to_string()).collect();
        // "high" outranks everything; equal-priority global/world/low keep
        // insertion order.
        assert_eq!(names, vec!["high", "global", "world", "low"]);
    }

    #[test]
    fn test_equal_priority_keeps_insertion_order() {
        let (mut manager, _writer, _dir) = manager();
        let world = Uuid::new_v4();
        let volume = cuboid((0, 0, 0), (15, 255, 15));
        manager.define(world, "first", volume, 0).unwrap();
        manager.define(world, "second", volume, 0).unwrap();

        let regions = manager.regions_at(world, BlockPos::new(1, 64, 1));
        let names: Vec<_> = regions.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["global", "world", "first", "second"]);
    }

    #[test]
    fn test_cache_invalidated_on_mutation() {
        let (mut manager, _writer, _dir) = manager();
        let world = Uuid::new_v4();
        let pos = BlockPos::new(8, 64, 8);
        assert_eq!(manager.regions_at(world, pos).len(), 2);

        manager
            .define(world, "new", cuboid((0, 0, 0), (15, 255, 15)), 0)
            .unwrap();
        assert_eq!(manager.regions_at(world, pos).len(), 3);

        manager.delete(world, "new");
        assert_eq!(manager.regions_at(world, pos).len(), 2);
    }

    #[test]
    fn test_update_region_settings() {
        let (mut manager, _writer, _dir) = manager();
        let world = Uuid::new_v4();
        manager
            .define(world, "spawn", cuboid((0, 0, 0), (15, 255, 15)), 0)
            .unwrap();
        manager
            .update_region(world, "spawn", |config| {
                config.settings.build = Tristate::False;
            })
            .unwrap();
        assert_eq!(
            manager.get_region(world, "spawn").unwrap().settings().build,
            Tristate::False
        );

        let missing = manager.update_region(world, "nowhere", |_| {});
        assert!(matches!(missing, Err(BlockwardError::RegionNotFound(_))));
    }

    #[test]
    fn test_documents_survive_reload() {
        let (mut manager, writer, dir) = manager();
        let world = Uuid::new_v4();
        manager
            .define(world, "keep", cuboid((0, 0, 0), (15, 255, 15)), 5)
            .unwrap();
        manager
            .update_region(world, "keep", |config| {
                config.settings.build = Tristate::False;
            })
            .unwrap();

        // Let the writer drain, then rebuild a manager over the same dir.
        drop(manager);
        writer.join();

        let sled = sled::Config::new()
            .path(dir.path().join("db2"))
            .temporary(true)
            .open()
            .unwrap();
        let db = DbOperations::new(sled).unwrap();
        let (handle, _writer2) = StorageWriter::spawn(db);
        let mut reloaded = RegionManager::new(dir.path().join("regions"), handle).unwrap();

        let region = reloaded.regions_at(world, BlockPos::new(8, 64, 8));
        let kept = region.iter().find(|r| r.name() == "keep").unwrap();
        assert_eq!(kept.priority(), 5);
        assert_eq!(kept.settings().build, Tristate::False);
    }

    #[test]
    fn test_active_region_pointer() {
        let (mut manager, _writer, _dir) = manager();
        let world = Uuid::new_v4();
        let source = Uuid::new_v4();
        manager
            .define(world, "spawn", cuboid((0, 0, 0), (1, 1, 1)), 0)
            .unwrap();

        assert!(manager.active_region(source).is_none());
        manager.set_active_region(source, world, "spawn");
        assert_eq!(
            manager.active_region(source),
            Some(&(world, "spawn".to_string()))
        );
        manager.clear_active_region(source);
        assert!(manager.active_region(source).is_none());
    }

    #[test]
    fn test_reserved_names_rejected() {
        let (mut manager, _writer, _dir) = manager();
        let world = Uuid::new_v4();
        assert!(manager
            .define(world, "global", cuboid((0, 0, 0), (1, 1, 1)), 0)
            .is_err());
        assert!(manager
            .define(world, "World", cuboid((0, 0, 0), (1, 1, 1)), 0)
            .is_err());
    }
}
