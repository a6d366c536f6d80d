//! Spatial primitives: block positions, chunk coordinates and cuboids.
//!
//! Chunk coordinates are block coordinates shifted right by four (16x16
//! columns). Packed keys exist so that positions and chunk columns can be
//! used as cheap map keys in the spatial indexes.

use serde::{Deserialize, Serialize};

/// An absolute block coordinate in some world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn chunk(&self) -> ChunkPos {
        ChunkPos::new(self.x >> 4, self.z >> 4)
    }

    /// Packs the position into a single key. Uses 26/12/26 bits, enough for
    /// the +-30M block range of the supported hosts.
    pub fn location_key(&self) -> u64 {
        ((self.x as u64 & 0x3FF_FFFF) << 38)
            | ((self.y as u64 & 0xFFF) << 26)
            | (self.z as u64 & 0x3FF_FFFF)
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> BlockPos {
        BlockPos::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl From<Vec3> for BlockPos {
    fn from(v: Vec3) -> Self {
        BlockPos::new(
            v.x.floor() as i32,
            v.y.floor() as i32,
            v.z.floor() as i32,
        )
    }
}

/// A continuous position, used for entity locations and movement checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn add_y(&self, dy: f64) -> Vec3 {
        Vec3::new(self.x, self.y + dy, self.z)
    }

    pub fn block(&self) -> BlockPos {
        BlockPos::from(*self)
    }
}

/// A chunk column coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn chunk_key(&self) -> u64 {
        ((self.x as u64 & 0xFFFF_FFFF) << 32) | (self.z as u64 & 0xFFFF_FFFF)
    }
}

/// Horizontal and vertical unit directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

/// The four horizontal directions.
pub const CARDINAL_DIRECTIONS: [Direction; 4] = [
    Direction::North,
    Direction::South,
    Direction::East,
    Direction::West,
];

impl Direction {
    pub fn offset(&self) -> (i32, i32, i32) {
        match self {
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::East => (1, 0, 0),
            Direction::West => (-1, 0, 0),
            Direction::Up => (0, 1, 0),
            Direction::Down => (0, -1, 0),
        }
    }

    /// 90 degrees clockwise, seen from above. Vertical directions are
    /// unchanged.
    pub fn rotate_cw(&self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
            other => *other,
        }
    }

    pub fn rotate_ccw(&self) -> Direction {
        self.rotate_cw().rotate_cw().rotate_cw()
    }
}

impl BlockPos {
    pub fn relative(&self, direction: Direction) -> BlockPos {
        let (dx, dy, dz) = direction.offset();
        self.offset(dx, dy, dz)
    }
}

/// An axis-aligned volume with inclusive corners.
///
/// Corners are normalized on construction so `contains` never has to care
/// which way the region was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cuboid {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl Cuboid {
    pub fn new(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn contains(&self, pos: &BlockPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    /// The chunk columns overlapped by this cuboid.
    pub fn chunks(&self) -> Vec<ChunkPos> {
        let mut result = Vec::new();
        for x in (self.min.x >> 4)..=(self.max.x >> 4) {
            for z in (self.min.z >> 4)..=(self.max.z >> 4) {
                result.push(ChunkPos::new(x, z));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_derivation() {
        assert_eq!(BlockPos::new(0, 64, 0).chunk(), ChunkPos::new(0, 0));
        assert_eq!(BlockPos::new(15, 64, 15).chunk(), ChunkPos::new(0, 0));
        assert_eq!(BlockPos::new(16, 64, 16).chunk(), ChunkPos::new(1, 1));
        assert_eq!(BlockPos::new(-1, 64, -16).chunk(), ChunkPos::new(-1, -1));
    }

    #[test]
    fn test_location_keys_distinct() {
        let a = BlockPos::new(10, 64, 10).location_key();
        let b = BlockPos::new(10, 65, 10).location_key();
        let c = BlockPos::new(-10, 64, 10).location_key();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cuboid_normalizes_corners() {
        let c = Cuboid::new(BlockPos::new(10, 70, 10), BlockPos::new(-5, 60, -5));
        assert!(c.contains(&BlockPos::new(0, 64, 0)));
        assert!(c.contains(&BlockPos::new(10, 70, 10)));
        assert!(c.contains(&BlockPos::new(-5, 60, -5)));
        assert!(!c.contains(&BlockPos::new(11, 64, 0)));
    }

    #[test]
    fn test_cuboid_chunks_cover_span() {
        let c = Cuboid::new(BlockPos::new(0, 0, 0), BlockPos::new(31, 0, 15));
        let chunks = c.chunks();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.contains(&ChunkPos::new(0, 0)));
        assert!(chunks.contains(&ChunkPos::new(1, 0)));
    }

    #[test]
    fn test_vec3_to_block_floors() {
        assert_eq!(
            Vec3::new(-0.5, 64.9, 3.2).block(),
            BlockPos::new(-1, 64, 3)
        );
    }
}
