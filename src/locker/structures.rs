//! Multi-block structure expansion.
//!
//! One lock covers a whole structure: both halves of a double chest, both
//! blocks of a door, and all four blocks of a hinged double door. The host
//! answers block queries through [`BlockQuery`] snapshots since the engine
//! has no world access.

use crate::locker::types::ProtectedType;
use crate::math::{BlockPos, Direction, CARDINAL_DIRECTIONS};

/// What the engine needs to know about one block when expanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub type_id: String,
    /// Upper half of a two-block door, when the block is a door.
    pub upper_half: Option<bool>,
    /// Facing of a door block.
    pub facing: Option<Direction>,
    /// Hinge side of a door block (right-hinged when true).
    pub hinge_right: Option<bool>,
}

impl BlockInfo {
    pub fn plain(type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            upper_half: None,
            facing: None,
            hinge_right: None,
        }
    }

    pub fn door(
        type_id: impl Into<String>,
        upper_half: bool,
        facing: Direction,
        hinge_right: bool,
    ) -> Self {
        Self {
            type_id: type_id.into(),
            upper_half: Some(upper_half),
            facing: Some(facing),
            hinge_right: Some(hinge_right),
        }
    }
}

/// World snapshot access provided by the host for expansion.
pub trait BlockQuery {
    fn block_at(&self, pos: &BlockPos) -> Option<BlockInfo>;
}

impl<F> BlockQuery for F
where
    F: Fn(&BlockPos) -> Option<BlockInfo>,
{
    fn block_at(&self, pos: &BlockPos) -> Option<BlockInfo> {
        self(pos)
    }
}

/// Expands the clicked block to the full structure a lock should cover.
///
/// Chests pick up an adjacent chest of the same type; doors pick up their
/// other half and, when a matching hinged partner exists (same type, same
/// facing, opposite hinge), the partner's two blocks as well. Everything
/// else locks as a single block.
pub fn expand_structure(pos: BlockPos, world: &impl BlockQuery) -> Vec<BlockPos> {
    let Some(info) = world.block_at(&pos) else {
        return vec![pos];
    };
    match ProtectedType::for_block(&info.type_id) {
        ProtectedType::Container => expand_chest(pos, &info, world),
        ProtectedType::Door => expand_door(pos, &info, world),
        _ => vec![pos],
    }
}

fn expand_chest(pos: BlockPos, info: &BlockInfo, world: &impl BlockQuery) -> Vec<BlockPos> {
    let mut positions = vec![pos];
    for direction in CARDINAL_DIRECTIONS {
        let neighbor = pos.relative(direction);
        if world
            .block_at(&neighbor)
            .is_some_and(|other| other.type_id == info.type_id)
        {
            positions.push(neighbor);
        }
    }
    positions
}

fn expand_door(pos: BlockPos, info: &BlockInfo, world: &impl BlockQuery) -> Vec<BlockPos> {
    let mut positions = vec![pos];

    // Find the other half above or below.
    let other_half = if info.upper_half == Some(true) {
        pos.relative(Direction::Down)
    } else {
        pos.relative(Direction::Up)
    };
    if !world
        .block_at(&other_half)
        .is_some_and(|other| other.type_id == info.type_id)
    {
        // A lone half; protect just what exists.
        return positions;
    }
    positions.push(other_half);

    // A hinged partner sits perpendicular to the facing, on the hinge side.
    let (Some(facing), Some(hinge_right)) = (info.facing, info.hinge_right) else {
        return positions;
    };
    let partner_direction = if hinge_right {
        facing.rotate_ccw()
    } else {
        facing.rotate_cw()
    };
    let partner = pos.relative(partner_direction);
    let is_pair = world.block_at(&partner).is_some_and(|other| {
        other.type_id == info.type_id
            && other.facing == info.facing
            && other.hinge_right == Some(!hinge_right)
    });
    if is_pair {
        positions.push(partner);
        positions.push(partner.relative(if info.upper_half == Some(true) {
            Direction::Down
        } else {
            Direction::Up
        }));
    }
    positions
}
