//! Small newtypes so tile indices, partition indices, and block addresses
//! don't get silently mixed up at call sites (they're all plain integers in
//! the original simulator).
//!
//! `TileId`/`PartitionId` derive `From`/`Into` because call sites genuinely
//! convert both ways (a `usize` offset into a tile id, a tile id back into a
//! raw index for a bit position) -- see `Tile::map_addr_to_tile`,
//! `Directory::map_addr_to_tile`, `MigrationController::next_host`.
//! `BlockAddr` only ever comes from [`BlockAddr::from_byte_addr`] (which
//! shifts off the offset bits, not a bare wrap), so it derives `Display`
//! alone -- a derived `From<u64>`/`Into<u64>` would silently skip that
//! shift if anyone reached for it.

use derive_more::{Display, From, Into};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct TileId(pub usize);

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct PartitionId(pub usize);

/// A cache block address: the byte address right-shifted by the block
/// offset bits (`BLKADDR` in the original).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockAddr(pub u64);

impl BlockAddr {
    pub fn from_byte_addr(addr: u64) -> Self {
        Self(addr >> crate::params::BLOCK_SIZE.trailing_zeros())
    }
}
