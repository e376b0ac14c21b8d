//! Compile-time simulator parameters: cache geometry, timings, and mesh
//! topology. Mirrors `params.h` of the original C++ simulator; these are
//! genuinely compile-time constants, not CLI-configurable knobs (only
//! `PartitionScheme` and partition sharing are runtime-selectable, via the
//! CLI — see `cli.rs`).

use static_assertions::const_assert;

/// Number of tiles on the chip. Tiles are laid out on a `SQRT_NPROCS` x
/// `SQRT_NPROCS` mesh.
pub const NPROCS: usize = 16;
/// Side length of the tile mesh.
pub const SQRT_NPROCS: usize = 4;

const_assert!(SQRT_NPROCS * SQRT_NPROCS == NPROCS);

/// Partition-scheme-4's four hand-assigned quadrant masks (not a generated
/// pattern — reproduced literally from the original simulator's directory,
/// per `spec.md` §9). Hoisted here, rather than inlined in
/// `directory::Directory::new`, so the partition-completeness check below
/// can run at compile time against the same constants the directory uses.
pub const SCHEME4_MASK_0: u32 = 0b0000000000110011;
pub const SCHEME4_MASK_1: u32 = 0b0000000011001100;
pub const SCHEME4_MASK_2: u32 = 0b0011001100000000;
pub const SCHEME4_MASK_3: u32 = 0b1100110000000000;

const_assert!(
    SCHEME4_MASK_0.count_ones()
        + SCHEME4_MASK_1.count_ones()
        + SCHEME4_MASK_2.count_ones()
        + SCHEME4_MASK_3.count_ones()
        == NPROCS as u32
);
const_assert!((SCHEME4_MASK_0 | SCHEME4_MASK_1 | SCHEME4_MASK_2 | SCHEME4_MASK_3) == 0xFFFF);

/// L1 size in bytes.
pub const L1_SIZE: usize = 32 * 1024;
/// L1 associativity (ways per set).
pub const L1_ASSOC: usize = 8;
/// L2 size in bytes (per tile's bank of the aggregate L2).
pub const L2_SIZE: usize = 256 * 1024;
/// L2 associativity (ways per set).
pub const L2_ASSOC: usize = 8;
/// Cache block (line) size in bytes.
pub const BLOCK_SIZE: usize = 64;

/// Cycles to access an L1 line.
pub const L1_ATIME: u64 = 3;
/// Cycles to access an L2 line.
pub const L2_ATIME: u64 = 10;
/// Cycles to service a memory access.
pub const MEM_ATIME: u64 = 150;
/// Cycles per interconnect hop.
pub const HOP_TIME: u64 = 4;
/// Serialization tail added to a data-carrying hop, on top of `HOP_TIME`
/// per hop.
pub const DATA_HOP_TAIL: u64 = 3;

/// Block offset bits (`log2(BLOCK_SIZE)`), used by [`addr_hash`].
pub const OFFSET_BITS: u32 = 6;
/// Index bits used by the address-to-tile hash. This mirrors the original
/// simulator's `INDEXBITS`, a fixed constant independent of any particular
/// cache's actual geometry — it exists only to spread consecutive blocks
/// across partition tiles.
pub const HASH_INDEX_BITS: u32 = 9;

/// Hashes a byte address down to a tile-selection value, mixing the index
/// and tag portions of the address so consecutive blocks interleave across
/// the tiles of a partition.
pub const fn addr_hash(addr: u64) -> u64 {
    (addr >> (OFFSET_BITS + HASH_INDEX_BITS)) ^ (addr >> OFFSET_BITS)
}

/// Control-message latency for `hops` mesh hops.
pub const fn hop_delay(hops: u64) -> u64 {
    hops * HOP_TIME
}

/// Data-message latency for `hops` mesh hops (includes the serialization
/// tail for the block payload).
pub const fn data_hop_delay(hops: u64) -> u64 {
    hops * HOP_TIME + DATA_HOP_TAIL
}

/// How many tiles share an aggregate L2, i.e. the partition granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionScheme {
    /// 16 one-tile partitions (private L2s).
    One,
    /// 8 two-tile partitions.
    Two,
    /// 4 four-tile quadrant partitions.
    Four,
    /// 2 eight-tile half-chip partitions.
    Eight,
    /// 1 whole-chip partition.
    Sixteen,
}

impl PartitionScheme {
    /// Number of tiles per partition under this scheme.
    pub const fn tiles_per_partition(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }

    /// Number of partitions on the chip under this scheme.
    pub const fn num_partitions(self) -> usize {
        NPROCS / self.tiles_per_partition()
    }
}

impl std::str::FromStr for PartitionScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Self::One),
            "2" => Ok(Self::Two),
            "4" => Ok(Self::Four),
            "8" => Ok(Self::Eight),
            "16" => Ok(Self::Sixteen),
            other => Err(format!(
                "invalid partition scheme '{other}' (expected 1, 2, 4, 8, or 16)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_counts() {
        assert_eq!(PartitionScheme::One.num_partitions(), 16);
        assert_eq!(PartitionScheme::Two.num_partitions(), 8);
        assert_eq!(PartitionScheme::Four.num_partitions(), 4);
        assert_eq!(PartitionScheme::Eight.num_partitions(), 2);
        assert_eq!(PartitionScheme::Sixteen.num_partitions(), 1);
    }
}
