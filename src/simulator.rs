//! Top-level simulator state: the tile arena, the directory, and the two
//! delay accumulators every component threads delay through.
//!
//! The original simulator kept `CURRENTDELAY`/`CURRENTMEMDELAY`/`NETWORK`
//! as process globals mutated by whichever object happened to be running.
//! Here they're fields on one struct that every cross-component operation
//! takes `&mut self` on — no locking is needed since access is strictly
//! sequential, one trace record at a time.

use crate::cache::Op;
use crate::directory::Directory;
use crate::ids::TileId;
use crate::params::{self, PartitionScheme, NPROCS};
use crate::tile::Tile;

pub struct Simulator {
    pub(crate) tiles: Vec<Tile>,
    pub(crate) directory: Directory,
    /// Delay accumulated by the in-flight access, in cycles. Reset to 0 at
    /// the start of every `access()` call (mirrors `CURRENTDELAY`).
    pub(crate) current_delay: u64,
    /// Delay specifically attributable to a memory-controller round trip
    /// (mirrors `CURRENTMEMDELAY`).
    pub(crate) current_mem_delay: u64,
    /// Whether the directory may forward a read reply from a sharer in a
    /// different partition, instead of always going to memory.
    pub(crate) partition_sharing: bool,
}

impl Simulator {
    pub fn new(scheme: PartitionScheme, partition_sharing: bool) -> Self {
        let directory = Directory::new(scheme);

        let tiles = (0..NPROCS)
            .map(|i| {
                let tile_id = TileId(i);
                let partid = directory.partition_of_tile(tile_id);
                let mask = directory.partition_table_mask(partid);
                Tile::new(tile_id, scheme.tiles_per_partition(), mask)
            })
            .collect();

        Self {
            tiles,
            directory,
            current_delay: 0,
            current_mem_delay: 0,
            partition_sharing,
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Runs a single trace record: `proc` performs `op` against `addr`.
    pub fn run_record(&mut self, proc: TileId, op: Op, addr: u64) {
        self.access(proc, addr, op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Op;

    #[test]
    fn single_cold_read_hits_memory() {
        let mut sim = Simulator::new(PartitionScheme::One, false);
        sim.run_record(TileId(0), Op::Read, 0x0000_0000);

        let tile = &sim.tiles()[0];
        assert_eq!(tile.stats.accesses, 1);
        assert_eq!(tile.stats.mem_xfer, 1);
        assert_eq!(tile.stats.ctoc_xfer, 0);
        assert_eq!(tile.stats.ptop_xfer, 0);
        assert_eq!(tile.l1.stats.read_misses, 1);
        assert_eq!(tile.l2.stats.read_misses, 1);
        assert_eq!(tile.stats.mem_cycles, params::MEM_ATIME);
    }

    #[test]
    fn write_then_read_same_block_hits_l1() {
        let mut sim = Simulator::new(PartitionScheme::One, false);
        sim.run_record(TileId(0), Op::Write, 0x1000);
        sim.run_record(TileId(0), Op::Read, 0x1000);

        let tile = &sim.tiles()[0];
        assert_eq!(tile.l1.stats.reads, 1);
        assert_eq!(tile.l1.stats.read_misses, 0);
    }
}
