//! A tile: one processor plus its private L1 and its bank of the
//! partition-aggregated L2. Tiles sit on a `SQRT_NPROCS` x `SQRT_NPROCS`
//! mesh, addressed row-major by `index`.

use log::trace;

use crate::bitset::BitSet;
use crate::cache::{AccessOutcome, Cache, CacheLevel, LineFlags, Op};
use crate::ids::TileId;
use crate::network::Msg;
use crate::params::{self, SQRT_NPROCS};
use crate::simulator::Simulator;

#[derive(Debug, Default)]
pub struct TileStats {
    pub cycle: u64,
    pub accesses: u64,
    pub l2_accesses: u64,
    pub loc_xfer: u64,
    pub loc_delay: u64,
    pub ctoc_xfer: u64,
    pub ctoc_delay: u64,
    pub mem_xfer: u64,
    pub ptop_xfer: u64,
    pub ptop_delay: u64,
    pub mem_cycles: u64,
    pub mem_hops_cycles: u64,
}

#[derive(Debug)]
pub struct Tile {
    pub id: TileId,
    pub x: u32,
    pub y: u32,
    pub partition_scheme: usize,
    pub partition: BitSet,
    pub l1: Cache,
    pub l2: Cache,
    pub stats: TileStats,
}

impl Tile {
    pub fn new(id: TileId, partition_scheme: usize, partition_mask: u32) -> Self {
        let index = id.0 as u32;
        Self {
            id,
            x: index / SQRT_NPROCS as u32,
            y: index % SQRT_NPROCS as u32,
            partition_scheme,
            partition: BitSet::from_raw(partition_mask),
            l1: Cache::with_block_size(CacheLevel::L1, params::L1_SIZE, params::L1_ASSOC),
            l2: Cache::with_block_size(CacheLevel::L2, params::L2_SIZE, params::L2_ASSOC),
            stats: TileStats::default(),
        }
    }

    pub fn mesh_coords(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    /// Maps `addr` to the specific tile within this tile's partition that
    /// owns it: blocks are interleaved across partition members by address
    /// hash.
    pub fn map_addr_to_tile(&self, addr: u64) -> TileId {
        let num_tiles = self.partition.count();
        let offset = (params::addr_hash(addr) as usize) % num_tiles;
        self.partition.nth_set_bit(offset + 1).into()
    }
}

impl Simulator {
    /// Services a trace record: `op` against `addr`, issued by the
    /// processor hosted at `tile`.
    pub fn access(&mut self, tile: TileId, addr: u64, op: Op) {
        self.tiles[tile.0].stats.accesses += 1;
        self.current_delay = 0;
        self.current_mem_delay = 0;

        self.current_delay += params::L1_ATIME;
        let (outcome, _, _evicted) = self.tiles[tile.0].l1.access(addr, op);
        // L1 evictions need no CCSM/partition handling: L1 carries no
        // coherence state, and the writeback was already counted by
        // `Cache::access` itself.

        if outcome == AccessOutcome::Hit && op == Op::Write {
            self.l2_access(tile, addr, op);
        }
        if outcome == AccessOutcome::Miss {
            self.l2_access(tile, addr, op);
        }

        let delay = self.current_delay + self.current_mem_delay;
        self.tiles[tile.0].stats.cycle += delay;
    }

    /// Routes a logical access to the partition's aggregate L2: finds the
    /// tile that owns `addr` within the partition and issues an `L2RD`/
    /// `L2WR` to it over the network.
    fn l2_access(&mut self, tile: TileId, addr: u64, op: Op) {
        let to_tile = self.tiles[tile.0].map_addr_to_tile(addr);
        let msg = if op == Op::Write { Msg::L2Wr } else { Msg::L2Rd };

        let state = self.send_req_tile_to_tile(msg, addr, tile, to_tile);

        self.tiles[tile.0].stats.l2_accesses += 1;

        if state == AccessOutcome::Hit as i64 {
            if to_tile == tile {
                self.tiles[tile.0].stats.loc_xfer += 1;
                self.tiles[tile.0].stats.loc_delay += self.current_delay;
            } else {
                self.tiles[tile.0].stats.ctoc_xfer += 1;
                self.tiles[tile.0].stats.ctoc_delay += self.current_delay;
            }
        } else if state == AccessOutcome::Miss as i64 {
            if self.current_mem_delay != 0 {
                self.tiles[tile.0].stats.mem_xfer += 1;
                self.tiles[tile.0].stats.mem_cycles += self.current_mem_delay;
                self.tiles[tile.0].stats.mem_hops_cycles += self.current_mem_delay + self.current_delay;
            } else {
                self.tiles[tile.0].stats.ptop_xfer += 1;
                self.tiles[tile.0].stats.ptop_delay += self.current_delay;
            }
        }
    }

    /// The L2 half of an access, reimplementing `Cache::access`'s
    /// accounting rather than calling it directly: on a miss, the CCSM
    /// eviction of the victim (L1INV broadcast, its own writeback count,
    /// invalidation) must run against the victim's *old* tag/index/flags
    /// before they are overwritten for the incoming block, exactly as
    /// `Cache::fillLine` calls `victim->ccsm->evict()` before
    /// `setTag`/`setIndex`/`setFlags(VALID)` (Cache.cc). Splitting the flow
    /// here — rather than inside `Cache::fill_line` — is what lets the
    /// evict step reach the whole `Simulator` (broadcast to other tiles),
    /// which a `Cache` has no way to see.
    fn l2_cache_access(&mut self, tile: TileId, addr: u64, op: Op) -> (AccessOutcome, (u64, usize)) {
        let cache = &mut self.tiles[tile.0].l2;
        cache.lru_counter += 1;
        match op {
            Op::Write => cache.stats.writes += 1,
            Op::Read => cache.stats.reads += 1,
        }

        if let Some((set, way)) = cache.find_line(addr) {
            if op == Op::Write {
                cache.line_mut(set, way).set_flags(LineFlags::Dirty);
            }
            cache.update_lru(set, way);
            return (AccessOutcome::Hit, (set, way));
        }

        match op {
            Op::Write => cache.stats.write_misses += 1,
            Op::Read => cache.stats.read_misses += 1,
        }

        let (set, way) = cache.get_lru(addr);
        let victim = cache.line(set, way);
        let victim_was_valid = victim.is_valid();
        let victim_was_dirty = victim.flags() == LineFlags::Dirty;
        if victim_was_valid && victim_was_dirty {
            cache.stats.write_backs += 1;
        }

        if victim_was_valid {
            self.handle_l2_eviction(tile, set, way);
        }

        let cache = &mut self.tiles[tile.0].l2;
        cache.overwrite_line(set, way, addr);
        if op == Op::Write {
            cache.line_mut(set, way).set_flags(LineFlags::Dirty);
        }

        (AccessOutcome::Miss, (set, way))
    }

    /// Delivers a network message to `tile`. Returns an access-outcome
    /// encoding for `L2RD`/`L2WR` (see [`crate::cache::AccessOutcome`] cast
    /// to `i64`), or `-1` for messages that don't produce one.
    pub(crate) fn tile_get_from_network(
        &mut self,
        tile: TileId,
        msg: Msg,
        addr: u64,
        from_tile: Option<TileId>,
    ) -> i64 {
        if msg == Msg::L1Inv {
            self.tiles[tile.0].l1.invalidate_line_if_exists(addr);
            self.current_delay += params::L1_ATIME;
            return -1;
        }

        match msg {
            Msg::Inv | Msg::Int => {
                self.current_delay += params::L2_ATIME;
                let Some((set, way)) = self.tiles[tile.0].l2.find_line(addr) else {
                    return -1;
                };
                self.ccsm_get_from_network(tile, set, way, msg);
                -1
            }
            Msg::L2Rd | Msg::L2Wr => {
                self.current_delay += params::L2_ATIME;
                let op = if msg == Msg::L2Wr { Op::Write } else { Op::Read };
                let (outcome, (set, way)) = self.l2_cache_access(tile, addr, op);
                self.ccsm_dispatch_proc_init(tile, set, way, addr, op);
                let from = from_tile.expect("L2RD/L2WR always originate from a requesting tile");
                self.fake_data_tile_to_tile(tile, from);
                outcome as i64
            }
            Msg::L1Inv => unreachable!(),
            Msg::Rd | Msg::Rdx | Msg::Upgr => unreachable!("tile-to-dir messages never loop back"),
        }
    }

    /// Broadcasts `msg` (always `L1INV` in practice) to every tile sharing
    /// `tile`'s partition, folding the parallel delay to its max rather
    /// than summing it.
    pub(crate) fn broadcast_to_partition(&mut self, tile: TileId, msg: Msg, addr: u64) {
        let orig_delay = self.current_delay;
        self.current_delay = 0;
        let mut max = 0;

        let members: Vec<TileId> = self.tiles[tile.0]
            .partition
            .iter_set_bits()
            .map(TileId)
            .collect();

        for member in members {
            self.send_req_tile_to_tile(msg, addr, tile, member);
            max = max.max(self.current_delay);
            self.current_delay = 0;
        }

        self.current_delay = orig_delay + max;
        trace!("tile {tile} broadcast {:?} to partition, max delay {}", msg, max);
    }
}
