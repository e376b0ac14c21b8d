//! Set-associative cache, used for both the write-through L1 and the
//! CCSM-managed L2 bank of a tile.

mod line;

pub use line::{CacheLine, LineFlags};

use crate::params::BLOCK_SIZE;

/// Which level of the hierarchy a [`Cache`] implements. L1 is write-through
/// and carries no coherence state; L2 carries per-line MESI state handled
/// by [`crate::ccsm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLevel {
    L1,
    L2,
}

/// Outcome of a [`Cache::access`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Hit,
    Miss,
}

/// Read or write access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub reads: u64,
    pub read_misses: u64,
    pub writes: u64,
    pub write_misses: u64,
    pub write_backs: u64,
}

/// A set-associative cache: `sets` rows of `assoc` ways each.
#[derive(Debug)]
pub struct Cache {
    level: CacheLevel,
    assoc: usize,
    num_sets: u64,
    index_bits: u32,
    offset_bits: u32,
    lines: Vec<Vec<CacheLine>>,
    pub lru_counter: u64,
    pub stats: CacheStats,
}

impl Cache {
    /// `size_bytes` and `line_size_bytes` must both be powers of two, and
    /// `size_bytes / line_size_bytes` must be a multiple of `assoc`.
    pub fn new(level: CacheLevel, size_bytes: usize, assoc: usize, line_size_bytes: usize) -> Self {
        let num_lines = size_bytes / line_size_bytes;
        let num_sets = (num_lines / assoc) as u64;
        let index_bits = num_sets.trailing_zeros();
        let offset_bits = (line_size_bytes as u64).trailing_zeros();

        let mut lines = Vec::with_capacity(num_sets as usize);
        for _ in 0..num_sets {
            let mut set = Vec::with_capacity(assoc);
            for _ in 0..assoc {
                let mut line = CacheLine::new();
                if level == CacheLevel::L2 {
                    line.init_coherence();
                }
                set.push(line);
            }
            lines.push(set);
        }

        Self {
            level,
            assoc,
            num_sets,
            index_bits,
            offset_bits,
            lines,
            lru_counter: 0,
            stats: CacheStats::default(),
        }
    }

    /// Convenience constructor using the simulator's fixed block size.
    pub fn with_block_size(level: CacheLevel, size_bytes: usize, assoc: usize) -> Self {
        Self::new(level, size_bytes, assoc, BLOCK_SIZE)
    }

    pub fn level(&self) -> CacheLevel {
        self.level
    }

    pub fn calc_tag(&self, addr: u64) -> u64 {
        addr >> (self.index_bits + self.offset_bits)
    }

    pub fn calc_index(&self, addr: u64) -> u64 {
        let tag_mask = (1u64 << (self.index_bits + self.offset_bits)) - 1;
        (addr & tag_mask) >> self.offset_bits
    }

    pub fn get_base_addr(&self, tag: u64, index: u64) -> u64 {
        ((tag << self.index_bits) | index) << self.offset_bits
    }

    fn set(&self, index: u64) -> &[CacheLine] {
        &self.lines[index as usize]
    }

    /// Looks for `addr`'s block in the cache, returning its `(set, way)`
    /// coordinates if present.
    pub fn find_line(&self, addr: u64) -> Option<(u64, usize)> {
        let tag = self.calc_tag(addr);
        let index = self.calc_index(addr);
        self.set(index)
            .iter()
            .position(|line| line.is_valid() && line.tag() == tag)
            .map(|way| (index, way))
    }

    pub fn line(&self, set: u64, way: usize) -> &CacheLine {
        &self.lines[set as usize][way]
    }

    pub fn line_mut(&mut self, set: u64, way: usize) -> &mut CacheLine {
        &mut self.lines[set as usize][way]
    }

    pub(crate) fn update_lru(&mut self, set: u64, way: usize) {
        let seq = self.lru_counter;
        self.line_mut(set, way).set_seq(seq);
    }

    /// Picks the victim way for `addr`'s set: the first invalid way, or
    /// else the way with the smallest (oldest) LRU sequence number.
    pub fn get_lru(&self, addr: u64) -> (u64, usize) {
        let index = self.calc_index(addr);
        let set = self.set(index);

        if let Some(way) = set.iter().position(|line| !line.is_valid()) {
            return (index, way);
        }

        let mut victim = self.assoc;
        let mut min = self.lru_counter;
        for (way, line) in set.iter().enumerate() {
            if line.seq() <= min {
                victim = way;
                min = line.seq();
            }
        }
        assert!(victim != self.assoc, "no LRU victim found");
        (index, victim)
    }

    /// Finishes filling `(set, way)` for `addr`: refreshes its LRU sequence
    /// and overwrites tag/index/flags for the new block. Callers with
    /// coherence state to evict (L2) must have already handled that against
    /// the line's old identity before calling this — it clobbers the old
    /// tag/index irreversibly, mirroring the tail of `Cache::fillLine`
    /// (Cache.cc) after its `ccsm->evict()` call.
    pub(crate) fn overwrite_line(&mut self, set: u64, way: usize, addr: u64) {
        self.update_lru(set, way);

        let tag = self.calc_tag(addr);
        let index = self.calc_index(addr);
        let line = self.line_mut(set, way);
        line.set_tag(tag);
        line.set_index(index);
        line.set_flags(LineFlags::Valid);
    }

    /// Allocates a line for `addr`, evicting a victim if necessary.
    /// Returns `(set, way)` of the newly filled line, and the evicted
    /// line's previous `(tag, was_dirty)` if a valid line was evicted.
    ///
    /// L1 has no coherence state, so there is nothing to do with the
    /// evicted identity besides count it; used only by the L1 path. The L2
    /// path does not call this — it needs to run CCSM eviction against the
    /// victim before the overwrite, so it drives `get_lru`/`overwrite_line`
    /// directly (see `Simulator::l2_cache_access` in `src/tile.rs`).
    pub fn fill_line(&mut self, addr: u64) -> ((u64, usize), Option<(u64, bool)>) {
        let (set, way) = self.get_lru(addr);
        let victim = self.line(set, way);
        let evicted = if victim.is_valid() {
            Some((victim.tag(), victim.flags() == LineFlags::Dirty))
        } else {
            None
        };
        if let Some((_, was_dirty)) = evicted {
            if was_dirty {
                self.stats.write_backs += 1;
            }
        }

        self.overwrite_line(set, way, addr);

        ((set, way), evicted)
    }

    /// Begins an access to `addr`, charging the access-time delay and
    /// updating read/write counters and LRU. Returns whether the block was
    /// already resident, and the `(set, way)` of the (possibly newly
    /// filled) line. Coherence dispatch (L2 only) is the caller's
    /// responsibility, since it needs tile/directory context this cache
    /// does not have.
    pub fn access(&mut self, addr: u64, op: Op) -> (AccessOutcome, (u64, usize), Option<(u64, bool)>) {
        self.lru_counter += 1;

        match op {
            Op::Write => self.stats.writes += 1,
            Op::Read => self.stats.reads += 1,
        }

        let mut evicted = None;
        let (outcome, coords) = match self.find_line(addr) {
            Some(coords) => (AccessOutcome::Hit, coords),
            None => {
                let (coords, ev) = self.fill_line(addr);
                evicted = ev;
                match op {
                    Op::Write => self.stats.write_misses += 1,
                    Op::Read => self.stats.read_misses += 1,
                }
                (AccessOutcome::Miss, coords)
            }
        };

        let (set, way) = coords;
        if op == Op::Write {
            self.line_mut(set, way).set_flags(LineFlags::Dirty);
        }
        if outcome == AccessOutcome::Hit {
            self.update_lru(set, way);
        }

        (outcome, coords, evicted)
    }

    /// Invalidates `addr`'s line if present, charging a writeback if it was
    /// dirty. Used to propagate an L2 eviction down to L1 (inclusive
    /// hierarchy).
    pub fn invalidate_line_if_exists(&mut self, addr: u64) {
        if let Some((set, way)) = self.find_line(addr) {
            let was_dirty = self.line(set, way).flags() == LineFlags::Dirty;
            if was_dirty {
                self.stats.write_backs += 1;
            }
            self.line_mut(set, way).invalidate();
        }
    }

    pub fn num_sets(&self) -> u64 {
        self.num_sets
    }

    pub fn assoc(&self) -> usize {
        self.assoc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache() -> Cache {
        // 2 sets, 2 ways, 64B lines -> 256B total.
        Cache::new(CacheLevel::L1, 256, 2, 64)
    }

    #[test]
    fn addr_decomposition_round_trip() {
        let cache = small_cache();
        for addr in [0u64, 64, 128, 192, 1 << 20, 0xDEAD_BE00] {
            let tag = cache.calc_tag(addr);
            let index = cache.calc_index(addr);
            assert_eq!(cache.get_base_addr(tag, index), addr & !0x3Fu64);
        }
    }

    #[test]
    fn miss_then_hit() {
        let mut cache = small_cache();
        let (outcome, _, evicted) = cache.access(0x1000, Op::Read);
        assert_eq!(outcome, AccessOutcome::Miss);
        assert!(evicted.is_none());
        let (outcome, _, _) = cache.access(0x1000, Op::Read);
        assert_eq!(outcome, AccessOutcome::Hit);
        assert_eq!(cache.stats.reads, 2);
        assert_eq!(cache.stats.read_misses, 1);
    }

    #[test]
    fn write_sets_dirty_and_counts_writeback_on_eviction() {
        let mut cache = small_cache();
        let (_, (set, way), _) = cache.access(0x0000, Op::Write);
        assert_eq!(cache.line(set, way).flags(), LineFlags::Dirty);

        // Same set, different tag, fills the second way.
        cache.access(0x4000, Op::Read);
        // Third distinct block in the same set evicts one of the two.
        let (_, _, evicted) = cache.access(0x8000, Op::Read);
        assert!(evicted.is_some());
        assert_eq!(cache.stats.write_backs, 1);
    }

    #[test]
    fn invalidate_line_if_exists_noop_when_absent() {
        let mut cache = small_cache();
        cache.invalidate_line_if_exists(0x1000);
        assert_eq!(cache.stats.write_backs, 0);
    }
}
