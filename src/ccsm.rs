//! Per-L2-line MESI coherence state machine. There is one of these
//! implicitly attached to every L2 line (held as [`CoherenceState`] on the
//! line itself, see [`crate::cache::line::CacheLine`]); the transition
//! logic lives here as methods on [`Simulator`] since every transition
//! needs to reach the network and, transitively, the directory.

use log::debug;

use crate::cache::Op;
use crate::directory::DirState;
use crate::ids::TileId;
use crate::network::Msg;
use crate::simulator::Simulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoherenceState {
    Modified,
    Exclusive,
    Shared,
    Invalid,
}

impl Simulator {
    /// Transitions the L2 line at `(tile, set, way)` to `new_state`,
    /// performing the invalidation housekeeping (L1INV broadcast,
    /// writeback, line invalidation) when leaving a valid state for
    /// `Invalid`.
    fn ccsm_set_state(&mut self, tile: TileId, set: u64, way: usize, new_state: CoherenceState) {
        let old_state = self.tiles[tile.0]
            .l2
            .line(set, way)
            .coherence_state()
            .expect("L2 line has no CCSM state");

        if old_state != CoherenceState::Invalid && new_state == CoherenceState::Invalid {
            let line = self.tiles[tile.0].l2.line(set, way);
            debug_assert!(line.is_valid(), "CCSM transition to I on an already-invalid line");
            let tag = line.tag();
            let index = line.index();
            let was_dirty = line.flags() == crate::cache::LineFlags::Dirty;
            let addr = self.tiles[tile.0].l2.get_base_addr(tag, index);

            self.broadcast_to_partition(tile, Msg::L1Inv, addr);

            if was_dirty {
                self.tiles[tile.0].l2.stats.write_backs += 1;
            }
            self.tiles[tile.0].l2.line_mut(set, way).invalidate();
        }

        self.tiles[tile.0].l2.line_mut(set, way).set_coherence_state(new_state);
        debug!("tile {tile} L2[{},{}] -> {:?}", set, way, new_state);
    }

    /// Eviction from the LRU replacement policy: an L2 victim always goes
    /// straight to Invalid. Must run before the victim line's tag/index/
    /// flags are overwritten for the incoming block — `ccsm_set_state`
    /// reads the line's tag/index/flags straight off it, so calling this
    /// any later broadcasts the *new* block's address instead of the
    /// evicted one (mirrors `Cache::fillLine` calling `victim->ccsm->evict()`
    /// before `setTag`/`setIndex`/`setFlags`, Cache.cc).
    pub(crate) fn handle_l2_eviction(&mut self, tile: TileId, set: u64, way: usize) {
        self.ccsm_set_state(tile, set, way, CoherenceState::Invalid);
    }

    /// A network-initiated invalidation (directory -> L2 CCSM).
    fn ccsm_net_init_inv(&mut self, tile: TileId, set: u64, way: usize) {
        let state = self.tiles[tile.0].l2.line(set, way).coherence_state().unwrap();
        match state {
            CoherenceState::Modified => {
                let (tag, index) = {
                    let line = self.tiles[tile.0].l2.line(set, way);
                    (line.tag(), line.index())
                };
                let addr = self.tiles[tile.0].l2.get_base_addr(tag, index);
                self.flush_to_mem(addr, tile);
                self.ccsm_set_state(tile, set, way, CoherenceState::Invalid);
            }
            CoherenceState::Exclusive | CoherenceState::Shared => {
                self.ccsm_set_state(tile, set, way, CoherenceState::Invalid);
            }
            CoherenceState::Invalid => unreachable!("INV delivered to an already-invalid line"),
        }
    }

    /// A network-initiated intervention (directory -> L2 CCSM): downgrade
    /// to Shared, flushing first if Modified.
    fn ccsm_net_init_int(&mut self, tile: TileId, set: u64, way: usize) {
        let state = self.tiles[tile.0].l2.line(set, way).coherence_state().unwrap();
        match state {
            CoherenceState::Modified => {
                let (tag, index) = {
                    let line = self.tiles[tile.0].l2.line(set, way);
                    (line.tag(), line.index())
                };
                let addr = self.tiles[tile.0].l2.get_base_addr(tag, index);
                self.flush_to_mem(addr, tile);
                self.ccsm_set_state(tile, set, way, CoherenceState::Shared);
            }
            CoherenceState::Exclusive => {
                self.ccsm_set_state(tile, set, way, CoherenceState::Shared);
            }
            CoherenceState::Shared | CoherenceState::Invalid => {}
        }
    }

    pub(crate) fn ccsm_get_from_network(&mut self, tile: TileId, set: u64, way: usize, msg: Msg) {
        match msg {
            Msg::Inv => self.ccsm_net_init_inv(tile, set, way),
            Msg::Int => self.ccsm_net_init_int(tile, set, way),
            other => unreachable!("CCSM never receives {other:?} directly"),
        }
    }

    /// Processor-initiated write: the local dirty-flag/write-miss handling
    /// already happened in `Cache::access`; this only drives the MESI
    /// transition and, if necessary, talks to the directory.
    fn ccsm_proc_init_wr(&mut self, tile: TileId, set: u64, way: usize, addr: u64) {
        let state = self.tiles[tile.0].l2.line(set, way).coherence_state().unwrap();
        match state {
            CoherenceState::Modified => {}
            CoherenceState::Exclusive => {
                self.ccsm_set_state(tile, set, way, CoherenceState::Modified);
            }
            CoherenceState::Shared => {
                self.send_req_tile_to_dir(Msg::Upgr, addr, tile);
                self.ccsm_set_state(tile, set, way, CoherenceState::Modified);
            }
            CoherenceState::Invalid => {
                self.send_req_tile_to_dir(Msg::Rdx, addr, tile);
                self.ccsm_set_state(tile, set, way, CoherenceState::Modified);
            }
        }
    }

    /// Processor-initiated read.
    fn ccsm_proc_init_rd(&mut self, tile: TileId, set: u64, way: usize, addr: u64) {
        let state = self.tiles[tile.0].l2.line(set, way).coherence_state().unwrap();
        match state {
            CoherenceState::Modified | CoherenceState::Exclusive | CoherenceState::Shared => {}
            CoherenceState::Invalid => {
                let dir_state = self.send_req_tile_to_dir(Msg::Rd, addr, tile);
                let new_state = if dir_state == DirState::Em as i64 {
                    CoherenceState::Exclusive
                } else {
                    CoherenceState::Shared
                };
                self.ccsm_set_state(tile, set, way, new_state);
            }
        }
    }

    pub(crate) fn ccsm_dispatch_proc_init(&mut self, tile: TileId, set: u64, way: usize, addr: u64, op: Op) {
        match op {
            Op::Write => self.ccsm_proc_init_wr(tile, set, way, addr),
            Op::Read => self.ccsm_proc_init_rd(tile, set, way, addr),
        }
    }
}
