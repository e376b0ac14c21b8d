//! A single cache line. L2 lines additionally carry MESI coherence state;
//! L1 lines never do (L1 is write-through and holds no coherence state of
//! its own — see [`crate::cache::Cache`]).

use crate::ccsm::CoherenceState;

/// Validity/dirtiness of a line's data, independent of its MESI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineFlags {
    #[default]
    Invalid,
    Valid,
    Dirty,
}

#[derive(Debug, Clone, Default)]
pub struct CacheLine {
    tag: u64,
    index: u64,
    flags: LineFlags,
    seq: u64,
    /// `Some` only for L2 lines, set once at construction time.
    coherence: Option<CoherenceState>,
}

impl CacheLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn flags(&self) -> LineFlags {
        self.flags
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn set_seq(&mut self, seq: u64) {
        self.seq = seq;
    }

    pub fn set_flags(&mut self, flags: LineFlags) {
        self.flags = flags;
    }

    pub fn set_tag(&mut self, tag: u64) {
        self.tag = tag;
    }

    pub fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    pub fn invalidate(&mut self) {
        self.tag = 0;
        self.flags = LineFlags::Invalid;
    }

    pub fn is_valid(&self) -> bool {
        self.flags != LineFlags::Invalid
    }

    /// Initializes an L2 line with its starting MESI state (Invalid).
    pub fn init_coherence(&mut self) {
        self.invalidate();
        self.coherence = Some(CoherenceState::Invalid);
    }

    pub fn coherence_state(&self) -> Option<CoherenceState> {
        self.coherence
    }

    pub fn set_coherence_state(&mut self, state: CoherenceState) {
        self.coherence = Some(state);
    }
}
