//! Process migration for shape-(a) traces, where records carry no explicit
//! processor column: the logical process is hosted on one tile at a time,
//! and hops to the next tile (round-robin) every `every` records.

use log::debug;

use crate::ids::TileId;
use crate::params::NPROCS;

#[derive(Debug)]
pub struct MigrationController {
    every: u64,
    seen: u64,
    current: TileId,
}

impl MigrationController {
    pub fn new(every: u64) -> Self {
        Self {
            every,
            seen: 0,
            current: TileId(0),
        }
    }

    /// Returns the tile hosting the logical process for the next record,
    /// advancing to the next tile (wrapping mod `NPROCS`) every `every`
    /// records.
    pub fn next_host(&mut self) -> TileId {
        if self.every > 0 && self.seen > 0 && self.seen % self.every == 0 {
            self.current = ((usize::from(self.current) + 1) % NPROCS).into();
            debug!("migrating logical process to tile {}", self.current);
        }
        self.seen += 1;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrates_every_n_records() {
        let mut ctl = MigrationController::new(2);
        let hosts: Vec<_> = (0..5).map(|_| ctl.next_host()).collect();
        assert_eq!(hosts, vec![TileId(0), TileId(0), TileId(1), TileId(1), TileId(2)]);
    }

    #[test]
    fn zero_means_never_migrate() {
        let mut ctl = MigrationController::new(0);
        for _ in 0..10 {
            assert_eq!(ctl.next_host(), TileId(0));
        }
    }
}
