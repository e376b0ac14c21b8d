//! Output rendering: the human-readable per-tile block and the tabular
//! whitespace-padded column format. Field order, labels, and the tabular
//! column width (15) are the original simulator's, restated in Rust.

use std::fmt::Write as _;

use crate::cache::{Cache, CacheLevel};
use crate::tile::Tile;

const COL_WIDTH: usize = 15;

fn aat(numer: u64, denom: u64) -> f64 {
    numer as f64 / denom as f64
}

/// Prints the simulator's startup banner (non-tabular mode only).
pub fn print_configuration(
    partition_scheme: crate::params::PartitionScheme,
    partition_sharing: bool,
    trace_file: &str,
) {
    println!("===== 706 SMP Simulator Configuration =====");
    println!("L1_SIZE:                        {}", crate::params::L1_SIZE);
    println!("L1_ASSOC:                       {}", crate::params::L1_ASSOC);
    println!("L2_SIZE:                        {}", crate::params::L2_SIZE);
    println!("L2_ASSOC:                       {}", crate::params::L2_ASSOC);
    println!("BLOCKSIZE:                      {}", crate::params::BLOCK_SIZE);
    println!("NUMBER OF PROCESSORS:           {}", crate::params::NPROCS);
    println!("COHERENCE PROTOCOL:             MESI");
    println!(
        "TILES PER PARTITION:            {}",
        partition_scheme.tiles_per_partition()
    );
    println!("ALLOW PARITION SHARING:         {}", partition_sharing as u32);
    println!("TRACE FILE:                     {trace_file}");
}

/// Renders one tile's human-readable stats block (`Tile::PrintStats` plus
/// its L1/L2 sub-reports).
pub fn print_tile_stats(tile: &Tile) {
    let s = &tile.stats;
    println!("========================================================== (Tile {})", tile.id);
    println!("01. cycle completed:                            {}", s.cycle);
    println!("02. cache to cache xfer (within partition)      {}", s.ctoc_xfer);
    println!("03. memory xfer (does not include writebacks)   {}", s.mem_xfer);
    println!("04. part to part xfer  (outside partition)      {}", s.ptop_xfer);
    println!("05. number of accesses                          {}", s.accesses);
    println!("06. memory cycles                               {}", s.mem_cycles);
    println!("07. average total access time (cycles)          {}", aat(s.cycle, s.accesses));
    println!(
        "08. average interconnect hop cycles             {}",
        aat(s.cycle - s.mem_cycles, s.accesses)
    );
    println!("09. average mem access cycles (excludes hops)   {}", aat(s.mem_cycles, s.accesses));
    println!(
        "10. average mem access cycles (includes hops)   {}",
        aat(s.mem_cycles + s.mem_hops_cycles, s.accesses)
    );
    println!("===== Simulation results (Cache {} L1) =============", tile.id);
    print_cache_stats(&tile.l1);
    println!("===== Simulation results (Cache {} L2) =============", tile.id);
    print_cache_stats(&tile.l2);
}

fn print_cache_stats(cache: &Cache) {
    let s = &cache.stats;
    println!("01. number of reads:                            {}", s.reads);
    println!("02. number of read misses:                      {}", s.read_misses);
    println!("03. number of writes:                           {}", s.writes);
    println!("04. number of write misses:                     {}", s.write_misses);
    println!("05. number of write backs:                      {}", s.write_backs);
}

fn push_col(buf: &mut String, value: &str) {
    let _ = write!(buf, "{value:>width$}", width = COL_WIDTH);
}

fn tile_tabular_row(tile: &Tile, head: &mut String, body: &mut String, print_head: bool) {
    let s = &tile.stats;

    if print_head {
        for label in [
            "tile",
            "partscheme",
            "cycle",
            "accesses",
            "L2accesses",
            "locxfer",
            "ctocxfer",
            "ptopxfer",
            "memxfer",
            "locAAT",
            "ctocAAT",
            "ptopAAT",
            "memAAT",
            "totalAAT",
            "memcycles",
            "ahopcycles",
            "amemnohops",
            "amemwithhops",
        ] {
            push_col(head, label);
        }
    }

    push_col(body, &tile.id.to_string());
    push_col(body, &tile.partition_scheme.to_string());
    push_col(body, &s.cycle.to_string());
    push_col(body, &s.accesses.to_string());
    push_col(body, &s.l2_accesses.to_string());
    push_col(body, &s.loc_xfer.to_string());
    push_col(body, &s.ctoc_xfer.to_string());
    push_col(body, &s.ptop_xfer.to_string());
    push_col(body, &s.mem_xfer.to_string());
    push_col(body, &aat(s.loc_delay, s.loc_xfer).to_string());
    push_col(body, &aat(s.ctoc_delay, s.ctoc_xfer).to_string());
    push_col(body, &aat(s.ptop_delay, s.ptop_xfer).to_string());
    push_col(body, &aat(s.mem_cycles + s.mem_hops_cycles, s.mem_xfer).to_string());
    push_col(body, &aat(s.cycle, s.accesses).to_string());
    push_col(body, &s.mem_cycles.to_string());
    push_col(body, &aat(s.cycle - s.mem_cycles, s.accesses).to_string());
    push_col(body, &aat(s.mem_cycles, s.accesses).to_string());
    push_col(body, &aat(s.mem_cycles + s.mem_hops_cycles, s.accesses).to_string());
}

fn cache_tabular_row(cache: &Cache, head: &mut String, body: &mut String, print_head: bool) {
    let level = if cache.level() == CacheLevel::L1 { "L1" } else { "L2" };
    let s = &cache.stats;

    if print_head {
        for suffix in ["reads", "rdMisses", "writes", "wrMisses", "wrBacks"] {
            push_col(head, &format!("{level}{suffix}"));
        }
    }

    push_col(body, &s.reads.to_string());
    push_col(body, &s.read_misses.to_string());
    push_col(body, &s.writes.to_string());
    push_col(body, &s.write_misses.to_string());
    push_col(body, &s.write_backs.to_string());
}

/// Renders one tile's tabular row. `print_head` is true only for the very
/// first tile printed (the header row is shared across the whole table).
pub fn print_tile_stats_tabular(tile: &Tile, print_head: bool) {
    let mut head = String::new();
    let mut body = String::new();

    tile_tabular_row(tile, &mut head, &mut body, print_head);
    cache_tabular_row(&tile.l1, &mut head, &mut body, print_head);
    cache_tabular_row(&tile.l2, &mut head, &mut body, print_head);

    if print_head {
        println!("{head}");
    }
    println!("{body}");
}
