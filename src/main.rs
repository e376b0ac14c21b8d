//! Driver: wires the CLI, trace parser, migration controller, and
//! [`coherence_sim::simulator::Simulator`] together, then renders stats.
//!
//! Startup (arg parsing, trace file open) is the graceful error path —
//! `spec.md` §7 calls for exit 1 on missing/bad args and exit 0 on a trace
//! file that fails to open. Everything downstream of `Simulator::access`
//! enforces its invariants as hard assertions instead.

use std::fs;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::info;

use coherence_sim::cli::Cli;
use coherence_sim::ids::TileId;
use coherence_sim::migration::MigrationController;
use coherence_sim::params::NPROCS;
use coherence_sim::simulator::Simulator;
use coherence_sim::stats;
use coherence_sim::trace::{self, Record};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };

    let tabular = cli.tabular_enabled();

    if !tabular {
        stats::print_configuration(cli.partitions, cli.partsharing.0, &display_path(&cli.trace_file));
    }

    let contents = match fs::read_to_string(&cli.trace_file) {
        Ok(contents) => contents,
        Err(_) => {
            println!("Trace file problem");
            return ExitCode::from(0);
        }
    };

    let records = match parse_records(&contents, cli.migrate_every.is_some()) {
        Ok(records) => records,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::from(1);
        }
    };

    let mut sim = Simulator::new(cli.partitions, cli.partsharing.0);
    let mut migration = cli.migrate_every.map(MigrationController::new);

    info!("running {} trace records", records.len());

    for record in records {
        let proc = resolve_proc(record.proc, &mut migration);
        assert!(proc.0 < NPROCS, "processor id out of range after migration");
        sim.run_record(proc, record.op, record.addr);
    }

    render_output(&sim, tabular);

    ExitCode::from(0)
}

fn parse_records(contents: &str, migrating: bool) -> anyhow::Result<Vec<Record>> {
    parse_trace(contents, migrating).context("failed to parse trace file")
}

fn display_path(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn parse_trace(contents: &str, migrating: bool) -> Result<Vec<Record>, trace::TraceError> {
    if migrating {
        trace::parse_all(contents, trace::parse_line_without_proc)
    } else {
        trace::parse_all(contents, trace::parse_line_with_proc)
    }
}

fn resolve_proc(proc: Option<TileId>, migration: &mut Option<MigrationController>) -> TileId {
    match proc {
        Some(proc) => proc,
        None => migration
            .as_mut()
            .expect("shape-(a) records require --migrate-every")
            .next_host(),
    }
}

fn render_output(sim: &Simulator, tabular: bool) {
    if tabular {
        let mut first = true;
        for tile in sim.tiles() {
            stats::print_tile_stats_tabular(tile, first);
            first = false;
        }
    } else {
        for tile in sim.tiles() {
            stats::print_tile_stats(tile);
        }
    }
}
