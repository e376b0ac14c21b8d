//! Command-line surface: `coherence-sim <partitions> <partsharing>
//! <trace_file> [tabular]`. Argument validation is the graceful error path
//! (`spec.md` §7); everything past this module treats its protocol
//! invariants as hard assertions.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use thiserror::Error;

use crate::params::PartitionScheme;

/// Errors from validating the CLI's own positional arguments (partition
/// scheme, partition-sharing flag) -- the recoverable, input-validation
/// path `spec.md` §7 calls for. Protocol invariants past this point stay
/// hard assertions, never a `Result`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("invalid partition scheme '{0}' (expected 1, 2, 4, 8, or 16)")]
    InvalidPartitions(String),
    #[error("invalid partsharing '{0}' (expected 0 or 1)")]
    InvalidPartSharing(String),
}

/// `value_parser` for the `partitions` field: wraps [`PartitionScheme`]'s
/// own `FromStr` (which stays in `params.rs`, free of CLI concerns) and
/// reports failures as a typed [`CliError`] instead of clap's generic
/// string-based error.
fn parse_partitions(s: &str) -> Result<PartitionScheme, CliError> {
    s.parse().map_err(|_| CliError::InvalidPartitions(s.to_string()))
}

/// Trace-driven simulator for a tiled CMP with a directory-based MESI
/// protocol and partitioned aggregate L2s.
#[derive(Debug, Parser)]
#[command(name = "coherence-sim", version, about)]
pub struct Cli {
    /// Tiles per partition: 1, 2, 4, 8, or 16.
    #[arg(value_parser = parse_partitions)]
    pub partitions: PartitionScheme,

    /// Allow inter-partition L2-to-L2 forwarding on a read miss (0 or 1).
    /// When disabled, every inter-partition miss goes to memory.
    pub partsharing: PartSharing,

    /// Path to the trace file (one record per line).
    pub trace_file: PathBuf,

    /// Switch output to the tabular (whitespace-padded column) format
    /// instead of the per-tile report. The original CLI instead keyed this
    /// off the mere presence of a fourth positional argument; a named flag
    /// is the idiomatic `clap` surface for a boolean switch.
    #[arg(long)]
    pub tabular: bool,

    /// Parse traces in shape (a) (`<op> <hexaddr>`, no processor column),
    /// migrating the logical process to the next tile every N records.
    #[arg(long)]
    pub migrate_every: Option<u64>,
}

impl Cli {
    pub fn tabular_enabled(&self) -> bool {
        self.tabular
    }
}

/// Wraps a bool to give `clap` a value parser for `partsharing` without
/// depending on `clap`'s derive macros inside `params.rs` (which stays
/// free of CLI concerns, per `spec.md` §9's context-object boundary).
#[derive(Debug, Clone, Copy)]
pub struct PartSharing(pub bool);

impl FromStr for PartSharing {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Self(false)),
            "1" => Ok(Self(true)),
            other => Err(CliError::InvalidPartSharing(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partsharing_rejects_bad_value() {
        let err = "2".parse::<PartSharing>().unwrap_err();
        assert_eq!(err, CliError::InvalidPartSharing("2".to_string()));
    }

    #[test]
    fn parse_partitions_rejects_bad_value() {
        let err = parse_partitions("3").unwrap_err();
        assert_eq!(err, CliError::InvalidPartitions("3".to_string()));
    }
}
