//! Trace file parsing. Two record shapes are supported:
//!
//! - **Shape (b)**, the default: `<proc> <op> <hexaddr>` per line, e.g.
//!   `0 r 7fc61248`. The processor id is explicit on every line.
//! - **Shape (a)**, enabled with `--migrate-every`: `<op> <hexaddr>` with
//!   no processor column; the logical process is hosted on a tile that a
//!   [`crate::migration::MigrationController`] advances every N records.

use std::str::FromStr;

use thiserror::Error;

use crate::cache::Op;
use crate::ids::TileId;
use crate::params::NPROCS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("line {line}: missing processor id")]
    MissingProc { line: usize },
    #[error("line {line}: invalid processor id {value:?}")]
    InvalidProc { line: usize, value: String },
    #[error("line {line}: processor id {proc} out of range (NPROCS = {NPROCS})")]
    ProcOutOfRange { line: usize, proc: usize },
    #[error("line {line}: missing operation")]
    MissingOp { line: usize },
    #[error("line {line}: invalid operation {value:?} (expected 'r' or 'w')")]
    InvalidOp { line: usize, value: String },
    #[error("line {line}: missing address")]
    MissingAddr { line: usize },
    #[error("line {line}: invalid hex address {value:?}")]
    InvalidAddr { line: usize, value: String },
}

/// A single parsed trace record. `proc` is `None` for shape-(a) records
/// (no explicit processor column); the caller resolves those through a
/// [`crate::migration::MigrationController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub proc: Option<TileId>,
    pub op: Op,
    pub addr: u64,
}

fn parse_op(line: usize, token: &str) -> Result<Op, TraceError> {
    match token.chars().next() {
        Some('r') => Ok(Op::Read),
        Some('w') => Ok(Op::Write),
        _ => Err(TraceError::InvalidOp {
            line,
            value: token.to_string(),
        }),
    }
}

fn parse_addr(line: usize, token: &str) -> Result<u64, TraceError> {
    let trimmed = token.strip_prefix("0x").unwrap_or(token);
    u64::from_str_radix(trimmed, 16).map_err(|_| TraceError::InvalidAddr {
        line,
        value: token.to_string(),
    })
}

/// Parses one shape-(b) line: `<proc> <op> <hexaddr>`, whitespace/tab
/// delimited (matching the original's `" \t\n"` token delimiters).
pub fn parse_line_with_proc(line_no: usize, line: &str) -> Result<Record, TraceError> {
    let mut tokens = line.split_whitespace();

    let proc_tok = tokens.next().ok_or(TraceError::MissingProc { line: line_no })?;
    let proc = usize::from_str(proc_tok).map_err(|_| TraceError::InvalidProc {
        line: line_no,
        value: proc_tok.to_string(),
    })?;
    if proc >= NPROCS {
        return Err(TraceError::ProcOutOfRange { line: line_no, proc });
    }
    let proc = TileId(proc);

    let op_tok = tokens.next().ok_or(TraceError::MissingOp { line: line_no })?;
    let op = parse_op(line_no, op_tok)?;

    let addr_tok = tokens.next().ok_or(TraceError::MissingAddr { line: line_no })?;
    let addr = parse_addr(line_no, addr_tok)?;

    Ok(Record {
        proc: Some(proc),
        op,
        addr,
    })
}

/// Parses one shape-(a) line: `<op> <hexaddr>`, no processor column.
pub fn parse_line_without_proc(line_no: usize, line: &str) -> Result<Record, TraceError> {
    let mut tokens = line.split_whitespace();

    let op_tok = tokens.next().ok_or(TraceError::MissingOp { line: line_no })?;
    let op = parse_op(line_no, op_tok)?;

    let addr_tok = tokens.next().ok_or(TraceError::MissingAddr { line: line_no })?;
    let addr = parse_addr(line_no, addr_tok)?;

    Ok(Record {
        proc: None,
        op,
        addr,
    })
}

/// Parses every non-blank line of `contents` using `parse_line`, which is
/// either [`parse_line_with_proc`] or [`parse_line_without_proc`] depending
/// on the trace shape in use.
pub fn parse_all(
    contents: &str,
    parse_line: impl Fn(usize, &str) -> Result<Record, TraceError>,
) -> Result<Vec<Record>, TraceError> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| parse_line(i + 1, line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shape_b_record() {
        let rec = parse_line_with_proc(1, "0 r 7fc61248").unwrap();
        assert_eq!(rec.proc, Some(TileId(0)));
        assert_eq!(rec.op, Op::Read);
        assert_eq!(rec.addr, 0x7fc61248);
    }

    #[test]
    fn accepts_0x_prefixed_addr() {
        let rec = parse_line_with_proc(1, "3 w 0xDEADBEEF").unwrap();
        assert_eq!(rec.proc, Some(TileId(3)));
        assert_eq!(rec.addr, 0xDEADBEEF);
    }

    #[test]
    fn rejects_bad_op() {
        let err = parse_line_with_proc(2, "0 x 1000").unwrap_err();
        assert!(matches!(err, TraceError::InvalidOp { line: 2, .. }));
    }

    #[test]
    fn rejects_out_of_range_proc() {
        let err = parse_line_with_proc(3, "16 r 1000").unwrap_err();
        assert!(matches!(err, TraceError::ProcOutOfRange { line: 3, proc: 16 }));
    }

    #[test]
    fn shape_a_has_no_proc() {
        let rec = parse_line_without_proc(1, "r 1000").unwrap();
        assert_eq!(rec.proc, None);
    }

    #[test]
    fn parse_all_skips_blank_lines() {
        let recs = parse_all("0 r 1000\n\n1 w 2000\n", parse_line_with_proc).unwrap();
        assert_eq!(recs.len(), 2);
    }
}
