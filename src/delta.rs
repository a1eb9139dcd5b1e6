//! Delta computation between two command-stats snapshots.
//!
//! This module is the single source of truth for delta and rate logic:
//! pure functions over two [`CommandMap`]s and an elapsed-time divisor, no
//! I/O. Rounding is a rendering concern and never happens here.

use crate::model::{CommandMap, DeltaRow, SortColumn};

/// Produces one [`DeltaRow`] per command present in BOTH maps.
///
/// The intersection is deliberate: a command first invoked between the two
/// samples has no baseline to diff against, so it is withheld until the
/// next cycle. Deltas may be negative (counter wrap or server restart) and
/// are surfaced as-is.
///
/// The sequence is lazy, finite and recomputed fresh on each call.
///
/// # Panics
///
/// `calc_interval_secs` of zero is a contract violation — the sampling
/// loop guarantees a divisor of at least one second by construction.
pub fn delta_rows<'a>(
    prev: &'a CommandMap,
    curr: &'a CommandMap,
    calc_interval_secs: u64,
) -> impl Iterator<Item = DeltaRow> + 'a {
    assert!(
        calc_interval_secs >= 1,
        "calc interval must be at least one second"
    );
    curr.iter().filter_map(move |(name, stat)| {
        let last = prev.get(name)?;
        let calls_since_last = stat.calls - last.calls;
        Some(DeltaRow {
            command: name.clone(),
            total_calls: stat.calls,
            calls_since_last,
            calls_per_second: calls_since_last as f64 / calc_interval_secs as f64,
            usec_per_call: stat.usec_per_call,
        })
    })
}

/// Ranks rows descending by the selected column.
///
/// Comparison is numeric on every column. Ties fall back to command name
/// so output order is stable across cycles.
pub fn rank(mut rows: Vec<DeltaRow>, sort: SortColumn) -> Vec<DeltaRow> {
    rows.sort_by(|a, b| {
        sort_key(b, sort)
            .total_cmp(&sort_key(a, sort))
            .then_with(|| a.command.cmp(&b.command))
    });
    rows
}

fn sort_key(row: &DeltaRow, sort: SortColumn) -> f64 {
    match sort {
        SortColumn::TotalCalls => row.total_calls as f64,
        SortColumn::SinceLast => row.calls_since_last as f64,
        SortColumn::CallsPerSec => row.calls_per_second,
        SortColumn::UsecPerCall => row.usec_per_call,
    }
}
