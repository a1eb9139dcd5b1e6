//! Shared data model for snapshots, delta rows and sort columns.

use std::collections::HashMap;

/// Flat key/value mapping from the general `INFO` output
/// (server version, uptime, connection counters, memory, throughput gauges).
pub type InfoMap = HashMap<String, String>;

/// Cumulative counters for a single command, as reported by
/// `INFO commandstats`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandStat {
    /// Total number of calls since server start.
    pub calls: i64,
    /// Total CPU time consumed by this command, in microseconds.
    pub usec: i64,
    /// Average CPU time per call, in microseconds.
    pub usec_per_call: f64,
}

/// Per-command counters keyed by bare command name (`cmdstat_` prefix stripped).
pub type CommandMap = HashMap<String, CommandStat>;

/// One point-in-time capture of server statistics.
///
/// The two parts are fetched back-to-back by a single poll and treated as
/// one logical sample.
#[derive(Debug, Clone)]
pub struct StatSnapshot {
    pub info: InfoMap,
    pub commands: CommandMap,
}

/// Per-command difference between two snapshots.
///
/// Derived and ephemeral: rows are recomputed fresh each cycle and never
/// retained.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaRow {
    pub command: String,
    /// Cumulative call count from the current snapshot.
    pub total_calls: i64,
    /// Call count delta against the previous snapshot. May be negative if
    /// the counter wrapped or the server restarted; surfaced as-is.
    pub calls_since_last: i64,
    /// `calls_since_last` normalized to the actual elapsed interval.
    pub calls_per_second: f64,
    /// Latest sample's average, not a delta.
    pub usec_per_call: f64,
}

/// Numeric table column selectable as the ranking key.
///
/// The command-name column is deliberately not representable here: sorting
/// is numeric only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    TotalCalls,
    SinceLast,
    CallsPerSec,
    UsecPerCall,
}

impl SortColumn {
    /// Maps the digit keys `1`-`4` to a column. Any other character
    /// (including `0` and `5`-`9`) is out of domain.
    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '1' => Some(SortColumn::TotalCalls),
            '2' => Some(SortColumn::SinceLast),
            '3' => Some(SortColumn::CallsPerSec),
            '4' => Some(SortColumn::UsecPerCall),
            _ => None,
        }
    }

    /// Column label as shown in the table header and the sort line.
    pub fn label(self) -> &'static str {
        match self {
            SortColumn::TotalCalls => "total",
            SortColumn::SinceLast => "since last int",
            SortColumn::CallsPerSec => "calls/sec",
            SortColumn::UsecPerCall => "usec/call",
        }
    }
}
