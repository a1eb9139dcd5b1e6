//! Pure text formatting for the header block and the ranked table.
//!
//! No decision logic lives here: the sampling loop decides what to show,
//! this module only turns it into text. Rounding happens here and nowhere
//! else — `calls/sec` to 0 decimal places, `usec/call` to 2.

use crate::model::{DeltaRow, InfoMap, SortColumn};

/// Commands whose cost scales with the number of keys or queued commands
/// they touch; their usec/call reads high by nature, so the table marks
/// them `* name *`.
const MULTI_KEY_COMMANDS: &[&str] = &[
    "bitop",
    "blpop",
    "brpop",
    "brpoplpush",
    "msetnx",
    "rpoplpush",
    "sdiff",
    "sdiffstore",
    "sinter",
    "sinterstore",
    "smove",
    "sort",
    "sunion",
    "xread",
    "xreadgroup",
    "zinterstore",
    "zunionstore",
    "multi",
    "exec",
];

/// Fixed widths for the numeric columns; the command column is sized to
/// its contents.
const TOTAL_WIDTH: usize = 10;
const SINCE_WIDTH: usize = 14;
const RATE_WIDTH: usize = 11;
const USEC_WIDTH: usize = 11;

/// Formats the four-line header block.
///
/// With a previous info map, the connection total is annotated with the
/// number of connections received since the last sample. Missing or
/// non-numeric counters degrade to the plain form rather than failing.
pub fn header(info: &InfoMap, prev: Option<&InfoMap>) -> String {
    let field = |key: &str| info.get(key).map(String::as_str).unwrap_or("n/a");

    let connections = match prev.and_then(|p| connections_delta(info, p)) {
        Some(diff) => format!(
            "{} total connections ({} new)",
            field("total_connections_received"),
            diff
        ),
        None => format!("{} total connections", field("total_connections_received")),
    };

    format!(
        "Redis {} ({}) on {} (pid: {})\n\
         uptime: {} days, replication role: {}, connected slaves: {}\n\
         {}, {} connected, used memory: {}\n\
         {} ops/sec, input: {} kbps, output: {} kbps",
        field("redis_version"),
        field("redis_mode"),
        field("os"),
        field("process_id"),
        field("uptime_in_days"),
        field("role"),
        field("connected_slaves"),
        connections,
        field("connected_clients"),
        field("used_memory_human"),
        field("instantaneous_ops_per_sec"),
        field("instantaneous_input_kbps"),
        field("instantaneous_output_kbps"),
    )
}

/// Connections received between the two samples, if both counters are
/// present and numeric.
fn connections_delta(curr: &InfoMap, prev: &InfoMap) -> Option<i64> {
    let c: i64 = curr.get("total_connections_received")?.parse().ok()?;
    let p: i64 = prev.get("total_connections_received")?.parse().ok()?;
    Some(c - p)
}

/// Formats the ranked table plus its cadence, sort and control-hint lines.
///
/// `refresh_interval_secs` is the displayed cadence only; the rates inside
/// `rows` were already computed against the actual elapsed interval.
pub fn table(rows: &[DeltaRow], sort: SortColumn, refresh_interval_secs: u64) -> String {
    let name_width = rows
        .iter()
        .map(|r| display_name(&r.command).len())
        .max()
        .unwrap_or(0)
        .max("call".len());

    let mut out = String::new();
    out.push_str(&format!(
        "refresh interval: {} seconds (press +/- to change)\n",
        refresh_interval_secs
    ));
    out.push_str(&format!("sorting on '{}'\n", sort.label()));

    out.push_str(&format!(
        "{:<name_width$}  {:>TOTAL_WIDTH$}  {:>SINCE_WIDTH$}  {:>RATE_WIDTH$}  {:>USEC_WIDTH$}\n",
        "call", "total", "since last int", "calls/sec", "usec/call",
    ));
    out.push_str(&format!(
        "{:-<name_width$}  {:->TOTAL_WIDTH$}  {:->SINCE_WIDTH$}  {:->RATE_WIDTH$}  {:->USEC_WIDTH$}\n",
        "", "", "", "", "",
    ));

    for row in rows {
        out.push_str(&format!(
            "{:<name_width$}  {:>TOTAL_WIDTH$}  {:>SINCE_WIDTH$}  {:>RATE_WIDTH$.0}  {:>USEC_WIDTH$.2}\n",
            display_name(&row.command),
            row.total_calls,
            row.calls_since_last,
            row.calls_per_second,
            row.usec_per_call,
        ));
    }

    out.push_str("sort on numeric columns by pressing 1-4. press q or esc to exit.");
    out
}

fn display_name(command: &str) -> String {
    if MULTI_KEY_COMMANDS.contains(&command) {
        format!("* {} *", command)
    } else {
        command.to_string()
    }
}
