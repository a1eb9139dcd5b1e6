//! Parsers for the server's human-readable statistics text.
//!
//! These are pure functions that turn raw `INFO` output into structured
//! maps. They are designed to be easily testable with string inputs.
//!
//! The feed is organized into `#`-prefixed section headers followed by
//! `key:value` lines (general form) or
//! `cmdstat_<name>:calls=<c>,usec=<u>,usec_per_call=<f>` lines
//! (command-stats form). Lines are CRLF-terminated on the wire; both line
//! endings are accepted here.

use tracing::warn;

use crate::model::{CommandMap, CommandStat, InfoMap};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses general `INFO` output into a flat key/value map.
///
/// Section markers are discarded and blank lines skipped. A line without a
/// `:` delimiter is skipped with a warning; a `key:value` line before any
/// section header is a hard error — the feed always begins with a section
/// header, so its absence means the input is structurally invalid.
///
/// A textually empty value is normalized to `"n/a"` so downstream
/// formatting never sees a missing value for a line that was present.
pub fn parse_info(text: &str) -> Result<InfoMap, ParseError> {
    let mut map = InfoMap::new();
    let mut in_section = false;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            in_section = true;
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            warn!("skipping unrecognized info line: {:?}", line);
            continue;
        };
        if !in_section {
            return Err(ParseError::new(format!(
                "field '{}' before any section header",
                key
            )));
        }
        let value = if value.is_empty() { "n/a" } else { value };
        map.insert(key.to_string(), value.to_string());
    }

    Ok(map)
}

/// Parses `INFO commandstats` output into per-command counters.
///
/// The key prefix up to and including the first `_` is stripped, so
/// `cmdstat_get` becomes `get` (and `cmdstat_georadius_ro` becomes
/// `georadius_ro`). Lines that do not match the expected shape, or whose
/// numeric fields fail to parse, are skipped with a warning. Section
/// headers are skipped but not required.
pub fn parse_commandstats(text: &str) -> Result<CommandMap, ParseError> {
    let mut map = CommandMap::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, fields)) = line.split_once(':') else {
            warn!("skipping unrecognized commandstats line: {:?}", line);
            continue;
        };
        let Some((_, name)) = key.split_once('_') else {
            warn!("skipping commandstats key without prefix: {:?}", key);
            continue;
        };
        match parse_command_fields(fields) {
            Some(stat) => {
                map.insert(name.to_string(), stat);
            }
            None => {
                warn!("skipping malformed commandstats fields: {:?}", line);
            }
        }
    }

    Ok(map)
}

/// Parses the `calls=<c>,usec=<u>,usec_per_call=<f>` field list.
/// Unknown fields are ignored; all three known fields must be present.
fn parse_command_fields(fields: &str) -> Option<CommandStat> {
    let mut calls: Option<i64> = None;
    let mut usec: Option<i64> = None;
    let mut usec_per_call: Option<f64> = None;

    for part in fields.split(',') {
        let (key, value) = part.split_once('=')?;
        match key {
            "calls" => calls = value.parse().ok(),
            "usec" => usec = value.parse().ok(),
            "usec_per_call" => usec_per_call = value.parse().ok(),
            _ => {}
        }
    }

    Some(CommandStat {
        calls: calls?,
        usec: usec?,
        usec_per_call: usec_per_call?,
    })
}
