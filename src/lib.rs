//! rcstat — live per-command statistics monitor for Redis.
//!
//! Connects to a running instance, polls `INFO` and `INFO commandstats`
//! on a configurable interval, and prints a continuously refreshing table
//! of per-command call deltas and rates, ranked by a user-selectable
//! column. Single keystrokes adjust the refresh interval and sort column
//! while the loop runs.
//!
//! Modules:
//! - `model`  — shared data model (snapshots, delta rows, sort columns)
//! - `parser` — raw statistics text → structured maps (pure, no I/O)
//! - `delta`  — snapshot diffing and ranking (pure, no I/O)
//! - `source` — the store collaborator behind the `StatsSource` trait
//! - `input`  — bounded-wait single-key input with raw-mode guard
//! - `render` — header and table formatting (pure)
//! - `app`    — the sampling loop driving poll/wait/render cycles

pub mod app;
pub mod delta;
pub mod input;
pub mod model;
pub mod parser;
pub mod render;
pub mod source;
