//! Derived views over prediction history.
//!
//! - [`aggregate`]: one-pass summary statistics
//! - [`charts`]: timeline, risk hierarchy, temporal matrix, gauge views
//! - [`cache`]: immutable snapshots and memoized derivations
//! - [`feed`]: refreshing the snapshot from the API
//! - [`activity`]: local JSONL log of client actions

pub mod activity;
pub mod aggregate;
pub mod cache;
pub mod charts;
pub mod feed;
