// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod event;
pub mod source_weights;

// Source adapters, aggregation, dedup
pub mod ingest;

// Scoring and day-capacity selection
pub mod rank;

// Remote calendar reconciliation
pub mod sync;

#[cfg(test)]
mod test_support;

// ---- Re-exports for stable public API ----
pub use crate::event::{Event, EventError, EventSource, ReconciliationKey};
pub use crate::ingest::{deduplicate, pull_all};
pub use crate::rank::{process, rank_and_filter, Processed, RankContext};
pub use crate::sync::{OpOutcome, Reconciler, SyncError, SyncReport, SyncStatus};
