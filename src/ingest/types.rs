// src/ingest/types.rs
use anyhow::Result;
use std::time::Duration;

use crate::event::Event;

/// A single upstream source of events. Implementations do their own parsing
/// and hand back validated, Montreal-zoned records.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Event>>;
    fn name(&self) -> &'static str;
}

/// What happened to one provider during an aggregate pull.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Ok { count: usize },
    Failed { error: String },
    TimedOut { after: Duration },
}

impl SourceOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, SourceOutcome::Ok { .. })
    }
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub name: &'static str,
    pub outcome: SourceOutcome,
    pub elapsed: Duration,
}

/// Merged result of one pull across all providers.
#[derive(Debug, Clone, Default)]
pub struct PullReport {
    pub events: Vec<Event>,
    pub sources: Vec<SourceReport>,
}

impl PullReport {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| !s.outcome.is_ok())
    }
}
