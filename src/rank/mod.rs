// src/rank/mod.rs
//! Scoring and day-capacity selection for timed events.
//!
//! All policy (weights, keywords, source table, language signal, limits)
//! travels in an explicit [`RankContext`]; nothing here reads global state.

pub mod capacity;
pub mod keywords;
pub mod language;
pub mod scoring;
pub mod weights;

pub use capacity::{select_by_capacity, CapacityLimits};
pub use keywords::KeywordMap;
pub use language::{BilingualHeuristic, LanguageSignal, NoLanguageSignal};
pub use scoring::{score_event, ScoreInputs};
pub use weights::RankWeights;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::event::Event;
use crate::ingest::deduplicate;
use crate::source_weights::SourceWeightsConfig;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("rank_kept_total", "Timed events kept after scoring and capacity selection.");
    });
}

/// Everything the scorer and filter need, built once by the caller.
#[derive(Clone)]
pub struct RankContext {
    pub weights: RankWeights,
    pub keywords: KeywordMap,
    pub source_weights: SourceWeightsConfig,
    pub language: Arc<dyn LanguageSignal>,
    pub limits: CapacityLimits,
    pub min_score: f64,
    pub hard_cap: usize,
    pub festival_cap: Option<usize>,
}

impl Default for RankContext {
    fn default() -> Self {
        Self::from_config(
            &PipelineConfig::default(),
            KeywordMap::default(),
            SourceWeightsConfig::default_seed(),
        )
    }
}

impl RankContext {
    /// The language signal is the bilingual heuristic; it only matters when
    /// `weights.language > 0`.
    pub fn from_config(
        cfg: &PipelineConfig,
        keywords: KeywordMap,
        source_weights: SourceWeightsConfig,
    ) -> Self {
        Self {
            weights: cfg.weights,
            keywords,
            source_weights,
            language: Arc::new(BilingualHeuristic),
            limits: cfg.capacity(),
            min_score: cfg.min_score,
            hard_cap: cfg.hard_cap,
            festival_cap: cfg.festival_cap,
        }
    }

    pub fn with_language(mut self, signal: Arc<dyn LanguageSignal>) -> Self {
        self.language = signal;
        self
    }
}

/// Outcome of one ranking pass.
#[derive(Debug, Default)]
pub struct Ranked {
    pub kept: Vec<Event>,
    pub below_threshold: usize,
    pub by_capacity: usize,
}

/// Score, threshold, capacity selection, hard cap. Input should be timed events.
pub fn rank(events: Vec<Event>, ctx: &RankContext) -> Ranked {
    ensure_metrics_described();

    let mut candidates = Vec::with_capacity(events.len());
    let mut below_threshold = 0usize;
    for mut ev in events {
        let score = score_event(&mut ev, ctx);
        if score < ctx.min_score {
            below_threshold += 1;
            tracing::trace!(target: "rank", title = %ev.title, score, "below threshold");
            continue;
        }
        candidates.push(ev);
    }

    let offered = candidates.len();
    let mut kept = select_by_capacity(candidates, ctx.limits);
    kept.truncate(ctx.hard_cap);

    counter!("rank_kept_total").increment(kept.len() as u64);
    Ranked {
        by_capacity: offered - kept.len(),
        below_threshold,
        kept,
    }
}

/// Scored and capacity-filtered timed events, in acceptance order.
pub fn rank_and_filter(events: Vec<Event>, ctx: &RankContext) -> Vec<Event> {
    rank(events, ctx).kept
}

/// Result of the whole in-memory pipeline.
#[derive(Debug, Default)]
pub struct Processed {
    /// All-day records, unscored, input order.
    pub festivals: Vec<Event>,
    /// Timed records that survived ranking, acceptance order.
    pub curated: Vec<Event>,
    pub dropped_duplicates: usize,
    pub dropped_below_threshold: usize,
    pub dropped_by_capacity: usize,
}

impl Processed {
    pub fn is_empty(&self) -> bool {
        self.festivals.is_empty() && self.curated.is_empty()
    }

    /// Festivals first, then curated: the list handed to the calendar sync.
    pub fn into_events(self) -> Vec<Event> {
        let mut out = self.festivals;
        out.extend(self.curated);
        out
    }
}

/// Dedup, split all-day from timed, rank the timed ones, apply caps.
pub fn process(events: Vec<Event>, ctx: &RankContext) -> Processed {
    let before = events.len();
    let unique = deduplicate(events);
    let dropped_duplicates = before - unique.len();

    let (mut festivals, timed): (Vec<Event>, Vec<Event>) =
        unique.into_iter().partition(|e| e.is_all_day);
    if let Some(cap) = ctx.festival_cap {
        festivals.truncate(cap);
    }

    let ranked = rank(timed, ctx);
    tracing::info!(
        target: "rank",
        festivals = festivals.len(),
        curated = ranked.kept.len(),
        dropped_duplicates,
        below_threshold = ranked.below_threshold,
        by_capacity = ranked.by_capacity,
        "ranking done"
    );

    Processed {
        festivals,
        curated: ranked.kept,
        dropped_duplicates,
        dropped_below_threshold: ranked.below_threshold,
        dropped_by_capacity: ranked.by_capacity,
    }
}
