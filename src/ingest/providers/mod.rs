// src/ingest/providers/mod.rs
pub mod reddit;
pub mod rss;
pub mod ticketmaster;
pub mod ville_mtl;

pub use reddit::RedditProvider;
pub use rss::RssProvider;
pub use ticketmaster::TicketmasterProvider;
pub use ville_mtl::VilleMtlProvider;

use metrics::{counter, histogram};
use std::time::Instant;

/// Record parse timing and yield for a provider run (same series for all providers).
pub(crate) fn record_parse(t0: Instant, produced: usize) {
    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_parsed_total").increment(produced as u64);
}
