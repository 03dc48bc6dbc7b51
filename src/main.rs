//! mtl-events-agent — one pass: pull sources, dedup + rank, sync to the calendar.
//!
//! Exit status: 0 synced (fully or partly) or nothing to do, 1 configuration
//! or hard sync failure, 2 every write failed.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mtl_events_agent::config::calendar::dry_run_enabled;
use mtl_events_agent::config::{CalendarConfig, PipelineConfig};
use mtl_events_agent::ingest::config::load_feeds_default;
use mtl_events_agent::ingest::http::build_client;
use mtl_events_agent::ingest::providers::{
    reddit::REDDIT_SEARCH_URL, ville_mtl::CITY_CSV_URL, RedditProvider, RssProvider,
    TicketmasterProvider, VilleMtlProvider,
};
use mtl_events_agent::ingest::pull_all;
use mtl_events_agent::ingest::types::SourceProvider;
use mtl_events_agent::rank::{process, KeywordMap, RankContext};
use mtl_events_agent::source_weights::SourceWeightsConfig;
use mtl_events_agent::sync::{
    CalendarStore, GoogleCalendarStore, MemoryStore, Reconciler, SyncStatus,
};

const DEFAULT_FILTER: &str = "mtl_events_agent=info,warn";

/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches output.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

struct Setup {
    pipeline: PipelineConfig,
    rank: RankContext,
    providers: Vec<Arc<dyn SourceProvider>>,
    store: Arc<dyn CalendarStore>,
    dry_run: bool,
}

/// Everything that can fail for configuration reasons, before any fetch.
fn setup() -> anyhow::Result<Setup> {
    let pipeline = PipelineConfig::load_default().context("pipeline config")?;
    let keywords = KeywordMap::load_default().context("keywords")?;
    let source_weights = SourceWeightsConfig::load_default();
    let feeds = load_feeds_default().context("feed list")?;
    let client = build_client()?;

    let dry_run = dry_run_enabled();
    let store: Arc<dyn CalendarStore> = if dry_run {
        Arc::new(MemoryStore::new())
    } else {
        let cal = CalendarConfig::from_env().context("calendar config")?;
        Arc::new(GoogleCalendarStore::from_config(&cal, client.clone()).context("calendar client")?)
    };

    let mut providers: Vec<Arc<dyn SourceProvider>> = vec![
        Arc::new(VilleMtlProvider::from_url(CITY_CSV_URL, client.clone())),
        Arc::new(RedditProvider::from_url(REDDIT_SEARCH_URL, client.clone())),
        Arc::new(RssProvider::from_feeds(feeds, client.clone())),
    ];
    match TicketmasterProvider::from_env(client) {
        Some(tm) => providers.push(Arc::new(tm)),
        None => tracing::info!("TICKETMASTER_API_KEY not set; ticketmaster disabled"),
    }

    let rank = RankContext::from_config(&pipeline, keywords, source_weights);
    Ok(Setup {
        pipeline,
        rank,
        providers,
        store,
        dry_run,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let setup = match setup() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "configuration error");
            eprintln!("configuration error: {e:#}");
            return ExitCode::from(1);
        }
    };

    let pulled = pull_all(&setup.providers, setup.pipeline.source_timeout()).await;
    let failed_sources: Vec<_> = pulled.failed_sources().map(|s| s.name).collect();
    tracing::info!(
        events = pulled.events.len(),
        ?failed_sources,
        "sources pulled"
    );
    if pulled.events.is_empty() {
        tracing::info!("no events found; nothing to sync");
        return ExitCode::SUCCESS;
    }

    let processed = process(pulled.events, &setup.rank);
    tracing::info!(
        festivals = processed.festivals.len(),
        curated = processed.curated.len(),
        "events selected"
    );
    let events = processed.into_events();

    let reconciler = Reconciler::new(setup.store, setup.pipeline.sync_options());
    let report = match reconciler.sync(&events).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "sync failed");
            return ExitCode::from(1);
        }
    };

    let status = report.status();
    tracing::info!(
        dry_run = setup.dry_run,
        created = report.created(),
        updated = report.updated(),
        skipped = report.skipped(),
        failed = report.failed(),
        deleted = report.deleted,
        ?status,
        "run complete"
    );
    match status {
        SyncStatus::NothingSynced if !events.is_empty() => ExitCode::from(2),
        _ => ExitCode::SUCCESS,
    }
}
