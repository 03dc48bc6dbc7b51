// src/ingest/providers/ville_mtl.rs
//! City of Montréal open-data events CSV.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::event::{parse_date, Event, EventSource, DEFAULT_LOCATION, MONTREAL};
use crate::ingest::fix_encoding;
use crate::ingest::http::{self, CsvRow, CSV_MAX_BYTES, CSV_TIMEOUT};
use crate::ingest::types::SourceProvider;

pub const CITY_CSV_URL: &str = "https://donnees.montreal.ca/dataset/evenements-publics/\
resource/6decf611-6f11-4f34-bb36-324d804c9bad/download/evenements.csv";

/// Only rows starting within this many days from today are kept.
pub const HORIZON_DAYS: i64 = 35;

/// The portal has no popularity signal; every row gets the same modest prior.
pub const CITY_POPULARITY: f64 = 0.2;

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

pub struct VilleMtlProvider {
    mode: Mode,
    today: Option<NaiveDate>,
}

impl VilleMtlProvider {
    pub fn from_fixture_str(csv: &str) -> Self {
        Self {
            mode: Mode::Fixture(csv.to_string()),
            today: None,
        }
    }

    pub fn from_url(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
            today: None,
        }
    }

    /// Pin "today" for the horizon check (tests, replays).
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| Utc::now().with_timezone(&MONTREAL).date_naive())
    }

    /// Turn CSV rows into events; bad rows are logged and skipped.
    pub fn parse_rows(rows: &[CsvRow], today: NaiveDate) -> Vec<Event> {
        let horizon = today + Duration::days(HORIZON_DAYS);
        let mut out = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            match parse_row(row, today, horizon) {
                Ok(Some(ev)) => out.push(ev),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(target: "ingest", provider = "ville_mtl", row = idx, error = %e, "skipping row");
                }
            }
        }
        out
    }
}

fn field<'a>(row: &'a CsvRow, key: &str) -> Result<&'a str> {
    row.get(key)
        .map(|s| s.trim())
        .ok_or_else(|| anyhow::anyhow!("missing column {key}"))
}

fn non_empty<'a>(row: &'a CsvRow, key: &str) -> Option<&'a str> {
    row.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn parse_row(row: &CsvRow, today: NaiveDate, horizon: NaiveDate) -> Result<Option<Event>> {
    let start: DateTime<Tz> = parse_date(field(row, "date_debut")?)?;
    if !(today..=horizon).contains(&start.date_naive()) {
        return Ok(None);
    }
    let end = match non_empty(row, "date_fin") {
        Some(raw) => parse_date(raw)?,
        None => start + Duration::hours(2),
    };
    let url = field(row, "url_fiche")?;
    let location = non_empty(row, "titre_adresse")
        .or_else(|| non_empty(row, "arrondissement"))
        .unwrap_or(DEFAULT_LOCATION);

    let ev = Event::new(
        fix_encoding(field(row, "titre")?),
        start,
        end,
        EventSource::VilleMtl,
        url,
    )?
    .with_description(fix_encoding(field(row, "description")?))
    .with_url(url)
    .with_location(fix_encoding(location))
    .with_popularity(Some(CITY_POPULARITY));
    Ok(Some(ev))
}

#[async_trait]
impl SourceProvider for VilleMtlProvider {
    async fn fetch_latest(&self) -> Result<Vec<Event>> {
        let rows = match &self.mode {
            Mode::Fixture(s) => http::parse_csv_rows(s.as_bytes())?,
            Mode::Http { url, client } => {
                http::fetch_csv(client, url, CSV_TIMEOUT, CSV_MAX_BYTES).await?
            }
        };
        let t0 = std::time::Instant::now();
        let out = Self::parse_rows(&rows, self.today());
        super::record_parse(t0, out.len());
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "ville_mtl"
    }
}
