// src/ingest/providers/ticketmaster.rs
//! Ticketmaster Discovery API, Montreal only. Enabled only when an API key is set.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::event::{Event, EventSource, MONTREAL};
use crate::ingest::http;
use crate::ingest::normalize_text;
use crate::ingest::types::SourceProvider;

pub const TICKETMASTER_API_URL: &str = "https://app.ticketmaster.com/discovery/v2/events.json";
const ENV_KEY: &str = "TICKETMASTER_API_KEY";
const WINDOW_DAYS: i64 = 30;
const PAGE_SIZE: u32 = 100;
const UNKNOWN_VENUE: &str = "TBD";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(rename = "_embedded", default)]
    embedded: Option<Embedded>,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    #[serde(default)]
    events: Vec<TmEvent>,
}

#[derive(Debug, Deserialize)]
struct TmEvent {
    id: String,
    name: String,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    url: String,
    dates: Dates,
    #[serde(rename = "_embedded", default)]
    embedded: Option<VenueList>,
}

#[derive(Debug, Deserialize)]
struct Dates {
    start: Start,
    #[serde(default)]
    end: Option<End>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Start {
    date_time: Option<DateTime<Utc>>,
    #[serde(default, rename = "dateTBD")]
    date_tbd: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct End {
    date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct VenueList {
    #[serde(default)]
    venues: Vec<Venue>,
}

#[derive(Debug, Deserialize)]
struct Venue {
    name: Option<String>,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        api_key: String,
        client: reqwest::Client,
    },
}

pub struct TicketmasterProvider {
    mode: Mode,
    now: Option<DateTime<Tz>>,
}

impl TicketmasterProvider {
    /// `None` when `TICKETMASTER_API_KEY` is unset or blank.
    pub fn from_env(client: reqwest::Client) -> Option<Self> {
        let key = std::env::var(ENV_KEY).ok().filter(|k| !k.trim().is_empty())?;
        Some(Self::with_key(TICKETMASTER_API_URL, key, client))
    }

    pub fn with_key(url: impl Into<String>, api_key: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                api_key: api_key.into(),
                client,
            },
            now: None,
        }
    }

    pub fn from_fixture_str(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
            now: None,
        }
    }

    /// Pin "now" for the already-started check and the query window.
    pub fn with_now(mut self, now: DateTime<Tz>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Tz> {
        self.now
            .unwrap_or_else(|| Utc::now().with_timezone(&MONTREAL))
    }

    fn parse_response(resp: Response, now: DateTime<Tz>) -> Vec<Event> {
        let items = resp.embedded.map(|e| e.events).unwrap_or_default();
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let id = item.id.clone();
            match to_event(item, now) {
                Ok(Some(ev)) => out.push(ev),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(target: "ingest", provider = "ticketmaster", event_id = %id, error = %e, "skipping event");
                }
            }
        }
        out
    }
}

fn to_event(item: TmEvent, now: DateTime<Tz>) -> Result<Option<Event>> {
    let Some(start) = item.dates.start.date_time else {
        bail!("no start dateTime");
    };
    if start < now {
        return Ok(None);
    }
    let tbd = item.dates.start.date_tbd;
    let end = match item.dates.end.and_then(|e| e.date_time) {
        Some(end) => end,
        None if tbd => start + Duration::hours(23) + Duration::minutes(59),
        None => start,
    };
    let venue = item
        .embedded
        .and_then(|v| v.venues.into_iter().next())
        .and_then(|v| v.name)
        .unwrap_or_else(|| UNKNOWN_VENUE.to_string());

    let ev = Event::new(
        normalize_text(&item.name),
        start,
        end,
        EventSource::Ticketmaster,
        item.id,
    )?
    .with_description(normalize_text(item.info.as_deref().unwrap_or_default()))
    .with_location(venue)
    .with_url(item.url)
    .all_day(tbd);
    Ok(Some(ev))
}

#[async_trait]
impl SourceProvider for TicketmasterProvider {
    async fn fetch_latest(&self) -> Result<Vec<Event>> {
        let now = self.now();
        let resp: Response = match &self.mode {
            Mode::Fixture(s) => serde_json::from_str(s).context("parsing ticketmaster json")?,
            Mode::Http {
                url,
                api_key,
                client,
            } => {
                let from = now.with_timezone(&Utc);
                let to = from + Duration::days(WINDOW_DAYS);
                let query = [
                    ("apikey", api_key.clone()),
                    ("city", "Montreal".to_string()),
                    ("countryCode", "CA".to_string()),
                    ("startDateTime", from.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("endDateTime", to.to_rfc3339_opts(SecondsFormat::Secs, true)),
                    ("size", PAGE_SIZE.to_string()),
                    ("sort", "date,asc".to_string()),
                ];
                http::get_json(client, url, &query, &[]).await?
            }
        };
        let t0 = std::time::Instant::now();
        let out = Self::parse_response(resp, now);
        super::record_parse(t0, out.len());
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "ticketmaster"
    }
}
