// src/ingest/providers/reddit.rs
//! r/montreal weekly "What's on this week" thread. One event per body line:
//! `Mar 28 | Title | Location | URL`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::event::{localize, Event, EventSource, MONTREAL};
use crate::ingest::http;
use crate::ingest::types::SourceProvider;

pub const REDDIT_SEARCH_URL: &str = "https://www.reddit.com/r/montreal/search.json";
pub const THREAD_QUERY: &str = "What's on this week";
const COMMUNITY_DESCRIPTION: &str = "Reddit r/montreal community event.";

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: String,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

pub struct RedditProvider {
    mode: Mode,
    now: Option<DateTime<Tz>>,
}

impl RedditProvider {
    pub fn from_fixture_str(json: &str) -> Self {
        Self {
            mode: Mode::Fixture(json.to_string()),
            now: None,
        }
    }

    pub fn from_url(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
            now: None,
        }
    }

    /// Pin "now" (year for dates like "Mar 28", fallback start time).
    pub fn with_now(mut self, now: DateTime<Tz>) -> Self {
        self.now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Tz> {
        self.now
            .unwrap_or_else(|| Utc::now().with_timezone(&MONTREAL))
    }

    fn parse_listing(listing: Listing, now: DateTime<Tz>) -> Vec<Event> {
        let Some(thread) = listing.data.children.into_iter().next().map(|c| c.data) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for line in thread.selftext.lines() {
            if line.trim().is_empty() || !line.contains('|') {
                continue;
            }
            match parse_line(line, &thread, now) {
                Ok(Some(ev)) => out.push(ev),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(target: "ingest", provider = "reddit", error = %e, "skipping thread line");
                }
            }
        }
        out
    }
}

fn parse_line(line: &str, thread: &Post, now: DateTime<Tz>) -> Result<Option<Event>> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    let title = parts.get(1).copied().unwrap_or_default();
    if title.is_empty() {
        return Ok(None);
    }

    // Dates carry no year; assume the current one. Unreadable dates fall back to now.
    let start = NaiveDate::parse_from_str(&format!("{} {}", parts[0], now.year()), "%b %d %Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(localize)
        .transpose()?
        .unwrap_or(now);

    let location = parts.get(2).copied().unwrap_or_default();
    let url = parts
        .get(3)
        .copied()
        .filter(|u| !u.is_empty())
        .unwrap_or(thread.url.as_str());

    let ev = Event::new(
        title,
        start,
        start + Duration::hours(2),
        EventSource::Reddit,
        format!("{}{}", thread.id, title),
    )?
    .with_description(COMMUNITY_DESCRIPTION)
    .with_location(location)
    .with_url(url);
    Ok(Some(ev))
}

#[async_trait]
impl SourceProvider for RedditProvider {
    async fn fetch_latest(&self) -> Result<Vec<Event>> {
        let listing: Listing = match &self.mode {
            Mode::Fixture(s) => serde_json::from_str(s).context("parsing reddit listing")?,
            Mode::Http { url, client } => {
                let query = [
                    ("q", THREAD_QUERY.to_string()),
                    ("restrict_sr", "1".to_string()),
                    ("sort", "new".to_string()),
                    ("limit", "1".to_string()),
                ];
                http::get_json(client, url, &query, &[]).await?
            }
        };
        let t0 = std::time::Instant::now();
        let out = Self::parse_listing(listing, self.now());
        super::record_parse(t0, out.len());
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}
