// src/ingest/providers/rss.rs
//! Generic RSS provider: each configured feed maps to one source tag.
//! Items become 2-hour events starting at their publication date.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Duration;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::event::{parse_date, Event, EventSource};
use crate::ingest::config::FeedSpec;
use crate::ingest::http;
use crate::ingest::normalize_text;
use crate::ingest::types::SourceProvider;

const FEED_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    updated: Option<String>,
    description: Option<String>,
    guid: Option<Guid>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

enum Feed {
    Fixture { xml: String, source: EventSource },
    Http(FeedSpec),
}

pub struct RssProvider {
    feeds: Vec<Feed>,
    client: reqwest::Client,
}

impl RssProvider {
    pub fn from_fixture_str(xml: &str, source: EventSource) -> Self {
        Self {
            feeds: vec![Feed::Fixture {
                xml: xml.to_string(),
                source,
            }],
            client: reqwest::Client::new(),
        }
    }

    pub fn from_feeds(feeds: Vec<FeedSpec>, client: reqwest::Client) -> Self {
        Self {
            feeds: feeds.into_iter().map(Feed::Http).collect(),
            client,
        }
    }

    /// Parse one feed document. Items without a usable date or link are skipped.
    pub fn parse_feed(xml: &str, source: EventSource) -> Result<Vec<Event>> {
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            match item_to_event(it, source) {
                Ok(ev) => out.push(ev),
                Err(e) => {
                    tracing::warn!(target: "ingest", provider = "rss", %source, error = %e, "skipping feed item");
                }
            }
        }
        Ok(out)
    }

    async fn load(&self, feed: &Feed) -> Result<Vec<Event>> {
        match feed {
            Feed::Fixture { xml, source } => Self::parse_feed(xml, *source),
            Feed::Http(spec) => {
                let body = http::get_text(&self.client, &spec.url, FEED_TIMEOUT).await?;
                Self::parse_feed(&body, spec.source)
                    .with_context(|| format!("feed {}", spec.url))
            }
        }
    }
}

fn item_to_event(it: Item, source: EventSource) -> Result<Event> {
    let title = normalize_text(it.title.as_deref().unwrap_or_default());
    if title.is_empty() {
        bail!("item has no title");
    }
    let raw_date = it
        .pub_date
        .as_deref()
        .or(it.updated.as_deref())
        .unwrap_or_default();
    let start = parse_date(raw_date)?;
    let link = it.link.unwrap_or_default().trim().to_string();
    let source_id = it
        .guid
        .and_then(|g| g.value)
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| link.clone());
    if source_id.is_empty() {
        bail!("item has neither guid nor link");
    }

    let ev = Event::new(title, start, start + Duration::hours(2), source, source_id)?
        .with_description(normalize_text(it.description.as_deref().unwrap_or_default()))
        .with_url(link);
    Ok(ev)
}

#[async_trait]
impl SourceProvider for RssProvider {
    async fn fetch_latest(&self) -> Result<Vec<Event>> {
        let t0 = std::time::Instant::now();
        let mut out = Vec::new();
        let mut failures = 0usize;
        for feed in &self.feeds {
            match self.load(feed).await {
                Ok(mut v) => out.append(&mut v),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(target: "ingest", provider = "rss", error = %format!("{e:#}"), "feed failed");
                }
            }
        }
        if failures > 0 && failures == self.feeds.len() {
            bail!("all {failures} rss feeds failed");
        }
        super::record_parse(t0, out.len());
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
