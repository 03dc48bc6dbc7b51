// src/event.rs
//! # Event record
//! The one shape every source adapter produces and every pipeline stage
//! consumes. Timestamps are always zoned to America/Montreal.
//!
//! `(source, source_id)` is the durable identity of an event: it is what the
//! sync layer stores remotely and matches on in later runs.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Home timezone of every event in the pipeline.
pub const MONTREAL: Tz = chrono_tz::America::Montreal;

/// Location used when an adapter has nothing better.
pub const DEFAULT_LOCATION: &str = "Montreal";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("event ends before it starts ({end} < {start})")]
    EndBeforeStart { start: String, end: String },
    #[error("date string cannot be empty")]
    EmptyDate,
    #[error("could not parse date string: {0}")]
    UnparsableDate(String),
    #[error("local time {0} does not exist in America/Montreal")]
    NonexistentLocalTime(NaiveDateTime),
    #[error("unknown event source: {0}")]
    UnknownSource(String),
}

/// Origin system of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    VilleMtl,
    TourismeMtl,
    Eventbrite,
    Ticketmaster,
    Reddit,
    MtlBlog,
    Gazette,
}

impl EventSource {
    pub const ALL: [EventSource; 7] = [
        EventSource::VilleMtl,
        EventSource::TourismeMtl,
        EventSource::Eventbrite,
        EventSource::Ticketmaster,
        EventSource::Reddit,
        EventSource::MtlBlog,
        EventSource::Gazette,
    ];

    /// Stable wire tag, stored remotely as part of the reconciliation key.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::VilleMtl => "ville_mtl",
            EventSource::TourismeMtl => "tourisme_mtl",
            EventSource::Eventbrite => "eventbrite",
            EventSource::Ticketmaster => "ticketmaster",
            EventSource::Reddit => "reddit",
            EventSource::MtlBlog => "mtl_blog",
            EventSource::Gazette => "gazette",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSource {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        EventSource::ALL
            .into_iter()
            .find(|src| src.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| EventError::UnknownSource(t.to_string()))
    }
}

/// Durable identity of an event across runs and syncs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReconciliationKey {
    pub source: EventSource,
    pub source_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub title: String,
    pub description: String,
    start_dt: DateTime<Tz>,
    end_dt: DateTime<Tz>,
    pub location: String,
    pub url: String,
    pub source: EventSource,
    pub source_id: String,
    pub is_all_day: bool,
    popularity: Option<f64>,
    pub score: Option<f64>,
}

impl Event {
    /// Build an event; fails hard when `end < start`.
    pub fn new<Z: TimeZone>(
        title: impl Into<String>,
        start: DateTime<Z>,
        end: DateTime<Z>,
        source: EventSource,
        source_id: impl Into<String>,
    ) -> Result<Self, EventError> {
        let start_dt = start.with_timezone(&MONTREAL);
        let end_dt = end.with_timezone(&MONTREAL);
        check_order(&start_dt, &end_dt)?;
        Ok(Self {
            title: title.into(),
            description: String::new(),
            start_dt,
            end_dt,
            location: DEFAULT_LOCATION.to_string(),
            url: String::new(),
            source,
            source_id: source_id.into(),
            is_all_day: false,
            popularity: None,
            score: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Blank locations keep the default.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        let location = location.into();
        if !location.trim().is_empty() {
            self.location = location;
        }
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_popularity(mut self, popularity: Option<f64>) -> Self {
        self.set_popularity(popularity);
        self
    }

    pub fn all_day(mut self, is_all_day: bool) -> Self {
        self.is_all_day = is_all_day;
        self
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start_dt
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.end_dt
    }

    /// Move the event; same ordering rule as construction.
    pub fn reschedule<Z: TimeZone>(
        &mut self,
        start: DateTime<Z>,
        end: DateTime<Z>,
    ) -> Result<(), EventError> {
        let start_dt = start.with_timezone(&MONTREAL);
        let end_dt = end.with_timezone(&MONTREAL);
        check_order(&start_dt, &end_dt)?;
        self.start_dt = start_dt;
        self.end_dt = end_dt;
        Ok(())
    }

    pub fn popularity(&self) -> Option<f64> {
        self.popularity
    }

    /// Popularity is kept in [0,1]; non-finite values count as "no signal".
    pub fn set_popularity(&mut self, popularity: Option<f64>) {
        self.popularity = popularity
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 1.0));
    }

    /// Calendar date of the start, in Montreal time.
    pub fn start_date(&self) -> NaiveDate {
        self.start_dt.date_naive()
    }

    pub fn duration_hours(&self) -> f64 {
        (self.end_dt - self.start_dt).num_seconds() as f64 / 3600.0
    }

    /// Half-open interval overlap: touching boundaries do not overlap.
    pub fn overlaps(&self, other: &Event) -> bool {
        self.start_dt < other.end_dt && other.start_dt < self.end_dt
    }

    pub fn reconciliation_key(&self) -> ReconciliationKey {
        ReconciliationKey {
            source: self.source,
            source_id: self.source_id.clone(),
        }
    }
}

fn check_order(start: &DateTime<Tz>, end: &DateTime<Tz>) -> Result<(), EventError> {
    if end < start {
        return Err(EventError::EndBeforeStart {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }
    Ok(())
}

/// Attach Montreal time to a wall-clock value. Ambiguous times (DST
/// fall-back) resolve to the earlier instant.
pub fn localize(naive: NaiveDateTime) -> Result<DateTime<Tz>, EventError> {
    match MONTREAL.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(EventError::NonexistentLocalTime(naive)),
    }
}

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
];

/// Parse an upstream date string into Montreal time.
///
/// Order: RFC 2822 (RSS), RFC 3339 / ISO with offset, ISO without offset
/// (taken as Montreal wall-clock), then a few common local formats and a
/// bare `YYYY-MM-DD` (local midnight).
pub fn parse_date(raw: &str) -> Result<DateTime<Tz>, EventError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(EventError::EmptyDate);
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&MONTREAL));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&MONTREAL));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&MONTREAL));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return localize(naive);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return localize(midnight);
        }
    }

    Err(EventError::UnparsableDate(s.to_string()))
}
