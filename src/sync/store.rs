// src/sync/store.rs
//! Remote calendar seam: the payload we write and the trait stores implement.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::SyncError;
use crate::event::{Event, EventSource, MONTREAL};

/// Half-open query window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// One Montreal calendar day.
    pub fn for_date(date: NaiveDate) -> Option<Self> {
        let start = date.and_hms_opt(0, 0, 0)?;
        let end = start + Duration::days(1);
        let start = start.and_local_timezone(MONTREAL).earliest()?;
        let end = end.and_local_timezone(MONTREAL).earliest()?;
        Some(Self::new(start.with_timezone(&Utc), end.with_timezone(&Utc)))
    }

    /// Same rule as the Google API: the item ends after `start` and begins before `end`.
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

/// What discovery learns about one remote item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    /// Stored `source` tag, if the item was written by us.
    pub source: Option<String>,
    /// Stored `source_id`, if the item was written by us.
    pub source_id: Option<String>,
}

impl RemoteItem {
    pub fn is_keyed(&self) -> bool {
        self.source_id.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// `{"dateTime": ...}` for timed events, `{"date": ...}` for all-day ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl EventTime {
    pub fn timed(dt: DateTime<chrono_tz::Tz>) -> Self {
        Self {
            date_time: Some(dt.to_rfc3339()),
            date: None,
        }
    }

    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date_time: None,
            date: Some(date.format("%Y-%m-%d").to_string()),
        }
    }

    /// Absolute instant; bare dates are Montreal midnight.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        if let Some(dt) = &self.date_time {
            return DateTime::parse_from_rfc3339(dt)
                .ok()
                .map(|d| d.with_timezone(&Utc));
        }
        let date = NaiveDate::parse_from_str(self.date.as_deref()?, "%Y-%m-%d").ok()?;
        date.and_hms_opt(0, 0, 0)?
            .and_local_timezone(MONTREAL)
            .earliest()
            .map(|d| d.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKey {
    pub source: String,
    pub source_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProperties {
    pub private: PrivateKey,
}

/// Body of an insert or a full-overwrite update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventTime,
    pub end: EventTime,
    pub extended_properties: ExtendedProperties,
}

impl EventPayload {
    pub fn from_event(ev: &Event) -> Self {
        let (start, end) = if ev.is_all_day {
            let first = ev.start_date();
            // All-day end dates are exclusive; never let the range be empty.
            let last = ev.end().date_naive().max(first + Duration::days(1));
            (EventTime::all_day(first), EventTime::all_day(last))
        } else {
            (EventTime::timed(ev.start()), EventTime::timed(ev.end()))
        };
        Self {
            summary: ev.title.clone(),
            description: format!(
                "{}\n\nSource: {}\nURL: {}",
                ev.description,
                ev.source.as_str(),
                ev.url
            ),
            location: ev.location.clone(),
            start,
            end,
            extended_properties: ExtendedProperties {
                private: PrivateKey {
                    source: ev.source.as_str().to_string(),
                    source_id: ev.source_id.clone(),
                },
            },
        }
    }

    pub fn source(&self) -> Option<EventSource> {
        self.extended_properties.private.source.parse().ok()
    }
}

/// A calendar that can be listed and written item by item.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Called once before any discovery or write; failure aborts the sync.
    async fn authenticate(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn list(&self, window: TimeWindow) -> Result<Vec<RemoteItem>, SyncError>;

    /// Create an item, returning its remote id.
    async fn insert(&self, payload: &EventPayload) -> Result<String, SyncError>;

    async fn update(&self, id: &str, payload: &EventPayload) -> Result<(), SyncError>;

    async fn delete(&self, id: &str) -> Result<(), SyncError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ev(all_day: bool) -> Event {
        let start = MONTREAL.with_ymd_and_hms(2025, 7, 1, 19, 30, 0).unwrap();
        Event::new("Jazz Night", start, start + Duration::hours(2), EventSource::Gazette, "g-1")
            .unwrap()
            .with_description("Live trio.")
            .with_url("https://example.com/jazz")
            .with_location("Upstairs")
            .all_day(all_day)
    }

    #[test]
    fn timed_payload() {
        let p = EventPayload::from_event(&ev(false));
        assert_eq!(p.summary, "Jazz Night");
        assert_eq!(
            p.description,
            "Live trio.\n\nSource: gazette\nURL: https://example.com/jazz"
        );
        assert_eq!(p.location, "Upstairs");
        assert_eq!(p.start.date_time.as_deref(), Some("2025-07-01T19:30:00-04:00"));
        assert_eq!(p.end.date_time.as_deref(), Some("2025-07-01T21:30:00-04:00"));
        assert!(p.start.date.is_none());
        assert_eq!(p.extended_properties.private.source, "gazette");
        assert_eq!(p.extended_properties.private.source_id, "g-1");
        assert_eq!(p.source(), Some(EventSource::Gazette));
    }

    #[test]
    fn all_day_payload_uses_dates() {
        let p = EventPayload::from_event(&ev(true));
        assert_eq!(p.start.date.as_deref(), Some("2025-07-01"));
        assert_eq!(p.end.date.as_deref(), Some("2025-07-02"));
        assert!(p.start.date_time.is_none());
    }

    #[test]
    fn wire_shape() {
        let v = serde_json::to_value(EventPayload::from_event(&ev(false))).unwrap();
        assert!(v["start"]["dateTime"].is_string());
        assert!(v["start"].get("date").is_none());
        assert_eq!(v["extendedProperties"]["private"]["source_id"], "g-1");
    }

    #[test]
    fn day_window_follows_montreal_midnight() {
        let w = TimeWindow::for_date(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2025, 1, 15, 5, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2025, 1, 16, 5, 0, 0).unwrap());
        assert!(w.intersects(w.start, w.start + Duration::hours(1)));
        assert!(!w.intersects(w.end, w.end + Duration::hours(1)));
    }
}
