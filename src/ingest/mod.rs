// src/ingest/mod.rs
pub mod config;
pub mod http;
pub mod providers;
pub mod types;

use crate::event::Event;
use crate::ingest::types::{PullReport, SourceOutcome, SourceProvider, SourceReport};
use chrono::NaiveDate;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use unicode_normalization::UnicodeNormalization;

/// Default per-provider budget for one aggregate pull.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(60);

/// One-time metrics registration (so series show up once a recorder exists).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total events parsed from providers.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors and timeouts."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Events removed as duplicates of an earlier event."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
    });
}

/// Normalize free text from feeds: decode entities, strip tags, fold
/// typographic quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Repair UTF-8 text that was decoded as latin-1 upstream ("FÃªte" → "Fête").
/// Text that does not round-trip is returned unchanged.
pub fn fix_encoding(s: &str) -> String {
    let bytes: Option<Vec<u8>> = s
        .chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect();
    match bytes.map(String::from_utf8) {
        Some(Ok(fixed)) => fixed.nfc().collect(),
        _ => s.to_string(),
    }
}

/// Title normalized for duplicate detection: alphanumerics and whitespace
/// only, lower-cased.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Dedup identity: SHA-256 of `"{normalized title}|{YYYY-MM-DD}"`, hex encoded.
pub fn dedup_key(title: &str, date: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_title(title).as_bytes());
    hasher.update(b"|");
    hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Drop events whose (normalized title, start date) was already seen.
/// First occurrence wins; relative order of survivors is preserved.
pub fn deduplicate(events: Vec<Event>) -> Vec<Event> {
    ensure_metrics_described();

    let before = events.len();
    let mut seen: HashSet<String> = HashSet::with_capacity(before);
    let kept: Vec<Event> = events
        .into_iter()
        .filter(|ev| seen.insert(dedup_key(&ev.title, ev.start_date())))
        .collect();

    let dropped = before - kept.len();
    if dropped > 0 {
        tracing::debug!(target: "ingest", dropped, kept = kept.len(), "deduplicated events");
        counter!("ingest_dedup_total").increment(dropped as u64);
    }
    kept
}

/// Fetch from every provider concurrently, each in its own task with its own
/// timeout. A failing, panicking or slow provider contributes nothing and is
/// reported; it never cancels its siblings. Events are merged in provider
/// order, not completion order.
pub async fn pull_all(providers: &[Arc<dyn SourceProvider>], timeout: Duration) -> PullReport {
    ensure_metrics_described();

    let handles: Vec<_> = providers
        .iter()
        .map(|p| {
            let provider = Arc::clone(p);
            tokio::spawn(async move {
                let t0 = Instant::now();
                let res = tokio::time::timeout(timeout, provider.fetch_latest()).await;
                (res, t0.elapsed())
            })
        })
        .collect();

    let mut report = PullReport::default();
    for (provider, handle) in providers.iter().zip(handles) {
        let name = provider.name();
        let (outcome, events, elapsed) = match handle.await {
            Ok((Ok(Ok(events)), elapsed)) => {
                (SourceOutcome::Ok { count: events.len() }, events, elapsed)
            }
            Ok((Ok(Err(e)), elapsed)) => (
                SourceOutcome::Failed {
                    error: format!("{e:#}"),
                },
                Vec::new(),
                elapsed,
            ),
            Ok((Err(_), elapsed)) => (SourceOutcome::TimedOut { after: timeout }, Vec::new(), elapsed),
            Err(join_err) => (
                SourceOutcome::Failed {
                    error: format!("provider task aborted: {join_err}"),
                },
                Vec::new(),
                Duration::ZERO,
            ),
        };

        match &outcome {
            SourceOutcome::Ok { count } => {
                tracing::info!(target: "ingest", provider = name, count, elapsed_ms = elapsed.as_millis() as u64, "fetched events");
                counter!("ingest_events_total").increment(*count as u64);
            }
            SourceOutcome::Failed { error } => {
                tracing::warn!(target: "ingest", provider = name, %error, "provider error");
                counter!("ingest_provider_errors_total").increment(1);
            }
            SourceOutcome::TimedOut { after } => {
                tracing::warn!(target: "ingest", provider = name, timeout_secs = after.as_secs(), "provider timed out");
                counter!("ingest_provider_errors_total").increment(1);
            }
        }

        report.events.extend(events);
        report.sources.push(SourceReport {
            name,
            outcome,
            elapsed,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_tags_and_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b>!</p>  ";
        assert_eq!(normalize_text(s), "Hello, world !");
    }

    #[test]
    fn normalize_text_folds_quotes() {
        assert_eq!(normalize_text("\u{00AB}Salut\u{00BB} l\u{2019}ami"), "\"Salut\" l'ami");
    }

    #[test]
    fn fix_encoding_repairs_mojibake() {
        assert_eq!(fix_encoding("FÃªte de la musique"), "Fête de la musique");
        assert_eq!(fix_encoding("MontrÃ©al"), "Montréal");
    }

    #[test]
    fn fix_encoding_leaves_clean_text_alone() {
        assert_eq!(fix_encoding("Plain ascii"), "Plain ascii");
        // 'é' alone is not valid UTF-8 once narrowed to a byte.
        assert_eq!(fix_encoding("Montréal"), "Montréal");
        // Characters beyond latin-1 cannot be mojibake.
        assert_eq!(fix_encoding("Jazz 🎷"), "Jazz 🎷");
    }

    #[test]
    fn normalize_title_drops_punctuation_and_case() {
        assert_eq!(normalize_title("JAZZ NIGHT!!"), "jazz night");
        assert_eq!(normalize_title("Jazz Night"), "jazz night");
        assert_eq!(normalize_title("!!!"), "");
    }

    #[test]
    fn dedup_key_is_stable_hex() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let a = dedup_key("Test Event", d);
        assert_eq!(a, dedup_key("Test Event", d));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, dedup_key("Test Event 2", d));
        assert_ne!(a, dedup_key("Test Event", d.succ_opt().unwrap()));
    }
}
