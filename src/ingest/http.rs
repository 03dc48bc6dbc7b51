// src/ingest/http.rs
//! Tiny HTTP helpers with hard timeouts, shared by the source providers.

use anyhow::{bail, Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("mtl-events-agent/", env!("CARGO_PKG_VERSION"));

pub const CSV_TIMEOUT: Duration = Duration::from_secs(12);
pub const CSV_MAX_BYTES: usize = 5_000_000;
pub const JSON_TIMEOUT: Duration = Duration::from_secs(10);
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);

pub type CsvRow = HashMap<String, String>;

/// Shared client for all providers.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("building http client")
}

/// Download a CSV with a hard timeout and a size cap, returning header-keyed rows.
pub async fn fetch_csv(
    client: &Client,
    url: &str,
    timeout: Duration,
    max_bytes: usize,
) -> Result<Vec<CsvRow>> {
    let mut resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?;

    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = resp.chunk().await.context("reading csv body")? {
        buf.extend_from_slice(&chunk);
        if buf.len() > max_bytes {
            bail!("CSV larger than {} MB - aborted", max_bytes / 1_000_000);
        }
    }
    parse_csv_rows(&buf)
}

/// Parse CSV bytes into rows keyed by header. Invalid UTF-8 is replaced
/// rather than rejected; short rows only carry the columns they have.
pub fn parse_csv_rows(bytes: &[u8]) -> Result<Vec<CsvRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = rdr
        .byte_headers()
        .context("reading csv headers")?
        .iter()
        .map(|h| {
            String::from_utf8_lossy(h)
                .trim_start_matches('\u{feff}')
                .trim()
                .to_string()
        })
        .collect();

    let mut rows = Vec::new();
    for rec in rdr.byte_records() {
        let rec = rec.context("reading csv record")?;
        let row: CsvRow = headers
            .iter()
            .zip(rec.iter())
            .map(|(h, v)| (h.clone(), String::from_utf8_lossy(v).into_owned()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// GET + JSON decode with a 10s timeout and a single retry after a 429.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    headers: &[(&str, &str)],
) -> Result<T> {
    let request = || {
        let mut rb = client.get(url).timeout(JSON_TIMEOUT).query(query);
        for (k, v) in headers {
            rb = rb.header(*k, *v);
        }
        rb
    };

    let mut resp = request()
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    if resp.status() == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(target: "ingest", %url, "rate limit hit (429), retrying once");
        tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
        resp = request()
            .send()
            .await
            .with_context(|| format!("GET {url} (retry)"))?;
    }

    resp.error_for_status()
        .with_context(|| format!("GET {url}"))?
        .json::<T>()
        .await
        .with_context(|| format!("decoding json from {url}"))
}

/// GET a text body (feeds) with the given timeout.
pub async fn get_text(client: &Client, url: &str, timeout: Duration) -> Result<String> {
    client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?
        .text()
        .await
        .with_context(|| format!("reading body from {url}"))
}
