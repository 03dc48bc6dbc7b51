// src/ingest/config.rs
//! Which generic web feeds to pull, and which source tag each one carries.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::event::EventSource;

const ENV_PATH: &str = "RSS_FEEDS_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSpec {
    pub url: String,
    pub source: EventSource,
}

/// Built-in feed list used when no file is configured.
pub fn default_feeds() -> Vec<FeedSpec> {
    vec![
        FeedSpec {
            url: "https://www.mtlblog.com/rss".to_string(),
            source: EventSource::MtlBlog,
        },
        FeedSpec {
            url: "https://montrealgazette.com/feed/".to_string(),
            source: EventSource::Gazette,
        },
    ]
}

/// Load feeds from an explicit path. Supports TOML or JSON formats.
pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed list from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_feeds(&content, ext.as_str())
}

/// Load feeds using env var + fallbacks:
/// 1) $RSS_FEEDS_PATH
/// 2) config/feeds.toml
/// 3) config/feeds.json
/// 4) built-in defaults
pub fn load_feeds_default() -> Result<Vec<FeedSpec>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_feeds_from(&pb);
        } else {
            return Err(anyhow!("RSS_FEEDS_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/feeds.toml");
    if toml_p.exists() {
        return load_feeds_from(&toml_p);
    }
    let json_p = PathBuf::from("config/feeds.json");
    if json_p.exists() {
        return load_feeds_from(&json_p);
    }
    Ok(default_feeds())
}

fn parse_feeds(s: &str, hint_ext: &str) -> Result<Vec<FeedSpec>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[feeds]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    // Try JSON array
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    // Fallback: also try TOML if not attempted
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported feed list format"))
}

fn parse_toml(s: &str) -> Result<Vec<FeedSpec>> {
    #[derive(Deserialize)]
    struct TomlFeeds {
        feeds: Vec<FeedSpec>,
    }
    let v: TomlFeeds = toml::from_str(s)?;
    Ok(clean_list(v.feeds))
}

fn parse_json(s: &str) -> Result<Vec<FeedSpec>> {
    let v: Vec<FeedSpec> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

/// Trim urls, drop blanks and repeated urls (first one wins).
fn clean_list(items: Vec<FeedSpec>) -> Vec<FeedSpec> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter_map(|f| {
            let url = f.url.trim().to_string();
            (!url.is_empty() && seen.insert(url.clone())).then_some(FeedSpec { url, ..f })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_and_json_formats_work() {
        let toml = r#"
[[feeds]]
url = " https://a.example/rss "
source = "mtl_blog"

[[feeds]]
url = ""
source = "gazette"

[[feeds]]
url = "https://a.example/rss"
source = "gazette"
"#;
        let out = parse_feeds(toml, "toml").unwrap();
        assert_eq!(
            out,
            vec![FeedSpec {
                url: "https://a.example/rss".into(),
                source: EventSource::MtlBlog
            }]
        );

        let json = r#"[{"url":"https://b.example/feed","source":"gazette"}]"#;
        let out = parse_feeds(json, "json").unwrap();
        assert_eq!(out[0].source, EventSource::Gazette);
    }

    #[test]
    fn unknown_source_tag_is_an_error() {
        let json = r#"[{"url":"https://b.example/feed","source":"myspace"}]"#;
        assert!(parse_feeds(json, "json").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);

        // Nothing on disk: built-in list.
        assert_eq!(load_feeds_default().unwrap(), default_feeds());

        // Env wins.
        let p = tmp.path().join("feeds.json");
        fs::write(&p, r#"[{"url":"https://x.example/rss","source":"gazette"}]"#).unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        let v = load_feeds_default().unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].url, "https://x.example/rss");

        // Env pointing nowhere is an error, not a silent default.
        env::set_var(ENV_PATH, tmp.path().join("nope.json").display().to_string());
        assert!(load_feeds_default().is_err());
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
