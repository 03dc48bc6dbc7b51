//! Keyword → weight table for the keyword component of the score.
//!
//! Accepted files:
//! - TOML with a `[keywords]` table: `improv = 1.0`
//! - JSON flat object: `{"improv": 1.0}`

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{extension, read_file, resolve_path, ConfigError};

const ENV_PATH: &str = "KEYWORDS_PATH";

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordMap {
    /// Lower-cased keyword → weight in [0,1].
    entries: BTreeMap<String, f64>,
}

impl Default for KeywordMap {
    fn default() -> Self {
        Self::from_pairs([
            ("improv", 1.0),
            ("free", 0.8),
            ("pay-what-you-can", 0.8),
            ("spoken-word", 0.6),
            ("trail", 0.4),
        ])
    }
}

impl KeywordMap {
    /// Keys are trimmed and lower-cased, blanks dropped, weights clamped to [0,1].
    pub fn from_pairs<K: AsRef<str>>(pairs: impl IntoIterator<Item = (K, f64)>) -> Self {
        let entries = pairs
            .into_iter()
            .filter_map(|(k, w)| {
                let k = k.as_ref().trim().to_lowercase();
                (!k.is_empty()).then(|| (k, if w.is_finite() { w.clamp(0.0, 1.0) } else { 0.0 }))
            })
            .collect();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// `$KEYWORDS_PATH`, then `config/keywords.toml`, then `config/keywords.json`,
    /// then the built-in table. A file that exists but does not parse is an error.
    pub fn load_default() -> Result<Self, ConfigError> {
        match resolve_path(ENV_PATH, "keywords")? {
            Some(p) => Self::load_from(&p),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = read_file(path)?;
        parse(&content, &extension(path)).map_err(|reason| ConfigError::parse(path, reason))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, keyword: &str) -> Option<f64> {
        self.entries.get(&keyword.to_lowercase()).copied()
    }

    /// Highest weight among keywords found (substring, case-insensitive) in
    /// the title or the description; 0 when none match.
    pub fn score(&self, title: &str, description: &str) -> f64 {
        let title = title.to_lowercase();
        let description = description.to_lowercase();
        self.entries
            .iter()
            .filter(|(k, _)| title.contains(k.as_str()) || description.contains(k.as_str()))
            .map(|(_, &w)| w)
            .fold(0.0, f64::max)
    }
}

fn parse(s: &str, hint_ext: &str) -> Result<KeywordMap, String> {
    #[derive(Deserialize)]
    struct TomlKeywords {
        keywords: BTreeMap<String, f64>,
    }

    let as_toml = || {
        toml::from_str::<TomlKeywords>(s)
            .map(|t| KeywordMap::from_pairs(t.keywords))
            .map_err(|e| e.to_string())
    };
    let as_json = || {
        serde_json::from_str::<BTreeMap<String, f64>>(s)
            .map(KeywordMap::from_pairs)
            .map_err(|e| e.to_string())
    };

    match hint_ext {
        "toml" => as_toml(),
        "json" => as_json(),
        _ => as_json().or_else(|_| as_toml()),
    }
}
