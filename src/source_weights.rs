//! # Source Weights
//!
//! Maps an event source (a wire tag such as `"ville_mtl"`, or a loose label
//! like `"Ville de Montréal"`) to a normalized trust weight in `[0.0, 1.0]`.
//!
//! - Loads from JSON config (weights + aliases), built-in seed as fallback.
//! - Case-insensitive lookup; dashes, underscores and punctuation are folded.
//! - Fallback order: aliases → exact match → longest substring match → default.

use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path, path::PathBuf};

use crate::event::EventSource;

const ENV_PATH: &str = "SOURCE_WEIGHTS_PATH";
const DEFAULT_PATH: &str = "config/source_weights.json";

/// Configuration for source weights, loaded from JSON or defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceWeightsConfig {
    /// Weight used when nothing matches.
    #[serde(default = "default_default_weight")]
    pub default_weight: f64,
    /// Weights keyed by source tag or label.
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    /// Alternative spellings → canonical key.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_default_weight() -> f64 {
    0.50
}

impl Default for SourceWeightsConfig {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceWeightsConfig {
    /// Load configuration from a JSON file.
    /// Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<Self>(&s) {
                Ok(cfg) => cfg.normalized(),
                Err(e) => {
                    tracing::warn!(target: "rank", path = %path.display(), error = %e, "bad source weights file, using seed");
                    Self::default_seed()
                }
            },
            Err(_) => Self::default_seed(),
        }
    }

    /// `$SOURCE_WEIGHTS_PATH`, then `config/source_weights.json`, then the seed.
    pub fn load_default() -> Self {
        let path = std::env::var(ENV_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_PATH));
        Self::load_from_file(path)
    }

    pub fn weight_for(&self, source: EventSource) -> f64 {
        self.weight_for_name(source.as_str())
    }

    /// Weight for a free-form source label.
    pub fn weight_for_name(&self, source: &str) -> f64 {
        let s = normalize(source);

        if let Some(canon) = self.aliases.get(&s) {
            if let Some(&w) = self.weights.get(&normalize(canon)) {
                return clamp01(w);
            }
        }

        if let Some(&w) = self.weights.get(&s) {
            return clamp01(w);
        }

        // Longest key wins so the result does not depend on map order.
        let best = self
            .weights
            .iter()
            .filter(|(k, _)| !k.is_empty() && s.contains(k.as_str()))
            .max_by_key(|(k, _)| k.len());
        if let Some((_, &w)) = best {
            return clamp01(w);
        }

        clamp01(self.default_weight)
    }

    /// Re-key weights and aliases in normalized form.
    fn normalized(self) -> Self {
        Self {
            default_weight: self.default_weight,
            weights: self
                .weights
                .into_iter()
                .map(|(k, v)| (normalize(&k), v))
                .collect(),
            aliases: self
                .aliases
                .into_iter()
                .map(|(k, v)| (normalize(&k), normalize(&v)))
                .collect(),
        }
    }

    /// Built-in seed: official listings first, community chatter last.
    pub fn default_seed() -> Self {
        let mut weights = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            ("ville_mtl", 0.90),
            ("tourisme_mtl", 0.85),
            ("ticketmaster", 0.70),
            ("eventbrite", 0.70),
            ("gazette", 0.65),
            ("mtl_blog", 0.60),
            ("reddit", 0.55),
        ] {
            weights.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("ville de montreal", "ville_mtl"),
            ("ville de montréal", "ville_mtl"),
            ("city of montreal", "ville_mtl"),
            ("donnees montreal", "ville_mtl"),
            ("tourisme montreal", "tourisme_mtl"),
            ("tourisme montréal", "tourisme_mtl"),
            ("montreal gazette", "gazette"),
            ("montrealgazette com", "gazette"),
            ("mtlblog", "mtl_blog"),
            ("mtlblog com", "mtl_blog"),
            ("r/montreal", "reddit"),
            ("tm", "ticketmaster"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default_weight: default_default_weight(),
            weights,
            aliases,
        }
        .normalized()
    }
}

/// Lowercase, turn separators and punctuation into spaces, collapse runs.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();

    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '’', '\''], " ");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
