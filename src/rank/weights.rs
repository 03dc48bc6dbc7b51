//! Component weights for the composite event score.
//!
//! TOML shape (all keys optional):
//! ```toml
//! [weights]
//! source = 0.4
//! keyword = 0.3
//! popularity = 0.2
//! duration = 0.1
//! language = 0.0
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankWeights {
    pub source: f64,
    pub keyword: f64,
    pub popularity: f64,
    pub duration: f64,
    /// Strength of the language-preference discount; 0 disables it.
    pub language: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            source: 0.4,
            keyword: 0.3,
            popularity: 0.2,
            duration: 0.1,
            language: 0.0,
        }
    }
}

impl RankWeights {
    /// Sum of the four additive components (language is a multiplier, not included).
    pub fn sum(&self) -> f64 {
        self.source + self.keyword + self.popularity + self.duration
    }

    /// Every weight finite and non-negative; language at most 1.
    /// A sum away from 1.0 is allowed but logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, v) in [
            ("weights.source", self.source),
            ("weights.keyword", self.keyword),
            ("weights.popularity", self.popularity),
            ("weights.duration", self.duration),
            ("weights.language", self.language),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::invalid(key, format!("{v} is not a finite non-negative number")));
            }
        }
        if self.language > 1.0 {
            return Err(ConfigError::invalid("weights.language", "must be at most 1.0"));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > 1e-6 {
            tracing::warn!(target: "rank", sum, "score weights do not sum to 1.0");
        }
        Ok(())
    }
}
