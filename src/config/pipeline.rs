// src/config/pipeline.rs
//! Pipeline policy. Every field has a default, so an absent or partial file is fine.
//!
//! ```toml
//! max_per_day = 5
//! max_parallel = 3
//! min_score = 0.2
//! hard_cap = 300
//! # festival_cap = 40
//!
//! [weights]
//! source = 0.4
//!
//! [sync]
//! lookahead_days = 35
//! batch_size = 50
//! batch_delay_ms = 200
//! stale_policy = "keep"     # or "delete"
//! discovery = "window"      # or "touched_dates"
//!
//! [sources]
//! timeout_secs = 60
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{extension, read_file, resolve_path, ConfigError};
use crate::rank::capacity::CapacityLimits;
use crate::rank::RankWeights;
use crate::sync::{DiscoveryMode, StalePolicy, SyncOptions};

const ENV_PATH: &str = "PIPELINE_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_per_day: usize,
    pub max_parallel: usize,
    pub min_score: f64,
    pub hard_cap: usize,
    pub festival_cap: Option<usize>,
    pub weights: RankWeights,
    pub sync: SyncSettings,
    pub sources: SourceSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_per_day: 5,
            max_parallel: 3,
            min_score: 0.2,
            hard_cap: 300,
            festival_cap: None,
            weights: RankWeights::default(),
            sync: SyncSettings::default(),
            sources: SourceSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub lookahead_days: i64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub stale_policy: StalePolicy,
    pub discovery: DiscoveryMode,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            lookahead_days: 35,
            batch_size: 50,
            batch_delay_ms: 200,
            stale_policy: StalePolicy::Keep,
            discovery: DiscoveryMode::Window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl PipelineConfig {
    /// `$PIPELINE_CONFIG_PATH`, then `config/pipeline.toml`, then
    /// `config/pipeline.json`, then defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match resolve_path(ENV_PATH, "pipeline")? {
            Some(p) => Self::load_from(&p),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = read_file(path)?;
        let cfg: Self = match extension(path).as_str() {
            "json" => serde_json::from_str(&content).map_err(|e| ConfigError::parse(path, e))?,
            _ => toml::from_str(&content).map_err(|e| ConfigError::parse(path, e))?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_per_day == 0 {
            return Err(ConfigError::invalid("max_per_day", "must be at least 1"));
        }
        if self.max_parallel == 0 {
            return Err(ConfigError::invalid("max_parallel", "must be at least 1"));
        }
        if !self.min_score.is_finite() {
            return Err(ConfigError::invalid("min_score", "must be finite"));
        }
        if self.sync.batch_size == 0 {
            return Err(ConfigError::invalid("sync.batch_size", "must be at least 1"));
        }
        if self.sync.lookahead_days < 1 {
            return Err(ConfigError::invalid("sync.lookahead_days", "must be at least 1"));
        }
        if self.sources.timeout_secs == 0 {
            return Err(ConfigError::invalid("sources.timeout_secs", "must be at least 1"));
        }
        self.weights.validate()
    }

    pub fn capacity(&self) -> CapacityLimits {
        CapacityLimits {
            max_per_day: self.max_per_day,
            max_parallel: self.max_parallel,
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            lookahead: chrono::Duration::days(self.sync.lookahead_days),
            batch_size: self.sync.batch_size,
            batch_delay: Duration::from_millis(self.sync.batch_delay_ms),
            stale_policy: self.sync.stale_policy,
            discovery: self.sync.discovery,
        }
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.sources.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn partial_toml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("pipeline.toml");
        fs::write(
            &p,
            "max_per_day = 4\nfestival_cap = 10\n[sync]\nstale_policy = \"delete\"\ndiscovery = \"touched_dates\"\n",
        )
        .unwrap();
        let cfg = PipelineConfig::load_from(&p).unwrap();
        assert_eq!(cfg.max_per_day, 4);
        assert_eq!(cfg.max_parallel, 3);
        assert_eq!(cfg.festival_cap, Some(10));
        assert_eq!(cfg.sync.stale_policy, StalePolicy::Delete);
        assert_eq!(cfg.sync.discovery, DiscoveryMode::TouchedDates);
        assert_eq!(cfg.sync.batch_size, 50);
        assert_eq!(cfg.weights, RankWeights::default());
        assert_eq!(cfg.source_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn json_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("pipeline.json");
        fs::write(&p, r#"{"hard_cap": 12, "sync": {"batch_delay_ms": 0}}"#).unwrap();
        let cfg = PipelineConfig::load_from(&p).unwrap();
        assert_eq!(cfg.hard_cap, 12);
        assert_eq!(cfg.sync_options().batch_delay, Duration::ZERO);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("pipeline.toml");

        fs::write(&p, "max_parallel = 0\n").unwrap();
        assert!(matches!(
            PipelineConfig::load_from(&p),
            Err(ConfigError::Invalid { key, .. }) if key == "max_parallel"
        ));

        fs::write(&p, "[sync]\nbatch_size = 0\n").unwrap();
        assert!(matches!(
            PipelineConfig::load_from(&p),
            Err(ConfigError::Invalid { key, .. }) if key == "sync.batch_size"
        ));

        fs::write(&p, "max_per_day = \"many\"\n").unwrap();
        assert!(matches!(PipelineConfig::load_from(&p), Err(ConfigError::Parse { .. })));

        fs::write(&p, "[sync]\nstale_policy = \"archive\"\n").unwrap();
        assert!(matches!(PipelineConfig::load_from(&p), Err(ConfigError::Parse { .. })));
    }

    #[serial_test::serial]
    #[test]
    fn load_default_without_files_is_defaults() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);

        assert_eq!(PipelineConfig::load_default().unwrap(), PipelineConfig::default());

        env::set_current_dir(&old).unwrap();
    }
}
