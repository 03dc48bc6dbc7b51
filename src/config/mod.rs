// src/config/mod.rs
//! Run configuration: pipeline policy (limits, weights, sync knobs) and the
//! calendar credentials. Files are optional; env vars point at them.

pub mod calendar;
pub mod pipeline;

pub use calendar::CalendarConfig;
pub use pipeline::{PipelineConfig, SourceSettings, SyncSettings};

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),
    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(path: &Path, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Locate a config file:
/// 1) `$env_var` (must exist when set)
/// 2) `config/{stem}.toml`
/// 3) `config/{stem}.json`
///
/// `Ok(None)` means "use built-in defaults".
pub(crate) fn resolve_path(env_var: &str, stem: &str) -> Result<Option<PathBuf>, ConfigError> {
    if let Ok(p) = std::env::var(env_var) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(ConfigError::invalid(
            env_var,
            format!("{} does not exist", pb.display()),
        ));
    }
    for ext in ["toml", "json"] {
        let pb = PathBuf::from(format!("config/{stem}.{ext}"));
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

pub(crate) fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Lower-cased file extension, empty when absent.
pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[serial_test::serial]
    #[test]
    fn resolve_prefers_env_then_toml_then_json() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var("TEST_CFG_PATH");

        assert!(resolve_path("TEST_CFG_PATH", "thing").unwrap().is_none());

        fs::create_dir_all("config").unwrap();
        fs::write("config/thing.json", "{}").unwrap();
        assert_eq!(
            resolve_path("TEST_CFG_PATH", "thing").unwrap(),
            Some(PathBuf::from("config/thing.json"))
        );

        fs::write("config/thing.toml", "").unwrap();
        assert_eq!(
            resolve_path("TEST_CFG_PATH", "thing").unwrap(),
            Some(PathBuf::from("config/thing.toml"))
        );

        let explicit = tmp.path().join("elsewhere.toml");
        fs::write(&explicit, "").unwrap();
        env::set_var("TEST_CFG_PATH", explicit.display().to_string());
        assert_eq!(resolve_path("TEST_CFG_PATH", "thing").unwrap(), Some(explicit));

        env::set_var("TEST_CFG_PATH", tmp.path().join("missing").display().to_string());
        assert!(matches!(
            resolve_path("TEST_CFG_PATH", "thing"),
            Err(ConfigError::Invalid { .. })
        ));
        env::remove_var("TEST_CFG_PATH");

        env::set_current_dir(&old).unwrap();
    }
}
