// src/config/calendar.rs
use std::path::Path;

use super::{read_file, ConfigError};

pub const ENV_CALENDAR_ID: &str = "GOOGLE_CALENDAR_ID";
pub const ENV_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const ENV_DRY_RUN: &str = "SYNC_DRY_RUN";

/// Target calendar and the service-account key used to write to it.
#[derive(Clone)]
pub struct CalendarConfig {
    pub calendar_id: String,
    /// Raw service-account key JSON.
    pub credentials_json: String,
}

impl std::fmt::Debug for CalendarConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarConfig")
            .field("calendar_id", &self.calendar_id)
            .field("credentials_json", &"<redacted>")
            .finish()
    }
}

impl CalendarConfig {
    /// `GOOGLE_CALENDAR_ID` plus `GOOGLE_APPLICATION_CREDENTIALS`, which may hold
    /// the key JSON inline or a path to it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let calendar_id = non_blank_env(ENV_CALENDAR_ID)?;
        let creds = non_blank_env(ENV_CREDENTIALS)?;
        let credentials_json = if creds.trim_start().starts_with('{') {
            creds
        } else {
            read_file(Path::new(creds.trim()))?
        };
        Ok(Self {
            calendar_id,
            credentials_json,
        })
    }
}

/// `SYNC_DRY_RUN=1` (or `true`) writes to an in-memory store instead of Google.
pub fn dry_run_enabled() -> bool {
    std::env::var(ENV_DRY_RUN)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn non_blank_env(var: &str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(var.to_string()))
}
