//! Runtime configuration read from the environment.
//!
//! Every field has a default; malformed values fall back to the default and
//! are logged, never fatal.

use crate::logging::{default_log_level, normalize_level};
use crate::notify::TaskCheckerConfig;
use std::path::PathBuf;
use std::time::Duration;

pub const DB_PATH_VAR: &str = "CAREWATCH_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "CAREWATCH_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "CAREWATCH_LOG_DIR";
pub const REMINDER_LOOKAHEAD_VAR: &str = "CAREWATCH_REMINDER_LOOKAHEAD_MIN";
pub const MISSED_GRACE_VAR: &str = "CAREWATCH_MISSED_GRACE_MIN";

const DB_FILE_NAME: &str = "carewatch_cache.sqlite3";
const LOG_DIR_NAME: &str = "carewatch-logs";
const DEFAULT_LOOKAHEAD_MIN: u64 = 15;
const DEFAULT_MISSED_GRACE_MIN: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: &'static str,
    pub log_dir: PathBuf,
    pub reminder_lookahead: Duration,
    pub missed_grace: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DB_FILE_NAME),
            log_level: default_log_level(),
            log_dir: std::env::temp_dir().join(LOG_DIR_NAME),
            reminder_lookahead: Duration::from_secs(DEFAULT_LOOKAHEAD_MIN * 60),
            missed_grace: Duration::from_secs(DEFAULT_MISSED_GRACE_MIN * 60),
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let log_level = match read(LOG_LEVEL_VAR) {
            Some(raw) => normalize_level(&raw).unwrap_or_else(|err| {
                log::warn!("event=config_load module=config status=fallback var={LOG_LEVEL_VAR} error={err}");
                defaults.log_level
            }),
            None => defaults.log_level,
        };

        Self {
            db_path: read(DB_PATH_VAR).map_or(defaults.db_path, PathBuf::from),
            log_level,
            log_dir: read(LOG_DIR_VAR).map_or(defaults.log_dir, PathBuf::from),
            reminder_lookahead: read_minutes(read(REMINDER_LOOKAHEAD_VAR), REMINDER_LOOKAHEAD_VAR)
                .unwrap_or(defaults.reminder_lookahead),
            missed_grace: read_minutes(read(MISSED_GRACE_VAR), MISSED_GRACE_VAR)
                .unwrap_or(defaults.missed_grace),
        }
    }

    pub fn task_checker(&self) -> TaskCheckerConfig {
        TaskCheckerConfig {
            lookahead: self.reminder_lookahead,
            missed_grace: self.missed_grace,
            ..TaskCheckerConfig::default()
        }
    }
}

fn read_minutes(raw: Option<String>, name: &str) -> Option<Duration> {
    let raw = raw?;
    let seconds = match raw.parse::<u64>() {
        Ok(value) => value.checked_mul(60),
        Err(err) => {
            log::warn!("event=config_load module=config status=fallback var={name} error={err}");
            return None;
        }
    };
    if seconds.is_none() {
        log::warn!("event=config_load module=config status=fallback var={name} error=overflow");
    }
    seconds.map(Duration::from_secs)
}
