use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::db::Database;
use crate::fetcher::FetchSettings;
use crate::normalize::DEFAULT_PREVIEW_CHARS;
use crate::suggest::DEFAULT_LIMIT;

const FETCH_TIMEOUT_SECS: (u64, u64) = (5, 60);
const MAX_SESSIONS: (usize, usize) = (1, 8);

/// Settings from the environment (and `.env`), before CLI overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub webdriver_url: String,
    pub render: bool,
    pub fetch_timeout: Duration,
    pub settle: Duration,
    pub max_sessions: usize,
    pub preview_chars: usize,
    pub suggestion_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: Database::default_path(),
            webdriver_url: "http://localhost:9515".to_string(),
            render: true,
            fetch_timeout: Duration::from_secs(20),
            settle: Duration::from_secs(8),
            max_sessions: 3,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            suggestion_limit: DEFAULT_LIMIT,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // .env is optional
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source, applying defaults and limits.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let timeout_secs: u64 = parse_var(&get, "JOBCLIP_FETCH_TIMEOUT_SECS")?
            .unwrap_or(defaults.fetch_timeout.as_secs());
        let max_sessions: usize =
            parse_var(&get, "JOBCLIP_MAX_SESSIONS")?.unwrap_or(defaults.max_sessions);
        let preview_chars: usize =
            parse_var(&get, "JOBCLIP_PREVIEW_CHARS")?.unwrap_or(defaults.preview_chars);
        let suggestion_limit: usize =
            parse_var(&get, "JOBCLIP_SUGGESTION_LIMIT")?.unwrap_or(defaults.suggestion_limit);

        if preview_chars < 10 {
            return Err(anyhow!("JOBCLIP_PREVIEW_CHARS must be at least 10"));
        }
        if suggestion_limit == 0 {
            return Err(anyhow!("JOBCLIP_SUGGESTION_LIMIT must be at least 1"));
        }

        Ok(Self {
            db_path: get("JOBCLIP_DB").map(PathBuf::from).unwrap_or(defaults.db_path),
            webdriver_url: get("JOBCLIP_WEBDRIVER_URL").unwrap_or(defaults.webdriver_url),
            render: match get("JOBCLIP_RENDER") {
                Some(raw) => parse_bool(&raw).context("JOBCLIP_RENDER must be true or false")?,
                None => defaults.render,
            },
            fetch_timeout: clamp_timeout(timeout_secs),
            settle: parse_var(&get, "JOBCLIP_SETTLE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.settle),
            max_sessions: max_sessions.clamp(MAX_SESSIONS.0, MAX_SESSIONS.1),
            preview_chars,
            suggestion_limit,
        })
    }

    pub fn set_fetch_timeout_secs(&mut self, secs: u64) {
        self.fetch_timeout = clamp_timeout(secs);
    }

    /// The settle wait is capped at half the fetch deadline so a page that
    /// never becomes ready is still captured before the deadline.
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            webdriver_url: self.webdriver_url.clone(),
            render: self.render,
            timeout: self.fetch_timeout,
            settle: self.settle.min(self.fetch_timeout / 2),
            max_sessions: self.max_sessions,
        }
    }
}

fn clamp_timeout(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(FETCH_TIMEOUT_SECS.0, FETCH_TIMEOUT_SECS.1))
}

fn parse_var<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("'{}' is not a boolean", other)),
    }
}
