//! Configuration loaded from the environment (and `.env` when present).

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::Context;
use log::warn;
use crate::client::{PollPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::error::AppError;

pub const API_KEY_VAR: &str = "FASHN_API_KEY";
pub const DEFAULT_API_URL: &str = "https://api.fashn.ai";

#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token; requests go out unauthenticated without it
    pub api_key: Option<String>,
    pub api_url: String,
    pub results_dir: PathBuf,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            results_dir: PathBuf::from("images/results"),
            poll_interval: Duration::from_millis(1000),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            http_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Not validated: overrides may still fix bad values.
    pub fn from_env() -> anyhow::Result<Self> {
        // .env is optional
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let api_key = env::var(API_KEY_VAR).ok().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("{} not set. API calls will fail.", API_KEY_VAR);
        }

        let config = Self {
            api_key,
            api_url: env::var("TRYON_API_URL").unwrap_or(defaults.api_url),
            results_dir: env::var("TRYON_RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            poll_interval: match env::var("TRYON_POLL_INTERVAL_MS") {
                Ok(ms) => Duration::from_millis(ms.parse().context("TRYON_POLL_INTERVAL_MS must be a number")?),
                Err(_) => defaults.poll_interval,
            },
            max_attempts: match env::var("TRYON_MAX_ATTEMPTS") {
                Ok(n) => n.parse().context("TRYON_MAX_ATTEMPTS must be a number")?,
                Err(_) => defaults.max_attempts,
            },
            http_timeout: match env::var("TRYON_HTTP_TIMEOUT_SECS") {
                Ok(secs) => Duration::from_secs(secs.parse().context("TRYON_HTTP_TIMEOUT_SECS must be a number")?),
                Err(_) => defaults.http_timeout,
            },
        };

        Ok(config)
    }

    /// Command-line values win over the environment. Call `validate` after.
    pub fn apply_overrides(
        &mut self,
        results_dir: Option<PathBuf>,
        max_attempts: Option<u32>,
        poll_interval_ms: Option<u64>,
    ) {
        if let Some(dir) = results_dir {
            self.results_dir = dir;
        }
        if let Some(n) = max_attempts {
            self.max_attempts = n;
        }
        if let Some(ms) = poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.api_url.trim().is_empty() {
            return Err(AppError::Config("TRYON_API_URL must not be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(AppError::Config("TRYON_MAX_ATTEMPTS must be greater than 0".into()));
        }
        if self.http_timeout.is_zero() {
            return Err(AppError::Config("TRYON_HTTP_TIMEOUT_SECS must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.poll_interval,
            max_attempts: self.max_attempts,
        }
    }
}
