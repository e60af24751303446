//! read configuration from a file or the environment

use std::time::Duration;

use serde::Deserialize;

use crate::errors::Error;
use crate::retry::{JitterStrategy, RetryPlan};
use crate::wake::WakePlan;

pub const DEFAULT_LOCAL_URL: &str = "http://localhost:5000";

const MIN_UPLOAD_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_TIMEOUT_SECS: u64 = 120;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub enum ConfigLocation {
    File(String),
    Env,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicitly configured backend URL. Empty or whitespace counts as unset.
    pub base_url: Option<String>,
    pub local_default: String,
    /// Probed in order when no base URL is configured and the runtime is not local.
    pub candidate_urls: Vec<String>,
    pub local_runtime: bool,
    pub health_timeout_ms: u64,
    /// Applied to every request that does not carry its own timeout.
    pub request_timeout_ms: u64,
    pub upload_timeout_ms: u64,
    #[serde(skip)]
    pub health_retry: RetryPlan,
    #[serde(skip)]
    pub wake: WakePlan,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            local_default: DEFAULT_LOCAL_URL.to_string(),
            candidate_urls: Vec::new(),
            local_runtime: true,
            health_timeout_ms: 5_000,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_SECS * 1_000,
            upload_timeout_ms: MAX_UPLOAD_TIMEOUT_SECS * 1_000,
            health_retry: RetryPlan::health_check(),
            wake: WakePlan::default(),
        }
    }
}

impl Config {
    pub fn load(loc: ConfigLocation) -> Result<Self, Error> {
        match loc {
            ConfigLocation::File(path) => Self::from_file(path),
            ConfigLocation::Env => Self::from_env(),
        }
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `API_*` variables from the process environment.
    /// # ENV Vars
    /// * `API_BASE_URL` - configured backend URL; absent or empty falls back per resolution policy
    /// * `API_CANDIDATE_URLS` - comma-separated URLs probed when no base URL is configured
    /// * `API_LOCAL_RUNTIME` - `true` (default) or `false`
    /// * `API_HEALTH_TIMEOUT_SECS` - health probe timeout, default 5
    /// * `API_REQUEST_TIMEOUT_SECS` - timeout for non-upload requests, default 30
    /// * `API_UPLOAD_TIMEOUT_SECS` - upload timeout between 30 and 120, default 120
    /// * `API_RETRY_JITTER` - `none` (default), `full` or `decorrelated`
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config {
            base_url: lookup("API_BASE_URL"),
            ..Config::default()
        };
        if let Some(raw) = lookup("API_CANDIDATE_URLS") {
            config.candidate_urls = raw
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = lookup("API_LOCAL_RUNTIME") {
            config.local_runtime = parse_bool("API_LOCAL_RUNTIME", &raw)?;
        }
        if let Some(raw) = lookup("API_HEALTH_TIMEOUT_SECS") {
            config.health_timeout_ms = parse_secs_as_millis("API_HEALTH_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("API_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_ms = parse_secs_as_millis("API_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("API_UPLOAD_TIMEOUT_SECS") {
            config.upload_timeout_ms = parse_secs_as_millis("API_UPLOAD_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("API_RETRY_JITTER") {
            config.health_retry.jitter = raw.parse::<JitterStrategy>()?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_values(
        base_url: Option<&str>,
        local_default: impl Into<String>,
        candidate_urls: Vec<String>,
        local_runtime: bool,
    ) -> Self {
        Self {
            base_url: base_url.map(str::to_string),
            local_default: local_default.into(),
            candidate_urls,
            local_runtime,
            ..Config::default()
        }
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_health_retry(mut self, plan: RetryPlan) -> Self {
        self.health_retry = plan;
        self
    }

    pub fn with_wake_plan(mut self, plan: WakePlan) -> Self {
        self.wake = plan;
        self
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    fn validate(&self) -> Result<(), Error> {
        if crate::resolver::normalize_base_url(&self.local_default).is_none() {
            return Err(Error::Config("Local default URL must not be empty".into()));
        }
        let upload_secs = self.upload_timeout_ms / 1_000;
        if !(MIN_UPLOAD_TIMEOUT_SECS..=MAX_UPLOAD_TIMEOUT_SECS).contains(&upload_secs) {
            return Err(Error::Config(format!(
                "Upload timeout must be between {}s and {}s, got {}s",
                MIN_UPLOAD_TIMEOUT_SECS, MAX_UPLOAD_TIMEOUT_SECS, upload_secs
            )));
        }
        if self.health_timeout_ms == 0 {
            return Err(Error::Config("Health timeout must be > 0".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("Request timeout must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, Error> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(Error::Config(format!(
            "Invalid {key} value '{other}'; expected true or false"
        ))),
    }
}

fn parse_secs_as_millis(key: &str, raw: &str) -> Result<u64, Error> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| Error::Config(format!("Invalid {key} value '{raw}': {e}")))?;
    secs.checked_mul(1_000)
        .ok_or_else(|| Error::Config(format!("{key} value '{raw}' is out of range")))
}
