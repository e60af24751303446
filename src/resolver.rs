use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::health::HealthChecker;

// One probe per candidate; slow candidates are the wake-up path's concern.
const DETECT_ATTEMPTS_PER_CANDIDATE: u8 = 1;

/// Trims whitespace and every trailing `/`. Returns `None` for blank input.
pub fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Joins a normalized base with an absolute API path using exactly one `/`.
pub fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Cached endpoint resolution. `resolved` separates "never attempted" from
/// "attempted", since the cached value may legitimately be the local default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolutionState {
    pub base_url: Option<String>,
    pub resolved: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionSource {
    Configured,
    LocalDefault,
    Detected,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::Configured => write!(f, "configured"),
            ResolutionSource::LocalDefault => write!(f, "local_default"),
            ResolutionSource::Detected => write!(f, "detected"),
        }
    }
}

/// Produces the single base URL every request uses and memoizes it until
/// [`invalidate`](Self::invalidate) is called.
pub struct EndpointResolver {
    configured: Option<String>,
    local_default: String,
    candidates: Vec<String>,
    local_runtime: bool,
    health: Arc<HealthChecker>,
    state: RwLock<ResolutionState>,
    resolve_lock: Mutex<()>,
}

impl EndpointResolver {
    pub fn new(config: &Config, health: Arc<HealthChecker>) -> Self {
        let local_default = normalize_base_url(&config.local_default)
            .unwrap_or_else(|| crate::config::DEFAULT_LOCAL_URL.to_string());
        Self {
            configured: config.base_url.as_deref().and_then(normalize_base_url),
            local_default,
            candidates: config
                .candidate_urls
                .iter()
                .filter_map(|url| normalize_base_url(url))
                .collect(),
            local_runtime: config.local_runtime,
            health,
            state: RwLock::new(ResolutionState::default()),
            resolve_lock: Mutex::new(()),
        }
    }

    pub fn configured(&self) -> Option<&str> {
        self.configured.as_deref()
    }

    pub fn local_default(&self) -> &str {
        &self.local_default
    }

    pub async fn state(&self) -> ResolutionState {
        self.state.read().await.clone()
    }

    /// Cached base URL without triggering resolution.
    pub async fn current(&self) -> Option<String> {
        let state = self.state.read().await;
        if state.resolved {
            state.base_url.clone()
        } else {
            None
        }
    }

    /// Returns the cached base URL, resolving it first if needed. Concurrent
    /// first callers share one resolution.
    pub async fn resolve(&self) -> String {
        if let Some(url) = self.current().await {
            debug!(base_url = %url, "resolve.cached");
            return url;
        }

        let _lock = self.resolve_lock.lock().await;
        if let Some(url) = self.current().await {
            debug!(base_url = %url, "resolve.cached");
            return url;
        }

        let (url, source) = self.compute().await;
        {
            let mut state = self.state.write().await;
            state.base_url = Some(url.clone());
            state.resolved = true;
        }
        info!(base_url = %url, source = %source, "resolve.complete");
        url
    }

    /// Drops the cached URL so the next [`resolve`](Self::resolve) starts over.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        if let Some(url) = state.base_url.take() {
            info!(base_url = %url, "resolve.invalidated");
        }
        state.resolved = false;
    }

    async fn compute(&self) -> (String, ResolutionSource) {
        if let Some(url) = &self.configured {
            return (url.clone(), ResolutionSource::Configured);
        }
        if self.local_runtime || self.candidates.is_empty() {
            return (self.local_default.clone(), ResolutionSource::LocalDefault);
        }
        for candidate in &self.candidates {
            let probe = self
                .health
                .check(Some(candidate.as_str()), DETECT_ATTEMPTS_PER_CANDIDATE)
                .await;
            if probe.success {
                return (probe.url, ResolutionSource::Detected);
            }
            debug!(
                candidate = %candidate,
                error = probe.error.as_deref().unwrap_or_default(),
                "resolve.candidate_unhealthy"
            );
        }
        warn!(
            candidates = self.candidates.len(),
            fallback = %self.local_default,
            "resolve.no_healthy_candidate"
        );
        (self.local_default.clone(), ResolutionSource::LocalDefault)
    }
}
