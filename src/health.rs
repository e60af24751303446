use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::errors::Error;
use crate::resolver::{join_path, normalize_base_url};
use crate::retry::{OperationKind, RetryCoordinator, RetryPlan};
use crate::types::HealthResponse;

pub const HEALTH_PATH: &str = "/api/health";

/// Result of a health check. Produced and consumed within a single call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthProbe {
    pub success: bool,
    pub url: String,
    pub error: Option<String>,
}

/// Probes `{base}/api/health`, retrying transport failures with backoff.
pub struct HealthChecker {
    http: Client,
    timeout: Duration,
    retry: RetryCoordinator,
}

impl HealthChecker {
    pub fn new(http: Client, timeout: Duration, plan: RetryPlan) -> Self {
        Self {
            http,
            timeout,
            retry: RetryCoordinator::new(plan),
        }
    }

    pub fn default_attempts(&self) -> u8 {
        self.retry.plan().max_attempts
    }

    /// Never fails: every outcome is reported through the returned probe.
    pub async fn check(&self, url: Option<&str>, max_attempts: u8) -> HealthProbe {
        let base = url.and_then(normalize_base_url);
        let target = match base.as_deref() {
            Some(base) => join_path(base, HEALTH_PATH),
            None => HEALTH_PATH.to_string(),
        };
        let probe_url = base.unwrap_or_default();

        let this = self;
        let result = self
            .retry
            .execute_bounded(OperationKind::HealthCheck, max_attempts, |attempt| {
                let target = target.clone();
                async move {
                    debug!(url = %target, attempt, "health.attempt");
                    this.probe(&target, this.timeout).await
                }
            })
            .await;

        match result {
            Ok(((), _)) => HealthProbe {
                success: true,
                url: probe_url,
                error: None,
            },
            Err(err) => HealthProbe {
                success: false,
                url: probe_url,
                error: Some(err.to_string()),
            },
        }
    }

    /// One GET against a full health URL. Statuses below 500 are inspected
    /// for `{"status":"ok"}`.
    pub(crate) async fn probe(&self, target: &str, timeout: Duration) -> Result<(), Error> {
        let resp = self
            .http
            .get(target)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(timeout)
                } else {
                    Error::Reqwest(e)
                }
            })?;
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_server_error() {
            return Err(Error::Http(status, body));
        }
        let parsed: HealthResponse = serde_json::from_str(&body)?;
        if parsed.is_ok() {
            return Ok(());
        }
        if status.is_success() {
            Err(Error::Api(format!(
                "health status '{}'",
                parsed.status.unwrap_or_default()
            )))
        } else {
            Err(Error::Http(status, body))
        }
    }
}
