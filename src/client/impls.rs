use std::sync::OnceLock;

use reqwest::Response;
use tracing::info;

use crate::{
    ResilientClient,
    config::Config,
    errors::Error,
    health::HealthProbe,
    recovery::{Recovery, RecoveryOutcome},
    request::ApiRequest,
    request_context::ApiContext,
};

static SHARED: OnceLock<ResilientClient> = OnceLock::new();

impl ResilientClient {
    pub fn new(config: Config) -> Result<Self, Error> {
        Ok(Self::from_context(ApiContext::build(config)?))
    }

    pub fn from_context(ctx: ApiContext) -> Self {
        Self { ctx }
    }

    /// Process-wide instance configured from `API_*` environment variables.
    /// The first caller builds it; later callers get the same instance.
    pub fn shared() -> Result<&'static ResilientClient, Error> {
        Self::shared_with(Config::from_env)
    }

    /// Like [`shared`](Self::shared), building the first instance from `load`.
    /// `load` is not called once the instance exists.
    pub fn shared_with<F>(load: F) -> Result<&'static ResilientClient, Error>
    where
        F: FnOnce() -> Result<Config, Error>,
    {
        if let Some(client) = SHARED.get() {
            return Ok(client);
        }
        let client = ResilientClient::new(load()?)?;
        info!("shared client initialised");
        Ok(SHARED.get_or_init(|| client))
    }

    pub fn context(&self) -> &ApiContext {
        &self.ctx
    }

    /// Resolved base URL, probing candidates on first use when configured to.
    pub async fn api_url(&self) -> String {
        self.ctx.resolver().resolve().await
    }

    /// Health check against the resolved base URL.
    pub async fn health_check(&self) -> HealthProbe {
        let base_url = self.api_url().await;
        let health = self.ctx.health();
        health.check(Some(base_url.as_str()), health.default_attempts()).await
    }

    /// Health check against an arbitrary URL with an explicit attempt budget.
    pub async fn check_url(&self, url: Option<&str>, max_attempts: u8) -> HealthProbe {
        self.ctx.health().check(url, max_attempts).await
    }

    pub async fn wake(&self, url: &str) -> bool {
        self.ctx.wake().wake(url).await
    }

    /// Sends the request against the resolved base URL. A transport failure
    /// triggers one wake-and-retry cycle before the error is returned.
    pub async fn execute(&self, request: ApiRequest) -> Result<Response, Error> {
        self.execute_with_outcome(request).await.0
    }

    pub async fn execute_with_outcome(
        &self,
        request: ApiRequest,
    ) -> (Result<Response, Error>, RecoveryOutcome) {
        Recovery::new(&self.ctx, request).run().await
    }
}
