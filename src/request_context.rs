use std::sync::Arc;

use reqwest::Client;

use crate::config::Config;
use crate::errors::Error;
use crate::health::HealthChecker;
use crate::resolver::EndpointResolver;
use crate::wake::WakeOrchestrator;

pub const USER_AGENT: &str = concat!("coldstart-client/", env!("CARGO_PKG_VERSION"));

/// Shared context for outbound requests: one endpoint cache, one health
/// checker and one wake orchestrator per context.
#[derive(Clone)]
pub struct ApiContext {
    http_client: Client,
    config: Arc<Config>,
    health: Arc<HealthChecker>,
    resolver: Arc<EndpointResolver>,
    wake: Arc<WakeOrchestrator>,
}

impl ApiContext {
    pub fn build(config: Config) -> Result<Self, Error> {
        let http_client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self::with_http_client(http_client, config))
    }

    pub fn with_http_client(http_client: Client, config: Config) -> Self {
        let health = Arc::new(HealthChecker::new(
            http_client.clone(),
            config.health_timeout(),
            config.health_retry.clone(),
        ));
        let resolver = Arc::new(EndpointResolver::new(&config, Arc::clone(&health)));
        let wake = Arc::new(WakeOrchestrator::new(
            Arc::clone(&health),
            config.wake.clone(),
        ));
        Self {
            http_client,
            config: Arc::new(config),
            health,
            resolver,
            wake,
        }
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn health(&self) -> Arc<HealthChecker> {
        Arc::clone(&self.health)
    }

    pub fn resolver(&self) -> Arc<EndpointResolver> {
        Arc::clone(&self.resolver)
    }

    pub fn wake(&self) -> Arc<WakeOrchestrator> {
        Arc::clone(&self.wake)
    }
}
