mod client;
pub mod config;
pub mod errors;
pub mod health;
pub mod recovery;
pub mod request;
pub mod request_context;
pub mod resolver;
pub mod retry;
pub mod telemetry;
pub mod types;
pub mod wake;

pub use client::ResilientClient;
pub use config::{Config, ConfigLocation, DEFAULT_LOCAL_URL};
pub use errors::{Error, ErrorClass};
pub use health::HealthProbe;
pub use recovery::{RecoveryOutcome, RecoveryPhase};
pub use request::{ApiRequest, FileUpload};
pub use request_context::ApiContext;
pub use resolver::{EndpointResolver, ResolutionState, join_path, normalize_base_url};
pub use wake::{WakeOrchestrator, WakePlan};

#[cfg(test)]
mod tests;
