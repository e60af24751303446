use std::time::Duration;

use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::Error;

/// Structured events for one wake-up sequence against a single base URL.
#[derive(Clone, Debug)]
pub struct WakeTelemetry {
    attempt_id: Uuid,
    base_url: String,
}

impl WakeTelemetry {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            base_url: base_url.into(),
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn emit_start(&self, max_attempts: u8) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            base_url = %self.base_url,
            max_attempts,
            "wake.start"
        );
    }

    pub fn emit_attempt(&self, attempt: u8, timeout: Duration) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            base_url = %self.base_url,
            attempt,
            timeout_ms = timeout.as_millis() as u64,
            "wake.attempt"
        );
    }

    /// Name resolution or timeout: the backend is most likely still cold.
    pub fn emit_asleep(&self, attempt: u8, error: &Error) {
        event!(
            Level::DEBUG,
            attempt_id = %self.attempt_id,
            base_url = %self.base_url,
            attempt,
            error = %error,
            "wake.asleep"
        );
    }

    pub fn emit_error(&self, attempt: u8, error: &Error) {
        event!(
            Level::WARN,
            attempt_id = %self.attempt_id,
            base_url = %self.base_url,
            attempt,
            error = %error,
            "wake.error"
        );
    }

    pub fn emit_backoff(&self, attempt: u8, delay: Duration) {
        event!(
            Level::DEBUG,
            attempt_id = %self.attempt_id,
            base_url = %self.base_url,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "wake.backoff"
        );
    }

    pub fn emit_success(&self, attempts: u8) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            base_url = %self.base_url,
            attempts,
            "wake.success"
        );
    }

    pub fn emit_failure(&self, attempts: u8) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            base_url = %self.base_url,
            attempts,
            "wake.failure"
        );
    }
}
