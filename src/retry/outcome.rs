use std::time::Duration;

use tracing::{info, warn};

use super::OperationKind;
use crate::errors::{Error, ErrorClass};

/// Summary of one retried operation, logged once it settles.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub operation: OperationKind,
    pub attempts: u8,
    pub success: bool,
    pub elapsed: Duration,
    /// Class of the error that ended the loop, `None` on success.
    pub final_error: Option<ErrorClass>,
}

impl RetryOutcome {
    pub(crate) fn succeeded(operation: OperationKind, attempts: u8, elapsed: Duration) -> Self {
        Self {
            operation,
            attempts,
            success: true,
            elapsed,
            final_error: None,
        }
    }

    pub(crate) fn failed(
        operation: OperationKind,
        attempts: u8,
        elapsed: Duration,
        err: &Error,
    ) -> Self {
        Self {
            operation,
            attempts,
            success: false,
            elapsed,
            final_error: Some(err.class()),
        }
    }

    pub fn log(&self) {
        let elapsed_ms = self.elapsed.as_millis() as u64;
        match self.final_error {
            None => info!(
                operation = %self.operation,
                attempts = self.attempts,
                elapsed_ms,
                "retry.outcome"
            ),
            Some(class) => warn!(
                operation = %self.operation,
                attempts = self.attempts,
                elapsed_ms,
                error_class = ?class,
                "retry.outcome"
            ),
        }
    }
}
