//! Wake-and-retry state machine for a single outgoing request.
//!
//! ```text
//! Idle --ok--> Succeeded
//! Idle --transport error, not yet retried--> Waking
//! Idle --any other error--> Failed
//! Waking --woke--> Retrying (same URL)
//! Waking --still down--> Probing
//! Probing --re-resolved to a different URL--> Retrying (new URL)
//! Probing --same URL--> Failed (unavailable)
//! Retrying --ok--> Succeeded
//! Retrying --error--> Failed
//! ```
//!
//! `Retrying` is entered at most once per request.

use std::fmt;
use std::time::Duration;

use reqwest::Response;
use tokio::time::Instant;
use tracing::{Level, debug, event, warn};

use crate::errors::Error;
use crate::request::ApiRequest;
use crate::request_context::ApiContext;
use crate::retry::OperationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    Idle,
    Probing,
    Waking,
    Retrying,
    Failed,
    Succeeded,
}

impl fmt::Display for RecoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryPhase::Idle => write!(f, "idle"),
            RecoveryPhase::Probing => write!(f, "probing"),
            RecoveryPhase::Waking => write!(f, "waking"),
            RecoveryPhase::Retrying => write!(f, "retrying"),
            RecoveryPhase::Failed => write!(f, "failed"),
            RecoveryPhase::Succeeded => write!(f, "succeeded"),
        }
    }
}

enum RecoveryState {
    Idle,
    Waking { base_url: String, cause: Error },
    Probing { base_url: String, cause: Error },
    Retrying { base_url: String },
    Succeeded(Response),
    Failed(Error),
}

impl RecoveryState {
    fn phase(&self) -> RecoveryPhase {
        match self {
            RecoveryState::Idle => RecoveryPhase::Idle,
            RecoveryState::Waking { .. } => RecoveryPhase::Waking,
            RecoveryState::Probing { .. } => RecoveryPhase::Probing,
            RecoveryState::Retrying { .. } => RecoveryPhase::Retrying,
            RecoveryState::Succeeded(_) => RecoveryPhase::Succeeded,
            RecoveryState::Failed(_) => RecoveryPhase::Failed,
        }
    }
}

/// Audit trail of one request's trip through the state machine.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    pub operation: OperationKind,
    pub phases: Vec<RecoveryPhase>,
    pub success: bool,
    pub elapsed: Duration,
}

impl RecoveryOutcome {
    /// Whether the request was sent a second time.
    pub fn reissued(&self) -> bool {
        self.phases.contains(&RecoveryPhase::Retrying)
    }

    pub fn log(&self) {
        let phases = self
            .phases
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(">");
        event!(
            Level::INFO,
            operation = %self.operation,
            phases = %phases,
            success = self.success,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "recovery.outcome"
        );
    }
}

pub(crate) struct Recovery<'a> {
    ctx: &'a ApiContext,
    request: ApiRequest,
    phases: Vec<RecoveryPhase>,
    started: Instant,
}

impl<'a> Recovery<'a> {
    pub(crate) fn new(ctx: &'a ApiContext, request: ApiRequest) -> Self {
        Self {
            ctx,
            request,
            phases: vec![RecoveryPhase::Idle],
            started: Instant::now(),
        }
    }

    pub(crate) async fn run(mut self) -> (Result<Response, Error>, RecoveryOutcome) {
        let mut state = RecoveryState::Idle;
        loop {
            state = match state {
                RecoveryState::Succeeded(resp) => return self.finish(Ok(resp)),
                RecoveryState::Failed(err) => return self.finish(Err(err)),
                current => {
                    let from = current.phase();
                    let next = self.advance(current).await;
                    debug!(
                        operation = %self.request.operation,
                        from = %from,
                        to = %next.phase(),
                        "recovery.transition"
                    );
                    self.phases.push(next.phase());
                    next
                }
            };
        }
    }

    async fn advance(&mut self, state: RecoveryState) -> RecoveryState {
        match state {
            RecoveryState::Idle => {
                let base_url = self.ctx.resolver().resolve().await;
                match self.send(&base_url).await {
                    Ok(resp) => RecoveryState::Succeeded(resp),
                    Err(cause) if cause.is_transport() && !self.request.retried() => {
                        self.request.mark_retried();
                        RecoveryState::Waking { base_url, cause }
                    }
                    Err(err) => RecoveryState::Failed(err),
                }
            }
            RecoveryState::Waking { base_url, cause } => {
                if self.ctx.wake().wake(&base_url).await {
                    RecoveryState::Retrying { base_url }
                } else {
                    RecoveryState::Probing { base_url, cause }
                }
            }
            RecoveryState::Probing { base_url, cause } => {
                let resolver = self.ctx.resolver();
                resolver.invalidate().await;
                let fresh = resolver.resolve().await;
                if fresh != base_url {
                    RecoveryState::Retrying { base_url: fresh }
                } else {
                    RecoveryState::Failed(Error::Unavailable {
                        base_url,
                        source: Box::new(cause),
                    })
                }
            }
            RecoveryState::Retrying { base_url } => match self.send(&base_url).await {
                Ok(resp) => RecoveryState::Succeeded(resp),
                Err(err) if err.is_transport() => RecoveryState::Failed(Error::Unavailable {
                    base_url,
                    source: Box::new(err),
                }),
                Err(err) => RecoveryState::Failed(err),
            },
            terminal @ (RecoveryState::Succeeded(_) | RecoveryState::Failed(_)) => terminal,
        }
    }

    async fn send(&self, base_url: &str) -> Result<Response, Error> {
        let timeout = self
            .request
            .effective_timeout(self.ctx.config().request_timeout());
        let resp = self
            .request
            .build(self.ctx.http_client(), base_url, timeout)?
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
        if status.is_success() {
            return Ok(resp);
        }
        let body = match resp.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(
                    operation = %self.request.operation,
                    status = status.as_u16(),
                    error = %err,
                    "request.body_unreadable"
                );
                String::new()
            }
        };
        warn!(
            operation = %self.request.operation,
            method = %self.request.method,
            path = %self.request.path,
            status = status.as_u16(),
            "request.http_error"
        );
        Err(Error::Http(status, body))
    }

    fn finish(
        self,
        result: Result<Response, Error>,
    ) -> (Result<Response, Error>, RecoveryOutcome) {
        let outcome = RecoveryOutcome {
            operation: self.request.operation,
            phases: self.phases,
            success: result.is_ok(),
            elapsed: self.started.elapsed(),
        };
        outcome.log();
        if let Err(err) = &result {
            warn!(
                operation = %outcome.operation,
                error = %err,
                user_message = %err.user_message(),
                "request.failed"
            );
        }
        (result, outcome)
    }
}
