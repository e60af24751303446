use rand::{SeedableRng, rngs::StdRng};
use std::fmt;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::errors::Error;

use super::{RetryOutcome, plan::RetryPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    HealthCheck,
    Upload,
    ListResults,
    GetResult,
    DownloadResult,
    DeleteResult,
    ListRequirements,
    Custom,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::HealthCheck => write!(f, "health_check"),
            OperationKind::Upload => write!(f, "upload"),
            OperationKind::ListResults => write!(f, "list_results"),
            OperationKind::GetResult => write!(f, "get_result"),
            OperationKind::DownloadResult => write!(f, "download_result"),
            OperationKind::DeleteResult => write!(f, "delete_result"),
            OperationKind::ListRequirements => write!(f, "list_requirements"),
            OperationKind::Custom => write!(f, "custom"),
        }
    }
}

/// Runs an operation under a [`RetryPlan`], retrying transport-class failures only.
pub struct RetryCoordinator {
    plan: RetryPlan,
    rng: Mutex<StdRng>,
}

impl RetryCoordinator {
    pub fn new(plan: RetryPlan) -> Self {
        Self {
            plan,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn plan(&self) -> RetryPlan {
        self.plan.clone()
    }

    pub async fn execute<F, Fut, T>(
        &self,
        operation: OperationKind,
        op: F,
    ) -> Result<(T, RetryOutcome), Error>
    where
        F: FnMut(u8) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, Error>> + Send,
    {
        self.execute_bounded(operation, self.plan.max_attempts, op)
            .await
    }

    /// Same as [`execute`](Self::execute) with an explicit attempt budget.
    pub async fn execute_bounded<F, Fut, T>(
        &self,
        operation: OperationKind,
        max_attempts: u8,
        mut op: F,
    ) -> Result<(T, RetryOutcome), Error>
    where
        F: FnMut(u8) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, Error>> + Send,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt: u8 = 1;
        let start = Instant::now();
        loop {
            match op(attempt).await {
                Ok(value) => {
                    let outcome = RetryOutcome::succeeded(operation, attempt, start.elapsed());
                    outcome.log();
                    return Ok((value, outcome));
                }
                Err(err) => {
                    if attempt >= max_attempts || !Self::is_retriable(&err) {
                        let outcome =
                            RetryOutcome::failed(operation, attempt, start.elapsed(), &err);
                        outcome.log();
                        return Err(err);
                    }
                    let delay = {
                        let mut rng = self.rng.lock().await;
                        self.plan.delay_for_attempt(attempt, &mut *rng)
                    };
                    warn!(
                        operation = %operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retry.scheduling"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn is_retriable(err: &Error) -> bool {
        err.is_transport()
    }
}

impl Default for RetryCoordinator {
    fn default() -> Self {
        Self::new(RetryPlan::health_check())
    }
}
