use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{Error, ErrorClass};
use crate::health::{HEALTH_PATH, HealthChecker};
use crate::resolver::{join_path, normalize_base_url};
use crate::telemetry::wake::WakeTelemetry;

/// Attempt budget for rousing a sleeping backend.
#[derive(Clone, Debug)]
pub struct WakePlan {
    pub max_attempts: u8,
    pub first_timeout: Duration,
    /// Longer timeout for later attempts, covering slow cold starts.
    pub later_timeout: Duration,
    /// Sleep `backoff_step * attempt` between attempts.
    pub backoff_step: Duration,
}

impl Default for WakePlan {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            first_timeout: Duration::from_secs(5),
            later_timeout: Duration::from_secs(15),
            backoff_step: Duration::from_millis(2_000),
        }
    }
}

impl WakePlan {
    pub fn timeout_for(&self, attempt: u8) -> Duration {
        if attempt <= 1 {
            self.first_timeout
        } else {
            self.later_timeout
        }
    }

    pub fn delay_after(&self, attempt: u8) -> Duration {
        self.backoff_step.saturating_mul(attempt as u32)
    }

    /// Worst case wall time of one wake sequence, excluding request overhead.
    pub fn budget(&self) -> Duration {
        let timeouts: Duration = (1..=self.max_attempts).map(|a| self.timeout_for(a)).sum();
        let backoffs: Duration = (1..self.max_attempts).map(|a| self.delay_after(a)).sum();
        timeouts + backoffs
    }
}

/// Single-flight state for one base URL.
#[derive(Default)]
struct WakeSlot {
    last: Mutex<Option<bool>>,
    completed: AtomicU64,
}

/// Repeatedly probes a possibly sleeping backend. Concurrent callers for the
/// same base URL share one in-flight sequence; different URLs wake independently.
pub struct WakeOrchestrator {
    health: Arc<HealthChecker>,
    plan: WakePlan,
    slots: StdMutex<HashMap<String, Arc<WakeSlot>>>,
}

impl WakeOrchestrator {
    pub fn new(health: Arc<HealthChecker>, plan: WakePlan) -> Self {
        Self {
            health,
            plan,
            slots: StdMutex::new(HashMap::new()),
        }
    }

    pub fn plan(&self) -> &WakePlan {
        &self.plan
    }

    /// Returns `true` once the backend reports healthy within the attempt budget.
    pub async fn wake(&self, url: &str) -> bool {
        let base = normalize_base_url(url).unwrap_or_default();
        let slot = self.slot(&base);
        let observed = slot.completed.load(Ordering::Acquire);
        let mut last = slot.last.lock().await;
        if slot.completed.load(Ordering::Acquire) != observed
            && let Some(result) = *last
        {
            debug!(base_url = %base, result, "wake.shared");
            return result;
        }

        let result = self.run(&base).await;
        *last = Some(result);
        slot.completed.fetch_add(1, Ordering::AcqRel);
        result
    }

    fn slot(&self, base: &str) -> Arc<WakeSlot> {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(base.to_string()).or_default())
    }

    async fn run(&self, base: &str) -> bool {
        let telemetry = WakeTelemetry::new(base);
        let target = join_path(base, HEALTH_PATH);
        let max_attempts = self.plan.max_attempts.max(1);
        telemetry.emit_start(max_attempts);

        for attempt in 1..=max_attempts {
            let timeout = self.plan.timeout_for(attempt);
            telemetry.emit_attempt(attempt, timeout);
            match self.health.probe(&target, timeout).await {
                Ok(()) => {
                    telemetry.emit_success(attempt);
                    return true;
                }
                Err(err) => {
                    log_attempt_error(&telemetry, attempt, &err);
                    if attempt == max_attempts {
                        break;
                    }
                }
            }
            let delay = self.plan.delay_after(attempt);
            telemetry.emit_backoff(attempt, delay);
            tokio::time::sleep(delay).await;
        }

        telemetry.emit_failure(max_attempts);
        false
    }
}

fn log_attempt_error(telemetry: &WakeTelemetry, attempt: u8, err: &Error) {
    match err.class() {
        ErrorClass::NameResolution | ErrorClass::Timeout => telemetry.emit_asleep(attempt, err),
        _ => telemetry.emit_error(attempt, err),
    }
}
