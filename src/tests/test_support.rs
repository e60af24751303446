use crate::Config;
use crate::config::DEFAULT_LOCAL_URL;
use crate::retry::{BackoffGrowth, JitterStrategy, RetryPlan};
use crate::wake::WakePlan;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::subscriber::{set_default, DefaultGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, Registry};

pub const HEALTH_TIMEOUT: Duration = Duration::from_millis(150);

pub fn fast_health_plan() -> RetryPlan {
    RetryPlan::new(
        3,
        Duration::from_millis(10),
        BackoffGrowth::Linear,
        Duration::from_millis(100),
        JitterStrategy::None,
    )
}

pub fn fast_wake_plan() -> WakePlan {
    WakePlan {
        max_attempts: 3,
        first_timeout: Duration::from_millis(150),
        later_timeout: Duration::from_millis(300),
        backoff_step: Duration::from_millis(20),
    }
}

/// Configuration with millisecond-scale timeouts and backoff.
pub fn fast_config(base_url: Option<&str>) -> Config {
    Config::from_values(base_url, DEFAULT_LOCAL_URL, Vec::new(), true)
        .with_health_timeout(HEALTH_TIMEOUT)
        .with_request_timeout(Duration::from_millis(300))
        .with_upload_timeout(Duration::from_millis(300))
        .with_health_retry(fast_health_plan())
        .with_wake_plan(fast_wake_plan())
}

pub fn detecting_config(candidates: Vec<String>) -> Config {
    Config {
        local_runtime: false,
        candidate_urls: candidates,
        ..fast_config(None)
    }
}

/// A loopback URL nothing listens on, so connects are refused.
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

struct VecWriter {
    lines: Arc<Mutex<Vec<String>>>,
}

impl std::io::Write for VecWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.lines.lock().unwrap();
        guard.push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn make_subscriber(lines: Arc<Mutex<Vec<String>>>) -> impl tracing::Subscriber + Send + Sync {
    let writer_lines = lines.clone();
    Registry::default().with(
        fmt::Layer::default()
            .with_writer(move || VecWriter {
                lines: writer_lines.clone(),
            })
            .with_target(false)
            .with_level(true)
            .with_ansi(false),
    )
}

pub fn capture_logs() -> (Arc<Mutex<Vec<String>>>, DefaultGuard) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let guard = set_default(make_subscriber(lines.clone()));
    (lines, guard)
}

pub fn drain_logs(lines: Arc<Mutex<Vec<String>>>) -> Vec<String> {
    let guard = lines.lock().unwrap();
    guard.clone()
}

pub fn count_events(logs: &[String], event: &str) -> usize {
    logs.iter().filter(|line| line.contains(event)).count()
}
