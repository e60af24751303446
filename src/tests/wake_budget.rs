use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::ApiContext;
use crate::tests::test_support::{
    capture_logs, count_events, drain_logs, fast_config, fast_wake_plan, refused_url,
};

#[tokio::test]
async fn wakes_on_second_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = ApiContext::build(fast_config(None)).unwrap();
    assert!(ctx.wake().wake(&server.uri()).await);
}

#[tokio::test]
async fn gives_up_after_three_attempts_within_budget() {
    let (lines, guard) = capture_logs();
    let ctx = ApiContext::build(fast_config(None)).unwrap();
    let started = tokio::time::Instant::now();
    let woke = ctx.wake().wake(&refused_url()).await;
    let elapsed = started.elapsed();
    drop(guard);

    assert!(!woke);
    assert!(
        elapsed <= fast_wake_plan().budget() + Duration::from_millis(500),
        "wake took {elapsed:?}"
    );
    let logs = drain_logs(lines);
    assert_eq!(count_events(&logs, "wake.attempt"), 3, "logs: {logs:?}");
    assert_eq!(count_events(&logs, "wake.failure"), 1);
    assert_eq!(count_events(&logs, "wake.error"), 3);
}

#[tokio::test]
async fn timeouts_are_treated_as_still_asleep() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(3)
        .mount(&server)
        .await;

    let (lines, guard) = capture_logs();
    let ctx = ApiContext::build(fast_config(None)).unwrap();
    let woke = ctx.wake().wake(&server.uri()).await;
    drop(guard);

    assert!(!woke);
    let logs = drain_logs(lines);
    assert_eq!(count_events(&logs, "wake.asleep"), 3, "logs: {logs:?}");
    assert_eq!(count_events(&logs, "wake.error"), 0);
}

#[tokio::test]
async fn concurrent_wakes_share_one_sequence() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "ok" }))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = ApiContext::build(fast_config(None)).unwrap();
    let wake = ctx.wake();
    let uri = server.uri();
    let (a, b) = tokio::join!(wake.wake(&uri), wake.wake(&uri));
    assert!(a && b);
}

#[tokio::test]
async fn wakes_for_different_urls_do_not_queue() {
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&slow)
        .await;
    let fast = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })))
        .expect(1)
        .mount(&fast)
        .await;

    let ctx = ApiContext::build(fast_config(None)).unwrap();
    let wake = ctx.wake();
    let (slow_uri, fast_uri) = (slow.uri(), fast.uri());
    let (slow_woke, (fast_woke, fast_elapsed)) = tokio::join!(wake.wake(&slow_uri), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let started = tokio::time::Instant::now();
        let woke = wake.wake(&fast_uri).await;
        (woke, started.elapsed())
    });

    assert!(!slow_woke);
    assert!(fast_woke);
    // The slow sequence spends at least its first probe timeout failing.
    assert!(
        fast_elapsed < fast_wake_plan().first_timeout,
        "fast wake waited {fast_elapsed:?}"
    );
}
