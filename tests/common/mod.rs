//! Shared helpers for optim integration tests.

#![allow(dead_code)]

use optim::config::{EndpointsConfig, OptimConfig, StreamingConfig};
use optim::stream::{StreamSnapshot, Subscription};
use std::time::Duration;

/// Upper bound for any single wait in an integration test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Every endpoint pointed at one mock server.
pub fn endpoints_for(base: &str) -> EndpointsConfig {
    EndpointsConfig {
        backend_url: base.to_string(),
        jobs_url: base.to_string(),
        status_stream_url: base.to_string(),
        log_stream_url: base.to_string(),
        chat_url: base.to_string(),
    }
}

/// Streaming settings short enough for real-time tests.
pub fn fast_streaming() -> StreamingConfig {
    StreamingConfig {
        heartbeat_timeout_seconds: 5,
        retry_delay_seconds: 1,
        no_logs_threshold: 3,
        blink_millis: 100,
        close_when_idle: true,
        connect_timeout_seconds: 2,
    }
}

pub fn config_for(base: &str) -> OptimConfig {
    OptimConfig {
        endpoints: endpoints_for(base),
        streaming: fast_streaming(),
        ..OptimConfig::default()
    }
}

/// A `text/event-stream` body with one `data:` event per payload.
pub fn sse_body(payloads: &[&str]) -> String {
    payloads
        .iter()
        .map(|payload| format!("data: {}\n\n", payload))
        .collect()
}

/// Wait until the subscription publishes a snapshot matching `predicate`.
///
/// Panics if the stream ends or `TEST_TIMEOUT` passes first.
pub async fn wait_for<F>(subscription: &mut Subscription, predicate: F) -> StreamSnapshot
where
    F: Fn(&StreamSnapshot) -> bool,
{
    let result = tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            let snapshot = subscription.snapshot();
            if predicate(&snapshot) {
                return snapshot;
            }
            assert!(subscription.changed().await, "stream ended before condition held");
        }
    })
    .await;
    result.expect("timed out waiting for stream state")
}

/// Drain updates until the stream ends; returns the final snapshot.
pub async fn wait_until_finished(subscription: &mut Subscription) -> StreamSnapshot {
    tokio::time::timeout(TEST_TIMEOUT, async {
        while subscription.changed().await {}
    })
    .await
    .expect("timed out waiting for stream to finish");
    subscription.snapshot()
}
