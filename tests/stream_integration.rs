//! Stream integration tests
//!
//! Real HTTP event streams served by wiremock, consumed through
//! `HttpEventSource` and `StreamManager`.

mod common;

use common::{config_for, sse_body, wait_for, wait_until_finished};
use optim::projection::project;
use optim::registry::{ConnectionRegistry, ResourceId, StreamKind};
use optim::stream::{
    JobStatus, LivenessState, LogLevel, StreamManager, CONNECTION_ERROR_MESSAGE, MAX_LINE_BYTES,
};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn event_stream(payloads: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(sse_body(payloads), "text/event-stream")
}

fn manager_for(server: &MockServer) -> StreamManager {
    StreamManager::from_config(Arc::new(ConnectionRegistry::new()), &config_for(&server.uri()))
        .unwrap()
}

#[tokio::test]
async fn test_status_stream_runs_to_completion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/job_status_stream"))
        .and(query_param("prompt_hash", "p1"))
        .and(query_param("tc_hash", "tc1"))
        .respond_with(event_stream(&[
            r#"{"status":"pending"}"#,
            r#"{"status":"processing"}"#,
            r#"{"status":"completed"}"#,
        ]))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let mut subscription =
        manager.subscribe_status(&ResourceId::new("p1", "tc1"), JobStatus::NoJobsActive);
    assert_eq!(subscription.snapshot().job_status(), Some(JobStatus::NoJobsActive));

    let last = wait_until_finished(&mut subscription).await;
    assert_eq!(last.job_status(), Some(JobStatus::Completed));
    assert_eq!(project(&last).label, "Completed");
    assert!(manager.registry().is_empty());

    manager.shutdown().await;
}

#[tokio::test]
async fn test_log_stream_records_lines_and_goes_live() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/log_stream"))
        .respond_with(event_stream(&[
            r#"{"message":"heartbeat"}"#,
            r#"{"message":"Starting test","level":"info"}"#,
            r#"{"message":"Slow response","level":"warn"}"#,
        ]))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let mut subscription = manager.subscribe_logs(&ResourceId::new("p1", "tc1"));

    let snapshot = wait_for(&mut subscription, |s| s.entries().len() >= 2).await;
    let entries = snapshot.entries();
    assert_eq!(entries[0].message, "INFO : Starting test");
    assert_eq!(entries[1].message, "WARN : Slow response");
    assert_eq!(entries[1].level, LogLevel::Warn);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_log_stream_server_end_adds_single_error_line() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/log_stream"))
        .respond_with(event_stream(&[r#"{"message":"only line"}"#]))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let mut subscription = manager.subscribe_logs(&ResourceId::new("p1", "tc1"));

    let snapshot = wait_for(&mut subscription, |s| {
        s.entries()
            .iter()
            .any(|entry| entry.message == CONNECTION_ERROR_MESSAGE)
    })
    .await;
    assert_eq!(snapshot.entries()[0].message, "INFO : only line");
    assert_eq!(snapshot.liveness(), Some(LivenessState::Streaming));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_log_stream_unreachable_server_shows_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/log_stream"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let mut subscription = manager.subscribe_logs(&ResourceId::new("p1", "tc1"));

    let snapshot = wait_for(&mut subscription, |s| !s.entries().is_empty()).await;
    assert_eq!(snapshot.entries().len(), 1);
    assert_eq!(snapshot.entries()[0].level, LogLevel::Error);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_oversized_line_fails_the_stream() {
    let server = MockServer::start().await;
    let body = format!("data: {}", "x".repeat(MAX_LINE_BYTES + 1));
    Mock::given(method("GET"))
        .and(path("/log_stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let mut subscription = manager.subscribe_logs(&ResourceId::new("p1", "tc1"));

    let snapshot = wait_for(&mut subscription, |s| !s.entries().is_empty()).await;
    assert_eq!(snapshot.entries()[0].message, CONNECTION_ERROR_MESSAGE);
    assert!(manager.registry().contains(subscription.key()));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_failure_on_same_subscription() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/job_status_stream"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/job_status_stream"))
        .respond_with(event_stream(&[r#"{"status":"completed"}"#]))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let mut subscription =
        manager.subscribe_status(&ResourceId::new("p1", "tc1"), JobStatus::Pending);

    let last = wait_until_finished(&mut subscription).await;
    assert_eq!(last.job_status(), Some(JobStatus::Completed));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_log_and_status_streams_coexist() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/log_stream"))
        .respond_with(event_stream(&[r#"{"message":"line"}"#]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/job_status_stream"))
        .respond_with(event_stream(&[r#"{"status":"processing"}"#]))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let id = ResourceId::new("p1", "tc1");
    let mut logs = manager.subscribe_logs(&id);
    let mut status = manager.subscribe_status(&id, JobStatus::Pending);

    assert_eq!(manager.registry().len(), 2);
    assert_eq!(logs.kind(), StreamKind::Log);
    assert_eq!(status.kind(), StreamKind::Status);

    wait_for(&mut logs, |s| !s.entries().is_empty()).await;
    wait_for(&mut status, |s| s.job_status() == Some(JobStatus::Processing)).await;

    manager.shutdown().await;
}

#[tokio::test]
async fn test_shared_subscription_opens_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/job_status_stream"))
        .respond_with(event_stream(&[r#"{"status":"completed"}"#]))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    let id = ResourceId::new("p1", "tc1");
    let mut first = manager.subscribe_status(&id, JobStatus::Pending);
    let mut second = manager.subscribe_status(&id, JobStatus::Pending);
    assert_eq!(first.session_id(), second.session_id());

    assert_eq!(
        wait_until_finished(&mut first).await.job_status(),
        Some(JobStatus::Completed)
    );
    assert_eq!(
        wait_until_finished(&mut second).await.job_status(),
        Some(JobStatus::Completed)
    );

    manager.shutdown().await;
}
