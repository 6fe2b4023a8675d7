use super::*;
use crate::config::{EndpointsConfig, StreamingConfig};
use crate::registry::{ConnectionRegistry, ResourceId};
use async_trait::async_trait;
use futures::channel::mpsc as feed_channel;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

type Feed = feed_channel::UnboundedSender<Result<SseMessage, TransportError>>;

const HEARTBEAT: &str = r#"{"message":"heartbeat"}"#;
const NO_LOGS: &str = r#"{"message":"No logs available at the moment"}"#;

/// In-memory event source: every successful open hands the test a sender
/// feeding that connection.
struct ScriptedSource {
    urls: Mutex<Vec<String>>,
    feeds: mpsc::UnboundedSender<Feed>,
    fail_opens: AtomicUsize,
}

impl ScriptedSource {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Feed>) {
        let (feeds, rx) = mpsc::unbounded_channel();
        let source = Arc::new(Self {
            urls: Mutex::new(Vec::new()),
            feeds,
            fail_opens: AtomicUsize::new(0),
        });
        (source, rx)
    }

    fn fail_next_opens(&self, count: usize) {
        self.fail_opens.store(count, Ordering::SeqCst);
    }

    fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    fn opens(&self) -> usize {
        self.urls.lock().unwrap().len()
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn open(&self, url: &str) -> Result<SseStream, TransportError> {
        self.urls.lock().unwrap().push(url.to_string());
        let failing = self
            .fail_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Connect("connection refused".to_string()));
        }
        let (tx, rx) = feed_channel::unbounded();
        let _ = self.feeds.send(tx);
        Ok(rx.boxed())
    }
}

fn manager_with(source: Arc<ScriptedSource>, close_when_idle: bool) -> StreamManager {
    let config = StreamingConfig {
        close_when_idle,
        ..Default::default()
    };
    StreamManager::new(
        Arc::new(ConnectionRegistry::new()),
        source,
        config,
        EndpointsConfig::default(),
    )
}

fn resource() -> ResourceId {
    ResourceId::new("p1", "tc1")
}

fn send(feed: &Feed, data: &str) {
    feed.unbounded_send(Ok(SseMessage::data(data))).unwrap();
}

fn lines(sub: &Subscription) -> Vec<String> {
    sub.snapshot()
        .entries()
        .iter()
        .map(|e| e.message.clone())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_second_subscription_reuses_connection() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source.clone(), true);

    let first = manager.subscribe_logs(&resource());
    let second = manager.subscribe_logs(&resource());
    let _feed = feeds.recv().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(source.opens(), 1);
    assert!(feeds.try_recv().is_err());
    assert_eq!(manager.registry().len(), 1);
    assert_eq!(first.session_id(), second.session_id());
    assert_eq!(first.key().as_str(), "log_p1_tc1");
    assert_eq!(
        manager.registry().get(first.key()).unwrap().subscribers(),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn test_log_and_status_streams_use_distinct_keys() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source.clone(), true);

    let logs = manager.subscribe_logs(&resource());
    let status = manager.subscribe_status(&resource(), JobStatus::NoJobsActive);
    let _ = feeds.recv().await.unwrap();
    let _ = feeds.recv().await.unwrap();

    assert_eq!(logs.key().as_str(), "log_p1_tc1");
    assert_eq!(status.key().as_str(), "p1_tc1");
    assert_eq!(manager.registry().len(), 2);

    let mut urls = source.urls();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "http://127.0.0.1:5003/job_status_stream?prompt_hash=p1&tc_hash=tc1".to_string(),
            "http://127.0.0.1:5004/log_stream?prompt_hash=p1&tc_hash=tc1".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_keep_online_and_gap_goes_offline_once() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source, true);
    let mut sub = manager.subscribe_logs(&resource());
    let feed = feeds.recv().await.unwrap();
    assert_eq!(sub.snapshot().liveness(), Some(LivenessState::Offline));

    send(&feed, HEARTBEAT);
    assert!(sub.changed().await);
    assert_eq!(sub.snapshot().liveness(), Some(LivenessState::Online));

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(sub.snapshot().liveness(), Some(LivenessState::Online));
        send(&feed, HEARTBEAT);
        assert!(sub.changed().await);
        assert_eq!(sub.snapshot().liveness(), Some(LivenessState::Online));
    }

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(sub.has_changed());
    assert!(sub.changed().await);
    assert_eq!(sub.snapshot().liveness(), Some(LivenessState::Offline));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!sub.has_changed());
}

#[tokio::test(start_paused = true)]
async fn test_fourth_no_logs_event_is_frequent() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source, true);
    let mut sub = manager.subscribe_logs(&resource());
    let feed = feeds.recv().await.unwrap();

    for _ in 0..3 {
        send(&feed, NO_LOGS);
        assert!(sub.changed().await);
        assert_eq!(sub.snapshot().liveness(), Some(LivenessState::Online));
    }
    send(&feed, NO_LOGS);
    assert!(sub.changed().await);
    assert_eq!(sub.snapshot().liveness(), Some(LivenessState::NoLogsFrequent));
    assert_eq!(sub.display().label, "No Logs Available");
}

#[tokio::test(start_paused = true)]
async fn test_completed_closes_and_removes() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source.clone(), true);
    let mut sub = manager.subscribe_status(&resource(), JobStatus::NoJobsActive);
    let feed = feeds.recv().await.unwrap();
    assert_eq!(sub.snapshot().job_status(), Some(JobStatus::NoJobsActive));

    send(&feed, r#"{"status":"processing"}"#);
    assert!(sub.changed().await);
    assert_eq!(sub.snapshot().job_status(), Some(JobStatus::Processing));

    send(&feed, r#"{"status":"completed"}"#);
    let _ = feed.unbounded_send(Ok(SseMessage::data(r#"{"status":"error"}"#)));
    assert!(sub.changed().await);
    assert_eq!(sub.snapshot().job_status(), Some(JobStatus::Completed));

    assert!(!sub.changed().await);
    assert!(manager.registry().is_empty());
    assert_eq!(sub.snapshot().job_status(), Some(JobStatus::Completed));
    assert!(feed.is_closed());

    // A later subscriber starts a fresh connection.
    let again = manager.subscribe_status(&resource(), JobStatus::Pending);
    let _ = feeds.recv().await.unwrap();
    assert_ne!(again.session_id(), sub.session_id());
    assert_eq!(source.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_logs_once_and_reconnects_under_same_key() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source.clone(), true);
    let mut sub = manager.subscribe_logs(&resource());
    let feed = feeds.recv().await.unwrap();
    let first = manager.registry().get(sub.key()).unwrap();

    send(&feed, HEARTBEAT);
    assert!(sub.changed().await);
    send(&feed, r#"{"message":"hello","level":"warn"}"#);
    assert!(sub.changed().await);
    feed.unbounded_send(Err(TransportError::Read("connection reset".to_string())))
        .unwrap();
    assert!(sub.changed().await);

    assert_eq!(sub.snapshot().liveness(), Some(LivenessState::Streaming));
    assert_eq!(
        lines(&sub),
        vec![
            "WARN : hello".to_string(),
            CONNECTION_ERROR_MESSAGE.to_string()
        ]
    );
    assert_eq!(
        manager.registry().get(sub.key()).unwrap().connection_id,
        first.connection_id
    );

    let failed_at = Instant::now();
    let _second_feed = feeds.recv().await.unwrap();
    assert!(failed_at.elapsed() >= Duration::from_secs(20));

    let current = manager.registry().get(sub.key()).unwrap();
    assert_ne!(current.connection_id, first.connection_id);
    assert_eq!(current.session_id, first.session_id);
    assert_eq!(current.key, first.key);
    assert_eq!(manager.registry().len(), 1);
    assert_eq!(source.urls()[0], source.urls()[1]);

    // No replay: the log still holds exactly one error line.
    assert_eq!(lines(&sub).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_open_failures_log_one_error() {
    let (source, mut feeds) = ScriptedSource::new();
    source.fail_next_opens(3);
    let manager = manager_with(source.clone(), true);
    let mut sub = manager.subscribe_logs(&resource());

    assert!(sub.changed().await);
    assert_eq!(lines(&sub), vec![CONNECTION_ERROR_MESSAGE.to_string()]);

    let started = Instant::now();
    let feed = feeds.recv().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(source.opens(), 4);
    assert_eq!(lines(&sub).len(), 1);

    // A successful open re-arms the error line.
    drop(feed);
    assert!(sub.changed().await);
    assert_eq!(lines(&sub).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_status_stream_retries_without_log() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source.clone(), true);
    let sub = manager.subscribe_status(&resource(), JobStatus::Pending);
    let feed = feeds.recv().await.unwrap();
    let first = manager.registry().get(sub.key()).unwrap().connection_id;

    drop(feed);
    let _ = feeds.recv().await.unwrap();

    assert_ne!(manager.registry().get(sub.key()).unwrap().connection_id, first);
    assert!(sub.snapshot().entries().is_empty());
    assert_eq!(sub.snapshot().job_status(), Some(JobStatus::Pending));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payloads_change_nothing() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source, true);
    let mut sub = manager.subscribe_logs(&resource());
    let feed = feeds.recv().await.unwrap();

    send(&feed, HEARTBEAT);
    assert!(sub.changed().await);
    let before = sub.snapshot();

    send(&feed, "not json");
    send(&feed, r#"{"level":"info"}"#);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!sub.has_changed());
    assert_eq!(sub.snapshot(), before);

    send(&feed, r#"{"message":"after"}"#);
    assert!(sub.changed().await);
    assert_eq!(lines(&sub), vec!["INFO : after".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_non_message_events_ignored() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source, true);
    let sub = manager.subscribe_logs(&resource());
    let feed = feeds.recv().await.unwrap();

    let ping = SseMessage {
        event: Some("ping".to_string()),
        data: HEARTBEAT.to_string(),
        id: None,
    };
    feed.unbounded_send(Ok(ping)).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(!sub.has_changed());
    assert_eq!(sub.snapshot().liveness(), Some(LivenessState::Offline));
}

#[tokio::test(start_paused = true)]
async fn test_blink_clears_after_window() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source, true);
    let mut sub = manager.subscribe_logs(&resource());
    let feed = feeds.recv().await.unwrap();

    send(&feed, r#"{"message":"step 1"}"#);
    assert!(sub.changed().await);
    assert!(sub.display().blink);

    assert!(sub.changed().await);
    assert!(!sub.display().blink);
    assert_eq!(sub.snapshot().liveness(), Some(LivenessState::Streaming));
}

#[tokio::test(start_paused = true)]
async fn test_last_release_closes_when_idle() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source, true);
    let first = manager.subscribe_logs(&resource());
    let second = manager.subscribe_logs(&resource());
    let feed = feeds.recv().await.unwrap();

    drop(first);
    assert_eq!(manager.registry().len(), 1);
    drop(second);
    assert!(manager.registry().is_empty());

    manager.shutdown().await;
    assert!(feed.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_connection_persists_without_idle_close() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source, false);
    let sub = manager.subscribe_logs(&resource());
    let _feed = feeds.recv().await.unwrap();
    let key = sub.key().clone();

    drop(sub);
    assert!(manager.registry().contains(&key));

    assert!(manager.close(&key));
    assert!(!manager.close(&key));
    assert!(manager.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_close_during_retry_wait_stops_reconnection() {
    let (source, _feeds) = ScriptedSource::new();
    source.fail_next_opens(1);
    let manager = manager_with(source.clone(), true);
    let mut sub = manager.subscribe_logs(&resource());

    assert!(sub.changed().await);
    assert!(manager.close(sub.key()));
    assert!(!sub.changed().await);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_everything() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source, false);
    let mut logs = manager.subscribe_logs(&resource());
    let mut status = manager.subscribe_status(&ResourceId::new("p2", "tc2"), JobStatus::Pending);
    let _ = feeds.recv().await.unwrap();
    let _ = feeds.recv().await.unwrap();

    manager.shutdown().await;

    assert!(manager.registry().is_empty());
    assert!(!logs.changed().await);
    assert!(!status.changed().await);
}

#[tokio::test(start_paused = true)]
async fn test_changed_waits_for_a_real_update() {
    let (source, mut feeds) = ScriptedSource::new();
    let manager = manager_with(source, true);

    let mut sub = manager.subscribe_logs(&resource());
    let feed = feeds.recv().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    while sub.has_changed() {
        sub.changed().await;
    }

    let mut changed = tokio_test::task::spawn(sub.changed());
    tokio_test::assert_pending!(changed.poll());

    send(&feed, r#"{"message":"not json"#);
    tokio::time::sleep(Duration::from_millis(10)).await;
    tokio_test::assert_pending!(changed.poll());

    send(&feed, HEARTBEAT);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(changed.is_woken());
    assert!(tokio_test::assert_ready!(changed.poll()));
}
