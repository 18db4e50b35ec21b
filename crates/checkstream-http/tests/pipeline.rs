//! End-to-end tests: mock Icinga API → supervisor → in-memory sink.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::oneshot;

use checkstream_core::policy::RetryConfig;
use checkstream_core::{
    BridgeError, EventSource, MemorySink, StreamSupervisor, SupervisorConfig, SupervisorState,
};
use checkstream_http::{IcingaEnricher, IcingaEventSource};
use common::{tags_body, MockIcinga, StreamReply};

// ─── Helpers ──────────────────────────────────────────────────────────────────

const H1_S1: &str = concat!(
    r#"{"type":"CheckResult","host":"h1","service":"s1","timestamp":1000.25,"#,
    r#""check_result":{"state":2.0,"output":"disk full"}}"#,
    "\n"
);

const H1_S1_RECOVERED: &str = concat!(
    r#"{"type":"StateChange","host":"h1","service":"s1","timestamp":1060.0,"#,
    r#""state":0,"check_result":{"state":0.0,"output":"disk ok"}}"#,
    "\n"
);

struct Running {
    supervisor: Arc<StreamSupervisor>,
    sink: MemorySink,
    shutdown: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<Result<(), BridgeError>>,
}

fn fast_retry() -> SupervisorConfig {
    SupervisorConfig {
        retry: RetryConfig {
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            jitter_fraction: 0.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn run(mock: &MockIcinga) -> Running {
    let config = mock.config();
    let source = IcingaEventSource::new(config.clone()).unwrap();
    let enricher = IcingaEnricher::new(config).unwrap();
    let sink = MemorySink::new();
    let supervisor = Arc::new(StreamSupervisor::new(
        fast_retry(),
        Arc::new(source),
        Arc::new(enricher),
        Arc::new(sink.clone()),
    ));

    let (shutdown, rx) = oneshot::channel();
    let sup = supervisor.clone();
    let handle = tokio::spawn(async move {
        sup.run(async {
            let _ = rx.await;
        })
        .await
    });
    Running {
        supervisor,
        sink,
        shutdown,
        handle,
    }
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Value of header `name` in a raw request head. Names compare
/// case-insensitively, values are returned untouched.
fn header(head: &str, name: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

async fn stop(running: Running) -> Arc<StreamSupervisor> {
    running.shutdown.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), running.handle)
        .await
        .expect("supervisor did not stop")
        .unwrap()
        .unwrap();
    running.supervisor
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn check_result_becomes_flapjack_event() {
    let mock = MockIcinga::start(vec![StreamReply::Hold(H1_S1.into())]).await;
    mock.lookup("/v1/objects/services/h1!s1", 200, &tags_body(&["prod"]));

    let running = run(&mock);
    let sink = running.sink.clone();
    wait_until("dispatch", || sink.len() == 1).await;

    assert_eq!(
        serde_json::to_value(&sink.events()[0]).unwrap(),
        json!({
            "entity": "h1",
            "check": "s1",
            "type": "service",
            "time": 1000,
            "state": "critical",
            "summary": "disk full",
            "details": "tags: [prod]",
            "tags": ["prod"]
        })
    );

    let supervisor = stop(running).await;
    assert_eq!(supervisor.state(), SupervisorState::Cancelled);
    assert!(sink.is_closed());
}

#[tokio::test]
async fn subscription_request_shape() {
    let mock = MockIcinga::start(vec![]).await;
    let running = run(&mock);
    wait_until("stream request", || mock.stream_requests() == 1).await;

    let head = &mock.heads()[0];
    assert!(
        head.starts_with("POST /v1/events?queue=flapjack&types=CheckResult&types=StateChange HTTP/1.1"),
        "{head}"
    );
    // base64("root:icinga")
    assert_eq!(header(head, "authorization").as_deref(), Some("Basic cm9vdDppY2luZ2E="));
    assert_eq!(header(head, "accept").as_deref(), Some("application/json"));

    stop(running).await;
}

#[tokio::test]
async fn reconnects_after_peer_close() {
    let mock = MockIcinga::start(vec![
        StreamReply::Close(H1_S1.into()),
        StreamReply::Hold(H1_S1_RECOVERED.into()),
    ])
    .await;
    mock.lookup("/v1/objects/services/h1!s1", 200, &tags_body(&["prod", "db"]));

    let running = run(&mock);
    let sink = running.sink.clone();
    wait_until("both events", || sink.len() == 2).await;

    let events = sink.events();
    assert_eq!(events[0].summary, "disk full");
    assert_eq!(events[1].summary, "disk ok");
    assert_eq!(events[1].details, "tags: [prod db]");
    assert_eq!(mock.stream_requests(), 2);

    let supervisor = stop(running).await;
    assert!(supervisor.metrics().reconnects >= 1);
}

#[tokio::test]
async fn server_error_is_retried() {
    let mock = MockIcinga::start(vec![
        StreamReply::Status(503, "try later".into()),
        StreamReply::Hold(H1_S1.into()),
    ])
    .await;
    mock.lookup("/v1/objects/services/h1!s1", 200, &tags_body(&[]));

    let running = run(&mock);
    let sink = running.sink.clone();
    wait_until("dispatch", || sink.len() == 1).await;
    assert_eq!(sink.events()[0].details, "tags: []");
    assert_eq!(mock.stream_requests(), 2);

    stop(running).await;
}

#[tokio::test]
async fn cancel_while_blocked_in_read() {
    let mock = MockIcinga::start(vec![StreamReply::Hold(String::new())]).await;
    let running = run(&mock);

    let mut state = running.supervisor.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == SupervisorState::Streaming),
    )
    .await
    .unwrap()
    .unwrap();

    let sink = running.sink.clone();
    let supervisor = stop(running).await;
    assert_eq!(supervisor.state(), SupervisorState::Cancelled);
    assert!(sink.is_empty());
    assert!(sink.is_closed());
}

#[tokio::test]
async fn unauthorized_is_fatal() {
    let mock = MockIcinga::start(vec![StreamReply::Status(
        401,
        r#"{"error":401,"status":"Unauthorized. Please check your user credentials."}"#.into(),
    )])
    .await;
    let running = run(&mock);

    let result = tokio::time::timeout(Duration::from_secs(5), running.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(BridgeError::HttpStatus { status: 401, .. })));
    assert_eq!(running.supervisor.state(), SupervisorState::Fatal);
    assert_eq!(mock.stream_requests(), 1);
}

#[tokio::test]
async fn forbidden_lookup_is_fatal() {
    let mock = MockIcinga::start(vec![
        StreamReply::Close(H1_S1.into()),
        StreamReply::Close(H1_S1.into()),
    ])
    .await;
    mock.lookup(
        "/v1/objects/services/h1!s1",
        403,
        r#"{"error":403,"status":"No permission to access object."}"#,
    );
    let running = run(&mock);

    let result = tokio::time::timeout(Duration::from_secs(5), running.handle)
        .await
        .expect("supervisor kept reconnecting")
        .unwrap();
    assert!(
        matches!(result, Err(BridgeError::Lookup { status: Some(403), .. })),
        "{result:?}"
    );
    assert_eq!(running.supervisor.state(), SupervisorState::Fatal);
    assert_eq!(mock.stream_requests(), 1);
    assert!(running.sink.is_empty());
    assert!(running.sink.is_closed());
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = IcingaEventSource::new(checkstream_http::IcingaConfig {
        server: addr.to_string(),
        scheme: checkstream_http::Scheme::Http,
        connect_timeout: Duration::from_secs(1),
        ..Default::default()
    })
    .unwrap();

    match source.open().await {
        Err(err @ BridgeError::Connect { .. }) => assert!(err.is_retryable()),
        Err(other) => panic!("expected connect error, got {other}"),
        Ok(_) => panic!("connected to a closed port"),
    }
}
