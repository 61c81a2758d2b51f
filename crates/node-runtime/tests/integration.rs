//! End-to-end tests that start a real supervisor (real TCP sockets, real broker and
//! responder tasks) and drive it as an external client would.

use node_runtime::{MetricRegistry, NodeConfig, NodeState, SampleSource, Supervisor};
use ring_store::PrimaryRing;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend};

struct NoopSource;
impl SampleSource for NoopSource {
    async fn connect(&mut self, _name: &str) -> bool {
        true
    }
    async fn pull_sample(&mut self) -> (Vec<f64>, Option<f64>) {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        (vec![0.0], None)
    }
}

fn free_port() -> u16 {
    static NEXT: AtomicUsize = AtomicUsize::new(17000);
    NEXT.fetch_add(1, Ordering::Relaxed) as u16
}

async fn start_node(n_workers: usize) -> (Supervisor, String) {
    let frontend_port = free_port();
    let backend_port = free_port();

    let mut raw = HashMap::new();
    raw.insert("nodename".into(), "eeg01".into());
    raw.insert("ip".into(), "127.0.0.1".into());
    raw.insert("n_channels".into(), "1".into());
    raw.insert("channel_names".into(), "x".into());
    raw.insert("sampling_rate".into(), "1".into());
    raw.insert("buffer_size_s".into(), "4".into());
    raw.insert("n_workers".into(), n_workers.to_string());
    raw.insert("port_frontend".into(), frontend_port.to_string());
    raw.insert("port_backend".into(), backend_port.to_string());
    let config = NodeConfig::from_map(&raw).unwrap();

    let primary = Arc::new(PrimaryRing::new(1, 4, 1.0).unwrap());
    primary.append(&[42.0], Some(1.0)).unwrap();

    let state = Arc::new(NodeState {
        config,
        primary: Some(primary),
        secondary: None,
        metrics: MetricRegistry::new(),
        topics: HashMap::new(),
    });

    let mut supervisor = Supervisor::new(Duration::from_millis(200));
    supervisor
        .start::<NoopSource>(state, None, "255.255.255.255:19999".to_string(), Vec::new())
        .await
        .unwrap();

    (supervisor, format!("tcp://127.0.0.1:{frontend_port}"))
}

async fn request(frontend_url: &str, body: &serde_json::Value) -> serde_json::Value {
    let mut socket = ReqSocket::new();
    socket.connect(frontend_url).await.unwrap();
    socket.send(serde_json::to_vec(body).unwrap().into()).await.unwrap();
    let reply = socket.recv().await.unwrap();
    serde_json::from_slice(&reply.into_vec()[0]).unwrap()
}

#[tokio::test]
async fn command_request_round_trips_through_broker_and_responder() {
    let (mut supervisor, frontend_url) = start_node(1).await;

    let reply = request(&frontend_url, &serde_json::json!({"type": "command", "command": "get_nodeinfo"})).await;
    assert_eq!(reply["name"], serde_json::json!("eeg01"));

    supervisor.stop().await;
}

#[tokio::test]
async fn data_request_returns_buffered_samples() {
    let (mut supervisor, frontend_url) = start_node(1).await;

    let reply = request(
        &frontend_url,
        &serde_json::json!({"type": "data", "parameters": ["x"], "timewindow": [0.0, 2.0]}),
    )
    .await;
    assert_eq!(reply["x"]["data"], serde_json::json!([42.0]));

    supervisor.stop().await;
}

#[tokio::test]
async fn unrecognized_request_gets_the_standard_error_object() {
    let (mut supervisor, frontend_url) = start_node(1).await;

    let reply = request(&frontend_url, &serde_json::json!({"type": "bogus"})).await;
    assert_eq!(reply, serde_json::json!({"error": "not recognized"}));

    supervisor.stop().await;
}

#[tokio::test]
async fn graceful_shutdown_joins_every_worker() {
    let (mut supervisor, _frontend_url) = start_node(2).await;
    supervisor.stop().await;
    assert!(!supervisor.is_running());
    // A second stop is a no-op rather than a hang or panic.
    supervisor.stop().await;
}

/// S6: with several responders behind the broker, concurrent requests are served
/// without ever losing a request or starving a responder permanently.
#[tokio::test]
async fn broker_distributes_concurrent_requests_across_all_responders() {
    let (mut supervisor, frontend_url) = start_node(3).await;

    let mut tasks = Vec::new();
    for _ in 0..9 {
        let url = frontend_url.clone();
        tasks.push(tokio::spawn(async move {
            request(&url, &serde_json::json!({"type": "command", "command": "get_nodeinfo"})).await
        }));
    }

    for task in tasks {
        let reply = task.await.unwrap();
        assert_eq!(reply["name"], serde_json::json!("eeg01"));
    }

    supervisor.stop().await;
}
