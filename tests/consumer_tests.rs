//! Consumer pool behavior: draining, ordering, and per-task failure
//! isolation.

mod common;

use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration, Instant};

use common::{FailingHandler, PanickingHandler, RecordingHandler};
use taskbridge::{
    ConsumerPool, ConsumerPoolConfig, ConsumerStatsSnapshot, DispatchRegistry, IngressServer,
    MemoryFacility, QueueBridge, QueueEnvelope, QueueFacility, Task, DEFAULT_ENVELOPE_TAG,
};

const FAST_TICK: ConsumerPoolConfig = ConsumerPoolConfig {
    worker_count: 1,
    tick_interval_ms: 20,
};

/// Poll pool stats until `done` says we are finished or the deadline passes.
async fn wait_until(pool: &ConsumerPool, done: impl Fn(&ConsumerStatsSnapshot) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        let stats = pool.stats();
        if done(&stats) {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "pool did not reach expected state in time: {stats:?}"
        );
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_single_consumer_preserves_push_order() {
    let facility = Arc::new(MemoryFacility::default());
    let handler = RecordingHandler::new();
    let registry = DispatchRegistry::new();
    registry.register("Rec", Arc::new(handler.clone()));

    let bridge = QueueBridge::new(facility.clone(), DEFAULT_ENVELOPE_TAG);
    for i in 0..8 {
        bridge
            .push(&Task::new("Rec", "run", vec![json!(i)]).encode())
            .await
            .unwrap();
    }

    let pool = ConsumerPool::new(facility, DEFAULT_ENVELOPE_TAG, registry, FAST_TICK);
    pool.start();
    wait_until(&pool, |s| s.tasks_processed == 8).await;
    pool.shutdown().await;

    let calls = handler.calls();
    let received: Vec<i64> = calls
        .iter()
        .map(|(_, args)| args[0].as_i64().unwrap())
        .collect();
    assert_eq!(received, (0..8).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_failures_are_isolated_within_one_tick() {
    let facility = Arc::new(MemoryFacility::default());
    let handler = RecordingHandler::new();
    let registry = DispatchRegistry::new();
    registry.register("Rec", Arc::new(handler.clone()));
    registry.register("Bad", Arc::new(FailingHandler));
    registry.register("Worse", Arc::new(PanickingHandler));

    // A corrupted payload, an unknown target, a failing handler, a panicking
    // handler, and finally a good task - all queued before the first tick.
    facility
        .send(&QueueEnvelope {
            tag: DEFAULT_ENVELOPE_TAG,
            payload: b"garbage bytes".to_vec(),
        })
        .await
        .unwrap();

    let bridge = QueueBridge::new(facility.clone(), DEFAULT_ENVELOPE_TAG);
    bridge
        .push(&Task::new("Ghost", "run", vec![]).encode())
        .await
        .unwrap();
    bridge
        .push(&Task::new("Bad", "run", vec![]).encode())
        .await
        .unwrap();
    bridge
        .push(&Task::new("Worse", "run", vec![]).encode())
        .await
        .unwrap();
    bridge
        .push(&Task::new("Rec", "run", vec![json!("survivor")]).encode())
        .await
        .unwrap();

    let pool = ConsumerPool::new(
        facility.clone(),
        DEFAULT_ENVELOPE_TAG,
        registry,
        FAST_TICK,
    );
    pool.start();
    wait_until(&pool, |s| s.tasks_processed == 1).await;

    let stats = pool.stats();
    assert_eq!(stats.decode_failures, 1);
    assert_eq!(stats.dispatch_failures, 3);
    assert!(facility.is_empty());

    // The worker is still alive and keeps draining new work.
    bridge
        .push(&Task::new("Rec", "run", vec![json!("after")]).encode())
        .await
        .unwrap();
    wait_until(&pool, |s| s.tasks_processed == 2).await;
    pool.shutdown().await;

    let calls = handler.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, vec![json!("survivor")]);
    assert_eq!(calls[1].1, vec![json!("after")]);
}

#[tokio::test]
async fn test_each_envelope_is_delivered_to_exactly_one_worker() {
    let facility = Arc::new(MemoryFacility::default());
    let handler = RecordingHandler::new();
    let registry = DispatchRegistry::new();
    registry.register("Rec", Arc::new(handler.clone()));

    let bridge = QueueBridge::new(facility.clone(), DEFAULT_ENVELOPE_TAG);
    for i in 0..30 {
        bridge
            .push(&Task::new("Rec", "run", vec![json!(i)]).encode())
            .await
            .unwrap();
    }

    let pool = ConsumerPool::new(
        facility,
        DEFAULT_ENVELOPE_TAG,
        registry,
        ConsumerPoolConfig {
            worker_count: 4,
            tick_interval_ms: 20,
        },
    );
    pool.start();
    wait_until(&pool, |s| s.tasks_processed == 30).await;
    pool.shutdown().await;

    // No duplicates across workers.
    let mut received: Vec<i64> = handler
        .calls()
        .iter()
        .map(|(_, args)| args[0].as_i64().unwrap())
        .collect();
    received.sort_unstable();
    assert_eq!(received, (0..30).collect::<Vec<i64>>());
}

/// End-to-end: a producer submits over TCP, gets a synchronous accept, and a
/// consumer later resolves the target and invokes the method.
#[tokio::test]
async fn test_mail_send_end_to_end() {
    let facility = Arc::new(MemoryFacility::default());
    let handler = RecordingHandler::new();
    let registry = DispatchRegistry::new();
    registry.register("Mail", Arc::new(handler.clone()));

    let server = IngressServer::new(
        "127.0.0.1:0",
        QueueBridge::new(facility.clone(), DEFAULT_ENVELOPE_TAG),
    );
    server.start().await.unwrap();

    let pool = ConsumerPool::new(facility, DEFAULT_ENVELOPE_TAG, registry, FAST_TICK);
    pool.start();

    let addr = server.local_addr().await.unwrap();
    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    writer
        .write_all(b"{\"target\":\"Mail\",\"method\":\"send\",\"args\":[\"a\",\"b\",\"hi\"]}\n")
        .await
        .unwrap();

    let mut reply = String::new();
    BufReader::new(reader).read_line(&mut reply).await.unwrap();
    assert_eq!(reply.trim(), r#"{"code":0,"msg":"success"}"#);

    wait_until(&pool, |s| s.tasks_processed == 1).await;
    pool.shutdown().await;
    server.stop().await.unwrap();

    let calls = handler.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "send");
    assert_eq!(calls[0].1, vec![json!("a"), json!("b"), json!("hi")]);
}
