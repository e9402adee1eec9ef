//! Ingress server behavior over real TCP connections.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use taskbridge::{
    IngressServer, MemoryFacility, QueueBridge, QueueFacility, Task, DEFAULT_ENVELOPE_TAG,
};

async fn start_server(facility: Arc<MemoryFacility>) -> IngressServer {
    let server = IngressServer::new(
        "127.0.0.1:0",
        QueueBridge::new(facility, DEFAULT_ENVELOPE_TAG),
    );
    server.start().await.expect("failed to start ingress");
    server
}

/// Send one line and read back the one-line reply.
async fn send_line(server: &IngressServer, line: &str) -> String {
    let addr = server.local_addr().await.expect("server has no address");
    let stream = TcpStream::connect(addr).await.expect("connect failed");
    let (reader, mut writer) = stream.into_split();

    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();

    let mut buf_reader = BufReader::new(reader);
    let mut reply = String::new();
    buf_reader.read_line(&mut reply).await.unwrap();
    reply.trim().to_string()
}

#[tokio::test]
async fn test_valid_task_is_accepted_and_enqueued() {
    let facility = Arc::new(MemoryFacility::default());
    let server = start_server(facility.clone()).await;

    let reply = send_line(
        &server,
        r#"{"target":"Mail","method":"send","args":["a","b","hi"]}"#,
    )
    .await;
    assert_eq!(reply, r#"{"code":0,"msg":"success"}"#);

    let envelope = facility
        .try_receive(DEFAULT_ENVELOPE_TAG)
        .await
        .unwrap()
        .expect("nothing enqueued");
    let task = Task::decode(&envelope.payload).unwrap();
    assert_eq!(task.target, "Mail");
    assert_eq!(task.method, "send");
    assert_eq!(task.args.len(), 3);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_line_is_rejected_with_nothing_enqueued() {
    let facility = Arc::new(MemoryFacility::default());
    let server = start_server(facility.clone()).await;

    let reply = send_line(&server, "not json").await;
    assert_eq!(reply, r#"{"code":500,"msg":"fail"}"#);
    assert!(facility.is_empty());

    let stats = server.get_stats().await;
    assert_eq!(stats.rejected_tasks, 1);
    assert_eq!(stats.accepted_tasks, 0);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_full_queue_rejects_with_facility_code() {
    // Capacity of one, pre-filled, so the next push is rejected.
    let facility = Arc::new(MemoryFacility::new(1, 65535));
    let bridge = QueueBridge::new(facility.clone(), DEFAULT_ENVELOPE_TAG);
    bridge.push(b"occupier").await.unwrap();

    let server = start_server(facility.clone()).await;
    let reply = send_line(
        &server,
        r#"{"target":"Mail","method":"send","args":[]}"#,
    )
    .await;
    assert_eq!(reply, r#"{"code":11,"msg":"fail"}"#);
    assert_eq!(facility.len(), 1);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_one_connection_can_submit_many_tasks() {
    let facility = Arc::new(MemoryFacility::default());
    let server = start_server(facility.clone()).await;

    let addr = server.local_addr().await.unwrap();
    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);

    for i in 0..3 {
        let line = format!(r#"{{"target":"Mail","method":"send","args":[{i}]}}"#);
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();

        let mut reply = String::new();
        buf_reader.read_line(&mut reply).await.unwrap();
        assert_eq!(reply.trim(), r#"{"code":0,"msg":"success"}"#);
    }

    assert_eq!(facility.len(), 3);
    server.stop().await.unwrap();
}
