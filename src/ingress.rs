//! # Ingress Handler
//!
//! TCP line-protocol server that admits tasks into the queue.
//!
//! One task per line, UTF-8 JSON; every line gets one synchronous JSON reply
//! on the same connection. A `{"code":0,"msg":"success"}` reply means the
//! task was *accepted* into the queue, never that it completed - execution is
//! asynchronous and unobserved by the producer, which decouples caller
//! latency from handler runtime.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::bridge::QueueBridge;
use crate::codec::Task;

/// Reply code for a rejected line (decode failure).
pub const REJECT_CODE: i64 = 500;

/// Synchronous per-line reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressReply {
    pub code: i64,
    pub msg: String,
}

impl IngressReply {
    pub fn success() -> Self {
        Self {
            code: 0,
            msg: "success".to_string(),
        }
    }

    pub fn fail(code: i64) -> Self {
        Self {
            code,
            msg: "fail".to_string(),
        }
    }
}

/// Ingress server errors.
#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    #[error("Server is already running")]
    ServerAlreadyRunning,

    #[error("Failed to bind to address {address}: {error}")]
    BindFailed { address: String, error: String },
}

/// Server statistics.
#[derive(Debug, Clone)]
pub struct IngressStats {
    pub running: bool,
    pub uptime_seconds: u64,
    pub total_connections: u64,
    pub active_connections: usize,
    pub accepted_tasks: u64,
    pub rejected_tasks: u64,
}

/// Connection state information.
#[derive(Debug)]
struct ConnectionState {
    peer_address: SocketAddr,
    connected_at: chrono::DateTime<chrono::Utc>,
}

/// Server state information.
#[derive(Debug)]
struct ServerState {
    running: bool,
    start_time: Option<chrono::DateTime<chrono::Utc>>,
    local_addr: Option<SocketAddr>,
    total_connections: u64,
    accepted_tasks: u64,
    rejected_tasks: u64,
}

/// TCP ingress accepting task lines and pushing them onto the bridge.
pub struct IngressServer {
    listen_address: String,
    bridge: QueueBridge,
    connections: Arc<RwLock<HashMap<String, ConnectionState>>>,
    shutdown_tx: broadcast::Sender<()>,
    server_state: Arc<RwLock<ServerState>>,
}

impl IngressServer {
    pub fn new(listen_address: impl Into<String>, bridge: QueueBridge) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            listen_address: listen_address.into(),
            bridge,
            connections: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
            server_state: Arc::new(RwLock::new(ServerState {
                running: false,
                start_time: None,
                local_addr: None,
                total_connections: 0,
                accepted_tasks: 0,
                rejected_tasks: 0,
            })),
        }
    }

    /// Bind the listener and begin accepting connections.
    pub async fn start(&self) -> Result<(), IngressError> {
        let mut state = self.server_state.write().await;
        if state.running {
            return Err(IngressError::ServerAlreadyRunning);
        }

        info!("Starting ingress server on {}", self.listen_address);

        let listener = TcpListener::bind(&self.listen_address)
            .await
            .map_err(|e| IngressError::BindFailed {
                address: self.listen_address.clone(),
                error: e.to_string(),
            })?;

        state.running = true;
        state.start_time = Some(chrono::Utc::now());
        state.local_addr = listener.local_addr().ok();
        drop(state);

        info!("Ingress server listening on {}", self.listen_address);

        let server = Arc::new(self.clone());
        tokio::spawn(async move {
            server.accept_connections(listener).await;
        });

        Ok(())
    }

    /// Stop the server gracefully.
    pub async fn stop(&self) -> Result<(), IngressError> {
        let mut state = self.server_state.write().await;
        if !state.running {
            return Ok(());
        }

        info!("Stopping ingress server");
        let _ = self.shutdown_tx.send(());
        state.running = false;
        info!("Ingress server stopped");

        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.server_state.read().await.running
    }

    /// Address the listener actually bound to. Useful when the configured
    /// port is 0.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server_state.read().await.local_addr
    }

    pub async fn get_stats(&self) -> IngressStats {
        let state = self.server_state.read().await;
        let connections = self.connections.read().await;

        IngressStats {
            running: state.running,
            uptime_seconds: state
                .start_time
                .map(|start| (chrono::Utc::now() - start).num_seconds() as u64)
                .unwrap_or(0),
            total_connections: state.total_connections,
            active_connections: connections.len(),
            accepted_tasks: state.accepted_tasks,
            rejected_tasks: state.rejected_tasks,
        }
    }

    /// Connection acceptance loop.
    async fn accept_connections(&self, listener: TcpListener) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let connection_id = uuid::Uuid::new_v4().to_string();
                            debug!("New connection: {} from {}", connection_id, addr);

                            {
                                let mut state = self.server_state.write().await;
                                state.total_connections += 1;
                            }

                            let server = self.clone();
                            tokio::spawn(async move {
                                server.handle_connection(connection_id, stream, addr).await;
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Connection acceptance loop shutting down");
                    break;
                }
            }
        }
    }

    /// Handle one producer connection: read lines, reply per line.
    async fn handle_connection(&self, connection_id: String, stream: TcpStream, addr: SocketAddr) {
        {
            let mut connections = self.connections.write().await;
            connections.insert(
                connection_id.clone(),
                ConnectionState {
                    peer_address: addr,
                    connected_at: chrono::Utc::now(),
                },
            );
        }

        let (reader, mut writer) = stream.into_split();
        let mut buf_reader = BufReader::new(reader);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let mut line = String::new();
        loop {
            tokio::select! {
                read_result = buf_reader.read_line(&mut line) => {
                    match read_result {
                        Ok(0) => {
                            debug!("Connection {} closed by client", connection_id);
                            break;
                        }
                        Ok(_) => {
                            let reply = self.process_line(line.trim()).await;
                            let mut reply_line = reply_json(&reply);
                            reply_line.push('\n');
                            if let Err(e) = writer.write_all(reply_line.as_bytes()).await {
                                error!("Failed to send reply on connection {}: {}", connection_id, e);
                                break;
                            }
                            line.clear();
                        }
                        Err(e) => {
                            error!("Error reading from connection {}: {}", connection_id, e);
                            break;
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    debug!("Connection {} shutting down", connection_id);
                    break;
                }
            }
        }

        {
            let mut connections = self.connections.write().await;
            if let Some(conn) = connections.remove(&connection_id) {
                debug!(
                    "Connection {} from {} closed after {}s",
                    connection_id,
                    conn.peer_address,
                    (chrono::Utc::now() - conn.connected_at).num_seconds()
                );
            }
        }
    }

    /// Admit one line: decode, canonically re-encode, push.
    ///
    /// A decode failure is rejected with code 500 and nothing is enqueued; a
    /// push failure is rejected with the facility's own code. A success reply
    /// acknowledges acceptance only.
    pub async fn process_line(&self, line: &str) -> IngressReply {
        let task = match Task::decode(line.as_bytes()) {
            Ok(task) => task,
            Err(e) => {
                warn!(error = %e, "Rejecting undecodable task line");
                self.server_state.write().await.rejected_tasks += 1;
                return IngressReply::fail(REJECT_CODE);
            }
        };

        match self.bridge.push(&task.encode()).await {
            Ok(()) => {
                debug!(target = %task.target, method = %task.method, "Task accepted");
                self.server_state.write().await.accepted_tasks += 1;
                IngressReply::success()
            }
            Err(e) => {
                warn!(
                    target = %task.target,
                    method = %task.method,
                    code = e.code,
                    error = %e,
                    "Task rejected by queue facility"
                );
                self.server_state.write().await.rejected_tasks += 1;
                IngressReply::fail(i64::from(e.code))
            }
        }
    }
}

/// Serialize a reply. `IngressReply` always serializes cleanly; fall back to
/// a literal failure object so the producer never waits on a missing reply.
fn reply_json(reply: &IngressReply) -> String {
    serde_json::to_string(reply)
        .unwrap_or_else(|_| format!(r#"{{"code":{REJECT_CODE},"msg":"fail"}}"#))
}

// Clone implementation to support Arc usage in spawned loops
impl Clone for IngressServer {
    fn clone(&self) -> Self {
        Self {
            listen_address: self.listen_address.clone(),
            bridge: self.bridge.clone(),
            connections: self.connections.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
            server_state: self.server_state.clone(),
        }
    }
}
