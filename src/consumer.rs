//! # Consumer Loop
//!
//! A fixed pool of workers drains the queue bridge and dispatches tasks.
//!
//! Each worker runs an Idle -> Draining -> Idle cycle: on every tick it pops
//! the bridge until empty, decoding and dispatching one task at a time. The
//! tick interval is decoupled from the task rate, so one tick may drain many
//! tasks or none. The isolation boundary around decode + dispatch is the core
//! correctness property here: a malformed payload or a failing handler is
//! logged and dropped, and the worker keeps draining.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use crate::bridge::QueueBridge;
use crate::codec::Task;
use crate::facility::QueueFacility;
use crate::registry::DispatchRegistry;

/// Pool configuration. Worker count is sized for slow, blocking handler work
/// rather than CPU count.
#[derive(Debug, Clone)]
pub struct ConsumerPoolConfig {
    pub worker_count: usize,
    pub tick_interval_ms: u64,
}

impl Default for ConsumerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 32,
            tick_interval_ms: 500,
        }
    }
}

/// Shared counters, updated by every worker in the pool.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    tasks_processed: AtomicU64,
    decode_failures: AtomicU64,
    dispatch_failures: AtomicU64,
}

/// Point-in-time view of [`ConsumerStats`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerStatsSnapshot {
    pub tasks_processed: u64,
    pub decode_failures: u64,
    pub dispatch_failures: u64,
}

impl ConsumerStats {
    fn snapshot(&self) -> ConsumerStatsSnapshot {
        ConsumerStatsSnapshot {
            tasks_processed: self.tasks_processed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
        }
    }
}

/// One polling worker. Owns its bridge handle for its whole lifetime.
pub struct ConsumerWorker {
    worker_id: usize,
    bridge: QueueBridge,
    registry: DispatchRegistry,
    tick_interval: Duration,
    stats: Arc<ConsumerStats>,
}

impl ConsumerWorker {
    pub fn new(
        worker_id: usize,
        bridge: QueueBridge,
        registry: DispatchRegistry,
        tick_interval: Duration,
        stats: Arc<ConsumerStats>,
    ) -> Self {
        Self {
            worker_id,
            bridge,
            registry,
            tick_interval,
            stats,
        }
    }

    /// Tick loop: sleep, drain, repeat until shutdown.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(worker_id = self.worker_id, "consumer worker started");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(worker_id = self.worker_id, "consumer worker shutting down");
                    break;
                }
                _ = sleep(self.tick_interval) => {
                    self.drain().await;
                }
            }
        }
    }

    /// Pop until the queue reports empty, dispatching one task at a time.
    ///
    /// Every per-task failure is terminal for that task only: logged,
    /// counted, and the loop continues.
    async fn drain(&self) {
        while let Some(payload) = self.bridge.try_pop().await {
            let task = match Task::decode(&payload) {
                Ok(task) => task,
                Err(e) => {
                    error!(
                        worker_id = self.worker_id,
                        error = %e,
                        payload_len = payload.len(),
                        "dropping undecodable payload from queue"
                    );
                    self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            match self.registry.dispatch(&task).await {
                Ok(()) => {
                    debug!(
                        worker_id = self.worker_id,
                        target = %task.target,
                        method = %task.method,
                        "task dispatched"
                    );
                    self.stats.tasks_processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    error!(
                        worker_id = self.worker_id,
                        target = %task.target,
                        method = %task.method,
                        error = %e,
                        "task dropped after dispatch failure"
                    );
                    self.stats.dispatch_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

/// Fixed-size pool of consumer workers.
///
/// Workers share no state beyond the facility itself and the stats counters;
/// each gets its own [`QueueBridge`] handle at spawn time. The queue is the
/// sole coordination point, so which worker receives a given task is
/// unspecified.
pub struct ConsumerPool {
    facility: Arc<dyn QueueFacility>,
    tag: u32,
    registry: DispatchRegistry,
    config: ConsumerPoolConfig,
    stats: Arc<ConsumerStats>,
    shutdown_tx: broadcast::Sender<()>,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl ConsumerPool {
    pub fn new(
        facility: Arc<dyn QueueFacility>,
        tag: u32,
        registry: DispatchRegistry,
        config: ConsumerPoolConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            facility,
            tag,
            registry,
            config,
            stats: Arc::new(ConsumerStats::default()),
            shutdown_tx,
            handles: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Spawn the configured number of workers.
    pub fn start(&self) {
        let tick_interval = Duration::from_millis(self.config.tick_interval_ms);
        let mut handles = self.handles.lock();

        for worker_id in 0..self.config.worker_count {
            let bridge = QueueBridge::new(self.facility.clone(), self.tag);
            let worker = ConsumerWorker::new(
                worker_id,
                bridge,
                self.registry.clone(),
                tick_interval,
                self.stats.clone(),
            );
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(worker.run(shutdown_rx)));
        }

        info!(
            worker_count = self.config.worker_count,
            tick_interval_ms = self.config.tick_interval_ms,
            "consumer pool started"
        );
    }

    /// Signal every worker and wait for them to finish their current tick.
    pub async fn shutdown(&self) {
        info!("consumer pool shutting down");
        let _ = self.shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
        info!("consumer pool stopped");
    }

    pub fn stats(&self) -> ConsumerStatsSnapshot {
        self.stats.snapshot()
    }
}
