use crate::error::{BridgeError, Result};

/// Static process configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address the ingress listener binds to.
    pub listen_address: String,
    /// Shared queue identifier, configured identically on producer and
    /// consumer processes.
    pub queue_id: u32,
    /// Constant type tag used for every envelope.
    pub envelope_tag: u32,
    /// Consumer pool size, sized for slow handler work.
    pub worker_count: usize,
    /// Consumer tick interval.
    pub tick_interval_ms: u64,
    /// Envelope capacity of the in-memory facility.
    pub queue_capacity: usize,
    /// Maximum payload size the in-memory facility accepts.
    pub max_payload_bytes: usize,
    /// When set, use the durable pgmq facility at this URL instead of the
    /// in-memory one.
    pub database_url: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:1236".to_string(),
            queue_id: 1236,
            envelope_tag: crate::bridge::DEFAULT_ENVELOPE_TAG,
            worker_count: 32,
            tick_interval_ms: 500,
            queue_capacity: crate::facility::memory::DEFAULT_CAPACITY,
            max_payload_bytes: crate::facility::memory::DEFAULT_MAX_PAYLOAD_BYTES,
            database_url: None,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(address) = std::env::var("TASKBRIDGE_LISTEN_ADDRESS") {
            config.listen_address = address;
        }

        if let Ok(queue_id) = std::env::var("TASKBRIDGE_QUEUE_ID") {
            config.queue_id = queue_id.parse().map_err(|e| {
                BridgeError::ConfigurationError(format!("Invalid queue_id: {e}"))
            })?;
        }

        if let Ok(workers) = std::env::var("TASKBRIDGE_WORKER_COUNT") {
            config.worker_count = workers.parse().map_err(|e| {
                BridgeError::ConfigurationError(format!("Invalid worker_count: {e}"))
            })?;
        }

        if let Ok(tick) = std::env::var("TASKBRIDGE_TICK_INTERVAL_MS") {
            config.tick_interval_ms = tick.parse().map_err(|e| {
                BridgeError::ConfigurationError(format!("Invalid tick_interval_ms: {e}"))
            })?;
        }

        if let Ok(capacity) = std::env::var("TASKBRIDGE_QUEUE_CAPACITY") {
            config.queue_capacity = capacity.parse().map_err(|e| {
                BridgeError::ConfigurationError(format!("Invalid queue_capacity: {e}"))
            })?;
        }

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = Some(db_url);
        }

        Ok(config)
    }

    /// Name of the pgmq queue backing this bridge.
    pub fn queue_name(&self) -> String {
        format!("taskbridge_{}", self.queue_id)
    }
}
