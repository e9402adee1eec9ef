//! Bridge Server Binary
//!
//! Standalone binary wiring the TCP ingress, the queue facility, and the
//! consumer worker pool together. Handlers are registered here before the
//! pool starts; the `Mail` handler below is a placeholder for real
//! application handlers.

use std::sync::Arc;

use serde_json::Value;
use tokio::signal;
use tracing::info;

use taskbridge::{
    BridgeConfig, ConsumerPool, ConsumerPoolConfig, DispatchRegistry, HandlerError, IngressServer,
    MemoryFacility, PgmqFacility, QueueBridge, QueueFacility, TaskHandler,
};

/// Example handler: logs outbound mail instead of sending it.
struct MailHandler;

#[async_trait::async_trait]
impl TaskHandler for MailHandler {
    async fn invoke(&self, method: &str, args: &[Value]) -> Result<(), HandlerError> {
        match method {
            "send" => {
                info!(args = %serde_json::Value::Array(args.to_vec()), "mail send requested");
                Ok(())
            }
            other => Err(HandlerError::UnknownMethod(other.to_string())),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    taskbridge::logging::init_structured_logging();

    let config = BridgeConfig::from_env()?;
    info!(
        listen_address = %config.listen_address,
        queue_id = config.queue_id,
        worker_count = config.worker_count,
        tick_interval_ms = config.tick_interval_ms,
        durable = config.database_url.is_some(),
        "starting taskbridge server"
    );

    let facility: Arc<dyn QueueFacility> = match &config.database_url {
        Some(url) => Arc::new(PgmqFacility::new(url, &config.queue_name()).await?),
        None => Arc::new(MemoryFacility::new(
            config.queue_capacity,
            config.max_payload_bytes,
        )),
    };

    let registry = DispatchRegistry::new();
    registry.register("Mail", Arc::new(MailHandler));
    info!(handlers = registry.stats().total_handlers, "handlers registered");

    let ingress = IngressServer::new(
        config.listen_address.clone(),
        QueueBridge::new(facility.clone(), config.envelope_tag),
    );
    ingress.start().await?;

    let pool = ConsumerPool::new(
        facility,
        config.envelope_tag,
        registry,
        ConsumerPoolConfig {
            worker_count: config.worker_count,
            tick_interval_ms: config.tick_interval_ms,
        },
    );
    pool.start();

    info!("taskbridge ready to accept producers");

    signal::ctrl_c().await?;
    info!("shutdown signal received");

    ingress.stop().await?;
    pool.shutdown().await;

    let stats = pool.stats();
    info!(
        tasks_processed = stats.tasks_processed,
        decode_failures = stats.decode_failures,
        dispatch_failures = stats.dispatch_failures,
        "taskbridge stopped"
    );

    Ok(())
}
