#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # taskbridge
//!
//! A minimal message-queue bridge: a TCP line-protocol ingress accepts task
//! descriptions and hands them to a durable, bounded, host-local FIFO; a pool
//! of consumer workers drains that FIFO and dispatches each task to a named
//! handler.
//!
//! ## Architecture
//!
//! ```text
//! client -> IngressServer -> Task::encode -> QueueBridge::push
//!              -> [persistent FIFO]
//!              -> ConsumerWorker::try_pop -> Task::decode -> DispatchRegistry
//! ```
//!
//! Delivery is at-most-once with best-effort durability across worker
//! restarts. There are no topics, no acknowledgement protocol, no priorities
//! and no retries: the only backpressure signal is a push rejection surfaced
//! synchronously to the producing client, and every failure after a
//! successful enqueue is terminal for that one task.
//!
//! ## Module Organization
//!
//! - [`codec`] - task wire encoding and structural validation
//! - [`facility`] - boundary to the external persistent FIFO, plus the
//!   in-memory and pgmq implementations
//! - [`bridge`] - tagged envelope adapter over the facility
//! - [`ingress`] - TCP line-protocol admission server
//! - [`registry`] - string-keyed handler resolution and failure-isolated
//!   invocation
//! - [`consumer`] - tick-driven worker pool draining the bridge
//! - [`config`] - static process configuration
//! - [`error`] - crate-level error handling
//! - [`logging`] - structured logging initialization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskbridge::{
//!     BridgeConfig, ConsumerPool, ConsumerPoolConfig, DispatchRegistry, IngressServer,
//!     MemoryFacility, QueueBridge, QueueFacility,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BridgeConfig::default();
//! let facility: Arc<dyn QueueFacility> = Arc::new(MemoryFacility::default());
//!
//! let registry = DispatchRegistry::new();
//! // registry.register("Mail", Arc::new(MyMailHandler));
//!
//! let ingress = IngressServer::new(
//!     config.listen_address.clone(),
//!     QueueBridge::new(facility.clone(), config.envelope_tag),
//! );
//! ingress.start().await?;
//!
//! let pool = ConsumerPool::new(
//!     facility,
//!     config.envelope_tag,
//!     registry,
//!     ConsumerPoolConfig::default(),
//! );
//! pool.start();
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod error;
pub mod facility;
pub mod ingress;
pub mod logging;
pub mod registry;

pub use bridge::{EnqueueError, QueueBridge, QueueEnvelope, DEFAULT_ENVELOPE_TAG};
pub use codec::{DecodeError, Task};
pub use config::BridgeConfig;
pub use consumer::{ConsumerPool, ConsumerPoolConfig, ConsumerStatsSnapshot, ConsumerWorker};
pub use error::{BridgeError, Result};
pub use facility::{FacilityError, MemoryFacility, PgmqFacility, QueueFacility};
pub use ingress::{IngressReply, IngressServer, IngressStats};
pub use registry::{DispatchError, DispatchRegistry, HandlerError, RegistryStats, TaskHandler};
