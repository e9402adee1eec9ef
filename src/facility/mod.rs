//! # Queue Facility Boundary
//!
//! The persistent FIFO underneath the bridge is an external collaborator. It
//! owns durability, capacity, and the maximum payload size; this crate only
//! talks to it through the [`QueueFacility`] trait and surfaces its numeric
//! error codes unchanged to producers.
//!
//! Two implementations ship here:
//!
//! - [`MemoryFacility`] - bounded in-process FIFO for development and tests
//! - [`PgmqFacility`] - durable facility backed by PostgreSQL pgmq

pub mod memory;
pub mod pgmq;

pub use self::memory::MemoryFacility;
pub use self::pgmq::PgmqFacility;

use crate::bridge::QueueEnvelope;

/// Facility reported the queue is at capacity.
pub const CODE_CAPACITY: i32 = 11;
/// Payload exceeds the facility's maximum envelope size.
pub const CODE_PAYLOAD_TOO_LARGE: i32 = 22;
/// Facility is missing or unreachable.
pub const CODE_UNAVAILABLE: i32 = 500;

/// Error from the underlying queue facility, carrying the facility's own
/// numeric code so ingress can report it to the producing client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("queue facility error (code {code}): {message}")]
pub struct FacilityError {
    pub code: i32,
    pub message: String,
}

impl FacilityError {
    pub fn capacity(message: impl Into<String>) -> Self {
        Self {
            code: CODE_CAPACITY,
            message: message.into(),
        }
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self {
            code: CODE_PAYLOAD_TOO_LARGE,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            code: CODE_UNAVAILABLE,
            message: message.into(),
        }
    }
}

/// Boundary to the external persistent FIFO.
///
/// Envelopes sharing a tag are delivered in FIFO order; each envelope is
/// handed to exactly one receiving call. The facility provides its own
/// cross-process mutual exclusion; implementations perform no buffering of
/// their own.
#[async_trait::async_trait]
pub trait QueueFacility: Send + Sync {
    /// Enqueue one envelope. Blocks the caller until the facility accepts or
    /// rejects it; rejection carries the facility's numeric code.
    async fn send(&self, envelope: &QueueEnvelope) -> Result<(), FacilityError>;

    /// Dequeue the oldest envelope carrying `tag`, or `None` immediately if
    /// nothing is available. Never waits for an envelope to arrive.
    async fn try_receive(&self, tag: u32) -> Result<Option<QueueEnvelope>, FacilityError>;
}
