//! # Queue Bridge
//!
//! Thin adapter between the bridge's callers and the external persistent
//! FIFO. The bridge wraps payloads in a tagged [`QueueEnvelope`], pushes them
//! through the [`QueueFacility`](crate::facility::QueueFacility) boundary, and
//! pops them back out on the consumer side. It holds no buffer of its own:
//! capacity, durability, and ordering all belong to the facility.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::facility::{FacilityError, QueueFacility};

/// Tag shared by every envelope of one logical queue.
pub const DEFAULT_ENVELOPE_TAG: u32 = 1;

/// Opaque transport unit on the persistent FIFO: a type tag used to
/// distinguish logical queues sharing one facility, plus the raw encoded
/// task bytes. No task metadata beyond the tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEnvelope {
    pub tag: u32,
    pub payload: Vec<u8>,
}

/// Push rejection, carrying the facility's numeric error code for the
/// producing client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("enqueue failed (code {code}): {message}")]
pub struct EnqueueError {
    pub code: i32,
    pub message: String,
}

impl From<FacilityError> for EnqueueError {
    fn from(err: FacilityError) -> Self {
        Self {
            code: err.code,
            message: err.message,
        }
    }
}

/// Handle to one logical queue on the facility.
///
/// Each consumer worker owns its own bridge handle for its whole lifetime;
/// the handle is created once at startup and passed into the loop explicitly,
/// never reached through ambient state.
#[derive(Clone)]
pub struct QueueBridge {
    facility: Arc<dyn QueueFacility>,
    tag: u32,
}

impl QueueBridge {
    pub fn new(facility: Arc<dyn QueueFacility>, tag: u32) -> Self {
        Self { facility, tag }
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Enqueue a payload under this bridge's tag. Blocks until the facility
    /// accepts or rejects; a rejection surfaces the facility's code.
    pub async fn push(&self, payload: &[u8]) -> Result<(), EnqueueError> {
        let envelope = QueueEnvelope {
            tag: self.tag,
            payload: payload.to_vec(),
        };
        self.facility.send(&envelope).await?;
        Ok(())
    }

    /// Dequeue the next payload, or `None` immediately when the queue is
    /// empty. A facility that is temporarily unavailable is treated as an
    /// empty queue, not a fatal condition.
    pub async fn try_pop(&self) -> Option<Vec<u8>> {
        match self.facility.try_receive(self.tag).await {
            Ok(Some(envelope)) => Some(envelope.payload),
            Ok(None) => None,
            Err(e) => {
                warn!(
                    tag = self.tag,
                    code = e.code,
                    error = %e,
                    "queue facility unavailable on pop, treating as empty"
                );
                None
            }
        }
    }
}
