//! In-process queue facility for development and tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::bridge::QueueEnvelope;
use crate::facility::{FacilityError, QueueFacility};

/// Default number of envelopes the facility holds before rejecting sends.
pub const DEFAULT_CAPACITY: usize = 1024;
/// Default maximum payload size in bytes.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 65535;

/// Bounded in-process FIFO.
///
/// Envelopes of every tag share one store, the way a single kernel queue is
/// shared by message types: `try_receive` removes the oldest envelope whose
/// tag matches, leaving other tags untouched. Durability is process-lifetime
/// only, which is why this facility is for development and tests.
#[derive(Clone)]
pub struct MemoryFacility {
    envelopes: Arc<Mutex<VecDeque<QueueEnvelope>>>,
    capacity: usize,
    max_payload_bytes: usize,
}

impl MemoryFacility {
    pub fn new(capacity: usize, max_payload_bytes: usize) -> Self {
        Self {
            envelopes: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
            max_payload_bytes,
        }
    }

    /// Number of envelopes currently queued, across all tags.
    pub fn len(&self) -> usize {
        self.envelopes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.lock().is_empty()
    }
}

impl Default for MemoryFacility {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

#[async_trait::async_trait]
impl QueueFacility for MemoryFacility {
    async fn send(&self, envelope: &QueueEnvelope) -> Result<(), FacilityError> {
        if envelope.payload.len() > self.max_payload_bytes {
            return Err(FacilityError::payload_too_large(format!(
                "payload of {} bytes exceeds maximum of {}",
                envelope.payload.len(),
                self.max_payload_bytes
            )));
        }

        let mut envelopes = self.envelopes.lock();
        if envelopes.len() >= self.capacity {
            return Err(FacilityError::capacity(format!(
                "queue full ({} envelopes)",
                self.capacity
            )));
        }

        envelopes.push_back(envelope.clone());
        debug!(
            tag = envelope.tag,
            depth = envelopes.len(),
            "envelope enqueued"
        );
        Ok(())
    }

    async fn try_receive(&self, tag: u32) -> Result<Option<QueueEnvelope>, FacilityError> {
        let mut envelopes = self.envelopes.lock();
        let position = envelopes.iter().position(|e| e.tag == tag);
        Ok(position.and_then(|i| envelopes.remove(i)))
    }
}
