//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use taskbridge::{HandlerError, TaskHandler};

/// Handler that records every invocation it receives.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl TaskHandler for RecordingHandler {
    async fn invoke(&self, method: &str, args: &[Value]) -> Result<(), HandlerError> {
        self.calls.lock().push((method.to_string(), args.to_vec()));
        Ok(())
    }
}

/// Handler whose every invocation fails.
pub struct FailingHandler;

#[async_trait::async_trait]
impl TaskHandler for FailingHandler {
    async fn invoke(&self, _method: &str, _args: &[Value]) -> Result<(), HandlerError> {
        Err(HandlerError::Failed("simulated handler failure".to_string()))
    }
}

/// Handler whose every invocation panics.
pub struct PanickingHandler;

#[async_trait::async_trait]
impl TaskHandler for PanickingHandler {
    async fn invoke(&self, _method: &str, _args: &[Value]) -> Result<(), HandlerError> {
        panic!("simulated handler panic");
    }
}
