//! # Dispatch Registry
//!
//! Maps a task's target identifier to an invocable handler. Handlers are
//! registered by the embedding application at process start and resolved by
//! exact string match - no wildcard or prefix matching.
//!
//! Dispatch distinguishes three disjoint failure outcomes for diagnostics:
//! the target is not registered, the target exists but does not know the
//! method, or the method ran and failed (including a panic inside the
//! handler). None of them escalate beyond the one task being dispatched.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::Task;

/// Failure reported by a handler itself.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("{0}")]
    Failed(String),
}

/// Invocable capability a handler variant implements.
///
/// `invoke` receives the method name and the ordered argument list from the
/// task and reports [`HandlerError::UnknownMethod`] for operations it does
/// not implement.
#[async_trait::async_trait]
pub trait TaskHandler: Send + Sync {
    async fn invoke(&self, method: &str, args: &[Value]) -> Result<(), HandlerError>;
}

/// Dispatch failure, one of three disjoint outcomes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown target: {target}")]
    UnknownTarget { target: String },

    #[error("unknown method: {target}.{method}")]
    UnknownMethod { target: String, method: String },

    #[error("invocation of {target}.{method} failed: {cause}")]
    InvocationFailed {
        target: String,
        method: String,
        cause: String,
    },
}

/// Registry statistics.
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub total_handlers: usize,
    pub targets: Vec<String>,
}

/// String-keyed mapping from target identifier to handler implementation.
#[derive(Clone, Default)]
pub struct DispatchRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn TaskHandler>>>>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a target identifier. Registering the same
    /// target twice replaces the previous handler.
    pub fn register(&self, target: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        let target = target.into();
        let mut handlers = self.handlers.write();
        if handlers.insert(target.clone(), handler).is_some() {
            warn!(target = %target, "target already registered, replacing handler");
        } else {
            debug!(target = %target, "handler registered");
        }
    }

    /// Resolve a target by exact string match.
    pub fn resolve(&self, target: &str) -> Result<Arc<dyn TaskHandler>, DispatchError> {
        self.handlers
            .read()
            .get(target)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownTarget {
                target: target.to_string(),
            })
    }

    /// Resolve the task's target and invoke its method inside a failure
    /// boundary: handler errors and handler panics both come back as
    /// [`DispatchError`], never as an unwound stack in the caller.
    pub async fn dispatch(&self, task: &Task) -> Result<(), DispatchError> {
        let handler = self.resolve(&task.target)?;

        let target = task.target.clone();
        let method = task.method.clone();
        let invoke_method = method.clone();
        let args = task.args.clone();

        // Run the handler on its own task so a panic is contained to the
        // invocation and reported as a join error.
        let joined =
            tokio::spawn(async move { handler.invoke(&invoke_method, &args).await }).await;

        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(HandlerError::UnknownMethod(m))) => {
                Err(DispatchError::UnknownMethod { target, method: m })
            }
            Ok(Err(HandlerError::Failed(cause))) => Err(DispatchError::InvocationFailed {
                target,
                method,
                cause,
            }),
            Err(join_err) => {
                let cause = if join_err.is_panic() {
                    match join_err.into_panic().downcast::<String>() {
                        Ok(msg) => format!("handler panicked: {msg}"),
                        Err(payload) => match payload.downcast::<&'static str>() {
                            Ok(msg) => format!("handler panicked: {msg}"),
                            Err(_) => "handler panicked".to_string(),
                        },
                    }
                } else {
                    "handler task was cancelled".to_string()
                };
                Err(DispatchError::InvocationFailed {
                    target,
                    method,
                    cause,
                })
            }
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let handlers = self.handlers.read();
        let mut targets: Vec<String> = handlers.keys().cloned().collect();
        targets.sort();
        RegistryStats {
            total_handlers: handlers.len(),
            targets,
        }
    }
}
