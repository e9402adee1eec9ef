//! # Task Codec
//!
//! Line-delimited JSON encoding for tasks travelling through the queue bridge.
//!
//! A task on the wire is a single UTF-8 JSON object terminated by a newline:
//!
//! ```text
//! {"target":"Mail","method":"send","args":["alice","bob","hello"]}
//! ```
//!
//! Decoding distinguishes structural failures only: bytes that are not a JSON
//! object are [`DecodeError::Malformed`]; a JSON object missing one of the
//! three required fields (or carrying it with the wrong shape) is
//! [`DecodeError::MissingField`]. Business-logic concerns such as whether the
//! target exists are dispatch failures, not codec failures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The unit of work carried through the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Handler identifier, resolved by exact match in the dispatch registry.
    pub target: String,
    /// Operation name on the resolved handler.
    pub method: String,
    /// Ordered, untyped invocation arguments. May be empty, never absent.
    pub args: Vec<Value>,
}

/// Structural decode failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed task payload: {0}")]
    Malformed(String),

    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),
}

impl Task {
    /// Create a task from its parts.
    pub fn new(target: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            args,
        }
    }

    /// Encode to the canonical one-line wire form, newline-terminated.
    pub fn encode(&self) -> Vec<u8> {
        let mut line = serde_json::json!({
            "target": self.target,
            "method": self.method,
            "args": self.args,
        })
        .to_string()
        .into_bytes();
        line.push(b'\n');
        line
    }

    /// Decode from wire bytes. Trailing newline/whitespace is tolerated.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| DecodeError::Malformed("not a JSON object".to_string()))?;

        let target = object
            .get("target")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(DecodeError::MissingField("target"))?;

        let method = object
            .get("method")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(DecodeError::MissingField("method"))?;

        let args = object
            .get("args")
            .and_then(Value::as_array)
            .cloned()
            .ok_or(DecodeError::MissingField("args"))?;

        Ok(Self {
            target: target.to_string(),
            method: method.to_string(),
            args,
        })
    }
}
