use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    ConfigurationError(String),
    IngressError(String),
    FacilityError(String),
    DispatchError(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            BridgeError::IngressError(msg) => write!(f, "Ingress error: {msg}"),
            BridgeError::FacilityError(msg) => write!(f, "Queue facility error: {msg}"),
            BridgeError::DispatchError(msg) => write!(f, "Dispatch error: {msg}"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<crate::ingress::IngressError> for BridgeError {
    fn from(err: crate::ingress::IngressError) -> Self {
        BridgeError::IngressError(err.to_string())
    }
}

impl From<crate::facility::FacilityError> for BridgeError {
    fn from(err: crate::facility::FacilityError) -> Self {
        BridgeError::FacilityError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
