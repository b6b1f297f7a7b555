use serde::{Deserialize, Serialize};
use std::fmt;

/// Named faults the calling process can route on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultCode {
    ValidationError,
    TransferFailed,
}

impl FaultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCode::ValidationError => "VALIDATION_ERROR",
            FaultCode::TransferFailed => "TRANSFER_FAILED",
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct BusinessFault {
    pub code: FaultCode,
    pub message: String,
}

impl BusinessFault {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            code: FaultCode::ValidationError,
            message: message.into(),
        }
    }

    pub fn transfer_failed(message: impl Into<String>) -> Self {
        Self {
            code: FaultCode::TransferFailed,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    /// Expected outcome the process routes along an alternate path.
    #[error(transparent)]
    Fault(#[from] BusinessFault),

    /// No automatic remedy; the engine should raise an incident.
    #[error("Fatal delegate error: {0}")]
    Fatal(String),
}

impl DelegateError {
    pub fn fault_code(&self) -> Option<FaultCode> {
        match self {
            DelegateError::Fault(fault) => Some(fault.code),
            DelegateError::Fatal(_) => None,
        }
    }
}
