//! Beacon Errors

use std::time::Duration;
use thiserror::Error;

/// Numeric error codes reported across process boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    Internal = 4000,
    Parameter = 4001,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Beacon errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BeaconError {
    /// A second setup was attempted on a configured instance
    #[error("Randomness service already set up")]
    AlreadyConfigured,

    #[error("Randomness service not set up")]
    NotConfigured,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Round timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transcript verification failed: {0}")]
    Verification(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BeaconError {
    /// Code used when reporting this error to a remote caller
    pub fn code(&self) -> ErrorCode {
        match self {
            BeaconError::InvalidParameter(_) => ErrorCode::Parameter,
            _ => ErrorCode::Internal,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        BeaconError::Internal(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        BeaconError::InvalidParameter(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::Internal.as_i32(), 4000);
        assert_eq!(ErrorCode::Parameter.as_i32(), 4001);

        assert_eq!(BeaconError::invalid("index").code(), ErrorCode::Parameter);
        assert_eq!(BeaconError::internal("ledger").code(), ErrorCode::Internal);
        assert_eq!(BeaconError::AlreadyConfigured.code(), ErrorCode::Internal);
        assert_eq!(BeaconError::NotConfigured.code(), ErrorCode::Internal);
    }
}
