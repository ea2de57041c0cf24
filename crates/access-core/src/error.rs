//! ============================================================================
//! Error Types - Capability-layer failures
//! ============================================================================
//! Everything the gate's injected capabilities can fail with. The gate turns
//! these into view states and notifications; none of them reach the page.
//! ============================================================================

use std::time::Duration;
use thiserror::Error;

/// Wallet connection attempt failed. The session falls back to disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Connection request rejected by user")]
    Rejected,

    #[error("A connection attempt is already in progress")]
    AlreadyConnecting,

    #[error("Wallet connection failed: {0}")]
    Failed(String),
}

/// Role check capability failed (network, revert, timeout, bad input).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleCheckError {
    #[error("Invalid wallet address '{0}'")]
    InvalidAddress(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Contract call reverted: {0}")]
    Reverted(String),

    #[error("Role check timed out after {0:?}")]
    Timeout(Duration),

    #[error("Role check aborted: {0}")]
    Panicked(String),
}

impl RoleCheckError {
    /// Classify a contract client error by its message
    pub fn from_contract_error(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("revert") || lower.contains("execution reverted") {
            RoleCheckError::Reverted(message)
        } else {
            RoleCheckError::Network(message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role '{0}'. Valid roles: miner, refiner, transporter, auditor, inspector, buyer, admin")]
pub struct ParseRoleError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_classification() {
        assert!(matches!(
            RoleCheckError::from_contract_error("server returned an error response: execution reverted"),
            RoleCheckError::Reverted(_)
        ));
        assert!(matches!(
            RoleCheckError::from_contract_error("error sending request: connection refused"),
            RoleCheckError::Network(_)
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = RoleCheckError::Timeout(Duration::from_secs(15));
        assert_eq!(err.to_string(), "Role check timed out after 15s");

        let err = ParseRoleError("smelter".into());
        assert!(err.to_string().contains("'smelter'"));
    }
}
