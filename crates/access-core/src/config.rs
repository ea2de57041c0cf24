//! Configuration for role checks, loaded from environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::access::is_evm_address;
use crate::error::ConfigError;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// JSON-RPC endpoint of the chain hosting the access-control contract
    pub rpc_url: String,
    /// Access-control contract address (0x-prefixed)
    pub access_control_address: Option<String>,
    /// Per-call timeout applied by the contract checker
    pub check_timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            access_control_address: None,
            check_timeout_secs: DEFAULT_CHECK_TIMEOUT_SECS,
        }
    }
}

impl GateConfig {
    /// Load configuration from environment variables.
    ///
    /// - `MINTRACE_RPC_URL` (default: local node on 8545)
    /// - `MINTRACE_ACCESS_CONTROL_ADDRESS` (needed for contract checks)
    /// - `MINTRACE_CHECK_TIMEOUT_SECS` (default: 15)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let check_timeout_secs = match std::env::var("MINTRACE_CHECK_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("Invalid MINTRACE_CHECK_TIMEOUT_SECS: '{}'", raw))
            })?,
            Err(_) => defaults.check_timeout_secs,
        };

        Ok(Self {
            rpc_url: std::env::var("MINTRACE_RPC_URL").unwrap_or(defaults.rpc_url),
            access_control_address: std::env::var("MINTRACE_ACCESS_CONTROL_ADDRESS")
                .ok()
                .filter(|a| !a.trim().is_empty()),
            check_timeout_secs,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(ConfigError::Invalid(
                "MINTRACE_RPC_URL must be a valid HTTP(S) URL".to_string(),
            ));
        }

        if let Some(address) = &self.access_control_address {
            if !is_evm_address(address) {
                return Err(ConfigError::Invalid(format!(
                    "MINTRACE_ACCESS_CONTROL_ADDRESS '{}' is not a 0x-prefixed 20-byte address",
                    address
                )));
            }
        }

        if self.check_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "MINTRACE_CHECK_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}
