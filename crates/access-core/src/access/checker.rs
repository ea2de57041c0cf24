//! ============================================================================
//! Role Checker - Does an address hold a role?
//! ============================================================================
//! The gate treats the check as an opaque async predicate. The production
//! implementation reads `hasRole(bytes32,address)` from the access-control
//! contract; the others serve offline runs and tests.
//! ============================================================================

use alloy::{
    primitives::{keccak256, Address, B256},
    providers::{DynProvider, Provider, ProviderBuilder},
    sol,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{is_evm_address, Role};
use crate::error::{ConfigError, RoleCheckError};

sol! {
    #[sol(rpc)]
    interface IAccessControl {
        function hasRole(bytes32 role, address account) external view returns (bool);
    }
}

/// Permission-check capability injected into each gate
#[async_trait]
pub trait RoleChecker: Send + Sync {
    async fn has_role(&self, role: Role, address: &str) -> Result<bool, RoleCheckError>;
}

/// bytes32 role identifier as the contract stores it
pub fn contract_role_id(role: Role) -> B256 {
    match role {
        Role::Admin => B256::ZERO,
        other => keccak256(other.contract_role_name().as_bytes()),
    }
}

/// Reads roles from an OpenZeppelin-style access-control contract
pub struct ContractRoleChecker {
    contract: IAccessControl::IAccessControlInstance<DynProvider>,
    timeout: Duration,
}

impl ContractRoleChecker {
    pub fn new(rpc_url: &str, contract_address: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ConfigError::Invalid(format!("Invalid RPC URL: {}", e)))?;
        let address = Address::from_str(contract_address).map_err(|e| {
            ConfigError::Invalid(format!("Invalid access-control address: {}", e))
        })?;

        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            contract: IAccessControl::new(address, provider),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl RoleChecker for ContractRoleChecker {
    async fn has_role(&self, role: Role, address: &str) -> Result<bool, RoleCheckError> {
        let account = Address::from_str(address)
            .map_err(|_| RoleCheckError::InvalidAddress(address.to_string()))?;
        let role_id = contract_role_id(role);

        debug!("hasRole({}, {}) on {}", role.contract_role_name(), account, self.contract.address());

        let call = self.contract.hasRole(role_id, account);
        match tokio::time::timeout(self.timeout, call.call()).await {
            Ok(Ok(granted)) => Ok(granted),
            Ok(Err(e)) => {
                warn!("hasRole call failed for {}: {}", address, e);
                Err(RoleCheckError::from_contract_error(e.to_string()))
            }
            Err(_) => Err(RoleCheckError::Timeout(self.timeout)),
        }
    }
}

/// In-memory grants keyed by lowercased address
#[derive(Debug, Default)]
pub struct StaticRoleChecker {
    grants: RwLock<HashMap<String, HashSet<Role>>>,
}

impl StaticRoleChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{ "0x...": ["miner", "admin"] }`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let parsed: HashMap<String, Vec<Role>> = serde_json::from_str(json)?;
        let grants = parsed
            .into_iter()
            .map(|(address, roles)| (address.to_lowercase(), roles.into_iter().collect()))
            .collect();
        Ok(Self {
            grants: RwLock::new(grants),
        })
    }

    pub fn with_grant(self, address: &str, role: Role) -> Self {
        self.grant(address, role);
        self
    }

    pub fn grant(&self, address: &str, role: Role) {
        if let Ok(mut grants) = self.grants.write() {
            grants.entry(address.to_lowercase()).or_default().insert(role);
        }
    }

    pub fn revoke(&self, address: &str, role: Role) {
        if let Ok(mut grants) = self.grants.write() {
            if let Some(roles) = grants.get_mut(&address.to_lowercase()) {
                roles.remove(&role);
            }
        }
    }
}

#[async_trait]
impl RoleChecker for StaticRoleChecker {
    async fn has_role(&self, role: Role, address: &str) -> Result<bool, RoleCheckError> {
        if !is_evm_address(address) {
            return Err(RoleCheckError::InvalidAddress(address.to_string()));
        }
        let grants = self
            .grants
            .read()
            .map_err(|e| RoleCheckError::Network(format!("grant table poisoned: {}", e)))?;
        Ok(grants
            .get(&address.to_lowercase())
            .map(|roles| roles.contains(&role))
            .unwrap_or(false))
    }
}

/// Adapts an async closure into a checker
pub struct FnRoleChecker<F> {
    check: F,
}

impl<F> FnRoleChecker<F> {
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

#[async_trait]
impl<F, Fut> RoleChecker for FnRoleChecker<F>
where
    F: Fn(Role, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, RoleCheckError>> + Send,
{
    async fn has_role(&self, role: Role, address: &str) -> Result<bool, RoleCheckError> {
        (self.check)(role, address.to_string()).await
    }
}
