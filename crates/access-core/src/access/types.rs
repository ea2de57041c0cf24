//! ============================================================================
//! Access Types - Roles, requirements and role grants
//! ============================================================================
//! Defines the roles held on the access-control contract and the per-gate
//! record of whether the connected address holds one.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseRoleError;

/// Roles granted by the external access-control contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Registers extracted minerals
    Miner,
    /// Processes and refines registered minerals
    Refiner,
    /// Moves minerals between supply-chain parties
    Transporter,
    /// Reviews supply-chain history
    Auditor,
    /// Performs compliance inspections
    Inspector,
    /// Purchases refined minerals
    Buyer,
    /// Assigns and revokes roles
    Admin,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Miner,
        Role::Refiner,
        Role::Transporter,
        Role::Auditor,
        Role::Inspector,
        Role::Buyer,
        Role::Admin,
    ];

    /// Role constant name on the contract.
    /// Admin is OpenZeppelin's DEFAULT_ADMIN_ROLE (bytes32 zero).
    pub fn contract_role_name(&self) -> &'static str {
        match self {
            Role::Miner => "MINER_ROLE",
            Role::Refiner => "REFINER_ROLE",
            Role::Transporter => "TRANSPORTER_ROLE",
            Role::Auditor => "AUDITOR_ROLE",
            Role::Inspector => "INSPECTOR_ROLE",
            Role::Buyer => "BUYER_ROLE",
            Role::Admin => "DEFAULT_ADMIN_ROLE",
        }
    }

    /// Human-readable role name
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Miner => "Miner",
            Role::Refiner => "Refiner",
            Role::Transporter => "Transporter",
            Role::Auditor => "Auditor",
            Role::Inspector => "Inspector",
            Role::Buyer => "Buyer",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Miner => "miner",
            Role::Refiner => "refiner",
            Role::Transporter => "transporter",
            Role::Auditor => "auditor",
            Role::Inspector => "inspector",
            Role::Buyer => "buyer",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "miner" => Ok(Role::Miner),
            "refiner" => Ok(Role::Refiner),
            "transporter" => Ok(Role::Transporter),
            "auditor" => Ok(Role::Auditor),
            "inspector" => Ok(Role::Inspector),
            "buyer" => Ok(Role::Buyer),
            "admin" => Ok(Role::Admin),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// What a gate demands of the connected address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// Address must hold this role
    Role(Role),
    /// Any connected wallet may pass
    Unrestricted,
}

impl Requirement {
    pub fn role(&self) -> Option<Role> {
        match self {
            Requirement::Role(role) => Some(*role),
            Requirement::Unrestricted => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Requirement::Role(role) => role.display_name(),
            Requirement::Unrestricted => "Member",
        }
    }
}

impl From<Role> for Requirement {
    fn from(role: Role) -> Self {
        Requirement::Role(role)
    }
}

/// Tri-state result of a role lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Lookup not yet resolved
    #[default]
    Pending,
    Granted,
    Denied,
}

/// Whether `address` held `requirement` at `last_checked_at`.
///
/// Only authoritative right after a successful read. Any role write
/// (assign/revoke) makes it stale; re-fetch rather than trust it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub requirement: Requirement,
    pub address: String,
    pub granted: GrantStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// A "Check Again" lookup is in flight; `granted` keeps the last result
    pub refreshing: bool,
}

impl RoleGrant {
    pub fn pending(requirement: Requirement, address: impl Into<String>) -> Self {
        Self {
            requirement,
            address: address.into(),
            granted: GrantStatus::Pending,
            last_checked_at: None,
            refreshing: false,
        }
    }

    /// Record a resolved lookup
    pub fn resolve(&mut self, granted: bool, at: DateTime<Utc>) {
        self.granted = if granted {
            GrantStatus::Granted
        } else {
            GrantStatus::Denied
        };
        self.last_checked_at = Some(at);
        self.refreshing = false;
    }

    /// Record a failed lookup: denied, but `last_checked_at` keeps the time
    /// of the last successful read
    pub fn fail(&mut self) {
        self.granted = GrantStatus::Denied;
        self.refreshing = false;
    }

    pub fn is_resolved(&self) -> bool {
        self.granted != GrantStatus::Pending
    }
}

/// Shorten an address to `first6...last4` for display
pub fn abbreviate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// `0x` followed by 40 hex digits
pub fn is_evm_address(address: &str) -> bool {
    match address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) {
        Some(hex) => hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
