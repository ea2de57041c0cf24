//! ============================================================================
//! Access Decision - What a gated page shows
//! ============================================================================
//! Pure function of (wallet session, role grant). Priority: connection, then
//! lookup progress, then the lookup result.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::{abbreviate_address, GrantStatus, Requirement, RoleGrant};
use crate::wallet::WalletSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Disconnected,
    Checking,
    Denied,
    Granted,
}

/// Contents of the access-denied banner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeniedBanner {
    pub requirement: Requirement,
    /// Full address, used by the copy control
    pub address: String,
    /// `first6...last4`
    pub display_address: String,
    /// "Check Again" is running; the control is disabled
    pub rechecking: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum AccessDecision {
    ShowConnectPrompt {
        requirement: Requirement,
        connecting: bool,
    },
    ShowLoading {
        requirement: Requirement,
    },
    ShowDeniedBanner(DeniedBanner),
    ShowContent,
}

impl AccessDecision {
    pub fn state(&self) -> GateState {
        match self {
            AccessDecision::ShowConnectPrompt { .. } => GateState::Disconnected,
            AccessDecision::ShowLoading { .. } => GateState::Checking,
            AccessDecision::ShowDeniedBanner(_) => GateState::Denied,
            AccessDecision::ShowContent => GateState::Granted,
        }
    }
}

/// Decide the view for `requirement`.
///
/// A grant recorded for a different address than the session's is treated
/// as unresolved.
pub fn decide(
    requirement: Requirement,
    session: &WalletSession,
    grant: Option<&RoleGrant>,
) -> AccessDecision {
    let Some(address) = session.connected_address() else {
        return AccessDecision::ShowConnectPrompt {
            requirement,
            connecting: session.is_connecting,
        };
    };

    let grant = match grant {
        Some(g) if g.address == address => g,
        _ => return AccessDecision::ShowLoading { requirement },
    };

    match grant.granted {
        GrantStatus::Pending => AccessDecision::ShowLoading { requirement },
        GrantStatus::Denied => AccessDecision::ShowDeniedBanner(DeniedBanner {
            requirement,
            address: address.to_string(),
            display_address: abbreviate_address(address),
            rechecking: grant.refreshing,
        }),
        GrantStatus::Granted => AccessDecision::ShowContent,
    }
}

/// Result of rendering through a gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    Content(T),
    Fallback(AccessDecision),
}

impl<T> Rendered<T> {
    pub fn content(self) -> Option<T> {
        match self {
            Rendered::Content(c) => Some(c),
            Rendered::Fallback(_) => None,
        }
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::ShowConnectPrompt { connecting: true, .. } => {
                write!(f, "Connecting wallet...")
            }
            AccessDecision::ShowConnectPrompt { requirement, .. } => write!(
                f,
                "Connect your wallet to access the {} dashboard. [Connect Wallet]",
                requirement.display_name()
            ),
            AccessDecision::ShowLoading { requirement } => write!(
                f,
                "Checking {} access...",
                requirement.display_name()
            ),
            AccessDecision::ShowDeniedBanner(banner) => {
                write!(
                    f,
                    "Access denied: {} does not hold the {} role. [Copy Address] ",
                    banner.display_address,
                    banner.requirement.display_name()
                )?;
                if banner.rechecking {
                    write!(f, "[Checking...]")
                } else {
                    write!(f, "[Check Again]")
                }
            }
            AccessDecision::ShowContent => write!(f, "Access granted."),
        }
    }
}
