//! ============================================================================
//! ACCESS-CORE: Role-gated dashboards for MinTrace
//! ============================================================================
//! This crate handles the access flow every dashboard page shares:
//! - Wallet session tracking (connect, switch account, disconnect)
//! - Role lookup against the access-control contract
//! - Gate state machine deciding connect prompt / loading / denied / content
//! - Notifications and clipboard capabilities for the denied banner
//! ============================================================================

pub mod access;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod notify;
pub mod routes;
pub mod wallet;

// Re-export main types for convenience
pub use access::{
    AccessDecision, AccessGate, ContractRoleChecker, GateHandle, GateState, GateView,
    RecheckOutcome, Requirement, Role, RoleChecker, StaticRoleChecker,
};
pub use clipboard::{Clipboard, MemoryClipboard};
pub use config::GateConfig;
pub use error::{ClipboardError, ConfigError, ConnectionError, RoleCheckError};
pub use notify::{ChannelNotifier, NotificationKind, Notifier, RecordingNotifier, TracingNotifier};
pub use wallet::{FixedAccountConnector, WalletConnector, WalletProvider, WalletSession};
