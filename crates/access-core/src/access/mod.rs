//! ============================================================================
//! Access Module - Role-gated access control for dashboards
//! ============================================================================
//! Wallet connection -> on-chain role lookup -> conditional render -> manual
//! re-check, implemented once and parametrized by the required role.
//!
//! ## Views (in priority order)
//! - **Connect prompt**: no wallet connected (or a connection in progress)
//! - **Loading**: role lookup not resolved yet
//! - **Denied banner**: lookup said no (or failed); copy address, Check Again
//! - **Content**: lookup said yes
//!
//! ## Usage
//! ```rust,ignore
//! use access_core::access::{AccessGate, ContractRoleChecker, Role};
//!
//! let checker = Arc::new(ContractRoleChecker::new(rpc_url, contract, timeout)?);
//! let gate = AccessGate::new(Role::Miner, checker, Arc::new(TracingNotifier));
//! let handle = gate.mount(wallet.subscribe());
//! match handle.view().render(|| miner_dashboard()) { ... }
//! ```
//! ============================================================================

mod checker;
mod decision;
mod gate;
mod types;

pub use checker::{
    contract_role_id, ContractRoleChecker, FnRoleChecker, RoleChecker, StaticRoleChecker,
};
pub use decision::{decide, AccessDecision, DeniedBanner, GateState, Rendered};
pub use gate::{AccessGate, GateHandle, GateView, RecheckOutcome};
pub use types::{
    abbreviate_address, is_evm_address, GrantStatus, Requirement, Role, RoleGrant,
};
