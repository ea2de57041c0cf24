//! ============================================================================
//! Wallet Session - Browser wallet connection state
//! ============================================================================
//! One session per tab. The provider owns the sender half of a watch channel;
//! gates hold receivers and react to every change.
//! ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::ConnectionError;

/// Connection state of the user's wallet
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletSession {
    pub address: Option<String>,
    pub is_connected: bool,
    /// A connection request is awaiting the user
    pub is_connecting: bool,
}

impl WalletSession {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            is_connected: true,
            is_connecting: false,
        }
    }

    /// Address of a live connection, if any
    pub fn connected_address(&self) -> Option<&str> {
        if self.is_connected {
            self.address.as_deref()
        } else {
            None
        }
    }
}

/// Asks the user's wallet for an account
#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn request_account(&self) -> Result<String, ConnectionError>;
}

/// Owns the tab's wallet session and publishes changes to gates
pub struct WalletProvider {
    session: watch::Sender<WalletSession>,
}

impl WalletProvider {
    pub fn new() -> Self {
        let (session, _) = watch::channel(WalletSession::disconnected());
        Self { session }
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletSession> {
        self.session.subscribe()
    }

    pub fn session(&self) -> WalletSession {
        self.session.borrow().clone()
    }

    /// Run a connection attempt, showing the connecting state meanwhile.
    /// On failure the session returns to disconnected so the user can retry.
    pub async fn connect(&self, connector: &dyn WalletConnector) -> Result<String, ConnectionError> {
        // Test and set under the channel lock so concurrent callers can't both pass
        let started = self.session.send_if_modified(|s| {
            if s.is_connecting {
                false
            } else {
                s.is_connecting = true;
                true
            }
        });
        if !started {
            return Err(ConnectionError::AlreadyConnecting);
        }

        match connector.request_account().await {
            Ok(address) => {
                info!("Wallet connected: {}", address);
                self.session.send_replace(WalletSession::connected(address.clone()));
                Ok(address)
            }
            Err(e) => {
                warn!("Wallet connection failed: {}", e);
                self.session.send_replace(WalletSession::disconnected());
                Err(e)
            }
        }
    }

    pub fn set_connected(&self, address: impl Into<String>) {
        self.session.send_replace(WalletSession::connected(address));
    }

    /// User picked another account in the wallet
    pub fn switch_account(&self, address: impl Into<String>) {
        let address = address.into();
        info!("Wallet account switched to {}", address);
        self.session.send_replace(WalletSession::connected(address));
    }

    pub fn disconnect(&self) {
        info!("Wallet disconnected");
        self.session.send_replace(WalletSession::disconnected());
    }
}

impl Default for WalletProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Connector that always yields the same account
pub struct FixedAccountConnector {
    address: String,
}

impl FixedAccountConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl WalletConnector for FixedAccountConnector {
    async fn request_account(&self) -> Result<String, ConnectionError> {
        Ok(self.address.clone())
    }
}
