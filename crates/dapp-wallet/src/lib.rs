//! Wallet session module for the dApp toolkit.
//!
//! A user-supplied wallet provider is treated as a black box that can connect,
//! report accounts and chain id, sign-and-send transactions, and emit lifecycle
//! signals. [`WalletSessionManager`] owns the single live [`WalletSession`] and
//! rebuilds it wholesale whenever the provider signals a change.

use async_trait::async_trait;
use dapp_types::{classify_rpc_error, Address, RpcErrorKind, Transaction, TransactionHash};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

pub mod implementations {
	pub mod burner;
	#[cfg(any(test, feature = "testing"))]
	pub mod mock;
}
pub mod manager;
pub mod session;

pub use manager::WalletSessionManager;
pub use session::{ProviderHandle, ProviderSigner, SessionHandle, SessionState, WalletSession};

/// Errors raised by wallet providers and the session manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
	/// The user declined the request in their wallet.
	#[error("User rejected: {0}")]
	UserRejected(String),
	/// The account cannot cover value plus gas.
	#[error("Insufficient funds: {0}")]
	InsufficientFunds(String),
	/// The provider could not reach its node.
	#[error("Network unavailable: {0}")]
	NetworkUnavailable(String),
	/// Any other provider failure.
	#[error("Provider error: {0}")]
	Provider(String),
	/// The provider exposed no accounts.
	#[error("No accounts available")]
	NoAccounts,
	/// The connect attempt exceeded its time bound.
	#[error("Connect timed out")]
	ConnectTimeout,
	/// A disconnect or a newer connect superseded this connect.
	#[error("Connect cancelled")]
	ConnectCancelled,
	/// A signer was used for a chain other than the one it was built for.
	#[error("Signer bound to chain {expected}, transaction targets {actual}")]
	ChainMismatch { expected: u64, actual: u64 },
	/// The session manager task is gone.
	#[error("Session manager stopped")]
	ManagerStopped,
}

impl WalletError {
	/// Builds an error from a provider message, classifying it.
	pub fn from_provider(error: impl std::fmt::Display) -> Self {
		let message = error.to_string();
		match classify_rpc_error(&message) {
			RpcErrorKind::UserRejected => Self::UserRejected(message),
			RpcErrorKind::InsufficientFunds => Self::InsufficientFunds(message),
			RpcErrorKind::NetworkUnavailable | RpcErrorKind::Timeout => {
				Self::NetworkUnavailable(message)
			},
			RpcErrorKind::Other => Self::Provider(message),
		}
	}
}

/// Lifecycle signal emitted by a wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSignal {
	/// The wallet switched to another chain.
	NetworkChanged { chain_id: u64 },
	/// The wallet switched accounts. Empty means the wallet was locked.
	AccountsChanged { accounts: Vec<Address> },
	/// The provider closed the connection.
	Disconnected { code: i64, reason: String },
}

/// A connected wallet provider (EIP-1193 style).
#[async_trait]
pub trait WalletProvider: Send + Sync {
	/// Stable identifier, stored as the cached provider id.
	fn id(&self) -> &str;

	/// Requests access to accounts; the first one is active.
	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

	async fn chain_id(&self) -> Result<u64, WalletError>;

	/// Signs and broadcasts a transaction from the active account.
	async fn send_transaction(&self, tx: Transaction) -> Result<TransactionHash, WalletError>;

	/// Closes the provider-side connection.
	async fn disconnect(&self) -> Result<(), WalletError>;

	/// Subscribes to lifecycle signals.
	fn subscribe(&self) -> broadcast::Receiver<ProviderSignal>;
}

/// Selects and caches wallet providers.
#[async_trait]
pub trait WalletConnector: Send + Sync {
	/// Id of the provider used last time, if remembered.
	fn cached_provider(&self) -> Option<String>;

	/// Silently reconnects to a previously used provider.
	async fn reconnect(&self, id: &str) -> Result<Arc<dyn WalletProvider>, WalletError>;

	/// Lets the user pick a provider interactively and remembers the choice.
	async fn select(&self) -> Result<Arc<dyn WalletProvider>, WalletError>;

	/// Forgets the cached provider.
	async fn clear_cached_provider(&self);
}

/// Signer bound to one session snapshot.
#[async_trait]
pub trait SessionSigner: Send + Sync {
	fn address(&self) -> Address;

	/// Chain the signer was built for.
	fn chain_id(&self) -> u64;

	/// Signs and sends a transaction through the session's provider.
	async fn send_transaction(&self, tx: Transaction) -> Result<TransactionHash, WalletError>;
}
