//! Wallet session snapshots.
//!
//! A [`WalletSession`] is immutable. Every lifecycle event produces a brand new
//! snapshot with a fresh [`ProviderHandle`] and [`ProviderSigner`]; consumers read
//! the current one through a [`SessionHandle`] and never keep a signer across an
//! await on an event boundary.

use crate::{SessionSigner, WalletError, WalletProvider};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use dapp_types::{Address, Transaction, TransactionHash};
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Disconnected,
	Connecting,
	Connected,
	/// Connected, rebuilt after a network or account change.
	Refreshed,
}

impl SessionState {
	pub fn is_connected(&self) -> bool {
		matches!(self, Self::Connected | Self::Refreshed)
	}
}

/// Per-snapshot wrapper around the raw provider.
pub struct ProviderHandle {
	inner: Arc<dyn WalletProvider>,
	chain_id: u64,
}

impl ProviderHandle {
	pub fn new(inner: Arc<dyn WalletProvider>, chain_id: u64) -> Self {
		Self { inner, chain_id }
	}

	pub fn id(&self) -> &str {
		self.inner.id()
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn inner(&self) -> &Arc<dyn WalletProvider> {
		&self.inner
	}
}

impl fmt::Debug for ProviderHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProviderHandle")
			.field("id", &self.id())
			.field("chain_id", &self.chain_id)
			.finish()
	}
}

/// Signer sending through a provider for a fixed account and chain.
pub struct ProviderSigner {
	provider: Arc<dyn WalletProvider>,
	address: Address,
	chain_id: u64,
}

impl ProviderSigner {
	pub fn new(provider: Arc<dyn WalletProvider>, address: Address, chain_id: u64) -> Self {
		Self {
			provider,
			address,
			chain_id,
		}
	}
}

#[async_trait]
impl SessionSigner for ProviderSigner {
	fn address(&self) -> Address {
		self.address
	}

	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn send_transaction(&self, tx: Transaction) -> Result<TransactionHash, WalletError> {
		if tx.chain_id != self.chain_id {
			return Err(WalletError::ChainMismatch {
				expected: self.chain_id,
				actual: tx.chain_id,
			});
		}
		self.provider
			.send_transaction(tx.with_from(self.address))
			.await
	}
}

/// One immutable view of the wallet connection.
#[derive(Clone)]
pub struct WalletSession {
	pub provider: Option<Arc<ProviderHandle>>,
	pub signer: Option<Arc<dyn SessionSigner>>,
	pub address: Option<Address>,
	pub chain_id: Option<u64>,
	pub cached_provider_id: Option<String>,
	pub state: SessionState,
}

impl WalletSession {
	pub fn disconnected() -> Self {
		Self {
			provider: None,
			signer: None,
			address: None,
			chain_id: None,
			cached_provider_id: None,
			state: SessionState::Disconnected,
		}
	}

	pub fn connecting(cached_provider_id: Option<String>) -> Self {
		Self {
			cached_provider_id,
			state: SessionState::Connecting,
			..Self::disconnected()
		}
	}

	/// Snapshot published while a rebuild is in flight.
	///
	/// Keeps the provider so later signals still reach the manager, but drops
	/// the signer so nothing is sent for the previous account or chain.
	pub fn refreshing(previous: &WalletSession) -> Self {
		Self {
			provider: previous.provider.clone(),
			cached_provider_id: previous.cached_provider_id.clone(),
			state: SessionState::Connecting,
			..Self::disconnected()
		}
	}

	/// A connected snapshot with a fresh provider wrapper and signer.
	pub fn connected(
		provider: Arc<dyn WalletProvider>,
		address: Address,
		chain_id: u64,
		state: SessionState,
	) -> Self {
		let cached_provider_id = Some(provider.id().to_string());
		let signer: Arc<dyn SessionSigner> =
			Arc::new(ProviderSigner::new(provider.clone(), address, chain_id));
		Self {
			provider: Some(Arc::new(ProviderHandle::new(provider, chain_id))),
			signer: Some(signer),
			address: Some(address),
			chain_id: Some(chain_id),
			cached_provider_id,
			state,
		}
	}

	pub fn is_connected(&self) -> bool {
		self.state.is_connected() && self.signer.is_some()
	}
}

impl fmt::Debug for WalletSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WalletSession")
			.field("provider", &self.provider)
			.field("address", &self.address)
			.field("chain_id", &self.chain_id)
			.field("cached_provider_id", &self.cached_provider_id)
			.field("state", &self.state)
			.finish()
	}
}

/// Read-only access to the current session snapshot.
#[derive(Clone)]
pub struct SessionHandle {
	current: Arc<ArcSwap<WalletSession>>,
}

impl SessionHandle {
	pub(crate) fn new(current: Arc<ArcSwap<WalletSession>>) -> Self {
		Self { current }
	}

	/// The latest published snapshot.
	pub fn current(&self) -> Arc<WalletSession> {
		self.current.load_full()
	}

	/// Signer of the latest snapshot, if connected.
	pub fn signer(&self) -> Option<Arc<dyn SessionSigner>> {
		self.current().signer.clone()
	}

	pub fn chain_id(&self) -> Option<u64> {
		self.current().chain_id
	}
}
