//! Burner wallet: an in-process key used when no external wallet is present.
//!
//! The burner signs locally and sends through a delivery bound to its own key.
//! It never changes account or chain, so its only signal is a disconnect.

use crate::{ProviderSignal, WalletConnector, WalletError, WalletProvider};
use async_trait::async_trait;
use dapp_account::{AccountInterface, LocalAccount};
use dapp_delivery::implementations::evm::alloy::AlloyDelivery;
use dapp_delivery::{DeliveryError, DeliveryInterface};
use dapp_types::{Address, NetworkDescriptor, Transaction, TransactionHash};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub const BURNER_ID: &str = "burner";

/// Wallet provider backed by a local key.
pub struct BurnerWallet {
	account: LocalAccount,
	delivery: Arc<dyn DeliveryInterface>,
	signals: broadcast::Sender<ProviderSignal>,
}

impl BurnerWallet {
	pub fn new(account: LocalAccount, delivery: Arc<dyn DeliveryInterface>) -> Self {
		let (signals, _) = broadcast::channel(16);
		Self {
			account,
			delivery,
			signals,
		}
	}

	/// Builds a burner that signs for `network` over JSON-RPC.
	pub fn for_network(
		account: LocalAccount,
		network: &NetworkDescriptor,
	) -> Result<Self, WalletError> {
		let delivery = AlloyDelivery::new(network, Some(account.wallet())).map_err(from_delivery)?;
		Ok(Self::new(account, Arc::new(delivery)))
	}

	pub fn address(&self) -> Address {
		self.account.address_sync()
	}
}

fn from_delivery(error: DeliveryError) -> WalletError {
	match error {
		DeliveryError::UserRejected(message) => WalletError::UserRejected(message),
		DeliveryError::InsufficientFunds(message) => WalletError::InsufficientFunds(message),
		DeliveryError::NetworkUnavailable(message) | DeliveryError::Timeout(message) => {
			WalletError::NetworkUnavailable(message)
		},
		other => WalletError::Provider(other.to_string()),
	}
}

#[async_trait]
impl WalletProvider for BurnerWallet {
	fn id(&self) -> &str {
		BURNER_ID
	}

	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
		Ok(vec![self.account.address_sync()])
	}

	async fn chain_id(&self) -> Result<u64, WalletError> {
		Ok(self.delivery.chain_id())
	}

	async fn send_transaction(&self, tx: Transaction) -> Result<TransactionHash, WalletError> {
		self.delivery
			.submit(tx.with_from(self.account.address_sync()))
			.await
			.map_err(from_delivery)
	}

	async fn disconnect(&self) -> Result<(), WalletError> {
		self.signals
			.send(ProviderSignal::Disconnected {
				code: 1000,
				reason: "burner closed".to_string(),
			})
			.ok();
		Ok(())
	}

	fn subscribe(&self) -> broadcast::Receiver<ProviderSignal> {
		self.signals.subscribe()
	}
}

/// Connector that always hands out the same burner.
pub struct BurnerConnector {
	burner: Arc<BurnerWallet>,
	cached: Mutex<Option<String>>,
}

impl BurnerConnector {
	pub fn new(burner: Arc<BurnerWallet>) -> Self {
		Self {
			burner,
			cached: Mutex::new(None),
		}
	}
}

#[async_trait]
impl WalletConnector for BurnerConnector {
	fn cached_provider(&self) -> Option<String> {
		self.cached.lock().ok().and_then(|cached| cached.clone())
	}

	async fn reconnect(&self, id: &str) -> Result<Arc<dyn WalletProvider>, WalletError> {
		if id != BURNER_ID {
			return Err(WalletError::Provider(format!("unknown provider {}", id)));
		}
		Ok(self.burner.clone())
	}

	async fn select(&self) -> Result<Arc<dyn WalletProvider>, WalletError> {
		if let Ok(mut cached) = self.cached.lock() {
			*cached = Some(BURNER_ID.to_string());
		}
		Ok(self.burner.clone())
	}

	async fn clear_cached_provider(&self) {
		if let Ok(mut cached) = self.cached.lock() {
			*cached = None;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{SessionState, WalletSessionManager};
	use dapp_delivery::implementations::mock::MockDelivery;
	use dapp_types::{EventBus, U256};
	use std::time::Duration;

	#[tokio::test]
	async fn test_burner_sends_from_its_key() {
		let delivery = Arc::new(MockDelivery::new(31337));
		let burner = BurnerWallet::new(LocalAccount::random(), delivery.clone());

		let tx = Transaction::transfer(Address::repeat_byte(9), U256::from(5u64), 31337);
		burner.send_transaction(tx).await.unwrap();

		assert_eq!(delivery.submitted()[0].from, Some(burner.address()));
		assert_eq!(burner.chain_id().await.unwrap(), 31337);
	}

	#[tokio::test]
	async fn test_burner_session_lifecycle() {
		let burner = Arc::new(BurnerWallet::new(
			LocalAccount::random(),
			Arc::new(MockDelivery::new(31337)),
		));
		let address = burner.address();
		let connector = Arc::new(BurnerConnector::new(burner));
		let manager =
			WalletSessionManager::spawn(connector.clone(), EventBus::new(16), Duration::from_secs(5));

		let session = manager.connect().await.unwrap();
		assert_eq!(session.address, Some(address));
		assert_eq!(connector.cached_provider(), Some(BURNER_ID.to_string()));

		manager.logout().await.unwrap();
		assert_eq!(manager.current().state, SessionState::Disconnected);
		assert_eq!(connector.cached_provider(), None);
	}
}
