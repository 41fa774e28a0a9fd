//! The two ways a transaction leaves the dispatcher.
//!
//! [`SessionTransactor`] signs through the wallet session. [`FaucetTransactor`]
//! sends from a node-managed account on the local development chain and is only
//! ever constructed when debug transactions are enabled.

use super::DispatchError;
use async_trait::async_trait;
use dapp_delivery::DeliveryService;
use dapp_types::{Address, Transaction, TransactionHash};
use dapp_wallet::SessionSigner;
use std::sync::Arc;

#[async_trait]
pub trait Transactor: Send + Sync {
	/// Chain transactions are sent on.
	fn chain_id(&self) -> u64;

	async fn send(&self, tx: Transaction) -> Result<TransactionHash, DispatchError>;
}

/// Sends through the signer of one session snapshot.
pub struct SessionTransactor {
	signer: Arc<dyn SessionSigner>,
}

impl SessionTransactor {
	pub fn new(signer: Arc<dyn SessionSigner>) -> Self {
		Self { signer }
	}
}

#[async_trait]
impl Transactor for SessionTransactor {
	fn chain_id(&self) -> u64 {
		self.signer.chain_id()
	}

	async fn send(&self, mut tx: Transaction) -> Result<TransactionHash, DispatchError> {
		tx.chain_id = self.signer.chain_id();
		self.signer
			.send_transaction(tx)
			.await
			.map_err(DispatchError::from)
	}
}

/// Funds addresses from an unlocked account on the local chain.
pub struct FaucetTransactor {
	delivery: Arc<DeliveryService>,
	chain_id: u64,
	funder: Address,
}

impl FaucetTransactor {
	pub fn new(delivery: Arc<DeliveryService>, chain_id: u64, funder: Address) -> Self {
		Self {
			delivery,
			chain_id,
			funder,
		}
	}

	pub fn funder(&self) -> Address {
		self.funder
	}
}

#[async_trait]
impl Transactor for FaucetTransactor {
	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn send(&self, mut tx: Transaction) -> Result<TransactionHash, DispatchError> {
		tx.chain_id = self.chain_id;
		self.delivery
			.deliver(tx.with_from(self.funder))
			.await
			.map_err(DispatchError::from)
	}
}
