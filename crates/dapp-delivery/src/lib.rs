//! Transaction delivery module for the dApp toolkit.
//!
//! This module is the toolkit's only path to a JSON-RPC node. Each chain gets one
//! [`DeliveryInterface`] implementation; [`DeliveryService`] routes by chain id and
//! bounds every single-shot request with the configured RPC timeout.

use async_trait::async_trait;
use dapp_types::{
	classify_rpc_error, Address, Bytes, RpcErrorKind, Transaction, TransactionHash,
	TransactionReceipt, U256,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod failover;

pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	#[cfg(any(test, feature = "testing"))]
	pub mod mock;
}

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Generic error reported by the node.
	#[error("Network error: {0}")]
	Network(String),
	/// The node could not be reached.
	#[error("Network unavailable: {0}")]
	NetworkUnavailable(String),
	/// The request exceeded its time bound.
	#[error("Timeout: {0}")]
	Timeout(String),
	/// The signer declined the request.
	#[error("User rejected: {0}")]
	UserRejected(String),
	/// The sender cannot cover value plus gas.
	#[error("Insufficient funds: {0}")]
	InsufficientFunds(String),
	/// A mined transaction reverted or never produced a receipt.
	#[error("Transaction failed: {0}")]
	TransactionFailed(String),
	/// No delivery is configured for the chain.
	#[error("No provider available for chain {0}")]
	NoProviderAvailable(u64),
}

impl DeliveryError {
	/// Builds an error from a provider message, classifying it.
	pub fn from_rpc(context: &str, error: impl std::fmt::Display) -> Self {
		let message = format!("{}: {}", context, error);
		match classify_rpc_error(&message) {
			RpcErrorKind::UserRejected => Self::UserRejected(message),
			RpcErrorKind::InsufficientFunds => Self::InsufficientFunds(message),
			RpcErrorKind::NetworkUnavailable => Self::NetworkUnavailable(message),
			RpcErrorKind::Timeout => Self::Timeout(message),
			RpcErrorKind::Other => Self::Network(message),
		}
	}
}

/// Interface to a single chain's JSON-RPC endpoint.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Chain this implementation is bound to, as configured.
	fn chain_id(&self) -> u64;

	/// Signs (when a wallet is attached) and broadcasts a transaction.
	///
	/// Without a wallet the request goes out as `eth_sendTransaction` and the node
	/// signs with the unlocked `from` account.
	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError>;

	/// Polls until the transaction is included with `confirmations` blocks.
	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Current receipt, or `None` while the transaction is pending.
	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError>;

	/// Gas price in wei.
	async fn get_gas_price(&self) -> Result<u128, DeliveryError>;

	/// Native balance in wei.
	async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError>;

	async fn get_block_number(&self) -> Result<u64, DeliveryError>;

	/// Timestamp of the latest block.
	async fn get_block_timestamp(&self) -> Result<u64, DeliveryError>;

	/// Chain id reported by the node (`eth_chainId`).
	async fn get_chain_id(&self) -> Result<u64, DeliveryError>;

	/// Read-only call (`eth_call`).
	async fn call(&self, tx: Transaction) -> Result<Bytes, DeliveryError>;

	/// Unlocked node accounts (`eth_accounts`).
	async fn get_accounts(&self) -> Result<Vec<Address>, DeliveryError>;
}

/// Routes delivery operations to the implementation for each chain.
pub struct DeliveryService {
	providers: HashMap<u64, Arc<dyn DeliveryInterface>>,
	min_confirmations: u64,
	rpc_timeout: Duration,
}

impl DeliveryService {
	pub fn new(
		providers: HashMap<u64, Arc<dyn DeliveryInterface>>,
		min_confirmations: u64,
		rpc_timeout: Duration,
	) -> Self {
		Self {
			providers,
			min_confirmations,
			rpc_timeout,
		}
	}

	/// Chains with a configured implementation.
	pub fn chains(&self) -> Vec<u64> {
		let mut chains: Vec<u64> = self.providers.keys().copied().collect();
		chains.sort_unstable();
		chains
	}

	pub fn supports(&self, chain_id: u64) -> bool {
		self.providers.contains_key(&chain_id)
	}

	fn provider(&self, chain_id: u64) -> Result<&Arc<dyn DeliveryInterface>, DeliveryError> {
		self.providers
			.get(&chain_id)
			.ok_or(DeliveryError::NoProviderAvailable(chain_id))
	}

	async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T, DeliveryError>
	where
		F: Future<Output = Result<T, DeliveryError>>,
	{
		tokio::time::timeout(self.rpc_timeout, fut)
			.await
			.map_err(|_| {
				DeliveryError::Timeout(format!(
					"{} exceeded {}s",
					operation,
					self.rpc_timeout.as_secs()
				))
			})?
	}

	/// Submits a transaction on its target chain.
	pub async fn deliver(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		let provider = self.provider(tx.chain_id)?;
		self.bounded("submit", provider.submit(tx)).await
	}

	/// Waits for the configured number of confirmations.
	///
	/// Not bounded by the RPC timeout; the implementation applies its own
	/// confirmation deadline.
	pub async fn confirm(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		self.provider(chain_id)?
			.wait_for_confirmation(hash, self.min_confirmations)
			.await
	}

	pub async fn get_receipt(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		let provider = self.provider(chain_id)?;
		self.bounded("get_receipt", provider.get_receipt(hash)).await
	}

	pub async fn get_gas_price(&self, chain_id: u64) -> Result<u128, DeliveryError> {
		let provider = self.provider(chain_id)?;
		self.bounded("get_gas_price", provider.get_gas_price()).await
	}

	pub async fn get_balance(&self, chain_id: u64, address: Address) -> Result<U256, DeliveryError> {
		let provider = self.provider(chain_id)?;
		self.bounded("get_balance", provider.get_balance(address))
			.await
	}

	pub async fn get_block_number(&self, chain_id: u64) -> Result<u64, DeliveryError> {
		let provider = self.provider(chain_id)?;
		self.bounded("get_block_number", provider.get_block_number())
			.await
	}

	pub async fn get_block_timestamp(&self, chain_id: u64) -> Result<u64, DeliveryError> {
		let provider = self.provider(chain_id)?;
		self.bounded("get_block_timestamp", provider.get_block_timestamp())
			.await
	}

	/// Checks that the node behind `chain_id` reports the same chain id.
	pub async fn verify_chain_id(&self, chain_id: u64) -> Result<(), DeliveryError> {
		let provider = self.provider(chain_id)?;
		let reported = self
			.bounded("get_chain_id", provider.get_chain_id())
			.await?;
		if reported != chain_id {
			return Err(DeliveryError::Network(format!(
				"RPC endpoint reports chain {} but {} is configured",
				reported, chain_id
			)));
		}
		Ok(())
	}

	pub async fn call(&self, tx: Transaction) -> Result<Bytes, DeliveryError> {
		let provider = self.provider(tx.chain_id)?;
		self.bounded("call", provider.call(tx)).await
	}

	pub async fn get_accounts(&self, chain_id: u64) -> Result<Vec<Address>, DeliveryError> {
		let provider = self.provider(chain_id)?;
		self.bounded("get_accounts", provider.get_accounts()).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::mock::MockDelivery;

	fn service(mock: Arc<MockDelivery>, timeout: Duration) -> DeliveryService {
		let mut providers: HashMap<u64, Arc<dyn DeliveryInterface>> = HashMap::new();
		providers.insert(mock.chain_id(), mock);
		DeliveryService::new(providers, 1, timeout)
	}

	#[tokio::test]
	async fn test_routes_by_chain() {
		let mock = Arc::new(MockDelivery::new(31337));
		let service = service(mock.clone(), Duration::from_secs(5));

		let to = Address::repeat_byte(0x22);
		let hash = service
			.deliver(Transaction::transfer(to, U256::from(10u64), 31337))
			.await
			.unwrap();
		let receipt = service.confirm(31337, &hash).await.unwrap();
		assert!(receipt.success);

		let missing = service
			.deliver(Transaction::transfer(to, U256::from(10u64), 1))
			.await;
		assert!(matches!(missing, Err(DeliveryError::NoProviderAvailable(1))));
		assert_eq!(mock.submitted().len(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_slow_node_times_out() {
		let mock = Arc::new(MockDelivery::new(31337).with_latency(Duration::from_secs(60)));
		let service = service(mock, Duration::from_secs(5));

		let result = service.get_gas_price(31337).await;
		assert!(matches!(result, Err(DeliveryError::Timeout(_))));
	}

	#[tokio::test]
	async fn test_chain_id_mismatch() {
		let mock = Arc::new(MockDelivery::new(31337).with_reported_chain_id(1337));
		let service = service(mock, Duration::from_secs(5));
		assert!(service.verify_chain_id(31337).await.is_err());
	}

	#[test]
	fn test_error_classification() {
		assert!(matches!(
			DeliveryError::from_rpc("send", "insufficient funds for gas * price + value"),
			DeliveryError::InsufficientFunds(_)
		));
		assert!(matches!(
			DeliveryError::from_rpc("send", "nonce too low"),
			DeliveryError::Network(_)
		));
	}
}
