//! Alloy-backed delivery over HTTP JSON-RPC.

use crate::failover::Failover;
use crate::{DeliveryError, DeliveryInterface};
use alloy_network::EthereumWallet;
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::{BlockNumberOrTag, BlockTransactionsKind, TransactionRequest};
use alloy_transport_http::Http;
use async_trait::async_trait;
use dapp_types::{
	truncate_id, NetworkDescriptor, Transaction, TransactionHash, TransactionReceipt,
};
use std::sync::Arc;
use std::time::Duration;

type DynProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Delivery for one EVM network through alloy providers.
///
/// With a wallet attached, transactions are signed locally; otherwise they are sent
/// with `eth_sendTransaction` for the node to sign. Every configured RPC url gets
/// its own provider and unreachable endpoints fail over to the next one.
pub struct AlloyDelivery {
	chain_id: u64,
	providers: Failover<DynProvider>,
	poll_interval: Duration,
	/// Deadline for a single confirmation wait.
	confirmation_timeout: Duration,
}

impl AlloyDelivery {
	pub fn new(
		network: &NetworkDescriptor,
		wallet: Option<EthereumWallet>,
	) -> Result<Self, DeliveryError> {
		let providers = network
			.rpc_urls()
			.map(|rpc_url| {
				let url = rpc_url.parse().map_err(|e| {
					DeliveryError::Network(format!("Invalid RPC URL {}: {}", rpc_url, e))
				})?;
				let provider: DynProvider = match wallet.clone() {
					Some(wallet) => Arc::new(
						ProviderBuilder::new()
							.with_recommended_fillers()
							.wallet(wallet)
							.on_http(url),
					),
					None => Arc::new(ProviderBuilder::new().with_recommended_fillers().on_http(url)),
				};
				Ok((rpc_url.to_string(), provider))
			})
			.collect::<Result<Vec<_>, DeliveryError>>()?;

		// Dev nodes mine instantly; public networks take a block or more
		let (poll_interval, confirmation_timeout) = if network.is_dev() {
			(Duration::from_millis(500), Duration::from_secs(60))
		} else {
			(Duration::from_secs(7), Duration::from_secs(1800))
		};

		Ok(Self {
			chain_id: network.chain_id,
			providers: Failover::new(providers)?,
			poll_interval,
			confirmation_timeout,
		})
	}

	fn to_receipt(receipt: &alloy_rpc_types::TransactionReceipt) -> TransactionReceipt {
		TransactionReceipt {
			hash: TransactionHash(receipt.transaction_hash),
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
			contract_address: receipt.contract_address,
		}
	}

	async fn fetch_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<alloy_rpc_types::TransactionReceipt>, DeliveryError> {
		let hash = hash.0;
		self.providers
			.run(|provider| async move {
				provider
					.get_transaction_receipt(hash)
					.await
					.map_err(|e| DeliveryError::from_rpc("Failed to get receipt", e))
			})
			.await
	}

	async fn block_number(&self) -> Result<u64, DeliveryError> {
		self.providers
			.run(|provider| async move {
				provider
					.get_block_number()
					.await
					.map_err(|e| DeliveryError::from_rpc("Failed to get block number", e))
			})
			.await
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		let is_create = tx.is_create();
		let request: TransactionRequest = tx.into();

		let hash = self
			.providers
			.run(|provider| {
				let request = request.clone();
				async move {
					let pending = provider
						.send_transaction(request)
						.await
						.map_err(|e| DeliveryError::from_rpc("Failed to send transaction", e))?;
					Ok(TransactionHash(*pending.tx_hash()))
				}
			})
			.await?;

		tracing::info!(
			tx_hash = %truncate_id(&hash.to_string()),
			chain_id = self.chain_id,
			rpc_url = %self.providers.active_url(),
			is_create,
			"Submitted transaction"
		);
		Ok(hash)
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		let started = tokio::time::Instant::now();
		tracing::debug!(
			tx_hash = %truncate_id(&hash.to_string()),
			confirmations,
			timeout_secs = self.confirmation_timeout.as_secs(),
			"Waiting for confirmations"
		);

		loop {
			if started.elapsed() > self.confirmation_timeout {
				return Err(DeliveryError::Timeout(format!(
					"Waiting for {} confirmations of {} exceeded {}s",
					confirmations,
					hash,
					self.confirmation_timeout.as_secs()
				)));
			}

			let receipt = match self.fetch_receipt(hash).await? {
				Some(receipt) => receipt,
				None => {
					tokio::time::sleep(self.poll_interval).await;
					continue;
				},
			};

			let current_block = self.block_number().await?;

			// The inclusion block counts as the first confirmation
			let tx_block = receipt.block_number.unwrap_or(current_block);
			let current_confirmations = current_block.saturating_sub(tx_block) + 1;
			if current_confirmations >= confirmations {
				return Ok(Self::to_receipt(&receipt));
			}

			tracing::debug!(
				remaining = confirmations - current_confirmations,
				"Waiting for more confirmations"
			);
			tokio::time::sleep(self.poll_interval).await;
		}
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		Ok(self.fetch_receipt(hash).await?.as_ref().map(Self::to_receipt))
	}

	async fn get_gas_price(&self) -> Result<u128, DeliveryError> {
		self.providers
			.run(|provider| async move {
				provider
					.get_gas_price()
					.await
					.map_err(|e| DeliveryError::from_rpc("Failed to get gas price", e))
			})
			.await
	}

	async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError> {
		self.providers
			.run(|provider| async move {
				provider
					.get_balance(address)
					.await
					.map_err(|e| DeliveryError::from_rpc("Failed to get balance", e))
			})
			.await
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		self.block_number().await
	}

	async fn get_block_timestamp(&self) -> Result<u64, DeliveryError> {
		let block = self
			.providers
			.run(|provider| async move {
				provider
					.get_block_by_number(BlockNumberOrTag::Latest, BlockTransactionsKind::Hashes)
					.await
					.map_err(|e| DeliveryError::from_rpc("Failed to get block", e))
			})
			.await?
			.ok_or_else(|| DeliveryError::Network("Latest block not found".to_string()))?;
		Ok(block.header.timestamp)
	}

	async fn get_chain_id(&self) -> Result<u64, DeliveryError> {
		self.providers
			.run(|provider| async move {
				provider
					.get_chain_id()
					.await
					.map_err(|e| DeliveryError::from_rpc("Failed to get chain id", e))
			})
			.await
	}

	async fn call(&self, tx: Transaction) -> Result<Bytes, DeliveryError> {
		let request: TransactionRequest = tx.into();
		self.providers
			.run(|provider| {
				let request = request.clone();
				async move {
					provider
						.call(&request)
						.await
						.map_err(|e| DeliveryError::from_rpc("eth_call failed", e))
				}
			})
			.await
	}

	async fn get_accounts(&self) -> Result<Vec<Address>, DeliveryError> {
		self.providers
			.run(|provider| async move {
				provider
					.get_accounts()
					.await
					.map_err(|e| DeliveryError::from_rpc("Failed to list accounts", e))
			})
			.await
	}
}
