//! In-process delivery used by tests across the workspace.
//!
//! Every submission is mined immediately. Contract creations get deterministic
//! addresses derived from the submission index.

use crate::{DeliveryError, DeliveryInterface};
use async_trait::async_trait;
use dapp_types::{Address, Bytes, Transaction, TransactionHash, TransactionReceipt, B256, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scriptable [`DeliveryInterface`].
pub struct MockDelivery {
	chain_id: u64,
	reported_chain_id: u64,
	gas_price: u128,
	accounts: Vec<Address>,
	latency: Option<Duration>,
	fail_submit_at: Option<usize>,
	revert_submit_at: Option<usize>,
	call_result: Bytes,
	calls: AtomicUsize,
	submitted: Mutex<Vec<Transaction>>,
	receipts: Mutex<HashMap<TransactionHash, TransactionReceipt>>,
}

impl MockDelivery {
	pub fn new(chain_id: u64) -> Self {
		Self {
			chain_id,
			reported_chain_id: chain_id,
			gas_price: 1_000_000_000,
			accounts: vec![Address::repeat_byte(0xf3)],
			latency: None,
			fail_submit_at: None,
			revert_submit_at: None,
			call_result: Bytes::new(),
			calls: AtomicUsize::new(0),
			submitted: Mutex::new(Vec::new()),
			receipts: Mutex::new(HashMap::new()),
		}
	}

	pub fn with_gas_price(mut self, gas_price: u128) -> Self {
		self.gas_price = gas_price;
		self
	}

	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);
		self
	}

	pub fn with_reported_chain_id(mut self, chain_id: u64) -> Self {
		self.reported_chain_id = chain_id;
		self
	}

	/// Makes the `index`-th submission (0-based) fail at broadcast.
	pub fn failing_submit_at(mut self, index: usize) -> Self {
		self.fail_submit_at = Some(index);
		self
	}

	/// Makes the `index`-th submission (0-based) mine with a reverted status.
	pub fn reverting_submit_at(mut self, index: usize) -> Self {
		self.revert_submit_at = Some(index);
		self
	}

	pub fn with_call_result(mut self, result: Bytes) -> Self {
		self.call_result = result;
		self
	}

	/// Address the `index`-th submission creates, if it is a contract creation.
	pub fn created_address(index: usize) -> Address {
		Address::from_word(B256::from(U256::from(0xc0de_0000u64 + index as u64)))
	}

	/// Transactions handed to `submit`, in order.
	pub fn submitted(&self) -> Vec<Transaction> {
		self.submitted
			.lock()
			.map(|txs| txs.clone())
			.unwrap_or_default()
	}

	/// Total number of interface calls made.
	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	async fn touch(&self) {
		self.calls.fetch_add(1, Ordering::SeqCst);
		if let Some(latency) = self.latency {
			tokio::time::sleep(latency).await;
		}
	}
}

#[async_trait]
impl DeliveryInterface for MockDelivery {
	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		self.touch().await;
		let mut submitted = self
			.submitted
			.lock()
			.map_err(|e| DeliveryError::Network(e.to_string()))?;
		let index = submitted.len();
		if self.fail_submit_at == Some(index) {
			return Err(DeliveryError::Network("nonce too low".to_string()));
		}

		let hash = TransactionHash(B256::from(U256::from(index as u64 + 1)));
		let receipt = TransactionReceipt {
			hash,
			block_number: index as u64 + 1,
			success: self.revert_submit_at != Some(index),
			contract_address: tx.is_create().then(|| Self::created_address(index)),
		};
		submitted.push(tx);
		self.receipts
			.lock()
			.map_err(|e| DeliveryError::Network(e.to_string()))?
			.insert(hash, receipt);
		Ok(hash)
	}

	async fn wait_for_confirmation(
		&self,
		hash: &TransactionHash,
		_confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		self.get_receipt(hash)
			.await?
			.ok_or_else(|| DeliveryError::TransactionFailed(format!("unknown tx {}", hash)))
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		self.touch().await;
		Ok(self
			.receipts
			.lock()
			.map_err(|e| DeliveryError::Network(e.to_string()))?
			.get(hash)
			.cloned())
	}

	async fn get_gas_price(&self) -> Result<u128, DeliveryError> {
		self.touch().await;
		Ok(self.gas_price)
	}

	async fn get_balance(&self, _address: Address) -> Result<U256, DeliveryError> {
		self.touch().await;
		Ok(U256::from(10u64).pow(U256::from(18u64)))
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		self.touch().await;
		Ok(self.submitted().len() as u64)
	}

	async fn get_block_timestamp(&self) -> Result<u64, DeliveryError> {
		self.touch().await;
		Ok(1_700_000_000)
	}

	async fn get_chain_id(&self) -> Result<u64, DeliveryError> {
		self.touch().await;
		Ok(self.reported_chain_id)
	}

	async fn call(&self, _tx: Transaction) -> Result<Bytes, DeliveryError> {
		self.touch().await;
		Ok(self.call_result.clone())
	}

	async fn get_accounts(&self) -> Result<Vec<Address>, DeliveryError> {
		self.touch().await;
		Ok(self.accounts.clone())
	}
}
