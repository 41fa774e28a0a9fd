//! Transaction delivery types.
//!
//! This module defines types related to blockchain transaction submission
//! and monitoring, including the request handed to a signer, transaction hashes,
//! receipts and gas price quotes.

use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_rpc_types::TransactionRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Blockchain transaction hash representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(pub B256);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<B256> for TransactionHash {
	fn from(value: B256) -> Self {
		Self(value)
	}
}

/// Transaction receipt containing execution details.
///
/// Provides information about a transaction after it has been included in a block,
/// including its success status, block number and, for contract-creation
/// transactions, the address of the new contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
	/// Address of the created contract, if any.
	pub contract_address: Option<Address>,
}

/// A transaction request as built by the dispatcher or the deployment orchestrator.
///
/// `to == None` denotes a contract-creation transaction whose `data` carries the
/// init code followed by the ABI-encoded constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
	/// Recipient; `None` for contract creation.
	pub to: Option<Address>,
	/// Native value in wei.
	pub value: U256,
	/// Calldata or init code.
	pub data: Bytes,
	/// Gas price in wei, filled from the current quote.
	pub gas_price: Option<u128>,
	/// Sender, when known ahead of signing.
	pub from: Option<Address>,
	/// Chain the transaction targets.
	pub chain_id: u64,
}

impl Transaction {
	/// Builds a plain value transfer.
	pub fn transfer(to: Address, value: U256, chain_id: u64) -> Self {
		Self {
			to: Some(to),
			value,
			chain_id,
			..Default::default()
		}
	}

	/// Builds a contract call carrying calldata and optional value.
	pub fn call(to: Address, data: Bytes, value: U256, chain_id: u64) -> Self {
		Self {
			to: Some(to),
			value,
			data,
			chain_id,
			..Default::default()
		}
	}

	/// Builds a contract-creation transaction.
	pub fn create(init_code: Bytes, chain_id: u64) -> Self {
		Self {
			to: None,
			data: init_code,
			chain_id,
			..Default::default()
		}
	}

	/// True for a pure value transfer: a recipient, non-zero value and no calldata.
	pub fn is_value_transfer(&self) -> bool {
		self.to.is_some() && self.data.is_empty() && !self.value.is_zero()
	}

	/// True if this transaction creates a contract.
	pub fn is_create(&self) -> bool {
		self.to.is_none()
	}

	/// Returns a copy with the given gas price applied.
	pub fn with_gas_price(mut self, gas_price: u128) -> Self {
		self.gas_price = Some(gas_price);
		self
	}

	/// Returns a copy with the given sender applied.
	pub fn with_from(mut self, from: Address) -> Self {
		self.from = Some(from);
		self
	}
}

impl From<Transaction> for TransactionRequest {
	fn from(tx: Transaction) -> Self {
		TransactionRequest {
			from: tx.from,
			to: Some(tx.to.map_or(TxKind::Create, TxKind::Call)),
			gas_price: tx.gas_price,
			value: Some(tx.value),
			input: tx.data.into(),
			chain_id: Some(tx.chain_id),
			..Default::default()
		}
	}
}

/// A gas price snapshot.
///
/// Quotes are refreshed on a timer and read as snapshots; a quote older than the
/// configured threshold must not be used to price a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPriceQuote {
	/// Gas price in wei.
	pub value: u128,
	/// When the quote was fetched.
	pub fetched_at: Instant,
}

impl GasPriceQuote {
	pub fn new(value: u128) -> Self {
		Self {
			value,
			fetched_at: Instant::now(),
		}
	}

	/// Age of the quote relative to now.
	pub fn age(&self) -> Duration {
		self.fetched_at.elapsed()
	}

	/// Whether the quote exceeded `max_age`.
	pub fn is_stale(&self, max_age: Duration) -> bool {
		self.age() > max_age
	}
}
