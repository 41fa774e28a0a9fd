//! Account management module for the dApp toolkit.
//!
//! Accounts own key material: the deployer key, the development burner key and the
//! optional local funding key. Delivery implementations obtain an alloy wallet from
//! them to sign transactions.

use alloy_network::EthereumWallet;
use async_trait::async_trait;
use dapp_types::Address;
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

pub use implementations::local::LocalAccount;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// Error that occurs when signing operations fail.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Interface for account implementations.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Address controlled by this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs an arbitrary message (EIP-191), returning the 65-byte signature.
	async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, AccountError>;

	/// Wallet used by delivery to sign and send transactions.
	fn wallet(&self) -> EthereumWallet;
}

/// Service wrapping an account implementation.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	pub async fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, AccountError> {
		self.implementation.sign_message(message).await
	}

	pub fn wallet(&self) -> EthereumWallet {
		self.implementation.wallet()
	}
}
