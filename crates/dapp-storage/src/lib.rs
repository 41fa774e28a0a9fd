//! Storage module for the dApp toolkit.
//!
//! A small key-value abstraction used as the deployment record ledger. Keys are
//! namespaced as `namespace:id` and values are stored as JSON.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
}

/// Low-level interface for storage backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists keys starting with `prefix`, sorted.
	async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Typed storage on top of a [`StorageInterface`] backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&Self::key(namespace, id), bytes).await
	}

	/// Retrieves and deserializes a value.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves every value in a namespace, ordered by key.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<T>, StorageError> {
		let prefix = format!("{}:", namespace);
		let mut values = Vec::new();
		for key in self.backend.keys_with_prefix(&prefix).await? {
			let bytes = self.backend.get_bytes(&key).await?;
			values.push(
				serde_json::from_slice(&bytes)
					.map_err(|e| StorageError::Serialization(e.to_string()))?,
			);
		}
		Ok(values)
	}

	/// Replaces an existing value; fails with `NotFound` if absent.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = Self::key(namespace, id);
		if !self.backend.exists(&key).await? {
			return Err(StorageError::NotFound);
		}

		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use dapp_types::{
		Address, DeploymentRecord, StorageKey, TransactionHash, VerificationState, B256,
	};

	fn record(name: &str, chain_id: u64) -> DeploymentRecord {
		DeploymentRecord {
			contract_name: name.to_string(),
			address: Address::repeat_byte(0x42),
			chain_id,
			tx_hash: TransactionHash(B256::repeat_byte(0x01)),
			verification_state: VerificationState::Deployed,
		}
	}

	#[tokio::test]
	async fn test_update_requires_existing() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		let ns = StorageKey::Deployments.as_str();
		let token = record("Token", 1);

		let result = storage.update(ns, &token.key(), &token).await;
		assert!(matches!(result, Err(StorageError::NotFound)));

		storage.store(ns, &token.key(), &token).await.unwrap();
		let mut verified = token.clone();
		verified.verification_state = VerificationState::Verified;
		storage.update(ns, &token.key(), &verified).await.unwrap();

		let loaded: DeploymentRecord = storage.retrieve(ns, &token.key()).await.unwrap();
		assert_eq!(loaded.verification_state, VerificationState::Verified);
	}

	#[tokio::test]
	async fn test_retrieve_all_is_namespaced() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		let ns = StorageKey::Deployments.as_str();

		for rec in [record("B", 1), record("A", 1)] {
			storage.store(ns, &rec.key(), &rec).await.unwrap();
		}
		storage.store("other", "x", &1u32).await.unwrap();

		let all: Vec<DeploymentRecord> = storage.retrieve_all(ns).await.unwrap();
		let names: Vec<_> = all.iter().map(|r| r.contract_name.as_str()).collect();
		assert_eq!(names, vec!["A", "B"]);
	}
}
