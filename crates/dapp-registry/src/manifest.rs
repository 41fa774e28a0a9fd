//! Deployment manifest in the `hardhat_contracts.json` shape.
//!
//! ```json
//! { "31337": { "name": "localhost", "chainId": 31337,
//!              "contracts": { "YourContract": { "address": "0x..", "abi": [..] } } } }
//! ```

use crate::RegistryError;
use alloy_json_abi::JsonAbi;
use dapp_types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One contract entry: where it lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestContract {
	pub address: Address,
	#[serde(default)]
	pub abi: JsonAbi,
}

/// Contracts deployed on one chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDeployment {
	#[serde(default)]
	pub name: String,
	pub chain_id: u64,
	#[serde(default)]
	pub contracts: BTreeMap<String, ManifestContract>,
}

/// Chain id to deployed contracts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentManifest {
	chains: BTreeMap<u64, ChainDeployment>,
}

impl DeploymentManifest {
	/// Reads a manifest file. A missing file is an empty manifest.
	pub async fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
		let path = path.as_ref();
		let content = match tokio::fs::read_to_string(path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(path = %path.display(), "No manifest yet");
				return Ok(Self::default());
			},
			Err(e) => return Err(RegistryError::Io(format!("{}: {}", path.display(), e))),
		};
		Self::from_json(&content)
	}

	pub fn from_json(content: &str) -> Result<Self, RegistryError> {
		serde_json::from_str(content).map_err(|e| RegistryError::Manifest(e.to_string()))
	}

	/// Writes the manifest, replacing the file atomically.
	pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
		let path = path.as_ref();
		let json = serde_json::to_string_pretty(self)
			.map_err(|e| RegistryError::Manifest(e.to_string()))?;

		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent)
				.await
				.map_err(|e| RegistryError::Io(e.to_string()))?;
		}
		let staging = path.with_extension("json.tmp");
		tokio::fs::write(&staging, json)
			.await
			.map_err(|e| RegistryError::Io(e.to_string()))?;
		tokio::fs::rename(&staging, path)
			.await
			.map_err(|e| RegistryError::Io(e.to_string()))
	}

	pub fn contract(&self, name: &str, chain_id: u64) -> Option<&ManifestContract> {
		self.chains.get(&chain_id)?.contracts.get(name)
	}

	pub fn chain(&self, chain_id: u64) -> Option<&ChainDeployment> {
		self.chains.get(&chain_id)
	}

	/// Adds or replaces a contract entry.
	pub fn insert(
		&mut self,
		chain_id: u64,
		network_name: &str,
		contract_name: &str,
		contract: ManifestContract,
	) {
		let chain = self.chains.entry(chain_id).or_insert_with(|| ChainDeployment {
			name: network_name.to_string(),
			chain_id,
			contracts: BTreeMap::new(),
		});
		chain.contracts.insert(contract_name.to_string(), contract);
	}

	pub fn is_empty(&self) -> bool {
		self.chains.values().all(|chain| chain.contracts.is_empty())
	}
}
