//! Contract registry for the dApp toolkit.
//!
//! Resolves a contract name on a chain to its address and ABI, looking in the
//! manifest written by deployments first and in the external manifest second.
//! A missing contract is an absent result, not an error.

use dapp_delivery::DeliveryService;
use dapp_wallet::SessionHandle;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub mod handle;
pub mod manifest;

pub use handle::{Binding, ContractHandle, PendingCall};
pub use manifest::{ChainDeployment, DeploymentManifest, ManifestContract};

/// Errors that can occur while loading manifests or using contract handles.
#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("IO error: {0}")]
	Io(String),
	#[error("Invalid manifest: {0}")]
	Manifest(String),
	#[error("{contract} has no function {function} with that arity")]
	UnknownFunction { contract: String, function: String },
	#[error("ABI encoding error: {0}")]
	Encoding(String),
	#[error("Call failed: {0}")]
	Call(String),
	/// Writes need a signer-bound handle.
	#[error("Handle for {0} is read-only")]
	ReadOnlyHandle(String),
	#[error("Handle for {0} has no read connection")]
	NoReader(String),
}

/// Name and chain lookup over the deployed and external manifests.
pub struct ContractRegistry {
	deployed: DeploymentManifest,
	external: DeploymentManifest,
	reader: Option<Arc<DeliveryService>>,
}

impl ContractRegistry {
	pub fn new(deployed: DeploymentManifest, external: DeploymentManifest) -> Self {
		Self {
			deployed,
			external,
			reader: None,
		}
	}

	/// Loads both manifests from disk; missing files are empty.
	pub async fn load(
		manifest_path: impl AsRef<Path>,
		external_path: Option<&Path>,
	) -> Result<Self, RegistryError> {
		let deployed = DeploymentManifest::load(manifest_path).await?;
		let external = match external_path {
			Some(path) => DeploymentManifest::load(path).await?,
			None => DeploymentManifest::default(),
		};
		Ok(Self::new(deployed, external))
	}

	/// Connection signer-bound handles use for reads.
	pub fn with_reader(mut self, reader: Arc<DeliveryService>) -> Self {
		self.reader = Some(reader);
		self
	}

	pub fn lookup(&self, name: &str, chain_id: u64) -> Option<&ManifestContract> {
		self.deployed
			.contract(name, chain_id)
			.or_else(|| self.external.contract(name, chain_id))
	}

	/// Resolves `name` on `chain_id` and binds it.
	pub fn resolve(&self, name: &str, chain_id: u64, binding: Binding) -> Option<ContractHandle> {
		let Some(entry) = self.lookup(name, chain_id) else {
			tracing::debug!(contract = %name, chain_id, "Contract not in any manifest");
			return None;
		};

		Some(ContractHandle::new(
			name,
			entry.address,
			chain_id,
			entry.abi.clone(),
			binding,
			self.reader.clone(),
		))
	}

	/// Resolves against the current session snapshot: its chain and its signer.
	///
	/// Absent when no session is connected.
	pub fn resolve_for_session(&self, name: &str, session: &SessionHandle) -> Option<ContractHandle> {
		let snapshot = session.current();
		let (signer, chain_id) = (snapshot.signer.clone()?, snapshot.chain_id?);
		self.resolve(name, chain_id, Binding::Signer(signer))
	}
}
