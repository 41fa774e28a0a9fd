//! Deployment inputs and records.
//!
//! A [`ContractSpec`] describes what to deploy; a [`DeploymentRecord`] is created once
//! the contract is on-chain and only its [`VerificationState`] evolves afterwards.

use crate::TransactionHash;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Input describing one contract to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
	/// Contract name; also the key in the deployment manifest.
	pub name: String,
	/// Artifact name to load bytecode and ABI from. Defaults to `name`.
	#[serde(default)]
	pub artifact: Option<String>,
	/// Fully qualified source reference, e.g. `contracts/Token.sol:Token`.
	#[serde(default)]
	pub source: Option<String>,
	/// Constructor arguments in declaration order.
	///
	/// `{deployer}` expands to the deploying account and `{Name}` to the address of
	/// an already deployed dependency.
	#[serde(default, rename = "args")]
	pub constructor_args: Vec<String>,
	/// Names of contracts that must be deployed first.
	#[serde(default)]
	pub dependencies: BTreeSet<String>,
	/// Calls made on the new contract, in order, before it counts as deployed.
	#[serde(default)]
	pub post_deploy: Vec<PostDeployCall>,
}

/// A function called on a freshly deployed contract, e.g. `pause(false)`.
///
/// Arguments take the same placeholders as constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDeployCall {
	pub function: String,
	#[serde(default)]
	pub args: Vec<String>,
}

impl ContractSpec {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			artifact: None,
			source: None,
			constructor_args: Vec::new(),
			dependencies: BTreeSet::new(),
			post_deploy: Vec::new(),
		}
	}

	pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.dependencies = deps.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.constructor_args = args.into_iter().map(Into::into).collect();
		self
	}

	/// Appends a call made right after deployment.
	pub fn with_post_deploy<I, S>(mut self, function: impl Into<String>, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.post_deploy.push(PostDeployCall {
			function: function.into(),
			args: args.into_iter().map(Into::into).collect(),
		});
		self
	}

	pub fn with_source(mut self, source: impl Into<String>) -> Self {
		self.source = Some(source.into());
		self
	}

	/// Artifact name, falling back to the contract name.
	pub fn artifact_name(&self) -> &str {
		self.artifact.as_deref().unwrap_or(&self.name)
	}
}

/// Verification lifecycle of a deployed contract.
///
/// Transitions only move forward:
/// `Pending -> Deployed -> (Skipped | VerificationPending -> Verified | VerificationFailed)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationState {
	Pending,
	Deployed,
	Skipped,
	VerificationPending,
	Verified,
	VerificationFailed(String),
}

impl VerificationState {
	/// No further transition is possible from a final state.
	pub fn is_final(&self) -> bool {
		matches!(
			self,
			Self::Skipped | Self::Verified | Self::VerificationFailed(_)
		)
	}
}

impl fmt::Display for VerificationState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Pending => write!(f, "pending"),
			Self::Deployed => write!(f, "deployed"),
			Self::Skipped => write!(f, "skipped"),
			Self::VerificationPending => write!(f, "verification pending"),
			Self::Verified => write!(f, "verified"),
			Self::VerificationFailed(reason) => write!(f, "verification failed: {}", reason),
		}
	}
}

/// A contract that made it on-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
	pub contract_name: String,
	pub address: Address,
	pub chain_id: u64,
	pub tx_hash: TransactionHash,
	pub verification_state: VerificationState,
}

impl DeploymentRecord {
	/// Storage key unique per (contract, chain).
	pub fn key(&self) -> String {
		record_key(&self.contract_name, self.chain_id)
	}
}

/// Builds the storage key used for a record.
pub fn record_key(contract_name: &str, chain_id: u64) -> String {
	format!("{}:{}", chain_id, contract_name)
}

/// Storage namespaces used by the toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
	/// Deployment records keyed by `chain_id:name`.
	Deployments,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Deployments => "deployments",
		}
	}
}
