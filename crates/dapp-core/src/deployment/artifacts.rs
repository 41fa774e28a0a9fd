//! Compiled contract artifacts.
//!
//! Hardhat writes one JSON file per contract under
//! `artifacts/<source path>/<Contract>.json`, a sibling `<Contract>.dbg.json`
//! pointing at the build-info file, and `artifacts/build-info/<hash>.json`
//! holding the compiler version and the standard-JSON input.

use super::DeployError;
use alloy_json_abi::JsonAbi;
use async_trait::async_trait;
use dapp_types::Bytes;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Bytecode and interface of one compiled contract.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
	pub contract_name: String,
	/// Source file, e.g. `contracts/UniCharts.sol`.
	pub source_name: String,
	pub abi: JsonAbi,
	pub bytecode: Bytes,
}

impl ContractArtifact {
	/// `source:Contract`, the form explorers expect.
	pub fn fully_qualified_name(&self) -> String {
		format!("{}:{}", self.source_name, self.contract_name)
	}
}

/// Compiler details needed for source verification.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildInfo {
	/// Version string as explorers expect it, e.g. `v0.8.17+commit.8df45f5f`.
	pub compiler_version: String,
	/// Solidity standard-JSON input.
	pub input: String,
}

/// Where contract artifacts come from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
	async fn load(&self, name: &str) -> Result<ContractArtifact, DeployError>;

	/// Compiler details for `artifact`, if recorded.
	async fn build_info(&self, artifact: &ContractArtifact) -> Result<Option<BuildInfo>, DeployError>;
}

/// Artifacts from a hardhat `artifacts/` directory.
pub struct HardhatArtifacts {
	root: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
	build_info: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfoFile {
	solc_long_version: String,
	input: serde_json::Value,
}

impl HardhatArtifacts {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	fn artifact_path(&self, artifact: &ContractArtifact) -> PathBuf {
		self.root
			.join(&artifact.source_name)
			.join(format!("{}.json", artifact.contract_name))
	}

	/// Finds `<name>.json` anywhere under the root, skipping build-info.
	async fn find(&self, name: &str) -> Result<Option<PathBuf>, DeployError> {
		let file_name = format!("{}.json", name);
		let mut pending = vec![self.root.clone()];

		while let Some(dir) = pending.pop() {
			let mut entries = match tokio::fs::read_dir(&dir).await {
				Ok(entries) => entries,
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
				Err(e) => return Err(DeployError::Artifact(format!("{}: {}", dir.display(), e))),
			};

			let mut children = Vec::new();
			while let Some(entry) = entries
				.next_entry()
				.await
				.map_err(|e| DeployError::Artifact(e.to_string()))?
			{
				let path = entry.path();
				let is_dir = entry
					.file_type()
					.await
					.map_err(|e| DeployError::Artifact(e.to_string()))?
					.is_dir();
				if is_dir {
					if entry.file_name() != "build-info" {
						children.push(path);
					}
				} else if entry.file_name().to_string_lossy() == file_name {
					return Ok(Some(path));
				}
			}
			children.sort();
			pending.extend(children.into_iter().rev());
		}

		Ok(None)
	}

	async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, DeployError> {
		let content = tokio::fs::read_to_string(path)
			.await
			.map_err(|e| DeployError::Artifact(format!("{}: {}", path.display(), e)))?;
		serde_json::from_str(&content)
			.map_err(|e| DeployError::Artifact(format!("{}: {}", path.display(), e)))
	}
}

#[async_trait]
impl ArtifactSource for HardhatArtifacts {
	async fn load(&self, name: &str) -> Result<ContractArtifact, DeployError> {
		let path = self
			.find(name)
			.await?
			.ok_or_else(|| DeployError::Artifact(format!("no artifact named {}", name)))?;
		let artifact: ContractArtifact = Self::read_json(&path).await?;

		if artifact.bytecode.is_empty() {
			return Err(DeployError::Artifact(format!(
				"{} has no bytecode (abstract contract or interface?)",
				name
			)));
		}
		tracing::debug!(contract = %name, path = %path.display(), "Loaded artifact");
		Ok(artifact)
	}

	async fn build_info(&self, artifact: &ContractArtifact) -> Result<Option<BuildInfo>, DeployError> {
		let artifact_path = self.artifact_path(artifact);
		let debug_path = artifact_path.with_file_name(format!("{}.dbg.json", artifact.contract_name));
		if tokio::fs::metadata(&debug_path).await.is_err() {
			return Ok(None);
		}

		let debug: DebugFile = Self::read_json(&debug_path).await?;
		let build_info_path = debug_path
			.parent()
			.map(|dir| dir.join(&debug.build_info))
			.ok_or_else(|| DeployError::Artifact("artifact has no parent directory".into()))?;
		let build: BuildInfoFile = Self::read_json(&build_info_path).await?;

		Ok(Some(BuildInfo {
			compiler_version: format!("v{}", build.solc_long_version),
			input: build.input.to_string(),
		}))
	}
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
	//! In-memory artifacts for tests.

	use super::*;
	use std::collections::HashMap;

	#[derive(Default)]
	pub struct StaticArtifacts {
		artifacts: HashMap<String, ContractArtifact>,
	}

	impl StaticArtifacts {
		/// Adds an artifact with dummy init code and the given ABI.
		pub fn with(mut self, name: &str, abi: JsonAbi) -> Self {
			self.artifacts.insert(
				name.to_string(),
				ContractArtifact {
					contract_name: name.to_string(),
					source_name: format!("contracts/{}.sol", name),
					abi,
					bytecode: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
				},
			);
			self
		}
	}

	#[async_trait]
	impl ArtifactSource for StaticArtifacts {
		async fn load(&self, name: &str) -> Result<ContractArtifact, DeployError> {
			self.artifacts
				.get(name)
				.cloned()
				.ok_or_else(|| DeployError::Artifact(format!("no artifact named {}", name)))
		}

		async fn build_info(
			&self,
			_artifact: &ContractArtifact,
		) -> Result<Option<BuildInfo>, DeployError> {
			Ok(Some(BuildInfo {
				compiler_version: "v0.8.17+commit.8df45f5f".to_string(),
				input: "{}".to_string(),
			}))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const ARTIFACT: &str = r#"{
		"_format": "hh-sol-artifact-1",
		"contractName": "YourContract",
		"sourceName": "contracts/YourContract.sol",
		"abi": [{"type": "constructor", "inputs": [], "stateMutability": "nonpayable"}],
		"bytecode": "0x6080604052",
		"deployedBytecode": "0x6080",
		"linkReferences": {},
		"deployedLinkReferences": {}
	}"#;

	async fn write(path: &Path, content: &str) {
		tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
		tokio::fs::write(path, content).await.unwrap();
	}

	#[tokio::test]
	async fn test_load_hardhat_layout() {
		let dir = tempfile::tempdir().unwrap();
		let contract_dir = dir.path().join("contracts/YourContract.sol");
		write(&contract_dir.join("YourContract.json"), ARTIFACT).await;
		write(
			&contract_dir.join("YourContract.dbg.json"),
			r#"{"_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/abc.json"}"#,
		)
		.await;
		write(
			&dir.path().join("build-info/abc.json"),
			r#"{"solcLongVersion": "0.8.17+commit.8df45f5f", "input": {"language": "Solidity"}}"#,
		)
		.await;

		let artifacts = HardhatArtifacts::new(dir.path());
		let artifact = artifacts.load("YourContract").await.unwrap();

		assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);
		assert_eq!(
			artifact.fully_qualified_name(),
			"contracts/YourContract.sol:YourContract"
		);

		let build = artifacts.build_info(&artifact).await.unwrap().unwrap();
		assert_eq!(build.compiler_version, "v0.8.17+commit.8df45f5f");
		assert!(build.input.contains("Solidity"));
	}

	#[tokio::test]
	async fn test_missing_artifact() {
		let dir = tempfile::tempdir().unwrap();
		let result = HardhatArtifacts::new(dir.path()).load("Nope").await;
		assert!(matches!(result, Err(DeployError::Artifact(_))));
	}
}
