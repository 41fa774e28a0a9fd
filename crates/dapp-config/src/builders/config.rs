//! Configuration builder for tests and local development.
//!
//! Produces a configuration targeting a single local hardhat network, bypassing file
//! loading. Validation still applies when [`ConfigBuilder::build`] is called.

use crate::{
	AppConfig, Config, ConfigError, DeploymentConfig, GasConfig, RpcConfig, VerifierConfig,
	WalletConfig,
};
use dapp_types::{ContractSpec, NetworkDescriptor, NetworksConfig};

/// Fluent builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	app_name: String,
	target_network: String,
	debug_transactions: bool,
	networks: NetworksConfig,
	deployment: DeploymentConfig,
	verifier: VerifierConfig,
	gas: GasConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// A local-only configuration on `http://localhost:8545`.
	pub fn new() -> Self {
		let mut networks = NetworksConfig::new();
		networks.insert(
			"localhost".to_string(),
			NetworkDescriptor::local(31337, "http://localhost:8545"),
		);

		Self {
			app_name: "test-app".to_string(),
			target_network: "localhost".to_string(),
			debug_transactions: false,
			networks,
			deployment: DeploymentConfig {
				manifest_path: "deployments/hardhat_contracts.json".to_string(),
				external_manifest_path: None,
				artifacts_dir: "artifacts".to_string(),
				settle_delay_seconds: 0,
				min_confirmations: 1,
				deployer_private_key: None,
				contracts: Vec::new(),
			},
			verifier: VerifierConfig::default(),
			gas: GasConfig::default(),
		}
	}

	pub fn debug_transactions(mut self, enabled: bool) -> Self {
		self.debug_transactions = enabled;
		self
	}

	/// Adds a network and makes it the target.
	pub fn target(mut self, name: &str, network: NetworkDescriptor) -> Self {
		self.networks.insert(name.to_string(), network);
		self.target_network = name.to_string();
		self
	}

	pub fn contract(mut self, contract: ContractSpec) -> Self {
		self.deployment.contracts.push(contract);
		self
	}

	pub fn manifest_path(mut self, path: impl Into<String>) -> Self {
		self.deployment.manifest_path = path.into();
		self
	}

	pub fn verifier(mut self, verifier: VerifierConfig) -> Self {
		self.verifier = verifier;
		self
	}

	/// Builds and validates the configuration.
	pub fn build(self) -> Result<Config, ConfigError> {
		let config = Config {
			app: AppConfig {
				name: self.app_name,
				target_network: self.target_network,
				debug_transactions: self.debug_transactions,
			},
			networks: self.networks,
			rpc: RpcConfig::default(),
			deployment: self.deployment,
			verifier: self.verifier,
			gas: self.gas,
			wallet: WalletConfig::default(),
		};
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_builder_is_valid() {
		let config = ConfigBuilder::new()
			.debug_transactions(true)
			.contract(ContractSpec::new("YourContract"))
			.build()
			.unwrap();

		assert!(config.app.debug_transactions);
		assert!(config.target_network().unwrap().is_dev());
	}
}
