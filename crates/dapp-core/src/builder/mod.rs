//! Assembles toolkit components from configuration.
//!
//! Each component is built on demand so a command only opens the connections it
//! needs. Every network-bound piece gets the configured RPC timeout.

use crate::deployment::artifacts::HardhatArtifacts;
use crate::deployment::{DeploymentOrchestrator, OrchestratorSettings};
use crate::dispatch::{Dispatcher, FaucetTransactor, GasPriceOracle, TransactionMonitor};
use crate::state::RecordStateMachine;
use dapp_account::{AccountService, LocalAccount};
use dapp_config::Config;
use dapp_delivery::implementations::evm::alloy::AlloyDelivery;
use dapp_delivery::{DeliveryInterface, DeliveryService};
use dapp_registry::{ContractRegistry, DeploymentManifest};
use dapp_storage::implementations::memory::MemoryStorage;
use dapp_storage::StorageService;
use dapp_types::{Address, EventBus, NetworkDescriptor, SecretString};
use dapp_verifier::implementations::etherscan::EtherscanVerifier;
use dapp_verifier::VerificationService;
use dapp_wallet::implementations::burner::{BurnerConnector, BurnerWallet};
use dapp_wallet::{SessionHandle, WalletSessionManager};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while assembling components.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Builds deployment, registry, wallet and dispatch components from a [`Config`].
pub struct DappBuilder {
	config: Config,
	events: EventBus,
}

impl DappBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			events: EventBus::default(),
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Bus shared by every component this builder creates.
	pub fn events(&self) -> &EventBus {
		&self.events
	}

	fn rpc_timeout(&self) -> Duration {
		Duration::from_secs(self.config.rpc.timeout_seconds)
	}

	fn network(&self, name: &str) -> Result<&NetworkDescriptor, BuilderError> {
		self.config
			.network(name)
			.ok_or_else(|| BuilderError::Config(format!("Unknown network '{}'", name)))
	}

	fn delivery_service(
		&self,
		providers: HashMap<u64, Arc<dyn DeliveryInterface>>,
	) -> Arc<DeliveryService> {
		Arc::new(DeliveryService::new(
			providers,
			self.config.deployment.min_confirmations,
			self.rpc_timeout(),
		))
	}

	/// Delivery for one network, signing with `key` when given.
	///
	/// Without a key the node signs (`eth_sendTransaction`), which only works for
	/// unlocked development accounts. Returns the service and the sending address.
	async fn signing_delivery(
		&self,
		network: &NetworkDescriptor,
		key: Option<&SecretString>,
		role: &str,
	) -> Result<(Arc<DeliveryService>, Address), BuilderError> {
		let (implementation, sender) = match key {
			Some(key) => {
				let account = AccountService::new(Box::new(
					LocalAccount::from_secret(key)
						.map_err(|e| BuilderError::Config(format!("{} key: {}", role, e)))?,
				));
				let address = account
					.get_address()
					.await
					.map_err(|e| BuilderError::Config(e.to_string()))?;
				let delivery = AlloyDelivery::new(network, Some(account.wallet()))
					.map_err(|e| BuilderError::Config(e.to_string()))?;
				(delivery, Some(address))
			},
			None if network.is_dev() => (
				AlloyDelivery::new(network, None).map_err(|e| BuilderError::Config(e.to_string()))?,
				None,
			),
			None => {
				return Err(BuilderError::MissingComponent(format!(
					"{} private key for chain {}",
					role, network.chain_id
				)))
			},
		};

		let mut providers: HashMap<u64, Arc<dyn DeliveryInterface>> = HashMap::new();
		providers.insert(network.chain_id, Arc::new(implementation));
		let service = self.delivery_service(providers);

		let sender = match sender {
			Some(address) => address,
			None => service
				.get_accounts(network.chain_id)
				.await
				.map_err(|e| BuilderError::Config(e.to_string()))?
				.into_iter()
				.next()
				.ok_or_else(|| {
					BuilderError::MissingComponent(format!(
						"unlocked {} account on chain {}",
						role, network.chain_id
					))
				})?,
		};
		tracing::debug!(role, chain_id = network.chain_id, address = %sender, "Sender resolved");
		Ok((service, sender))
	}

	/// Read-only delivery covering every configured network.
	pub fn read_delivery(&self) -> Result<Arc<DeliveryService>, BuilderError> {
		let mut providers: HashMap<u64, Arc<dyn DeliveryInterface>> = HashMap::new();
		for network in self.config.networks.values() {
			let delivery = AlloyDelivery::new(network, None)
				.map_err(|e| BuilderError::Config(e.to_string()))?;
			providers.insert(network.chain_id, Arc::new(delivery));
		}
		Ok(self.delivery_service(providers))
	}

	/// Verification for `network`, if it is public and has an explorer API.
	fn verifier(
		&self,
		network: &NetworkDescriptor,
	) -> Result<Option<Arc<VerificationService>>, BuilderError> {
		if network.is_dev() {
			return Ok(None);
		}
		let (Some(api_url), Some(api_key)) =
			(&network.explorer_api_url, &self.config.verifier.api_key)
		else {
			tracing::warn!(
				chain_id = network.chain_id,
				"No explorer API or key, deployments will not be verified"
			);
			return Ok(None);
		};

		let settings = &self.config.verifier;
		let explorer = EtherscanVerifier::new(
			api_url.clone(),
			api_key.clone(),
			Duration::from_secs(settings.timeout_seconds),
			Duration::from_secs(settings.poll_interval_seconds),
			settings.max_status_polls,
		)
		.map_err(|e| BuilderError::Config(e.to_string()))?;

		Ok(Some(Arc::new(VerificationService::new(
			Arc::new(explorer),
			settings.retry_policy(),
			settings.attempt_timeout(),
		))))
	}

	/// Orchestrator deploying to the named network.
	pub async fn build_orchestrator(
		&self,
		network_name: &str,
	) -> Result<DeploymentOrchestrator, BuilderError> {
		let network = self.network(network_name)?;
		let deployment = &self.config.deployment;
		let verifier = self.verifier(network)?;

		let (delivery, deployer) = self
			.signing_delivery(network, deployment.deployer_private_key.as_ref(), "deployer")
			.await?;

		let manifest = DeploymentManifest::load(&deployment.manifest_path)
			.await
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		let records = Arc::new(RecordStateMachine::new(Arc::new(StorageService::new(
			Box::new(MemoryStorage::new()),
		))));

		let mut orchestrator = DeploymentOrchestrator::new(
			delivery,
			Arc::new(HardhatArtifacts::new(&deployment.artifacts_dir)),
			records,
			self.events.clone(),
			deployer,
			OrchestratorSettings {
				settle_delay: Duration::from_secs(deployment.settle_delay_seconds),
				max_concurrent_verifications: self.config.verifier.max_concurrent,
				manifest_path: Some(deployment.manifest_path.clone().into()),
			},
		)
		.with_manifest(manifest);
		if let Some(verifier) = verifier {
			orchestrator = orchestrator.with_verifier(verifier);
		}

		tracing::info!(
			network = %network_name,
			chain_id = network.chain_id,
			deployer = %deployer,
			"Deployment orchestrator ready"
		);
		Ok(orchestrator)
	}

	/// Registry over the deployment and external manifests.
	pub async fn build_registry(
		&self,
		reader: Arc<DeliveryService>,
	) -> Result<ContractRegistry, BuilderError> {
		let deployment = &self.config.deployment;
		let registry = ContractRegistry::load(
			&deployment.manifest_path,
			deployment.external_manifest_path.as_deref().map(Path::new),
		)
		.await
		.map_err(|e| BuilderError::Config(e.to_string()))?;
		Ok(registry.with_reader(reader))
	}

	/// Session manager connecting a burner wallet on the target network.
	///
	/// Uses the configured burner key or a fresh random one.
	pub fn build_session_manager(&self) -> Result<WalletSessionManager, BuilderError> {
		let network = self
			.config
			.target_network()
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		let account = match &self.config.wallet.burner_private_key {
			Some(key) => {
				LocalAccount::from_secret(key).map_err(|e| BuilderError::Config(e.to_string()))?
			},
			None => LocalAccount::random(),
		};
		let burner = BurnerWallet::for_network(account, network)
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		tracing::info!(address = %burner.address(), chain_id = network.chain_id, "Burner wallet ready");

		Ok(WalletSessionManager::spawn(
			Arc::new(BurnerConnector::new(Arc::new(burner))),
			self.events.clone(),
			Duration::from_secs(self.config.wallet.connect_timeout_seconds),
		))
	}

	/// Dispatcher for `session`.
	///
	/// Gas is quoted on the target network. With `debug_transactions` on, value
	/// transfers are funded from the local network; otherwise no funding path is
	/// built at all.
	pub async fn build_dispatcher(
		&self,
		session: SessionHandle,
		reader: Arc<DeliveryService>,
	) -> Result<Dispatcher, BuilderError> {
		let target = self
			.config
			.target_network()
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		let gas = Arc::new(GasPriceOracle::spawn(
			reader.clone(),
			target.chain_id,
			Duration::from_secs(self.config.gas.refresh_interval_seconds),
			Duration::from_secs(self.config.gas.max_age_seconds),
		));
		let monitor = Arc::new(TransactionMonitor::new(
			reader,
			self.events.clone(),
			Duration::from_secs(3),
			Duration::from_secs(600),
		));

		let dispatcher =
			Dispatcher::new(session, gas, self.events.clone()).with_monitor(monitor);
		if !self.config.app.debug_transactions {
			return Ok(dispatcher);
		}

		let (name, local) = self.config.local_network().ok_or_else(|| {
			BuilderError::MissingComponent("local network for debug transactions".into())
		})?;
		let (delivery, funder) = self
			.signing_delivery(
				local,
				self.config.wallet.local_funding_private_key.as_ref(),
				"local funding",
			)
			.await?;
		tracing::info!(network = %name, funder = %funder, "Debug transactions use local funding");
		Ok(dispatcher.with_local_funding(FaucetTransactor::new(delivery, local.chain_id, funder)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dapp_config::builders::config::ConfigBuilder;
	use dapp_config::VerifierConfig;
	use dapp_registry::ManifestContract;

	fn sepolia() -> NetworkDescriptor {
		NetworkDescriptor {
			chain_id: 11155111,
			rpc_url: "https://rpc.sepolia.org".into(),
			fallback_rpc_urls: Vec::new(),
			explorer_url: "https://sepolia.etherscan.io".into(),
			explorer_api_url: Some("https://api-sepolia.etherscan.io/api".into()),
			is_local: false,
		}
	}

	#[tokio::test]
	async fn test_unknown_network() {
		let builder = DappBuilder::new(ConfigBuilder::new().build().unwrap());
		assert!(matches!(
			builder.build_orchestrator("mainnet").await,
			Err(BuilderError::Config(_))
		));
	}

	#[tokio::test]
	async fn test_public_network_needs_deployer_key() {
		let builder = DappBuilder::new(
			ConfigBuilder::new()
				.target("sepolia", sepolia())
				.verifier(VerifierConfig {
					api_key: Some(SecretString::from("key")),
					..Default::default()
				})
				.build()
				.unwrap(),
		);
		assert!(matches!(
			builder.build_orchestrator("sepolia").await,
			Err(BuilderError::MissingComponent(_))
		));
	}

	#[test]
	fn test_verifier_only_for_public_networks() {
		let builder = DappBuilder::new(
			ConfigBuilder::new()
				.verifier(VerifierConfig {
					api_key: Some(SecretString::from("key")),
					..Default::default()
				})
				.build()
				.unwrap(),
		);
		let local = builder.config().network("localhost").unwrap().clone();

		assert!(builder.verifier(&local).unwrap().is_none());
		assert!(builder.verifier(&sepolia()).unwrap().is_some());

		let mut no_api = sepolia();
		no_api.explorer_api_url = None;
		assert!(builder.verifier(&no_api).unwrap().is_none());
	}

	#[tokio::test]
	async fn test_registry_reads_manifest() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("hardhat_contracts.json");
		let mut manifest = DeploymentManifest::default();
		manifest.insert(
			31337,
			"localhost",
			"YourContract",
			ManifestContract {
				address: Address::repeat_byte(7),
				abi: Default::default(),
			},
		);
		manifest.save(&path).await.unwrap();

		let builder = DappBuilder::new(
			ConfigBuilder::new()
				.manifest_path(path.to_string_lossy())
				.build()
				.unwrap(),
		);
		let registry = builder
			.build_registry(builder.read_delivery().unwrap())
			.await
			.unwrap();

		assert_eq!(
			registry.lookup("YourContract", 31337).unwrap().address,
			Address::repeat_byte(7)
		);
		assert!(registry.lookup("YourContract", 1).is_none());
	}

	#[tokio::test]
	async fn test_session_manager_starts_disconnected() {
		let builder = DappBuilder::new(ConfigBuilder::new().build().unwrap());
		let manager = builder.build_session_manager().unwrap();
		assert!(!manager.current().is_connected());
	}
}
