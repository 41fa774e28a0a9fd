//! Contract deployment orchestration.
//!
//! Contracts are deployed strictly one after another in dependency order so
//! the deployer's nonce only ever moves forward. Each confirmed deployment is
//! recorded, written to the manifest and, on public networks, queued for source
//! verification after a settle delay. Verification runs in the background under
//! a concurrency cap and never affects the batch.

pub mod args;
pub mod artifacts;
pub mod planner;

use crate::state::{RecordStateError, RecordStateMachine};
use artifacts::{ArtifactSource, ContractArtifact};
use dapp_delivery::DeliveryService;
use dapp_registry::{DeploymentManifest, ManifestContract};
use dapp_types::{
	truncate_id, Address, AppEvent, Bytes, ContractSpec, DeploymentEvent, DeploymentRecord,
	EventBus, NetworkDescriptor, Transaction, U256, VerificationState,
};
use dapp_verifier::{VerificationOutcome, VerificationRequest, VerificationService};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::instrument;

/// Errors that stop a deployment batch.
#[derive(Debug, Error)]
pub enum DeployError {
	#[error("Dependency cycle between {0:?}")]
	DependencyCycle(Vec<String>),
	#[error("{contract} depends on unknown contract {dependency}")]
	UnknownDependency { contract: String, dependency: String },
	#[error("Contract {0} is declared more than once")]
	DuplicateContract(String),
	#[error("{contract}: cannot resolve {placeholder}")]
	UnresolvedPlaceholder { contract: String, placeholder: String },
	#[error("{contract}: invalid constructor arguments: {reason}")]
	InvalidArguments { contract: String, reason: String },
	#[error("Artifact error: {0}")]
	Artifact(String),
	#[error("Deployment of {contract} failed: {reason}")]
	DeploymentFailed { contract: String, reason: String },
	#[error("{contract}: post-deploy call {function} failed: {reason}")]
	PostDeployFailed {
		contract: String,
		function: String,
		reason: String,
	},
	#[error("Network error: {0}")]
	Network(String),
	#[error("{0} is still being verified from an earlier deployment")]
	VerificationInFlight(String),
	#[error("Record error: {0}")]
	Record(String),
	#[error("Manifest error: {0}")]
	Manifest(String),
}

/// Tunables for a [`DeploymentOrchestrator`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
	/// Wait between confirmation and the first verification attempt, so the
	/// explorer can index the contract.
	pub settle_delay: Duration,
	/// Maximum verification jobs talking to the explorer at once.
	pub max_concurrent_verifications: usize,
	/// Where the manifest is rewritten after each deployment.
	pub manifest_path: Option<PathBuf>,
}

impl Default for OrchestratorSettings {
	fn default() -> Self {
		Self {
			settle_delay: Duration::from_secs(15),
			max_concurrent_verifications: 2,
			manifest_path: None,
		}
	}
}

/// Deploys contract specs and tracks their records.
pub struct DeploymentOrchestrator {
	delivery: Arc<DeliveryService>,
	artifacts: Arc<dyn ArtifactSource>,
	verifier: Option<Arc<VerificationService>>,
	records: Arc<RecordStateMachine>,
	manifest: Mutex<DeploymentManifest>,
	manifest_path: Option<PathBuf>,
	events: EventBus,
	deployer: Address,
	settle_delay: Duration,
	verify_permits: Arc<Semaphore>,
	jobs: Mutex<JoinSet<()>>,
}

impl DeploymentOrchestrator {
	pub fn new(
		delivery: Arc<DeliveryService>,
		artifacts: Arc<dyn ArtifactSource>,
		records: Arc<RecordStateMachine>,
		events: EventBus,
		deployer: Address,
		settings: OrchestratorSettings,
	) -> Self {
		Self {
			delivery,
			artifacts,
			verifier: None,
			records,
			manifest: Mutex::new(DeploymentManifest::default()),
			manifest_path: settings.manifest_path,
			events,
			deployer,
			settle_delay: settings.settle_delay,
			verify_permits: Arc::new(Semaphore::new(settings.max_concurrent_verifications.max(1))),
			jobs: Mutex::new(JoinSet::new()),
		}
	}

	pub fn with_verifier(mut self, verifier: Arc<VerificationService>) -> Self {
		self.verifier = Some(verifier);
		self
	}

	/// Starts from an existing manifest; its contracts satisfy dependencies.
	pub fn with_manifest(mut self, manifest: DeploymentManifest) -> Self {
		self.manifest = Mutex::new(manifest);
		self
	}

	pub fn deployer(&self) -> Address {
		self.deployer
	}

	pub fn records(&self) -> &Arc<RecordStateMachine> {
		&self.records
	}

	pub async fn manifest(&self) -> DeploymentManifest {
		self.manifest.lock().await.clone()
	}

	/// Deploys `specs` to `network` in dependency order.
	///
	/// Configuration problems (cycles, unknown dependencies, missing artifacts)
	/// and contracts whose earlier deployment is still being verified are
	/// reported before anything is sent. The first failed deployment aborts
	/// the rest of the batch; contracts already deployed keep their records.
	/// Returned records reflect the state at the end of the batch; verification
	/// continues in the background.
	#[instrument(skip_all, fields(network = %network_name, chain_id = network.chain_id))]
	pub async fn deploy_all(
		&self,
		specs: &[ContractSpec],
		network_name: &str,
		network: &NetworkDescriptor,
	) -> Result<Vec<DeploymentRecord>, DeployError> {
		let chain_id = network.chain_id;
		let mut deployed: HashMap<String, Address> = self
			.manifest
			.lock()
			.await
			.chain(chain_id)
			.map(|chain| {
				chain
					.contracts
					.iter()
					.map(|(name, contract)| (name.clone(), contract.address))
					.collect()
			})
			.unwrap_or_default();
		let known: HashSet<String> = deployed.keys().cloned().collect();

		let ordered = planner::plan(specs, &known)?;
		let mut artifacts = Vec::with_capacity(ordered.len());
		for spec in &ordered {
			let artifact = self.artifacts.load(spec.artifact_name()).await?;
			for call in &spec.post_deploy {
				args::find_function(&spec.name, &artifact.abi, &call.function, call.args.len())?;
			}
			artifacts.push(artifact);
		}

		for spec in &ordered {
			match self.records.ensure_replaceable(&spec.name, chain_id).await {
				Ok(()) => {},
				Err(RecordStateError::InFlight { .. }) => {
					return Err(DeployError::VerificationInFlight(spec.name.clone()));
				},
				Err(e) => return Err(DeployError::Record(e.to_string())),
			}
		}

		self.delivery
			.verify_chain_id(chain_id)
			.await
			.map_err(|e| DeployError::Network(e.to_string()))?;

		tracing::info!(
			contracts = ordered.len(),
			deployer = %self.deployer,
			"Starting deployment"
		);

		let mut records = Vec::with_capacity(ordered.len());
		for (spec, artifact) in ordered.iter().zip(&artifacts) {
			match self
				.deploy_contract(spec, artifact, network_name, network, &deployed)
				.await
			{
				Ok(record) => {
					deployed.insert(record.contract_name.clone(), record.address);
					records.push(record);
				},
				Err(e) => {
					tracing::error!(contract = %spec.name, error = %e, "Deployment batch aborted");
					self.events
						.publish(AppEvent::Deployment(DeploymentEvent::BatchAborted {
							contract_name: spec.name.clone(),
							error: e.to_string(),
						}))
						.ok();
					return Err(e);
				},
			}
		}

		tracing::info!(contracts = records.len(), "Deployment finished");
		Ok(records)
	}

	async fn deploy_contract(
		&self,
		spec: &ContractSpec,
		artifact: &ContractArtifact,
		network_name: &str,
		network: &NetworkDescriptor,
		deployed: &HashMap<String, Address>,
	) -> Result<DeploymentRecord, DeployError> {
		let chain_id = network.chain_id;
		let failed = |reason: String| DeployError::DeploymentFailed {
			contract: spec.name.clone(),
			reason,
		};

		let args = args::expand_args(&spec.name, &spec.constructor_args, self.deployer, deployed)?;
		let constructor_args = args::encode_constructor_args(&spec.name, &artifact.abi, &args)?;
		let mut init_code = artifact.bytecode.to_vec();
		init_code.extend_from_slice(&constructor_args);

		let tx = Transaction::create(Bytes::from(init_code), chain_id).with_from(self.deployer);
		let tx_hash = self
			.delivery
			.deliver(tx)
			.await
			.map_err(|e| failed(e.to_string()))?;
		tracing::info!(
			contract = %spec.name,
			tx_hash = %truncate_id(&tx_hash.to_string()),
			"Deployment submitted"
		);

		let receipt = self
			.delivery
			.confirm(chain_id, &tx_hash)
			.await
			.map_err(|e| failed(e.to_string()))?;
		if !receipt.success {
			return Err(failed("creation transaction reverted".to_string()));
		}
		let address = receipt
			.contract_address
			.ok_or_else(|| failed("receipt carries no contract address".to_string()))?;

		if !spec.post_deploy.is_empty() {
			let mut known = deployed.clone();
			known.insert(spec.name.clone(), address);
			self.run_post_deploy(spec, artifact, address, chain_id, &known)
				.await?;
		}

		let record = DeploymentRecord {
			contract_name: spec.name.clone(),
			address,
			chain_id,
			tx_hash,
			verification_state: VerificationState::Deployed,
		};
		self.records
			.create(&record)
			.await
			.map_err(|e| DeployError::Record(e.to_string()))?;
		self.write_manifest(network_name, chain_id, &spec.name, address, artifact)
			.await?;

		tracing::info!(
			contract = %spec.name,
			address = %address,
			block = receipt.block_number,
			"Contract deployed"
		);
		self.events
			.publish(AppEvent::Deployment(DeploymentEvent::Deployed {
				record: record.clone(),
			}))
			.ok();

		if network.is_dev() {
			let record = self
				.records
				.transition(&spec.name, chain_id, VerificationState::Skipped)
				.await
				.map_err(|e| DeployError::Record(e.to_string()))?;
			publish_state(&self.events, &record.contract_name, chain_id, VerificationState::Skipped);
			return Ok(record);
		}

		self.schedule_verification(spec, artifact, &record, constructor_args)
			.await;
		Ok(record)
	}

	/// Runs the spec's post-deploy calls in order, each confirmed before the next.
	async fn run_post_deploy(
		&self,
		spec: &ContractSpec,
		artifact: &ContractArtifact,
		address: Address,
		chain_id: u64,
		known: &HashMap<String, Address>,
	) -> Result<(), DeployError> {
		for call in &spec.post_deploy {
			let failed = |reason: String| DeployError::PostDeployFailed {
				contract: spec.name.clone(),
				function: call.function.clone(),
				reason,
			};

			let args = args::expand_args(&spec.name, &call.args, self.deployer, known)?;
			let data = args::encode_call(&spec.name, &artifact.abi, &call.function, &args)?;
			let tx = Transaction::call(address, data, U256::ZERO, chain_id).with_from(self.deployer);
			let tx_hash = self
				.delivery
				.deliver(tx)
				.await
				.map_err(|e| failed(e.to_string()))?;
			let receipt = self
				.delivery
				.confirm(chain_id, &tx_hash)
				.await
				.map_err(|e| failed(e.to_string()))?;
			if !receipt.success {
				return Err(failed("call reverted".to_string()));
			}

			tracing::info!(
				contract = %spec.name,
				function = %call.function,
				tx_hash = %truncate_id(&tx_hash.to_string()),
				"Post-deploy call confirmed"
			);
		}
		Ok(())
	}

	async fn write_manifest(
		&self,
		network_name: &str,
		chain_id: u64,
		contract_name: &str,
		address: Address,
		artifact: &ContractArtifact,
	) -> Result<(), DeployError> {
		let mut manifest = self.manifest.lock().await;
		manifest.insert(
			chain_id,
			network_name,
			contract_name,
			ManifestContract {
				address,
				abi: artifact.abi.clone(),
			},
		);
		if let Some(path) = &self.manifest_path {
			manifest
				.save(path)
				.await
				.map_err(|e| DeployError::Manifest(e.to_string()))?;
		}
		Ok(())
	}

	async fn schedule_verification(
		&self,
		spec: &ContractSpec,
		artifact: &ContractArtifact,
		record: &DeploymentRecord,
		constructor_args: Bytes,
	) {
		let Some(verifier) = self.verifier.clone() else {
			tracing::warn!(contract = %spec.name, "No verifier configured, record stays deployed");
			return;
		};

		let build = match self.artifacts.build_info(artifact).await {
			Ok(build) => build,
			Err(e) => {
				tracing::warn!(contract = %spec.name, error = %e, "Build info unavailable");
				None
			},
		};

		let job = VerificationJob {
			deployment: record.clone(),
			request: VerificationRequest {
				contract_name: record.contract_name.clone(),
				address: record.address,
				chain_id: record.chain_id,
				contract_path: spec
					.source
					.clone()
					.unwrap_or_else(|| artifact.fully_qualified_name()),
				constructor_args,
				compiler_version: build.as_ref().map(|b| b.compiler_version.clone()),
				source: build.map(|b| b.input),
			},
			verifier,
			records: self.records.clone(),
			events: self.events.clone(),
			settle_delay: self.settle_delay,
			permits: self.verify_permits.clone(),
		};
		tracing::debug!(
			contract = %spec.name,
			delay_secs = self.settle_delay.as_secs(),
			"Verification scheduled"
		);
		self.jobs.lock().await.spawn(job.run());
	}

	/// Waits until every scheduled verification has finished.
	pub async fn wait_for_verifications(&self) {
		let mut jobs = self.jobs.lock().await;
		while let Some(result) = jobs.join_next().await {
			if let Err(e) = result {
				tracing::warn!(error = %e, "Verification job ended abnormally");
			}
		}
	}
}

fn publish_state(events: &EventBus, contract_name: &str, chain_id: u64, state: VerificationState) {
	events
		.publish(AppEvent::Deployment(DeploymentEvent::VerificationUpdated {
			contract_name: contract_name.to_string(),
			chain_id,
			state,
		}))
		.ok();
}

/// One contract's verification, run in the background.
struct VerificationJob {
	deployment: DeploymentRecord,
	request: VerificationRequest,
	verifier: Arc<VerificationService>,
	records: Arc<RecordStateMachine>,
	events: EventBus,
	settle_delay: Duration,
	permits: Arc<Semaphore>,
}

impl VerificationJob {
	async fn run(self) {
		tokio::time::sleep(self.settle_delay).await;
		let Ok(_permit) = self.permits.clone().acquire_owned().await else {
			return;
		};

		if !self.advance(VerificationState::VerificationPending).await {
			return;
		}

		let outcome = self.verifier.verify(&self.request).await;
		let state = match outcome.value {
			VerificationOutcome::Verified | VerificationOutcome::AlreadyVerified => {
				VerificationState::Verified
			},
			VerificationOutcome::RateLimited => VerificationState::VerificationFailed(format!(
				"rate limited after {} attempts",
				outcome.attempts
			)),
			VerificationOutcome::TransientError(reason)
			| VerificationOutcome::PermanentError(reason) => {
				VerificationState::VerificationFailed(reason)
			},
		};
		self.advance(state).await;
	}

	async fn advance(&self, state: VerificationState) -> bool {
		let name = &self.request.contract_name;
		match self
			.records
			.transition_deployment(&self.deployment, state.clone())
			.await
		{
			Ok(_) => {
				publish_state(&self.events, name, self.request.chain_id, state);
				true
			},
			Err(e) => {
				tracing::warn!(contract = %name, error = %e, "Could not update verification state");
				false
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::artifacts::testing::StaticArtifacts;
	use super::*;
	use alloy_json_abi::JsonAbi;
	use dapp_delivery::implementations::mock::MockDelivery;
	use dapp_delivery::DeliveryInterface;
	use dapp_storage::implementations::memory::MemoryStorage;
	use dapp_storage::StorageService;
	use dapp_types::RetryPolicy;
	use dapp_verifier::implementations::mock::MockVerifier;
	use tokio::sync::broadcast;

	const DEPLOYER: Address = Address::repeat_byte(0xde);

	struct Fixture {
		orchestrator: DeploymentOrchestrator,
		delivery: Arc<MockDelivery>,
		events: broadcast::Receiver<AppEvent>,
	}

	fn artifacts() -> StaticArtifacts {
		let takes_address = JsonAbi::parse(["constructor(address lib)"]).unwrap();
		let pausable = JsonAbi::parse(["function pause(bool paused)"]).unwrap();
		StaticArtifacts::default()
			.with("A", JsonAbi::default())
			.with("P", pausable)
			.with("B", takes_address.clone())
			.with("C", takes_address)
	}

	fn fixture(
		delivery: MockDelivery,
		verifier: Option<Arc<MockVerifier>>,
		settings: OrchestratorSettings,
	) -> Fixture {
		let delivery = Arc::new(delivery);
		let mut providers: HashMap<u64, Arc<dyn DeliveryInterface>> = HashMap::new();
		providers.insert(delivery.chain_id(), delivery.clone());
		let service = Arc::new(DeliveryService::new(providers, 1, Duration::from_secs(30)));

		let events = EventBus::new(128);
		let receiver = events.subscribe();
		let records = Arc::new(RecordStateMachine::new(Arc::new(StorageService::new(
			Box::new(MemoryStorage::new()),
		))));

		let mut orchestrator = DeploymentOrchestrator::new(
			service,
			Arc::new(artifacts()),
			records,
			events,
			DEPLOYER,
			settings,
		);
		if let Some(verifier) = verifier {
			orchestrator = orchestrator.with_verifier(Arc::new(VerificationService::new(
				verifier,
				RetryPolicy::default(),
				Duration::from_secs(30),
			)));
		}

		Fixture {
			orchestrator,
			delivery,
			events: receiver,
		}
	}

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

	fn specs() -> Vec<ContractSpec> {
		vec![
			ContractSpec::new("B")
				.with_dependencies(["A"])
				.with_args(["{A}"]),
			ContractSpec::new("C")
				.with_dependencies(["A"])
				.with_args(["{A}"]),
			ContractSpec::new("A"),
		]
	}

	fn drain(receiver: &mut broadcast::Receiver<AppEvent>) -> Vec<DeploymentEvent> {
		let mut events = Vec::new();
		while let Ok(event) = receiver.try_recv() {
			if let AppEvent::Deployment(event) = event {
				events.push(event);
			}
		}
		events
	}

	#[tokio::test]
	async fn test_local_batch_in_dependency_order() {
		let verifier = Arc::new(MockVerifier::always(VerificationOutcome::Verified));
		let fixture = fixture(
			MockDelivery::new(31337),
			Some(verifier.clone()),
			OrchestratorSettings::default(),
		);
		let network = NetworkDescriptor::local(31337, "http://localhost:8545");

		let records = fixture
			.orchestrator
			.deploy_all(&specs(), "localhost", &network)
			.await
			.unwrap();

		let names: Vec<_> = records.iter().map(|r| r.contract_name.as_str()).collect();
		assert_eq!(names, vec!["A", "B", "C"]);
		assert!(records
			.iter()
			.all(|r| r.verification_state == VerificationState::Skipped));

		// B and C were constructed with A's address
		let a = MockDelivery::created_address(0);
		assert_eq!(records[0].address, a);
		let submitted = fixture.delivery.submitted();
		assert!(submitted[1].data.ends_with(a.as_slice()));
		assert!(submitted[2].data.ends_with(a.as_slice()));
		assert!(submitted.iter().all(|tx| tx.from == Some(DEPLOYER)));

		fixture.orchestrator.wait_for_verifications().await;
		assert_eq!(verifier.attempts(), 0);

		let manifest = fixture.orchestrator.manifest().await;
		assert_eq!(manifest.contract("C", 31337).unwrap().address, records[2].address);
	}

	#[tokio::test]
	async fn test_cycle_sends_nothing() {
		let fixture = fixture(MockDelivery::new(31337), None, OrchestratorSettings::default());
		let specs = vec![
			ContractSpec::new("B").with_dependencies(["C"]),
			ContractSpec::new("C").with_dependencies(["B"]),
		];

		let result = fixture
			.orchestrator
			.deploy_all(&specs, "localhost", &NetworkDescriptor::local(31337, "http://x"))
			.await;

		assert!(matches!(result, Err(DeployError::DependencyCycle(_))));
		assert!(fixture.delivery.submitted().is_empty());
	}

	#[tokio::test]
	async fn test_failure_aborts_rest_of_batch() {
		let mut fixture = fixture(
			MockDelivery::new(11155111).failing_submit_at(1),
			Some(Arc::new(MockVerifier::always(VerificationOutcome::Verified))),
			OrchestratorSettings::default(),
		);

		let result = fixture
			.orchestrator
			.deploy_all(&specs(), "sepolia", &sepolia())
			.await;

		match result {
			Err(DeployError::DeploymentFailed { contract, .. }) => assert_eq!(contract, "B"),
			other => panic!("expected a failed deployment, got {:?}", other),
		}
		assert_eq!(fixture.delivery.submitted().len(), 1);

		let a = fixture.orchestrator.records().get("A", 11155111).await.unwrap();
		assert_eq!(a.verification_state, VerificationState::Deployed);
		assert!(fixture.orchestrator.records().get("C", 11155111).await.is_err());
		assert!(drain(&mut fixture.events)
			.iter()
			.any(|e| matches!(e, DeploymentEvent::BatchAborted { contract_name, .. } if contract_name == "B")));
	}

	#[tokio::test]
	async fn test_reverted_creation_fails() {
		let fixture = fixture(
			MockDelivery::new(31337).reverting_submit_at(0),
			None,
			OrchestratorSettings::default(),
		);

		let result = fixture
			.orchestrator
			.deploy_all(&[ContractSpec::new("A")], "localhost", &NetworkDescriptor::local(31337, "http://x"))
			.await;

		assert!(matches!(result, Err(DeployError::DeploymentFailed { .. })));
	}

	#[tokio::test(start_paused = true)]
	async fn test_rate_limited_then_verified() {
		let verifier = Arc::new(MockVerifier::scripted(vec![
			VerificationOutcome::RateLimited,
			VerificationOutcome::RateLimited,
			VerificationOutcome::RateLimited,
			VerificationOutcome::Verified,
		]));
		let mut fixture = fixture(
			MockDelivery::new(11155111),
			Some(verifier.clone()),
			OrchestratorSettings::default(),
		);

		let records = fixture
			.orchestrator
			.deploy_all(&[ContractSpec::new("A")], "sepolia", &sepolia())
			.await
			.unwrap();
		assert_eq!(records[0].verification_state, VerificationState::Deployed);
		assert_eq!(verifier.attempts(), 0);

		fixture.orchestrator.wait_for_verifications().await;

		assert_eq!(verifier.attempts(), 4);
		let record = fixture.orchestrator.records().get("A", 11155111).await.unwrap();
		assert_eq!(record.verification_state, VerificationState::Verified);

		let request = &verifier.requests()[0];
		assert_eq!(request.contract_path, "contracts/A.sol:A");
		assert_eq!(request.compiler_version.as_deref(), Some("v0.8.17+commit.8df45f5f"));

		let states: Vec<_> = drain(&mut fixture.events)
			.into_iter()
			.filter_map(|e| match e {
				DeploymentEvent::VerificationUpdated { state, .. } => Some(state),
				_ => None,
			})
			.collect();
		assert_eq!(
			states,
			vec![
				VerificationState::VerificationPending,
				VerificationState::Verified
			]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_permanent_error_is_not_retried() {
		let verifier = Arc::new(MockVerifier::always(VerificationOutcome::PermanentError(
			"Fail - Unable to verify".into(),
		)));
		let fixture = fixture(
			MockDelivery::new(11155111),
			Some(verifier.clone()),
			OrchestratorSettings::default(),
		);

		fixture
			.orchestrator
			.deploy_all(&[ContractSpec::new("A")], "sepolia", &sepolia())
			.await
			.unwrap();
		fixture.orchestrator.wait_for_verifications().await;

		assert_eq!(verifier.attempts(), 1);
		let record = fixture.orchestrator.records().get("A", 11155111).await.unwrap();
		assert_eq!(
			record.verification_state,
			VerificationState::VerificationFailed("Fail - Unable to verify".into())
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_settle_delay_and_concurrency_cap() {
		let verifier = Arc::new(
			MockVerifier::always(VerificationOutcome::Verified).with_latency(Duration::from_secs(10)),
		);
		let settings = OrchestratorSettings {
			settle_delay: Duration::from_secs(15),
			max_concurrent_verifications: 1,
			manifest_path: None,
		};
		let fixture = fixture(MockDelivery::new(11155111), Some(verifier.clone()), settings);
		let specs = vec![
			ContractSpec::new("A"),
			ContractSpec::new("B")
				.with_dependencies(["A"])
				.with_args(["{A}"]),
		];
		let orchestrator = fixture.orchestrator;

		let start = tokio::time::Instant::now();
		orchestrator
			.deploy_all(&specs, "sepolia", &sepolia())
			.await
			.unwrap();
		orchestrator.wait_for_verifications().await;

		// 15s settle, then two 10s verifications one after the other
		assert!(start.elapsed() >= Duration::from_secs(35));
		assert_eq!(verifier.attempts(), 2);
	}

	#[tokio::test]
	async fn test_manifest_rewritten_after_each_deploy() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("hardhat_contracts.json");
		let settings = OrchestratorSettings {
			manifest_path: Some(path.clone()),
			..Default::default()
		};
		let fixture = fixture(MockDelivery::new(31337).failing_submit_at(1), None, settings);

		let _ = fixture
			.orchestrator
			.deploy_all(&specs(), "localhost", &NetworkDescriptor::local(31337, "http://x"))
			.await;

		let manifest = DeploymentManifest::load(&path).await.unwrap();
		assert!(manifest.contract("A", 31337).is_some());
		assert!(manifest.contract("B", 31337).is_none());
	}

	#[tokio::test]
	async fn test_dependency_from_existing_manifest() {
		let mut existing = DeploymentManifest::default();
		existing.insert(
			31337,
			"localhost",
			"A",
			ManifestContract {
				address: Address::repeat_byte(0xaa),
				abi: JsonAbi::default(),
			},
		);
		let fixture = fixture(MockDelivery::new(31337), None, OrchestratorSettings::default());
		let orchestrator = fixture.orchestrator.with_manifest(existing);
		let specs = vec![ContractSpec::new("B").with_dependencies(["A"]).with_args(["{A}"])];

		orchestrator
			.deploy_all(&specs, "localhost", &NetworkDescriptor::local(31337, "http://x"))
			.await
			.unwrap();

		let submitted = fixture.delivery.submitted();
		assert!(submitted[0].data.ends_with(Address::repeat_byte(0xaa).as_slice()));
	}

	#[tokio::test(start_paused = true)]
	async fn test_redeploy_waits_for_earlier_verification() {
		let verifier = Arc::new(MockVerifier::always(VerificationOutcome::Verified));
		let fixture = fixture(
			MockDelivery::new(11155111),
			Some(verifier.clone()),
			OrchestratorSettings::default(),
		);
		let orchestrator = &fixture.orchestrator;
		let specs = [ContractSpec::new("A")];

		let first = orchestrator.deploy_all(&specs, "sepolia", &sepolia()).await.unwrap();
		let again = orchestrator.deploy_all(&specs, "sepolia", &sepolia()).await;
		assert!(matches!(again, Err(DeployError::VerificationInFlight(name)) if name == "A"));
		assert_eq!(fixture.delivery.submitted().len(), 1);

		orchestrator.wait_for_verifications().await;
		let second = orchestrator.deploy_all(&specs, "sepolia", &sepolia()).await.unwrap();
		assert_ne!(first[0].address, second[0].address);
		orchestrator.wait_for_verifications().await;

		let verified: Vec<_> = verifier.requests().iter().map(|r| r.address).collect();
		assert_eq!(verified, vec![first[0].address, second[0].address]);
		let record = orchestrator.records().get("A", 11155111).await.unwrap();
		assert_eq!(record.address, second[0].address);
		assert_eq!(record.verification_state, VerificationState::Verified);
	}

	#[tokio::test]
	async fn test_post_deploy_calls_run_before_record() {
		let fixture = fixture(MockDelivery::new(31337), None, OrchestratorSettings::default());
		let spec = ContractSpec::new("P").with_post_deploy("pause", ["false"]);

		let records = fixture
			.orchestrator
			.deploy_all(&[spec], "localhost", &NetworkDescriptor::local(31337, "http://x"))
			.await
			.unwrap();

		let created = MockDelivery::created_address(0);
		assert_eq!(records[0].address, created);
		let submitted = fixture.delivery.submitted();
		assert_eq!(submitted.len(), 2);
		assert_eq!(submitted[1].to, Some(created));
		assert_eq!(submitted[1].from, Some(DEPLOYER));
		let pause = JsonAbi::parse(["function pause(bool paused)"]).unwrap();
		assert_eq!(
			&submitted[1].data[..4],
			pause.function("pause").unwrap()[0].selector().as_slice()
		);
	}

	#[tokio::test]
	async fn test_reverted_post_deploy_call_leaves_no_record() {
		let mut fixture = fixture(
			MockDelivery::new(31337).reverting_submit_at(1),
			None,
			OrchestratorSettings::default(),
		);
		let spec = ContractSpec::new("P").with_post_deploy("pause", ["false"]);

		let result = fixture
			.orchestrator
			.deploy_all(&[spec], "localhost", &NetworkDescriptor::local(31337, "http://x"))
			.await;

		assert!(matches!(
			result,
			Err(DeployError::PostDeployFailed { function, .. }) if function == "pause"
		));
		assert!(fixture.orchestrator.records().get("P", 31337).await.is_err());
		assert!(drain(&mut fixture.events)
			.iter()
			.all(|e| !matches!(e, DeploymentEvent::Deployed { .. })));
	}

	#[tokio::test]
	async fn test_unknown_post_deploy_function_sends_nothing() {
		let fixture = fixture(MockDelivery::new(31337), None, OrchestratorSettings::default());
		let spec = ContractSpec::new("P").with_post_deploy("unpause", Vec::<String>::new());

		let result = fixture
			.orchestrator
			.deploy_all(&[spec], "localhost", &NetworkDescriptor::local(31337, "http://x"))
			.await;

		assert!(matches!(result, Err(DeployError::InvalidArguments { .. })));
		assert!(fixture.delivery.submitted().is_empty());
	}
}
