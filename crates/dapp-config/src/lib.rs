//! Configuration module for the dApp toolkit.
//!
//! Configuration is loaded from TOML, with `${VAR}` and `${VAR:-default}` references
//! resolved against the process environment before parsing. Everything is validated
//! eagerly so that a bad network name or a missing API key fails at startup, not in
//! the middle of a deployment batch.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["networks.toml", "contracts.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(feature = "testing")]
pub mod builders;
mod loader;

use dapp_types::{ContractSpec, NetworkDescriptor, NetworksConfig, RetryPolicy, SecretString};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "testing")]
pub use builders::config::ConfigBuilder;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Application identity and mode flags.
	pub app: AppConfig,
	/// Networks keyed by name.
	pub networks: NetworksConfig,
	/// JSON-RPC client settings.
	#[serde(default)]
	pub rpc: RpcConfig,
	/// Deployment batch and manifest settings.
	pub deployment: DeploymentConfig,
	/// Source verification settings.
	#[serde(default)]
	pub verifier: VerifierConfig,
	/// Gas price oracle settings.
	#[serde(default)]
	pub gas: GasConfig,
	/// Wallet session settings.
	#[serde(default)]
	pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
	pub name: String,
	/// Name of the network under `[networks]` that the app and deployments target.
	pub target_network: String,
	/// Redirects pure value transfers to the local funding account.
	#[serde(default)]
	pub debug_transactions: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcConfig {
	/// Upper bound for any single JSON-RPC request.
	#[serde(default = "default_rpc_timeout")]
	pub timeout_seconds: u64,
}

impl Default for RpcConfig {
	fn default() -> Self {
		Self {
			timeout_seconds: default_rpc_timeout(),
		}
	}
}

fn default_rpc_timeout() -> u64 {
	30
}

/// Deployment configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeploymentConfig {
	/// Manifest written after each deployment and read by the registry.
	#[serde(default = "default_manifest_path")]
	pub manifest_path: String,
	/// Manifest of contracts deployed by third parties. Read-only.
	#[serde(default)]
	pub external_manifest_path: Option<String>,
	/// Hardhat `artifacts/` directory.
	#[serde(default = "default_artifacts_dir")]
	pub artifacts_dir: String,
	/// Delay before a deployed contract is submitted for verification, giving the
	/// explorer time to index the creation transaction.
	#[serde(default = "default_settle_delay")]
	pub settle_delay_seconds: u64,
	#[serde(default = "default_min_confirmations")]
	pub min_confirmations: u64,
	/// Deployer key. When absent the node's first unlocked account deploys.
	#[serde(default)]
	pub deployer_private_key: Option<SecretString>,
	#[serde(default)]
	pub contracts: Vec<ContractSpec>,
}

fn default_manifest_path() -> String {
	"deployments/hardhat_contracts.json".to_string()
}

fn default_artifacts_dir() -> String {
	"artifacts".to_string()
}

fn default_settle_delay() -> u64 {
	15
}

fn default_min_confirmations() -> u64 {
	1
}

/// Etherscan-compatible verifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerifierConfig {
	#[serde(default)]
	pub api_key: Option<SecretString>,
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default = "default_initial_backoff_ms")]
	pub initial_backoff_ms: u64,
	#[serde(default = "default_max_backoff_ms")]
	pub max_backoff_ms: u64,
	/// Maximum verification jobs talking to the explorer at once.
	#[serde(default = "default_max_concurrent")]
	pub max_concurrent: usize,
	/// Bound on each HTTP request to the explorer.
	#[serde(default = "default_verifier_timeout")]
	pub timeout_seconds: u64,
	#[serde(default = "default_poll_interval")]
	pub poll_interval_seconds: u64,
	#[serde(default = "default_max_status_polls")]
	pub max_status_polls: u32,
	/// Bound on one whole attempt: the submission plus its status polling.
	/// Derived from the settings above when unset.
	#[serde(default)]
	pub attempt_timeout_seconds: Option<u64>,
}

impl Default for VerifierConfig {
	fn default() -> Self {
		Self {
			api_key: None,
			max_attempts: default_max_attempts(),
			initial_backoff_ms: default_initial_backoff_ms(),
			max_backoff_ms: default_max_backoff_ms(),
			max_concurrent: default_max_concurrent(),
			timeout_seconds: default_verifier_timeout(),
			poll_interval_seconds: default_poll_interval(),
			max_status_polls: default_max_status_polls(),
			attempt_timeout_seconds: None,
		}
	}
}

impl VerifierConfig {
	/// Retry policy applied to rate-limited and transient verifier responses.
	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy::new(
			self.max_attempts,
			Duration::from_millis(self.initial_backoff_ms),
			Duration::from_millis(self.max_backoff_ms),
		)
	}

	/// Shortest attempt bound that lets a submission poll to completion.
	pub fn min_attempt_timeout(&self) -> Duration {
		Duration::from_secs(
			self.timeout_seconds
				+ self.poll_interval_seconds * u64::from(self.max_status_polls),
		)
	}

	/// Bound on one verification attempt.
	pub fn attempt_timeout(&self) -> Duration {
		self.attempt_timeout_seconds
			.map(Duration::from_secs)
			.unwrap_or_else(|| self.min_attempt_timeout())
	}
}

fn default_max_attempts() -> u32 {
	4
}

fn default_initial_backoff_ms() -> u64 {
	2_000
}

fn default_max_backoff_ms() -> u64 {
	30_000
}

fn default_max_concurrent() -> usize {
	2
}

fn default_verifier_timeout() -> u64 {
	30
}

fn default_poll_interval() -> u64 {
	5
}

fn default_max_status_polls() -> u32 {
	10
}

/// Gas price oracle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GasConfig {
	#[serde(default = "default_gas_refresh")]
	pub refresh_interval_seconds: u64,
	/// Quotes older than this are refused.
	#[serde(default = "default_gas_max_age")]
	pub max_age_seconds: u64,
}

impl Default for GasConfig {
	fn default() -> Self {
		Self {
			refresh_interval_seconds: default_gas_refresh(),
			max_age_seconds: default_gas_max_age(),
		}
	}
}

fn default_gas_refresh() -> u64 {
	10
}

fn default_gas_max_age() -> u64 {
	60
}

/// Wallet session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WalletConfig {
	/// Key for the development burner wallet. A random key is generated when unset.
	#[serde(default)]
	pub burner_private_key: Option<SecretString>,
	/// Funding account used by the debug transaction path. When unset the local
	/// node's first unlocked account funds transfers.
	#[serde(default)]
	pub local_funding_private_key: Option<SecretString>,
	#[serde(default = "default_connect_timeout")]
	pub connect_timeout_seconds: u64,
}

impl Default for WalletConfig {
	fn default() -> Self {
		Self {
			burner_private_key: None,
			local_funding_private_key: None,
			connect_timeout_seconds: default_connect_timeout(),
		}
	}
}

fn default_connect_timeout() -> u64 {
	30
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable `VAR_NAME`.
/// Supports default values with `${VAR_NAME:-default_value}`.
///
/// Input strings are limited to 1MB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut resolved = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		resolved.push_str(&input[last..full_match.start()]);
		resolved.push_str(&value);
		last = full_match.end();
	}
	resolved.push_str(&input[last..]);

	Ok(resolved)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Looks up a network by name.
	pub fn network(&self, name: &str) -> Option<&NetworkDescriptor> {
		self.networks.get(name)
	}

	/// The network named by `app.target_network`.
	pub fn target_network(&self) -> Result<&NetworkDescriptor, ConfigError> {
		self.network(&self.app.target_network).ok_or_else(|| {
			ConfigError::Validation(format!(
				"Target network '{}' not found in networks",
				self.app.target_network
			))
		})
	}

	/// Returns the first local network, used for local funding and balance reads.
	pub fn local_network(&self) -> Option<(&str, &NetworkDescriptor)> {
		let mut local: Vec<_> = self
			.networks
			.iter()
			.filter(|(_, network)| network.is_dev())
			.collect();
		local.sort_by(|a, b| a.0.cmp(b.0));
		local
			.into_iter()
			.next()
			.map(|(name, network)| (name.as_str(), network))
	}

	/// Validates the configuration.
	///
	/// - app name is non-empty and the target network exists
	/// - chain ids are unique and rpc urls are http(s)
	/// - verification of a non-local deployment has an explorer API and key
	/// - retry, concurrency and gas freshness settings are usable
	/// - contract names are unique and non-empty, post-deploy calls name a function
	fn validate(&self) -> Result<(), ConfigError> {
		if self.app.name.trim().is_empty() {
			return Err(ConfigError::Validation("App name cannot be empty".into()));
		}

		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		let target = self.target_network()?;

		let mut chain_ids = HashSet::new();
		for (name, network) in &self.networks {
			if !chain_ids.insert(network.chain_id) {
				return Err(ConfigError::Validation(format!(
					"Chain id {} is configured more than once (network '{}')",
					network.chain_id, name
				)));
			}
			if let Some(url) = network.rpc_urls().find(|url| !is_http_url(url)) {
				return Err(ConfigError::Validation(format!(
					"Network '{}' has an invalid rpc_url: {}",
					name, url
				)));
			}
			if let Some(api_url) = &network.explorer_api_url {
				if !is_http_url(api_url) {
					return Err(ConfigError::Validation(format!(
						"Network '{}' has an invalid explorer_api_url: {}",
						name, api_url
					)));
				}
			}
		}

		if self.rpc.timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"rpc timeout_seconds must be greater than 0".into(),
			));
		}

		if self.deployment.min_confirmations == 0 {
			return Err(ConfigError::Validation(
				"min_confirmations must be at least 1".into(),
			));
		}
		if self.deployment.min_confirmations > 100 {
			return Err(ConfigError::Validation(
				"min_confirmations cannot exceed 100".into(),
			));
		}

		let mut names = HashSet::new();
		for contract in &self.deployment.contracts {
			if contract.name.trim().is_empty() || contract.artifact_name().trim().is_empty() {
				return Err(ConfigError::Validation(
					"Every contract needs a name and an artifact".into(),
				));
			}
			if contract
				.post_deploy
				.iter()
				.any(|call| call.function.trim().is_empty())
			{
				return Err(ConfigError::Validation(format!(
					"Contract '{}' has a post-deploy call without a function",
					contract.name
				)));
			}
			if !names.insert(contract.name.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Contract '{}' is declared more than once",
					contract.name
				)));
			}
		}

		if !target.is_dev() && !self.deployment.contracts.is_empty() {
			if target.explorer_api_url.is_none() {
				return Err(ConfigError::Validation(format!(
					"Network '{}' needs explorer_api_url to verify deployments",
					self.app.target_network
				)));
			}
			if self
				.verifier
				.api_key
				.as_ref()
				.is_none_or(|key| key.is_empty())
			{
				return Err(ConfigError::Validation(
					"verifier api_key is required for non-local deployments".into(),
				));
			}
			if self.deployment.deployer_private_key.is_none() {
				return Err(ConfigError::Validation(
					"deployer_private_key is required for non-local deployments".into(),
				));
			}
		}

		if self.verifier.max_attempts == 0 {
			return Err(ConfigError::Validation(
				"verifier max_attempts must be at least 1".into(),
			));
		}
		if self.verifier.max_concurrent == 0 {
			return Err(ConfigError::Validation(
				"verifier max_concurrent must be at least 1".into(),
			));
		}
		if self.verifier.initial_backoff_ms > self.verifier.max_backoff_ms {
			return Err(ConfigError::Validation(
				"verifier initial_backoff_ms cannot exceed max_backoff_ms".into(),
			));
		}
		if self.verifier.timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"verifier timeout_seconds must be greater than 0".into(),
			));
		}
		if self.verifier.attempt_timeout() < self.verifier.min_attempt_timeout() {
			return Err(ConfigError::Validation(format!(
				"verifier attempt_timeout_seconds must be at least {}s to fit status polling",
				self.verifier.min_attempt_timeout().as_secs()
			)));
		}

		if self.gas.refresh_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"gas refresh_interval_seconds must be greater than 0".into(),
			));
		}
		if self.gas.max_age_seconds <= self.gas.refresh_interval_seconds {
			return Err(ConfigError::Validation(
				"gas max_age_seconds must be greater than refresh_interval_seconds".into(),
			));
		}

		if self.wallet.connect_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"wallet connect_timeout_seconds must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

fn is_http_url(url: &str) -> bool {
	let rest = url
		.strip_prefix("http://")
		.or_else(|| url.strip_prefix("https://"));
	rest.is_some_and(|host| !host.is_empty())
}

/// Parses TOML, resolves environment references and validates.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
