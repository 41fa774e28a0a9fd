//! Network descriptor types.
//!
//! Networks are declared in configuration under a human readable name
//! (`localhost`, `mainnet`, `sepolia`, ...) and are immutable once loaded.

use crate::utils::is_local_chain;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for a single blockchain network.
///
/// # Fields
///
/// * `chain_id` - EIP-155 chain id
/// * `rpc_url` - The HTTP(S) JSON-RPC endpoint
/// * `fallback_rpc_urls` - Endpoints tried in order when `rpc_url` is unreachable
/// * `explorer_url` - Block explorer front-end, used for links
/// * `explorer_api_url` - Etherscan-compatible API used for source verification
/// * `is_local` - Development network; verification is always skipped
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkDescriptor {
	pub chain_id: u64,
	pub rpc_url: String,
	#[serde(default)]
	pub fallback_rpc_urls: Vec<String>,
	#[serde(default)]
	pub explorer_url: String,
	#[serde(default)]
	pub explorer_api_url: Option<String>,
	#[serde(default)]
	pub is_local: bool,
}

impl NetworkDescriptor {
	/// A local development network on the given RPC url.
	pub fn local(chain_id: u64, rpc_url: impl Into<String>) -> Self {
		Self {
			chain_id,
			rpc_url: rpc_url.into(),
			fallback_rpc_urls: Vec::new(),
			explorer_url: String::new(),
			explorer_api_url: None,
			is_local: true,
		}
	}

	/// The primary endpoint followed by the fallbacks, in preference order.
	pub fn rpc_urls(&self) -> impl Iterator<Item = &str> {
		std::iter::once(self.rpc_url.as_str())
			.chain(self.fallback_rpc_urls.iter().map(String::as_str))
	}

	/// True when the network is flagged local or its chain id is a well-known dev chain.
	pub fn is_dev(&self) -> bool {
		self.is_local || is_local_chain(self.chain_id)
	}

	/// Explorer link for a transaction.
	pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
		if self.explorer_url.is_empty() {
			return None;
		}
		Some(format!(
			"{}/tx/{}",
			self.explorer_url.trim_end_matches('/'),
			tx_hash
		))
	}
}

/// Networks keyed by configuration name.
pub type NetworksConfig = HashMap<String, NetworkDescriptor>;
