//! Chain reads for the session account.

use dapp_delivery::{DeliveryError, DeliveryService};
use dapp_types::{format_units, Address, U256, WEI_DECIMALS};
use dapp_wallet::SessionHandle;
use std::sync::Arc;

/// Native balance of one address on one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balance {
	pub chain_id: u64,
	pub address: Address,
	pub wei: U256,
}

impl Balance {
	/// Balance in ether, trailing zeros trimmed.
	pub fn display_ether(&self) -> String {
		format_units(&self.wei.to_string(), WEI_DECIMALS)
	}
}

/// Snapshot of a chain's head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHead {
	pub chain_id: u64,
	pub block_number: u64,
	pub timestamp: u64,
}

pub struct ChainReader {
	delivery: Arc<DeliveryService>,
}

impl ChainReader {
	pub fn new(delivery: Arc<DeliveryService>) -> Self {
		Self { delivery }
	}

	pub async fn balance(&self, chain_id: u64, address: Address) -> Result<Balance, DeliveryError> {
		let wei = self.delivery.get_balance(chain_id, address).await?;
		Ok(Balance {
			chain_id,
			address,
			wei,
		})
	}

	/// Balances of the session account on each of `chains`.
	///
	/// Empty without a session. Chains without a configured RPC are skipped.
	pub async fn session_balances(
		&self,
		session: &SessionHandle,
		chains: &[u64],
	) -> Result<Vec<Balance>, DeliveryError> {
		let Some(address) = session.current().address else {
			return Ok(Vec::new());
		};

		let mut balances = Vec::with_capacity(chains.len());
		for &chain_id in chains.iter().filter(|id| self.delivery.supports(**id)) {
			balances.push(self.balance(chain_id, address).await?);
		}
		Ok(balances)
	}

	/// Current block number and timestamp; the chain id is checked first.
	pub async fn head(&self, chain_id: u64) -> Result<ChainHead, DeliveryError> {
		self.delivery.verify_chain_id(chain_id).await?;
		Ok(ChainHead {
			chain_id,
			block_number: self.delivery.get_block_number(chain_id).await?,
			timestamp: self.delivery.get_block_timestamp(chain_id).await?,
		})
	}
}
