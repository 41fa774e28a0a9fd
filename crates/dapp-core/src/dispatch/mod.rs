//! Transaction dispatch for the active wallet session.
//!
//! Every dispatch reads the current session snapshot, prices the transaction
//! from a fresh gas quote and hands it to a transactor. Outcomes are values,
//! never errors: callers decide whether a failure is worth retrying.

pub mod gas;
pub mod monitor;
pub mod transactor;

pub use gas::GasPriceOracle;
pub use monitor::TransactionMonitor;
pub use transactor::{FaucetTransactor, SessionTransactor, Transactor};

use dapp_delivery::DeliveryError;
use dapp_registry::PendingCall;
use dapp_types::{
	truncate_id, Address, AppEvent, Bytes, DispatchEvent, EventBus, Transaction, TransactionHash,
	U256,
};
use dapp_wallet::{SessionHandle, SessionSigner, WalletError};
use std::sync::Arc;
use thiserror::Error;

/// Why a dispatch did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
	#[error("no session")]
	NoActiveSession,
	#[error("session changed since the call was prepared")]
	SessionChanged,
	#[error("gas quote is stale ({age_secs}s old)")]
	StaleGasQuote { age_secs: u64 },
	#[error("no gas quote available")]
	GasQuoteUnavailable,
	#[error("User rejected: {0}")]
	UserRejected(String),
	#[error("Insufficient funds: {0}")]
	InsufficientFunds(String),
	#[error("Network unavailable: {0}")]
	NetworkUnavailable(String),
	#[error("Provider error: {0}")]
	Provider(String),
}

impl DispatchError {
	/// Whether the caller may sensibly try again.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Self::StaleGasQuote { .. }
				| Self::GasQuoteUnavailable
				| Self::NetworkUnavailable(_)
				| Self::Provider(_)
		)
	}
}

impl From<WalletError> for DispatchError {
	fn from(error: WalletError) -> Self {
		match error {
			WalletError::UserRejected(m) => Self::UserRejected(m),
			WalletError::InsufficientFunds(m) => Self::InsufficientFunds(m),
			WalletError::NetworkUnavailable(m) => Self::NetworkUnavailable(m),
			WalletError::ChainMismatch { .. } => Self::SessionChanged,
			other => Self::Provider(other.to_string()),
		}
	}
}

impl From<DeliveryError> for DispatchError {
	fn from(error: DeliveryError) -> Self {
		match error {
			DeliveryError::UserRejected(m) => Self::UserRejected(m),
			DeliveryError::InsufficientFunds(m) => Self::InsufficientFunds(m),
			DeliveryError::NetworkUnavailable(m) | DeliveryError::Timeout(m) => {
				Self::NetworkUnavailable(m)
			},
			other => Self::Provider(other.to_string()),
		}
	}
}

/// What the caller wants sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxParams {
	pub to: Address,
	pub value: U256,
	pub data: Bytes,
}

impl TxParams {
	pub fn transfer(to: Address, value: U256) -> Self {
		Self {
			to,
			value,
			data: Bytes::new(),
		}
	}
}

/// Result of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
	Submitted(TransactionHash),
	/// Refused before anything was sent, or declined by the user.
	Rejected(DispatchError),
	Failed(DispatchError),
}

impl TransactionOutcome {
	pub fn tx_hash(&self) -> Option<TransactionHash> {
		match self {
			Self::Submitted(hash) => Some(*hash),
			_ => None,
		}
	}

	pub fn reason(&self) -> Option<String> {
		match self {
			Self::Submitted(_) => None,
			Self::Rejected(e) | Self::Failed(e) => Some(e.to_string()),
		}
	}
}

/// Sends transactions on behalf of the current wallet session.
pub struct Dispatcher {
	session: SessionHandle,
	gas: Arc<GasPriceOracle>,
	events: EventBus,
	local_funding: Option<FaucetTransactor>,
	monitor: Option<Arc<TransactionMonitor>>,
}

impl Dispatcher {
	pub fn new(session: SessionHandle, gas: Arc<GasPriceOracle>, events: EventBus) -> Self {
		Self {
			session,
			gas,
			events,
			local_funding: None,
			monitor: None,
		}
	}

	/// Routes plain value transfers to a local funding account.
	pub fn with_local_funding(mut self, faucet: FaucetTransactor) -> Self {
		self.local_funding = Some(faucet);
		self
	}

	/// Follows every submitted transaction until it is mined.
	pub fn with_monitor(mut self, monitor: Arc<TransactionMonitor>) -> Self {
		self.monitor = Some(monitor);
		self
	}

	pub fn local_funding_enabled(&self) -> bool {
		self.local_funding.is_some()
	}

	/// Sends `params` from the session account.
	pub async fn dispatch(&self, params: TxParams) -> TransactionOutcome {
		let Some(signer) = self.session.signer() else {
			return self.reject(DispatchError::NoActiveSession);
		};
		let tx = Transaction::call(params.to, params.data, params.value, signer.chain_id());
		self.send(signer, tx).await
	}

	/// Sends a call prepared on a signer-bound contract handle.
	///
	/// Refused when the session was rebuilt after the handle was resolved.
	pub async fn dispatch_call(&self, call: PendingCall) -> TransactionOutcome {
		let Some(signer) = self.session.signer() else {
			return self.reject(DispatchError::NoActiveSession);
		};
		if !Arc::ptr_eq(&signer, &call.signer) {
			return self.reject(DispatchError::SessionChanged);
		}
		tracing::debug!(
			contract = %call.contract_name,
			function = %call.function,
			"Dispatching contract call"
		);
		self.send(signer, call.tx).await
	}

	async fn send(&self, signer: Arc<dyn SessionSigner>, tx: Transaction) -> TransactionOutcome {
		let quote = match self.gas.latest() {
			Ok(quote) => quote,
			Err(e) => return self.reject(e),
		};
		let tx = tx.with_gas_price(quote.value);

		let (result, chain_id, local_funding) = match &self.local_funding {
			Some(faucet) if tx.is_value_transfer() => {
				tracing::info!(
					to = ?tx.to,
					value = %tx.value,
					funder = %faucet.funder(),
					"Debug transfer routed to local funding"
				);
				(faucet.send(tx).await, faucet.chain_id(), true)
			},
			_ => {
				let transactor = SessionTransactor::new(signer);
				(transactor.send(tx).await, transactor.chain_id(), false)
			},
		};

		match result {
			Ok(tx_hash) => {
				tracing::info!(
					chain_id,
					tx_hash = %truncate_id(&tx_hash.to_string()),
					local_funding,
					"Transaction submitted"
				);
				self.events
					.publish(AppEvent::Dispatch(DispatchEvent::Submitted {
						tx_hash,
						chain_id,
						local_funding,
					}))
					.ok();
				if let Some(monitor) = &self.monitor {
					let monitor = monitor.clone();
					tokio::spawn(async move {
						monitor.monitor(chain_id, tx_hash).await;
					});
				}
				TransactionOutcome::Submitted(tx_hash)
			},
			Err(e @ DispatchError::UserRejected(_)) => {
				tracing::info!(error = %e, "Transaction rejected by user");
				self.events
					.publish(AppEvent::Dispatch(DispatchEvent::Alert {
						message: "Transaction was rejected".to_string(),
					}))
					.ok();
				TransactionOutcome::Rejected(e)
			},
			Err(e) => {
				tracing::warn!(chain_id, error = %e, retryable = e.is_retryable(), "Transaction failed");
				self.events
					.publish(AppEvent::Dispatch(DispatchEvent::Failed {
						reason: e.to_string(),
					}))
					.ok();
				TransactionOutcome::Failed(e)
			},
		}
	}

	fn reject(&self, reason: DispatchError) -> TransactionOutcome {
		tracing::info!(reason = %reason, "Dispatch refused");
		self.events
			.publish(AppEvent::Dispatch(DispatchEvent::Rejected {
				reason: reason.to_string(),
			}))
			.ok();
		TransactionOutcome::Rejected(reason)
	}
}
