//! Source verification module for the dApp toolkit.
//!
//! Submits deployed contract metadata to an Etherscan-compatible verifier and
//! classifies the answer. Rate limits and transient failures are retried with a
//! bounded [`RetryPolicy`]; permanent failures are reported once.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use dapp_types::{truncate_id, RetryOutcome, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod implementations {
	pub mod etherscan;
	#[cfg(any(test, feature = "testing"))]
	pub mod mock;
}

/// Errors raised while setting up a verifier.
#[derive(Debug, Error)]
pub enum VerifierError {
	#[error("Configuration error: {0}")]
	Configuration(String),
	#[error("HTTP client error: {0}")]
	Client(String),
}

/// Everything the verifier needs to match on-chain bytecode to source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
	pub contract_name: String,
	pub address: Address,
	pub chain_id: u64,
	/// Fully qualified contract path, e.g. `contracts/UniCharts.sol:UniCharts`.
	pub contract_path: String,
	/// ABI-encoded constructor arguments.
	pub constructor_args: Bytes,
	/// Compiler version as the verifier expects it, e.g. `v0.8.17+commit.8df45f5f`.
	pub compiler_version: Option<String>,
	/// Solidity standard-JSON input.
	pub source: Option<String>,
}

/// Classified verifier answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationOutcome {
	Verified,
	AlreadyVerified,
	RateLimited,
	TransientError(String),
	PermanentError(String),
}

impl VerificationOutcome {
	/// Rate limits and transient errors are worth another attempt.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::RateLimited | Self::TransientError(_))
	}

	pub fn is_success(&self) -> bool {
		matches!(self, Self::Verified | Self::AlreadyVerified)
	}
}

/// Interface to an external verifier.
///
/// Implementations never fail; every problem is folded into a
/// [`VerificationOutcome`].
#[async_trait]
pub trait VerifierInterface: Send + Sync {
	async fn verify(&self, request: &VerificationRequest) -> VerificationOutcome;
}

/// Applies the retry policy and a per-attempt timeout around a verifier.
pub struct VerificationService {
	implementation: Arc<dyn VerifierInterface>,
	retry: RetryPolicy,
	attempt_timeout: Duration,
}

impl VerificationService {
	pub fn new(
		implementation: Arc<dyn VerifierInterface>,
		retry: RetryPolicy,
		attempt_timeout: Duration,
	) -> Self {
		Self {
			implementation,
			retry,
			attempt_timeout,
		}
	}

	/// Verifies a deployed contract, retrying rate limits and transient errors.
	pub async fn verify(&self, request: &VerificationRequest) -> RetryOutcome<VerificationOutcome> {
		let outcome = self
			.retry
			.run(
				|attempt| async move {
					let answer =
						tokio::time::timeout(self.attempt_timeout, self.implementation.verify(request))
							.await;
					let outcome = answer.unwrap_or_else(|_| {
						VerificationOutcome::TransientError(format!(
							"verifier did not answer within {}s",
							self.attempt_timeout.as_secs()
						))
					});
					tracing::debug!(
						contract = %request.contract_name,
						address = %truncate_id(&request.address.to_string()),
						attempt,
						?outcome,
						"Verification attempt finished"
					);
					outcome
				},
				VerificationOutcome::is_retryable,
			)
			.await;

		match &outcome.value {
			VerificationOutcome::Verified | VerificationOutcome::AlreadyVerified => {
				tracing::info!(
					contract = %request.contract_name,
					chain_id = request.chain_id,
					attempts = outcome.attempts,
					"Contract verified"
				);
			},
			other => {
				tracing::warn!(
					contract = %request.contract_name,
					chain_id = request.chain_id,
					attempts = outcome.attempts,
					outcome = ?other,
					"Verification did not succeed"
				);
			},
		}

		outcome
	}
}
