//! Deployment record state machine.
//!
//! Records are persisted in the `deployments` namespace and their
//! verification state only moves forward:
//! Pending -> Deployed -> (Skipped | VerificationPending -> Verified | VerificationFailed).

use dapp_storage::StorageService;
use dapp_types::{record_key, DeploymentRecord, StorageKey, VerificationState};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Invalid state transition from {from:?} to {to:?}")]
	InvalidTransition {
		from: VerificationState,
		to: VerificationState,
	},
	#[error("Record not found: {0}")]
	RecordNotFound(String),
	#[error("Record {key} is still {state}")]
	InFlight {
		key: String,
		state: VerificationState,
	},
	#[error("Record {0} was replaced by a newer deployment")]
	Superseded(String),
}

/// Manages deployment records and their transitions.
pub struct RecordStateMachine {
	storage: Arc<StorageService>,
}

impl RecordStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Stores a freshly deployed contract's record.
	///
	/// The record must be in the `Deployed` state. A contract redeployed on the
	/// same chain replaces its previous record once that record is final.
	pub async fn create(&self, record: &DeploymentRecord) -> Result<(), RecordStateError> {
		if !Self::is_valid_transition(&VerificationState::Pending, &record.verification_state) {
			return Err(RecordStateError::InvalidTransition {
				from: VerificationState::Pending,
				to: record.verification_state.clone(),
			});
		}
		self.ensure_replaceable(&record.contract_name, record.chain_id)
			.await?;
		self.storage
			.store(StorageKey::Deployments.as_str(), &record.key(), record)
			.await
			.map_err(|e| RecordStateError::Storage(e.to_string()))
	}

	/// Fails with `InFlight` while an earlier record for the same contract and
	/// chain can still change state.
	pub async fn ensure_replaceable(
		&self,
		contract_name: &str,
		chain_id: u64,
	) -> Result<(), RecordStateError> {
		match self.get(contract_name, chain_id).await {
			Ok(existing) if !existing.verification_state.is_final() => {
				Err(RecordStateError::InFlight {
					key: existing.key(),
					state: existing.verification_state,
				})
			},
			Ok(_) | Err(RecordStateError::RecordNotFound(_)) => Ok(()),
			Err(e) => Err(e),
		}
	}

	pub async fn get(
		&self,
		contract_name: &str,
		chain_id: u64,
	) -> Result<DeploymentRecord, RecordStateError> {
		let key = record_key(contract_name, chain_id);
		self.storage
			.retrieve(StorageKey::Deployments.as_str(), &key)
			.await
			.map_err(|e| match e {
				dapp_storage::StorageError::NotFound => RecordStateError::RecordNotFound(key),
				other => RecordStateError::Storage(other.to_string()),
			})
	}

	/// All records, ordered by chain then name.
	pub async fn all(&self) -> Result<Vec<DeploymentRecord>, RecordStateError> {
		self.storage
			.retrieve_all(StorageKey::Deployments.as_str())
			.await
			.map_err(|e| RecordStateError::Storage(e.to_string()))
	}

	/// Moves a record to `new_state` after validating the transition.
	pub async fn transition(
		&self,
		contract_name: &str,
		chain_id: u64,
		new_state: VerificationState,
	) -> Result<DeploymentRecord, RecordStateError> {
		let record = self.get(contract_name, chain_id).await?;
		self.apply(record, new_state).await
	}

	/// Transitions the stored record only while it is still `deployment`.
	///
	/// A record replaced by a later deployment of the same contract fails with
	/// `Superseded` and is left untouched.
	pub async fn transition_deployment(
		&self,
		deployment: &DeploymentRecord,
		new_state: VerificationState,
	) -> Result<DeploymentRecord, RecordStateError> {
		let record = self
			.get(&deployment.contract_name, deployment.chain_id)
			.await?;
		if record.address != deployment.address || record.tx_hash != deployment.tx_hash {
			return Err(RecordStateError::Superseded(record.key()));
		}
		self.apply(record, new_state).await
	}

	async fn apply(
		&self,
		mut record: DeploymentRecord,
		new_state: VerificationState,
	) -> Result<DeploymentRecord, RecordStateError> {
		if !Self::is_valid_transition(&record.verification_state, &new_state) {
			return Err(RecordStateError::InvalidTransition {
				from: record.verification_state,
				to: new_state,
			});
		}

		record.verification_state = new_state;
		self.storage
			.update(StorageKey::Deployments.as_str(), &record.key(), &record)
			.await
			.map_err(|e| RecordStateError::Storage(e.to_string()))?;

		Ok(record)
	}

	fn is_valid_transition(from: &VerificationState, to: &VerificationState) -> bool {
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
		enum StateKind {
			Pending,
			Deployed,
			Skipped,
			VerificationPending,
			Verified,
			VerificationFailed,
		}

		static TRANSITIONS: Lazy<HashMap<StateKind, HashSet<StateKind>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(StateKind::Pending, HashSet::from([StateKind::Deployed]));
			m.insert(
				StateKind::Deployed,
				HashSet::from([StateKind::Skipped, StateKind::VerificationPending]),
			);
			m.insert(
				StateKind::VerificationPending,
				HashSet::from([StateKind::Verified, StateKind::VerificationFailed]),
			);
			m.insert(StateKind::Skipped, HashSet::new());
			m.insert(StateKind::Verified, HashSet::new());
			m.insert(StateKind::VerificationFailed, HashSet::new());
			m
		});

		let kind = |state: &VerificationState| match state {
			VerificationState::Pending => StateKind::Pending,
			VerificationState::Deployed => StateKind::Deployed,
			VerificationState::Skipped => StateKind::Skipped,
			VerificationState::VerificationPending => StateKind::VerificationPending,
			VerificationState::Verified => StateKind::Verified,
			VerificationState::VerificationFailed(_) => StateKind::VerificationFailed,
		};

		TRANSITIONS
			.get(&kind(from))
			.is_some_and(|next| next.contains(&kind(to)))
	}
}
