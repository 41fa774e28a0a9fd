//! Event types for inter-component communication.
//!
//! Components publish events on a shared [`EventBus`]; user-interface layers and the
//! CLI subscribe to surface notices, alerts and reload requests.

use crate::{DeploymentRecord, TransactionHash, TransactionReceipt, VerificationState};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Main event type encompassing all toolkit events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
	/// Events from the wallet session manager.
	Session(SessionEvent),
	/// Events from the transaction dispatcher.
	Dispatch(DispatchEvent),
	/// Events from the deployment orchestrator.
	Deployment(DeploymentEvent),
}

/// Wallet session lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
	/// A connect attempt started.
	Connecting,
	/// A session was established.
	Connected { address: Address, chain_id: u64 },
	/// The session was rebuilt after a network or account change.
	Refreshed { address: Address, chain_id: u64 },
	/// The session ended.
	Disconnected { reason: Option<String> },
	/// The client must be fully reloaded to recover from a provider disconnect.
	ReloadRequired,
	/// One-line notice for the user interface.
	Notice { message: String },
}

/// Transaction dispatch events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchEvent {
	/// A transaction was handed to the network, or to the local funding source.
	Submitted {
		tx_hash: TransactionHash,
		chain_id: u64,
		local_funding: bool,
	},
	/// A submitted transaction was mined successfully.
	Confirmed {
		tx_hash: TransactionHash,
		receipt: TransactionReceipt,
	},
	/// A submitted transaction was mined but reverted.
	Reverted { tx_hash: TransactionHash },
	/// Dispatch refused before anything was sent.
	Rejected { reason: String },
	/// Dispatch failed while talking to the provider.
	Failed { reason: String },
	/// Alert-equivalent notice (e.g. the user rejected the signature request).
	Alert { message: String },
}

/// Deployment progress events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeploymentEvent {
	/// A contract is on-chain.
	Deployed { record: DeploymentRecord },
	/// Verification state changed for a deployed contract.
	VerificationUpdated {
		contract_name: String,
		chain_id: u64,
		state: VerificationState,
	},
	/// The batch stopped at the given contract.
	BatchAborted { contract_name: String, error: String },
}

/// Broadcast bus carrying [`AppEvent`]s.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
	/// Creates a bus buffering up to `capacity` events per slow subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to all events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event; fails only when nobody is listening.
	pub fn publish(
		&self,
		event: AppEvent,
	) -> Result<usize, broadcast::error::SendError<AppEvent>> {
		self.sender.send(event)
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1000)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_publish_reaches_subscribers() {
		let bus = EventBus::new(8);
		let mut rx = bus.subscribe();

		bus.publish(AppEvent::Session(SessionEvent::ReloadRequired))
			.unwrap();

		match rx.recv().await.unwrap() {
			AppEvent::Session(SessionEvent::ReloadRequired) => {},
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[test]
	fn test_publish_without_subscribers_is_an_error() {
		let bus = EventBus::new(8);
		assert!(bus
			.publish(AppEvent::Dispatch(DispatchEvent::Rejected {
				reason: "no session".into()
			}))
			.is_err());
	}
}
