//! Receipt polling for dispatched transactions.
//!
//! Polls until the transaction is mined or the timeout passes, then publishes
//! `Confirmed` or `Reverted` on the event bus.

use dapp_delivery::DeliveryService;
use dapp_types::{
	truncate_id, AppEvent, DispatchEvent, EventBus, TransactionHash, TransactionReceipt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub struct TransactionMonitor {
	delivery: Arc<DeliveryService>,
	events: EventBus,
	poll_interval: Duration,
	timeout: Duration,
}

impl TransactionMonitor {
	pub fn new(
		delivery: Arc<DeliveryService>,
		events: EventBus,
		poll_interval: Duration,
		timeout: Duration,
	) -> Self {
		Self {
			delivery,
			events,
			poll_interval,
			timeout,
		}
	}

	/// Waits for `tx_hash` to be mined on `chain_id`.
	///
	/// Returns the receipt, or `None` if monitoring timed out.
	#[instrument(skip_all, fields(chain_id, tx_hash = %truncate_id(&tx_hash.to_string())))]
	pub async fn monitor(&self, chain_id: u64, tx_hash: TransactionHash) -> Option<TransactionReceipt> {
		let start = tokio::time::Instant::now();

		loop {
			if start.elapsed() > self.timeout {
				tracing::warn!(
					timeout_secs = self.timeout.as_secs(),
					"Transaction monitoring timed out"
				);
				return None;
			}

			match self.delivery.get_receipt(chain_id, &tx_hash).await {
				Ok(Some(receipt)) => {
					let event = if receipt.success {
						tracing::info!(block = receipt.block_number, "Confirmed");
						DispatchEvent::Confirmed {
							tx_hash,
							receipt: receipt.clone(),
						}
					} else {
						tracing::warn!(block = receipt.block_number, "Transaction reverted");
						DispatchEvent::Reverted { tx_hash }
					};
					self.events.publish(AppEvent::Dispatch(event)).ok();
					return Some(receipt);
				},
				Ok(None) => {
					tracing::debug!(
						elapsed_secs = start.elapsed().as_secs(),
						"Waiting for transaction to be mined"
					);
				},
				Err(e) => {
					tracing::debug!(error = %e, "Checking transaction status");
				},
			}

			tokio::time::sleep(self.poll_interval).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use dapp_delivery::implementations::mock::MockDelivery;
	use dapp_delivery::DeliveryInterface;
	use dapp_types::{Address, Transaction, B256, U256};
	use std::collections::HashMap;

	fn service(mock: Arc<MockDelivery>) -> Arc<DeliveryService> {
		let mut providers: HashMap<u64, Arc<dyn DeliveryInterface>> = HashMap::new();
		providers.insert(mock.chain_id(), mock);
		Arc::new(DeliveryService::new(providers, 1, Duration::from_secs(5)))
	}

	#[tokio::test]
	async fn test_confirmed_and_reverted() {
		let mock = Arc::new(MockDelivery::new(31337).reverting_submit_at(1));
		let delivery = service(mock);
		let events = EventBus::new(16);
		let mut rx = events.subscribe();
		let monitor = TransactionMonitor::new(
			delivery.clone(),
			events,
			Duration::from_millis(10),
			Duration::from_secs(1),
		);

		let transfer = Transaction::transfer(Address::repeat_byte(1), U256::from(1u64), 31337);
		let ok = delivery.deliver(transfer.clone()).await.unwrap();
		let reverted = delivery.deliver(transfer).await.unwrap();

		assert!(monitor.monitor(31337, ok).await.unwrap().success);
		assert!(!monitor.monitor(31337, reverted).await.unwrap().success);

		assert!(matches!(
			rx.recv().await.unwrap(),
			AppEvent::Dispatch(DispatchEvent::Confirmed { .. })
		));
		assert_eq!(
			match rx.recv().await.unwrap() {
				AppEvent::Dispatch(event) => event,
				other => panic!("unexpected {:?}", other),
			},
			DispatchEvent::Reverted { tx_hash: reverted }
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_unknown_transaction_times_out() {
		let monitor = TransactionMonitor::new(
			service(Arc::new(MockDelivery::new(31337))),
			EventBus::new(16),
			Duration::from_secs(3),
			Duration::from_secs(30),
		);

		let receipt = monitor
			.monitor(31337, TransactionHash(B256::repeat_byte(9)))
			.await;
		assert!(receipt.is_none());
	}
}
