//! Gas price snapshots with a staleness bound.

use super::DispatchError;
use arc_swap::ArcSwapOption;
use dapp_delivery::DeliveryService;
use dapp_types::GasPriceQuote;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Holds the latest gas quote for one chain.
///
/// A quote older than `max_age` is refused rather than used, so a stalled
/// refresher fails closed.
pub struct GasPriceOracle {
	chain_id: u64,
	quote: Arc<ArcSwapOption<GasPriceQuote>>,
	max_age: Duration,
	refresher: Option<JoinHandle<()>>,
}

impl GasPriceOracle {
	/// An oracle without a refresher; quotes come from [`record`](Self::record).
	pub fn new(chain_id: u64, max_age: Duration) -> Self {
		Self {
			chain_id,
			quote: Arc::new(ArcSwapOption::empty()),
			max_age,
			refresher: None,
		}
	}

	/// Starts refreshing the quote from `delivery` every `refresh_interval`.
	pub fn spawn(
		delivery: Arc<DeliveryService>,
		chain_id: u64,
		refresh_interval: Duration,
		max_age: Duration,
	) -> Self {
		let quote = Arc::new(ArcSwapOption::<GasPriceQuote>::empty());
		let target = quote.clone();

		let refresher = tokio::spawn(async move {
			let mut interval = tokio::time::interval(refresh_interval);
			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				interval.tick().await;
				match delivery.get_gas_price(chain_id).await {
					Ok(value) => {
						tracing::debug!(chain_id, gas_price = value, "Gas price refreshed");
						target.store(Some(Arc::new(GasPriceQuote::new(value))));
					},
					Err(e) => {
						tracing::warn!(chain_id, error = %e, "Gas price refresh failed");
					},
				}
			}
		});

		Self {
			chain_id,
			quote,
			max_age,
			refresher: Some(refresher),
		}
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	/// Stores a quote fetched now.
	pub fn record(&self, value: u128) {
		self.quote.store(Some(Arc::new(GasPriceQuote::new(value))));
	}

	/// The current quote, if one exists and is fresh.
	pub fn latest(&self) -> Result<GasPriceQuote, DispatchError> {
		let quote = self
			.quote
			.load_full()
			.ok_or(DispatchError::GasQuoteUnavailable)?;
		if quote.is_stale(self.max_age) {
			return Err(DispatchError::StaleGasQuote {
				age_secs: quote.age().as_secs(),
			});
		}
		Ok(*quote)
	}
}

impl Drop for GasPriceOracle {
	fn drop(&mut self) {
		if let Some(refresher) = self.refresher.take() {
			refresher.abort();
		}
	}
}
