//! Ordered RPC endpoints with failover.
//!
//! Requests go to the active endpoint. When it cannot be reached the next
//! endpoint in order is tried, and the first one that answers becomes active.

use crate::DeliveryError;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Endpoints of one chain in preference order.
pub struct Failover<T> {
	endpoints: Vec<(String, T)>,
	active: AtomicUsize,
}

impl<T: Clone> Failover<T> {
	pub fn new(endpoints: Vec<(String, T)>) -> Result<Self, DeliveryError> {
		if endpoints.is_empty() {
			return Err(DeliveryError::Network("No RPC endpoint configured".to_string()));
		}
		Ok(Self {
			endpoints,
			active: AtomicUsize::new(0),
		})
	}

	pub fn active_url(&self) -> &str {
		&self.endpoints[self.active.load(Ordering::Relaxed) % self.endpoints.len()].0
	}

	/// Runs `request` against the active endpoint, moving on to the next one
	/// while endpoints are unreachable.
	///
	/// Only `NetworkUnavailable` triggers failover; every other error is the
	/// node's answer and is returned as is.
	pub async fn run<R, F, Fut>(&self, request: F) -> Result<R, DeliveryError>
	where
		F: Fn(T) -> Fut,
		Fut: Future<Output = Result<R, DeliveryError>>,
	{
		let start = self.active.load(Ordering::Relaxed);
		let mut last_error = None;

		for offset in 0..self.endpoints.len() {
			let index = (start + offset) % self.endpoints.len();
			let (url, endpoint) = &self.endpoints[index];
			match request(endpoint.clone()).await {
				Ok(value) => {
					if index != start {
						self.active.store(index, Ordering::Relaxed);
						tracing::info!(url = %url, "Switched to fallback RPC endpoint");
					}
					return Ok(value);
				},
				Err(DeliveryError::NetworkUnavailable(message)) => {
					tracing::warn!(url = %url, error = %message, "RPC endpoint unreachable");
					last_error = Some(DeliveryError::NetworkUnavailable(message));
				},
				Err(e) => return Err(e),
			}
		}

		Err(last_error
			.unwrap_or_else(|| DeliveryError::Network("No RPC endpoint configured".to_string())))
	}
}
