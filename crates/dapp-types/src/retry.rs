//! Bounded retry with exponential backoff.
//!
//! [`RetryPolicy`] wraps the `backoff` crate's [`ExponentialBackoff`] schedule but
//! bounds retries by attempt count instead of elapsed time, so callers can reason
//! about exactly how many times an external service is contacted.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;

/// Retry policy bounded by a maximum number of attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
	/// Total attempts including the first one. Always at least 1.
	pub max_attempts: u32,
	/// Delay before the second attempt.
	pub initial_interval: Duration,
	/// Upper bound for a single delay.
	pub max_interval: Duration,
	/// Growth factor between consecutive delays.
	pub multiplier: f64,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 4,
			initial_interval: Duration::from_secs(2),
			max_interval: Duration::from_secs(30),
			multiplier: 2.0,
		}
	}
}

/// Final value of a retried operation and how many attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
	pub value: T,
	pub attempts: u32,
}

impl RetryPolicy {
	pub fn new(max_attempts: u32, initial_interval: Duration, max_interval: Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			initial_interval,
			max_interval,
			..Default::default()
		}
	}

	fn schedule(&self) -> ExponentialBackoff {
		let mut schedule = ExponentialBackoff {
			current_interval: self.initial_interval,
			initial_interval: self.initial_interval,
			randomization_factor: 0.0,
			multiplier: self.multiplier,
			max_interval: self.max_interval,
			max_elapsed_time: None,
			..ExponentialBackoff::default()
		};
		schedule.reset();
		schedule
	}

	/// Runs `op` until `should_retry` returns false or attempts are exhausted.
	///
	/// `op` receives the 1-based attempt number. The last produced value is returned
	/// whether or not it was considered retryable.
	pub async fn run<T, F, Fut, R>(&self, mut op: F, should_retry: R) -> RetryOutcome<T>
	where
		F: FnMut(u32) -> Fut,
		Fut: Future<Output = T>,
		R: Fn(&T) -> bool,
	{
		let mut schedule = self.schedule();
		let max_attempts = self.max_attempts.max(1);
		let mut attempt = 1;

		loop {
			let value = op(attempt).await;
			if !should_retry(&value) || attempt >= max_attempts {
				return RetryOutcome {
					value,
					attempts: attempt,
				};
			}

			let delay = schedule.next_backoff().unwrap_or(self.max_interval);
			tracing::debug!(attempt, max_attempts, ?delay, "Retrying after backoff");
			tokio::time::sleep(delay).await;
			attempt += 1;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[tokio::test(start_paused = true)]
	async fn test_stops_on_success() {
		let policy = RetryPolicy::default();
		let calls = Arc::new(AtomicU32::new(0));

		let outcome = policy
			.run(
				|attempt| {
					let calls = calls.clone();
					async move {
						calls.fetch_add(1, Ordering::SeqCst);
						attempt >= 2
					}
				},
				|ok| !ok,
			)
			.await;

		assert!(outcome.value);
		assert_eq!(outcome.attempts, 2);
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_bounded_by_attempts() {
		let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40));
		let outcome = policy.run(|_| async { false }, |ok| !ok).await;

		assert!(!outcome.value);
		assert_eq!(outcome.attempts, 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_delays_grow_exponentially() {
		let policy = RetryPolicy::new(4, Duration::from_secs(1), Duration::from_secs(60));
		let start = tokio::time::Instant::now();

		policy.run(|_| async { false }, |ok| !ok).await;

		// 1s + 2s + 4s between the four attempts
		let elapsed = start.elapsed();
		assert!(elapsed >= Duration::from_secs(7), "elapsed {:?}", elapsed);
		assert!(elapsed < Duration::from_secs(8), "elapsed {:?}", elapsed);
	}

	#[test]
	fn test_zero_attempts_is_clamped() {
		let policy = RetryPolicy::new(0, Duration::from_secs(1), Duration::from_secs(1));
		assert_eq!(policy.max_attempts, 1);
	}
}
