//! Scripted verifier for tests.

use crate::{VerificationOutcome, VerificationRequest, VerifierInterface};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Returns scripted outcomes in order, then repeats the fallback.
pub struct MockVerifier {
	script: Mutex<VecDeque<VerificationOutcome>>,
	fallback: VerificationOutcome,
	latency: Option<Duration>,
	attempts: AtomicUsize,
	requests: Mutex<Vec<VerificationRequest>>,
}

impl MockVerifier {
	pub fn scripted(outcomes: Vec<VerificationOutcome>) -> Self {
		let fallback = outcomes
			.last()
			.cloned()
			.unwrap_or(VerificationOutcome::Verified);
		Self {
			script: Mutex::new(outcomes.into()),
			fallback,
			latency: None,
			attempts: AtomicUsize::new(0),
			requests: Mutex::new(Vec::new()),
		}
	}

	pub fn always(outcome: VerificationOutcome) -> Self {
		Self::scripted(vec![outcome])
	}

	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);
		self
	}

	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}

	/// Requests received, in order.
	pub fn requests(&self) -> Vec<VerificationRequest> {
		self.requests
			.lock()
			.map(|requests| requests.clone())
			.unwrap_or_default()
	}
}

#[async_trait]
impl VerifierInterface for MockVerifier {
	async fn verify(&self, request: &VerificationRequest) -> VerificationOutcome {
		self.attempts.fetch_add(1, Ordering::SeqCst);
		if let Ok(mut requests) = self.requests.lock() {
			requests.push(request.clone());
		}
		if let Some(latency) = self.latency {
			tokio::time::sleep(latency).await;
		}
		self.script
			.lock()
			.ok()
			.and_then(|mut script| script.pop_front())
			.unwrap_or_else(|| self.fallback.clone())
	}
}
