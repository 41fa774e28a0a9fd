//! Scriptable wallet provider and connector for tests.

use crate::{ProviderSignal, WalletConnector, WalletError, WalletProvider};
use async_trait::async_trait;
use dapp_types::{Address, Transaction, TransactionHash, B256, U256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Wallet provider whose accounts, chain and latencies are set by the test.
pub struct MockWalletProvider {
	id: String,
	accounts: Mutex<Vec<Address>>,
	chain_id: Mutex<u64>,
	chain_id_latency: Mutex<VecDeque<Duration>>,
	chain_id_error: Mutex<Option<WalletError>>,
	disconnect_latency: Mutex<Option<Duration>>,
	send_error: Mutex<Option<WalletError>>,
	sent: Mutex<Vec<Transaction>>,
	disconnects: AtomicUsize,
	signals: broadcast::Sender<ProviderSignal>,
}

impl MockWalletProvider {
	pub fn new(id: &str, account: Address, chain_id: u64) -> Self {
		let (signals, _) = broadcast::channel(64);
		Self {
			id: id.to_string(),
			accounts: Mutex::new(vec![account]),
			chain_id: Mutex::new(chain_id),
			chain_id_latency: Mutex::new(VecDeque::new()),
			chain_id_error: Mutex::new(None),
			disconnect_latency: Mutex::new(None),
			send_error: Mutex::new(None),
			sent: Mutex::new(Vec::new()),
			disconnects: AtomicUsize::new(0),
			signals,
		}
	}

	/// Delays applied to successive `chain_id` calls.
	pub fn script_chain_id_latency(&self, latencies: Vec<Duration>) {
		if let Ok(mut script) = self.chain_id_latency.lock() {
			*script = latencies.into();
		}
	}

	/// Makes every later `chain_id` call fail.
	pub fn fail_chain_id_with(&self, error: WalletError) {
		if let Ok(mut current) = self.chain_id_error.lock() {
			*current = Some(error);
		}
	}

	pub fn set_disconnect_latency(&self, latency: Duration) {
		if let Ok(mut current) = self.disconnect_latency.lock() {
			*current = Some(latency);
		}
	}

	pub fn set_accounts(&self, accounts: Vec<Address>) {
		if let Ok(mut current) = self.accounts.lock() {
			*current = accounts;
		}
	}

	pub fn set_chain_id(&self, chain_id: u64) {
		if let Ok(mut current) = self.chain_id.lock() {
			*current = chain_id;
		}
	}

	pub fn fail_sends_with(&self, error: WalletError) {
		if let Ok(mut current) = self.send_error.lock() {
			*current = Some(error);
		}
	}

	/// Emits a lifecycle signal to every subscriber.
	pub fn emit(&self, signal: ProviderSignal) {
		self.signals.send(signal).ok();
	}

	pub fn sent(&self) -> Vec<Transaction> {
		self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
	}

	pub fn disconnects(&self) -> usize {
		self.disconnects.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
	fn id(&self) -> &str {
		&self.id
	}

	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
		Ok(self
			.accounts
			.lock()
			.map(|accounts| accounts.clone())
			.unwrap_or_default())
	}

	async fn chain_id(&self) -> Result<u64, WalletError> {
		let latency = self
			.chain_id_latency
			.lock()
			.ok()
			.and_then(|mut script| script.pop_front());
		if let Some(latency) = latency {
			tokio::time::sleep(latency).await;
		}
		if let Some(error) = self.chain_id_error.lock().ok().and_then(|e| e.clone()) {
			return Err(error);
		}
		self.chain_id
			.lock()
			.map(|chain_id| *chain_id)
			.map_err(|e| WalletError::Provider(e.to_string()))
	}

	async fn send_transaction(&self, tx: Transaction) -> Result<TransactionHash, WalletError> {
		if let Some(error) = self.send_error.lock().ok().and_then(|e| e.clone()) {
			return Err(error);
		}
		let mut sent = self
			.sent
			.lock()
			.map_err(|e| WalletError::Provider(e.to_string()))?;
		sent.push(tx);
		Ok(TransactionHash(B256::from(U256::from(sent.len() as u64))))
	}

	async fn disconnect(&self) -> Result<(), WalletError> {
		let latency = self.disconnect_latency.lock().ok().and_then(|l| *l);
		if let Some(latency) = latency {
			tokio::time::sleep(latency).await;
		}
		self.disconnects.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	fn subscribe(&self) -> broadcast::Receiver<ProviderSignal> {
		self.signals.subscribe()
	}
}

/// Connector handing out a single mock provider.
pub struct MockConnector {
	provider: Arc<MockWalletProvider>,
	cached: Mutex<Option<String>>,
	select_latency: Option<Duration>,
	select_error: Option<WalletError>,
	selects: AtomicUsize,
	reconnects: AtomicUsize,
}

impl MockConnector {
	pub fn new(provider: Arc<MockWalletProvider>) -> Self {
		Self {
			provider,
			cached: Mutex::new(None),
			select_latency: None,
			select_error: None,
			selects: AtomicUsize::new(0),
			reconnects: AtomicUsize::new(0),
		}
	}

	pub fn with_cached(self, id: &str) -> Self {
		if let Ok(mut cached) = self.cached.lock() {
			*cached = Some(id.to_string());
		}
		self
	}

	pub fn with_select_latency(mut self, latency: Duration) -> Self {
		self.select_latency = Some(latency);
		self
	}

	pub fn with_select_error(mut self, error: WalletError) -> Self {
		self.select_error = Some(error);
		self
	}

	pub fn selects(&self) -> usize {
		self.selects.load(Ordering::SeqCst)
	}

	pub fn reconnects(&self) -> usize {
		self.reconnects.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl WalletConnector for MockConnector {
	fn cached_provider(&self) -> Option<String> {
		self.cached.lock().ok().and_then(|cached| cached.clone())
	}

	async fn reconnect(&self, id: &str) -> Result<Arc<dyn WalletProvider>, WalletError> {
		self.reconnects.fetch_add(1, Ordering::SeqCst);
		if id != self.provider.id() {
			return Err(WalletError::Provider(format!("unknown provider {}", id)));
		}
		Ok(self.provider.clone())
	}

	async fn select(&self) -> Result<Arc<dyn WalletProvider>, WalletError> {
		self.selects.fetch_add(1, Ordering::SeqCst);
		if let Some(latency) = self.select_latency {
			tokio::time::sleep(latency).await;
		}
		if let Some(error) = &self.select_error {
			return Err(error.clone());
		}
		if let Ok(mut cached) = self.cached.lock() {
			*cached = Some(self.provider.id().to_string());
		}
		Ok(self.provider.clone())
	}

	async fn clear_cached_provider(&self) {
		if let Ok(mut cached) = self.cached.lock() {
			*cached = None;
		}
	}
}
