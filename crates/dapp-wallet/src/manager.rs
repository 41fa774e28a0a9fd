//! Wallet session manager.
//!
//! A single task owns the session. Connect requests, logouts and provider
//! signals are funnelled through one command channel and handled in arrival
//! order. Rebuilding a session may await the provider, so rebuilds run as
//! spawned tasks tagged with a sequence number; only the completion carrying
//! the latest sequence is published, and a newer event aborts the older
//! rebuild outright. While a rebuild runs the published snapshot has no
//! signer, and every provider call is bounded by the connect timeout.

use crate::session::{SessionHandle, SessionState, WalletSession};
use crate::{ProviderSignal, WalletConnector, WalletError, WalletProvider};
use arc_swap::ArcSwap;
use dapp_types::{truncate_id, Address, AppEvent, EventBus, SessionEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

type ConnectReply = oneshot::Sender<Result<Arc<WalletSession>, WalletError>>;

enum Command {
	Connect(ConnectReply),
	Logout(oneshot::Sender<()>),
	Signal {
		generation: u64,
		signal: ProviderSignal,
	},
}

/// Provider state gathered by a rebuild task.
struct Rebuilt {
	provider: Arc<dyn WalletProvider>,
	address: Address,
	chain_id: u64,
}

struct Completion {
	seq: u64,
	result: Result<Rebuilt, WalletError>,
}

enum Pending {
	Connect(ConnectReply),
	Refresh,
}

struct InFlight {
	seq: u64,
	task: JoinHandle<()>,
	pending: Pending,
}

/// Owner of the live wallet session.
///
/// Dropping the manager stops its task.
pub struct WalletSessionManager {
	current: Arc<ArcSwap<WalletSession>>,
	commands: mpsc::UnboundedSender<Command>,
}

impl WalletSessionManager {
	/// Starts the session task in the Disconnected state.
	pub fn spawn(
		connector: Arc<dyn WalletConnector>,
		events: EventBus,
		connect_timeout: Duration,
	) -> Self {
		let current = Arc::new(ArcSwap::from_pointee(WalletSession::disconnected()));
		let (commands, command_rx) = mpsc::unbounded_channel();
		let (completion_tx, completion_rx) = mpsc::unbounded_channel();

		let session_loop = SessionLoop {
			connector,
			events,
			current: current.clone(),
			commands: command_rx,
			self_commands: commands.downgrade(),
			completion_tx,
			completions: completion_rx,
			connect_timeout,
			seq: 0,
			generation: 0,
			in_flight: None,
			forwarder: None,
		};
		tokio::spawn(session_loop.run());

		Self { current, commands }
	}

	/// Connects, reusing the cached provider when there is one.
	///
	/// Resolves once the session is Connected or the attempt failed. An already
	/// connected session is returned as is.
	pub async fn connect(&self) -> Result<Arc<WalletSession>, WalletError> {
		let (reply, response) = oneshot::channel();
		self.commands
			.send(Command::Connect(reply))
			.map_err(|_| WalletError::ManagerStopped)?;
		response.await.map_err(|_| WalletError::ManagerStopped)?
	}

	/// Forgets the cached provider, closes the provider and disconnects.
	pub async fn logout(&self) -> Result<(), WalletError> {
		let (reply, response) = oneshot::channel();
		self.commands
			.send(Command::Logout(reply))
			.map_err(|_| WalletError::ManagerStopped)?;
		response.await.map_err(|_| WalletError::ManagerStopped)
	}

	pub fn handle(&self) -> SessionHandle {
		SessionHandle::new(self.current.clone())
	}

	pub fn current(&self) -> Arc<WalletSession> {
		self.current.load_full()
	}
}

struct SessionLoop {
	connector: Arc<dyn WalletConnector>,
	events: EventBus,
	current: Arc<ArcSwap<WalletSession>>,
	commands: mpsc::UnboundedReceiver<Command>,
	self_commands: mpsc::WeakUnboundedSender<Command>,
	completion_tx: mpsc::UnboundedSender<Completion>,
	completions: mpsc::UnboundedReceiver<Completion>,
	connect_timeout: Duration,
	seq: u64,
	/// Bumped whenever the signal subscription is replaced or dropped.
	generation: u64,
	in_flight: Option<InFlight>,
	forwarder: Option<JoinHandle<()>>,
}

impl SessionLoop {
	async fn run(mut self) {
		loop {
			tokio::select! {
				command = self.commands.recv() => match command {
					Some(command) => self.handle_command(command).await,
					None => break,
				},
				Some(completion) = self.completions.recv() => {
					self.handle_completion(completion);
				}
			}
		}

		self.cancel_in_flight();
		self.stop_forwarder();
		tracing::debug!("Wallet session manager stopped");
	}

	async fn handle_command(&mut self, command: Command) {
		match command {
			Command::Connect(reply) => self.start_connect(reply),
			Command::Logout(reply) => {
				self.bounded("clear_cached_provider", self.connector.clear_cached_provider())
					.await;
				let session = self.current.load_full();
				if let Some(provider) = &session.provider {
					let provider = provider.inner().clone();
					self.bounded("disconnect", async move {
						if let Err(e) = provider.disconnect().await {
							tracing::warn!(error = %e, "Provider disconnect failed");
						}
					})
					.await;
				}
				self.disconnect(Some("logout".to_string())).await;
				let _ = reply.send(());
			},
			Command::Signal { generation, signal } => {
				if generation != self.generation {
					tracing::debug!(?signal, "Ignoring signal from a replaced provider");
					return;
				}
				self.handle_signal(signal).await;
			},
		}
	}

	fn start_connect(&mut self, reply: ConnectReply) {
		if self.current.load().is_connected() {
			let _ = reply.send(Ok(self.current.load_full()));
			return;
		}

		self.cancel_in_flight();
		let seq = self.next_seq();
		let cached = self.connector.cached_provider();
		tracing::info!(cached = ?cached, "Connecting wallet");
		let connecting = WalletSession::connecting(cached.clone());
		self.current.store(Arc::new(connecting));
		self.emit(SessionEvent::Connecting);

		let connector = self.connector.clone();
		let completions = self.completion_tx.clone();
		let timeout = self.connect_timeout;
		let task = tokio::spawn(async move {
			let result = tokio::time::timeout(timeout, establish(connector, cached))
				.await
				.unwrap_or(Err(WalletError::ConnectTimeout));
			let _ = completions.send(Completion { seq, result });
		});

		self.in_flight = Some(InFlight {
			seq,
			task,
			pending: Pending::Connect(reply),
		});
	}

	async fn handle_signal(&mut self, signal: ProviderSignal) {
		let Some(provider) = self
			.current
			.load()
			.provider
			.as_ref()
			.map(|handle| handle.inner().clone())
		else {
			return;
		};

		match signal {
			ProviderSignal::Disconnected { code, reason } => {
				tracing::info!(code, %reason, "Wallet provider disconnected");
				self.disconnect(Some(format!("{} ({})", reason, code))).await;
			},
			ProviderSignal::AccountsChanged { accounts } => match accounts.first() {
				Some(address) => {
					tracing::info!(address = %address, "Wallet account changed");
					self.start_refresh(provider, Some(*address), None);
				},
				None => {
					tracing::info!("Wallet locked");
					self.disconnect(Some("wallet locked".to_string())).await;
				},
			},
			ProviderSignal::NetworkChanged { chain_id } => {
				tracing::info!(chain_id, "Wallet network changed");
				self.start_refresh(provider, None, Some(chain_id));
			},
		}
	}

	fn start_refresh(
		&mut self,
		provider: Arc<dyn WalletProvider>,
		address: Option<Address>,
		chain_id: Option<u64>,
	) {
		self.cancel_in_flight();
		let refreshing = WalletSession::refreshing(&self.current.load());
		self.current.store(Arc::new(refreshing));

		let seq = self.next_seq();
		let completions = self.completion_tx.clone();
		let timeout = self.connect_timeout;
		let task = tokio::spawn(async move {
			let result = tokio::time::timeout(timeout, rebuild(provider, address, chain_id))
				.await
				.unwrap_or(Err(WalletError::ConnectTimeout));
			let _ = completions.send(Completion { seq, result });
		});

		self.in_flight = Some(InFlight {
			seq,
			task,
			pending: Pending::Refresh,
		});
	}

	fn handle_completion(&mut self, completion: Completion) {
		let Some(in_flight) = self.in_flight.take_if(|f| f.seq == completion.seq) else {
			tracing::debug!(seq = completion.seq, "Discarding superseded session rebuild");
			return;
		};

		match completion.result {
			Ok(rebuilt) => {
				let state = match in_flight.pending {
					Pending::Connect(_) => {
						self.start_forwarder(&rebuilt.provider);
						SessionState::Connected
					},
					Pending::Refresh => SessionState::Refreshed,
				};
				let session = Arc::new(WalletSession::connected(
					rebuilt.provider,
					rebuilt.address,
					rebuilt.chain_id,
					state,
				));
				self.current.store(session.clone());

				tracing::info!(
					address = %truncate_id(&rebuilt.address.to_string()),
					chain_id = rebuilt.chain_id,
					?state,
					"Wallet session published"
				);
				self.emit(match state {
					SessionState::Refreshed => SessionEvent::Refreshed {
						address: rebuilt.address,
						chain_id: rebuilt.chain_id,
					},
					_ => SessionEvent::Connected {
						address: rebuilt.address,
						chain_id: rebuilt.chain_id,
					},
				});

				if let Pending::Connect(reply) = in_flight.pending {
					let _ = reply.send(Ok(session));
				}
			},
			Err(error) => {
				tracing::warn!(error = %error, "Wallet session failed");
				self.stop_forwarder();
				let cached = self.connector.cached_provider();
				self.current.store(Arc::new(WalletSession {
					cached_provider_id: cached,
					..WalletSession::disconnected()
				}));
				self.emit(SessionEvent::Disconnected {
					reason: Some(error.to_string()),
				});
				self.emit(SessionEvent::Notice {
					message: format!("Wallet error: {}", error),
				});

				if let Pending::Connect(reply) = in_flight.pending {
					let _ = reply.send(Err(error));
				}
			},
		}
	}

	async fn disconnect(&mut self, reason: Option<String>) {
		self.cancel_in_flight();
		self.stop_forwarder();
		self.bounded("clear_cached_provider", self.connector.clear_cached_provider())
			.await;
		self.current.store(Arc::new(WalletSession::disconnected()));
		self.emit(SessionEvent::Disconnected { reason });
		self.emit(SessionEvent::ReloadRequired);
	}

	/// Aborts the running rebuild. A pending connect resolves as cancelled.
	fn cancel_in_flight(&mut self) {
		if let Some(in_flight) = self.in_flight.take() {
			in_flight.task.abort();
			if let Pending::Connect(reply) = in_flight.pending {
				let _ = reply.send(Err(WalletError::ConnectCancelled));
			}
		}
	}

	fn start_forwarder(&mut self, provider: &Arc<dyn WalletProvider>) {
		self.stop_forwarder();
		let generation = self.generation;
		let mut signals = provider.subscribe();
		let commands = self.self_commands.clone();

		self.forwarder = Some(tokio::spawn(async move {
			loop {
				match signals.recv().await {
					Ok(signal) => {
						let Some(commands) = commands.upgrade() else {
							break;
						};
						if commands.send(Command::Signal { generation, signal }).is_err() {
							break;
						}
					},
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "Dropped wallet signals");
					},
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}
		}));
	}

	fn stop_forwarder(&mut self) {
		if let Some(forwarder) = self.forwarder.take() {
			forwarder.abort();
		}
		self.generation += 1;
	}

	/// Awaits a provider or connector call for at most the connect timeout.
	async fn bounded(&self, call: &'static str, work: impl Future<Output = ()>) {
		if tokio::time::timeout(self.connect_timeout, work).await.is_err() {
			tracing::warn!(call, "Wallet call timed out");
		}
	}

	fn next_seq(&mut self) -> u64 {
		self.seq += 1;
		self.seq
	}

	fn emit(&self, event: SessionEvent) {
		self.events.publish(AppEvent::Session(event)).ok();
	}
}

/// Obtains a provider and reads its account and chain.
///
/// A cached provider is reconnected silently; if that fails the cache is
/// cleared and the user is asked to pick again.
async fn establish(
	connector: Arc<dyn WalletConnector>,
	cached: Option<String>,
) -> Result<Rebuilt, WalletError> {
	let provider = match cached {
		Some(id) => match connector.reconnect(&id).await {
			Ok(provider) => provider,
			Err(e) => {
				tracing::warn!(provider = %id, error = %e, "Silent reconnect failed");
				connector.clear_cached_provider().await;
				connector.select().await?
			},
		},
		None => connector.select().await?,
	};

	let accounts = provider.request_accounts().await?;
	let address = *accounts.first().ok_or(WalletError::NoAccounts)?;
	let chain_id = provider.chain_id().await?;

	Ok(Rebuilt {
		provider,
		address,
		chain_id,
	})
}

/// Re-reads whatever the signal did not carry.
async fn rebuild(
	provider: Arc<dyn WalletProvider>,
	address: Option<Address>,
	chain_id: Option<u64>,
) -> Result<Rebuilt, WalletError> {
	let address = match address {
		Some(address) => address,
		None => *provider
			.request_accounts()
			.await?
			.first()
			.ok_or(WalletError::NoAccounts)?,
	};
	let chain_id = match chain_id {
		Some(chain_id) => chain_id,
		None => provider.chain_id().await?,
	};

	Ok(Rebuilt {
		provider,
		address,
		chain_id,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::mock::{MockConnector, MockWalletProvider};

	fn setup(
		connector: MockConnector,
	) -> (WalletSessionManager, broadcast::Receiver<AppEvent>) {
		let events = EventBus::new(64);
		let receiver = events.subscribe();
		let manager =
			WalletSessionManager::spawn(Arc::new(connector), events, Duration::from_secs(30));
		(manager, receiver)
	}

	fn session_events(receiver: &mut broadcast::Receiver<AppEvent>) -> Vec<SessionEvent> {
		let mut events = Vec::new();
		while let Ok(event) = receiver.try_recv() {
			if let AppEvent::Session(event) = event {
				events.push(event);
			}
		}
		events
	}

	/// Lets the manager task drain its queues.
	async fn settle() {
		for _ in 0..20 {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test]
	async fn test_connect_selects_provider() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let connector = MockConnector::new(provider.clone());
		let events = EventBus::new(64);
		let mut receiver = events.subscribe();
		let connector = Arc::new(connector);
		let manager = WalletSessionManager::spawn(connector.clone(), events, Duration::from_secs(30));

		let session = manager.connect().await.unwrap();

		assert_eq!(session.state, SessionState::Connected);
		assert_eq!(session.address, Some(Address::repeat_byte(1)));
		assert_eq!(session.chain_id, Some(1));
		assert_eq!(connector.selects(), 1);
		assert_eq!(connector.cached_provider(), Some("injected".to_string()));
		assert_eq!(
			session_events(&mut receiver),
			vec![
				SessionEvent::Connecting,
				SessionEvent::Connected {
					address: Address::repeat_byte(1),
					chain_id: 1
				}
			]
		);

		// Second connect returns the live session
		let again = manager.connect().await.unwrap();
		assert!(Arc::ptr_eq(&session, &again));
		assert_eq!(connector.selects(), 1);
	}

	#[tokio::test]
	async fn test_cached_provider_reconnects_silently() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let connector = Arc::new(MockConnector::new(provider).with_cached("injected"));
		let manager =
			WalletSessionManager::spawn(connector.clone(), EventBus::new(16), Duration::from_secs(30));

		manager.connect().await.unwrap();

		assert_eq!(connector.reconnects(), 1);
		assert_eq!(connector.selects(), 0);
	}

	#[tokio::test]
	async fn test_stale_cache_falls_back_to_select() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let connector = Arc::new(MockConnector::new(provider).with_cached("walletconnect"));
		let manager =
			WalletSessionManager::spawn(connector.clone(), EventBus::new(16), Duration::from_secs(30));

		let session = manager.connect().await.unwrap();

		assert_eq!(session.cached_provider_id, Some("injected".to_string()));
		assert_eq!(connector.reconnects(), 1);
		assert_eq!(connector.selects(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_overlapping_account_changes_keep_latest() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		// connect, slow rebuild for the first change, fast rebuild for the second
		provider.script_chain_id_latency(vec![
			Duration::ZERO,
			Duration::from_secs(10),
			Duration::ZERO,
		]);
		let (manager, mut receiver) = setup(MockConnector::new(provider.clone()));
		manager.connect().await.unwrap();
		session_events(&mut receiver);

		provider.emit(ProviderSignal::AccountsChanged {
			accounts: vec![Address::repeat_byte(2)],
		});
		settle().await;
		provider.emit(ProviderSignal::AccountsChanged {
			accounts: vec![Address::repeat_byte(3)],
		});
		settle().await;
		tokio::time::sleep(Duration::from_secs(20)).await;

		let session = manager.current();
		assert_eq!(session.state, SessionState::Refreshed);
		assert_eq!(session.address, Some(Address::repeat_byte(3)));
		assert_eq!(
			session_events(&mut receiver),
			vec![SessionEvent::Refreshed {
				address: Address::repeat_byte(3),
				chain_id: 1
			}]
		);
	}

	#[tokio::test]
	async fn test_network_change_rebuilds_signer() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let (manager, _receiver) = setup(MockConnector::new(provider.clone()));
		let before = manager.connect().await.unwrap();
		let handle = manager.handle();

		provider.emit(ProviderSignal::NetworkChanged { chain_id: 5 });
		settle().await;

		let after = handle.current();
		assert_eq!(after.state, SessionState::Refreshed);
		assert_eq!(after.chain_id, Some(5));
		assert_eq!(handle.chain_id(), Some(5));
		let (old_signer, new_signer) = (before.signer.clone().unwrap(), handle.signer().unwrap());
		assert!(!Arc::ptr_eq(&old_signer, &new_signer));
		assert_eq!(new_signer.chain_id(), 5);
	}

	#[tokio::test]
	async fn test_provider_disconnect_clears_session() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let connector = Arc::new(MockConnector::new(provider.clone()));
		let events = EventBus::new(64);
		let mut receiver = events.subscribe();
		let manager = WalletSessionManager::spawn(connector.clone(), events, Duration::from_secs(30));
		manager.connect().await.unwrap();
		session_events(&mut receiver);

		provider.emit(ProviderSignal::Disconnected {
			code: 4900,
			reason: "closed".into(),
		});
		settle().await;

		let session = manager.current();
		assert_eq!(session.state, SessionState::Disconnected);
		assert!(session.signer.is_none());
		assert_eq!(connector.cached_provider(), None);
		assert_eq!(
			session_events(&mut receiver),
			vec![
				SessionEvent::Disconnected {
					reason: Some("closed (4900)".into())
				},
				SessionEvent::ReloadRequired
			]
		);

		// Signals from the dropped provider no longer reach the session
		provider.emit(ProviderSignal::NetworkChanged { chain_id: 5 });
		settle().await;
		assert_eq!(manager.current().state, SessionState::Disconnected);
	}

	#[tokio::test]
	async fn test_empty_accounts_means_disconnect() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let (manager, _receiver) = setup(MockConnector::new(provider.clone()));
		manager.connect().await.unwrap();

		provider.emit(ProviderSignal::AccountsChanged { accounts: vec![] });
		settle().await;

		assert_eq!(manager.current().state, SessionState::Disconnected);
	}

	#[tokio::test(start_paused = true)]
	async fn test_logout_cancels_pending_connect() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let connector = MockConnector::new(provider).with_select_latency(Duration::from_secs(10));
		let (manager, _receiver) = setup(connector);
		let manager = Arc::new(manager);

		let connecting = {
			let manager = manager.clone();
			tokio::spawn(async move { manager.connect().await })
		};
		settle().await;
		assert_eq!(manager.current().state, SessionState::Connecting);

		manager.logout().await.unwrap();

		assert_eq!(
			connecting.await.unwrap().unwrap_err(),
			WalletError::ConnectCancelled
		);
		tokio::time::sleep(Duration::from_secs(20)).await;
		assert_eq!(manager.current().state, SessionState::Disconnected);
	}

	#[tokio::test]
	async fn test_logout_closes_provider() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let connector = Arc::new(MockConnector::new(provider.clone()));
		let manager =
			WalletSessionManager::spawn(connector.clone(), EventBus::new(16), Duration::from_secs(30));
		manager.connect().await.unwrap();

		manager.logout().await.unwrap();

		assert_eq!(provider.disconnects(), 1);
		assert_eq!(connector.cached_provider(), None);
		assert_eq!(manager.current().state, SessionState::Disconnected);
	}

	#[tokio::test]
	async fn test_rejected_connect_reports_notice() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let connector = MockConnector::new(provider)
			.with_select_error(WalletError::UserRejected("user rejected the request".into()));
		let (manager, mut receiver) = setup(connector);

		let error = manager.connect().await.unwrap_err();

		assert!(matches!(error, WalletError::UserRejected(_)));
		assert_eq!(manager.current().state, SessionState::Disconnected);
		let events = session_events(&mut receiver);
		assert!(events
			.iter()
			.any(|event| matches!(event, SessionEvent::Notice { .. })));
	}

	#[tokio::test(start_paused = true)]
	async fn test_connect_times_out() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let connector = MockConnector::new(provider).with_select_latency(Duration::from_secs(60));
		let (manager, _receiver) = setup(connector);

		assert_eq!(manager.connect().await.unwrap_err(), WalletError::ConnectTimeout);
	}

	#[tokio::test(start_paused = true)]
	async fn test_rebuild_withholds_old_signer() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		// connect, then a chain id read that hangs
		provider.script_chain_id_latency(vec![Duration::ZERO, Duration::from_secs(3600)]);
		let (manager, mut receiver) = setup(MockConnector::new(provider.clone()));
		manager.connect().await.unwrap();
		session_events(&mut receiver);

		provider.emit(ProviderSignal::AccountsChanged {
			accounts: vec![Address::repeat_byte(2)],
		});
		settle().await;

		let rebuilding = manager.current();
		assert_eq!(rebuilding.state, SessionState::Connecting);
		assert!(rebuilding.signer.is_none());
		assert!(manager.handle().signer().is_none());

		tokio::time::sleep(Duration::from_secs(120)).await;

		let session = manager.current();
		assert_eq!(session.state, SessionState::Disconnected);
		assert!(session.signer.is_none());
		let events = session_events(&mut receiver);
		assert!(events.contains(&SessionEvent::Disconnected {
			reason: Some(WalletError::ConnectTimeout.to_string())
		}));
		assert!(events
			.iter()
			.any(|event| matches!(event, SessionEvent::Notice { .. })));
	}

	#[tokio::test]
	async fn test_failed_refresh_disconnects_with_notice() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		let (manager, mut receiver) = setup(MockConnector::new(provider.clone()));
		manager.connect().await.unwrap();
		session_events(&mut receiver);

		provider.fail_chain_id_with(WalletError::Provider("chain unavailable".into()));
		provider.emit(ProviderSignal::AccountsChanged {
			accounts: vec![Address::repeat_byte(2)],
		});
		settle().await;

		let session = manager.current();
		assert_eq!(session.state, SessionState::Disconnected);
		assert!(session.signer.is_none());
		assert_eq!(session.cached_provider_id, Some("injected".to_string()));
		assert_eq!(
			session_events(&mut receiver),
			vec![
				SessionEvent::Disconnected {
					reason: Some("Provider error: chain unavailable".into())
				},
				SessionEvent::Notice {
					message: "Wallet error: Provider error: chain unavailable".into()
				}
			]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_disconnect_during_refresh_wins() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		provider.script_chain_id_latency(vec![Duration::ZERO, Duration::from_secs(10)]);
		let (manager, mut receiver) = setup(MockConnector::new(provider.clone()));
		manager.connect().await.unwrap();
		session_events(&mut receiver);

		provider.emit(ProviderSignal::AccountsChanged {
			accounts: vec![Address::repeat_byte(2)],
		});
		settle().await;
		provider.emit(ProviderSignal::Disconnected {
			code: 4900,
			reason: "closed".into(),
		});
		settle().await;
		tokio::time::sleep(Duration::from_secs(20)).await;

		assert_eq!(manager.current().state, SessionState::Disconnected);
		assert_eq!(
			session_events(&mut receiver),
			vec![
				SessionEvent::Disconnected {
					reason: Some("closed (4900)".into())
				},
				SessionEvent::ReloadRequired
			]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_logout_bounds_hung_disconnect() {
		let provider = Arc::new(MockWalletProvider::new("injected", Address::repeat_byte(1), 1));
		provider.set_disconnect_latency(Duration::from_secs(3600));
		let (manager, _receiver) = setup(MockConnector::new(provider.clone()));
		manager.connect().await.unwrap();

		let started = tokio::time::Instant::now();
		manager.logout().await.unwrap();

		assert!(started.elapsed() < Duration::from_secs(60));
		assert_eq!(manager.current().state, SessionState::Disconnected);
		assert_eq!(provider.disconnects(), 0);
	}
}
