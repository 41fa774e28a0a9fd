//! Command-line entry point for the dApp toolkit.
//!
//! Deploys the configured contracts, sends value from a burner session and
//! resolves contracts from the deployment manifests.

use clap::{Parser, Subcommand};
use dapp_config::Config;
use dapp_core::{ChainReader, DappBuilder, DispatchError, TransactionOutcome, TxParams};
use dapp_registry::Binding;
use dapp_types::{Address, U256};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the toolkit.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", global = true)]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info", global = true)]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Deploy the configured contracts, then wait for verification
	Deploy {
		/// Network to deploy to; defaults to the target network
		#[arg(long)]
		network: Option<String>,
	},
	/// Send native value from a burner wallet session
	Send {
		#[arg(long)]
		to: Address,
		/// Amount in wei
		#[arg(long)]
		value: U256,
	},
	/// Look up a contract in the deployment manifests
	Resolve {
		name: String,
		/// Chain to look on; defaults to the target network's chain
		#[arg(long)]
		chain_id: Option<u64>,
	},
	/// Show the burner wallet's balances and chain heads
	Balance,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or_else(|| format!("Invalid config path {}", args.config.display()))?;
	let config = Config::from_file(config_path).await?;
	tracing::info!(
		app = %config.app.name,
		target = %config.app.target_network,
		"Loaded configuration"
	);

	let builder = DappBuilder::new(config);
	match args.command {
		Command::Deploy { network } => deploy(&builder, network).await,
		Command::Send { to, value } => send(&builder, to, value).await,
		Command::Resolve { name, chain_id } => resolve(&builder, &name, chain_id).await,
		Command::Balance => balance(&builder).await,
	}
}

async fn deploy(builder: &DappBuilder, network: Option<String>) -> Result<(), Box<dyn Error>> {
	let config = builder.config();
	let network_name = network.unwrap_or_else(|| config.app.target_network.clone());
	let descriptor = config
		.network(&network_name)
		.ok_or_else(|| format!("Unknown network '{}'", network_name))?;

	let orchestrator = builder.build_orchestrator(&network_name).await?;
	let deployed = orchestrator
		.deploy_all(&config.deployment.contracts, &network_name, descriptor)
		.await?;
	if deployed.is_empty() {
		println!("Nothing to deploy");
		return Ok(());
	}

	tracing::info!("Waiting for verification to finish");
	orchestrator.wait_for_verifications().await;

	for record in orchestrator.records().all().await? {
		let link = descriptor
			.tx_url(&record.tx_hash.to_string())
			.unwrap_or_default();
		println!(
			"{:<24} {} {:?} {}",
			record.contract_name, record.address, record.verification_state, link
		);
	}
	Ok(())
}

async fn send(builder: &DappBuilder, to: Address, value: U256) -> Result<(), Box<dyn Error>> {
	let manager = builder.build_session_manager()?;
	let session = manager.connect().await?;
	tracing::info!(address = ?session.address, chain_id = ?session.chain_id, "Session connected");

	let dispatcher = builder
		.build_dispatcher(manager.handle(), builder.read_delivery()?)
		.await?;

	// The first gas quote arrives shortly after the refresher starts
	let mut outcome = dispatcher.dispatch(TxParams::transfer(to, value)).await;
	for _ in 0..5 {
		if outcome != TransactionOutcome::Rejected(DispatchError::GasQuoteUnavailable) {
			break;
		}
		tokio::time::sleep(Duration::from_millis(500)).await;
		outcome = dispatcher.dispatch(TxParams::transfer(to, value)).await;
	}

	let result = match outcome {
		TransactionOutcome::Submitted(tx_hash) => {
			println!("Submitted {}", tx_hash);
			Ok(())
		},
		TransactionOutcome::Rejected(e) | TransactionOutcome::Failed(e) => Err(e.into()),
	};
	manager.logout().await.ok();
	result
}

async fn resolve(
	builder: &DappBuilder,
	name: &str,
	chain_id: Option<u64>,
) -> Result<(), Box<dyn Error>> {
	let chain_id = match chain_id {
		Some(chain_id) => chain_id,
		None => builder.config().target_network()?.chain_id,
	};
	let reader = builder.read_delivery()?;
	let registry = builder.build_registry(reader.clone()).await?;

	match registry.resolve(name, chain_id, Binding::ReadOnly(reader)) {
		Some(handle) => println!(
			"{} {} ({} functions)",
			handle.name(),
			handle.address(),
			handle.abi().functions().count()
		),
		None => println!("absent"),
	}
	Ok(())
}

async fn balance(builder: &DappBuilder) -> Result<(), Box<dyn Error>> {
	let config = builder.config();
	let target = config.target_network()?.chain_id;
	let mut chains = vec![target];
	if let Some((_, local)) = config.local_network() {
		if local.chain_id != target {
			chains.insert(0, local.chain_id);
		}
	}

	let manager = builder.build_session_manager()?;
	manager.connect().await?;
	let reader = ChainReader::new(builder.read_delivery()?);

	for balance in reader.session_balances(&manager.handle(), &chains).await? {
		println!(
			"chain {:>8}  {}  {} ETH",
			balance.chain_id,
			balance.address,
			balance.display_ether()
		);
	}
	for chain_id in chains {
		match reader.head(chain_id).await {
			Ok(head) => println!(
				"chain {:>8}  block {} at {}",
				head.chain_id, head.block_number, head.timestamp
			),
			Err(e) => tracing::warn!(chain_id, error = %e, "Chain head unavailable"),
		}
	}
	Ok(())
}
