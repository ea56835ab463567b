//! Main entry point for the SteakHouse trader CLI.
//!
//! This binary wires the trader services together from a configuration file
//! and runs one command: a trade through the orchestrator, a status check on
//! an existing transaction, a balance lookup or a token chart fetch.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use trader_backend::BackendService;
use trader_config::Config;
use trader_core::{EventBus, TokenDataCache, TradeOrchestrator};
use trader_delivery::DeliveryService;
use trader_storage::StorageService;

mod commands;

use commands::Command;
use trader_account::implementations::local::create_account;
use trader_account::AccountService;
use trader_backend::implementations::http::create_backend;
use trader_delivery::implementations::evm::alloy::create_http_delivery;
use trader_storage::implementations::memory::MemoryStorage;

/// Command-line arguments for the trader.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

/// The wired trader services.
pub struct Trader {
	pub config: Config,
	pub delivery: Arc<DeliveryService>,
	pub event_bus: EventBus,
	pub orchestrator: Arc<TradeOrchestrator>,
	pub token_data: Arc<TokenDataCache>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.trader.id);

	let trader = build_trader(config).await?;
	let cleanup = trader.token_data.spawn_cleanup();

	let result = commands::run(&trader, args.command).await;
	cleanup.abort();
	result
}

/// Builds the trader services from configuration.
///
/// The signing key, when present, must belong to `trader.wallet_address`.
/// Without an `[account]` section the chain provider is read-only: backend
/// trades, status checks and lookups work, while top-ups and deployments fail
/// with a missing-signer error.
async fn build_trader(config: Config) -> Result<Trader, Box<dyn std::error::Error>> {
	let account = match &config.account {
		Some(account) => {
			let account = AccountService::new(create_account(&account.private_key)?);
			let signer = account.get_address().await?;
			if signer != config.trader.wallet_address {
				return Err(format!(
					"account.private_key belongs to {} but trader.wallet_address is {}",
					signer, config.trader.wallet_address
				)
				.into());
			}
			Some(account)
		},
		None => None,
	};

	let private_key = account.as_ref().map(|account| account.get_private_key());
	let provider = create_http_delivery(
		config.chain.chain_id,
		&config.chain.rpc_url,
		private_key.as_ref(),
	)?;
	let delivery = Arc::new(DeliveryService::new(provider, config.poller.clone()));

	let backend = Arc::new(BackendService::new(create_backend(&config.backend)?));
	let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
	let event_bus = EventBus::default();

	let orchestrator = Arc::new(TradeOrchestrator::new(
		config.trader.wallet_address,
		config.chain.chain_id,
		delivery.clone(),
		backend.clone(),
		event_bus.clone(),
	));
	let token_data = Arc::new(TokenDataCache::new(storage, backend, &config.cache));

	Ok(Trader {
		config,
		delivery,
		event_bus,
		orchestrator,
		token_data,
	})
}
