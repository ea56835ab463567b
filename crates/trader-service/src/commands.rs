//! Command handlers for the trader CLI.
//!
//! Trade commands run through the orchestrator and print every status change
//! as it is published. Ctrl+C stops waiting for confirmation without touching
//! the broadcast transaction.

use crate::Trader;
use clap::Subcommand;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use trader_core::TradeOrchestrator;
use trader_delivery::AbortSignal;
use trader_types::{
	format_units, Address, Bytes, TradeEvent, TradeIntent, TradeOutcome, TradeStatus,
	Transaction, TransactionHash, U256,
};

/// Wei per ether.
const ETHER_DECIMALS: u8 = 18;

const PRINTER_DRAIN: Duration = Duration::from_secs(1);

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
	/// Buy a token through the backend
	Buy {
		/// Token contract address
		#[arg(value_parser = parse_address)]
		token: Address,
		/// Amount to spend, in wei or with an `eth` suffix
		#[arg(value_parser = parse_amount)]
		amount: U256,
		/// Maximum slippage in basis points
		#[arg(long)]
		slippage_bps: Option<u32>,
	},
	/// Sell a token through the backend
	Sell {
		#[arg(value_parser = parse_address)]
		token: Address,
		/// Amount of tokens to sell, in base units
		#[arg(value_parser = parse_amount)]
		amount: U256,
		#[arg(long)]
		slippage_bps: Option<u32>,
	},
	/// Send native currency from the local wallet to the trading wallet
	TopUp {
		#[arg(value_parser = parse_amount)]
		amount: U256,
	},
	/// Move native currency from the trading wallet back to the local wallet
	Withdraw {
		#[arg(value_parser = parse_amount)]
		amount: U256,
	},
	/// Deploy a contract from hex-encoded creation bytecode
	Deploy {
		#[arg(value_parser = parse_bytes)]
		bytecode: Bytes,
		/// Value sent with the deployment, in wei or with an `eth` suffix
		#[arg(long, value_parser = parse_amount, default_value = "0")]
		value: U256,
		#[arg(long)]
		gas_limit: Option<u64>,
	},
	/// Poll a transaction hash until it reaches a terminal state
	Status {
		#[arg(value_parser = parse_hash)]
		hash: TransactionHash,
	},
	/// Show the native balance of the configured wallet or another address
	Balance {
		#[arg(value_parser = parse_address)]
		address: Option<Address>,
	},
	/// Fetch token chart data
	TokenData {
		#[arg(value_parser = parse_address)]
		token: Address,
		#[arg(long, default_value = "1h")]
		interval: String,
		#[arg(long, default_value_t = 100)]
		limit: u32,
	},
}

impl Command {
	/// The trade intent for commands that run through the orchestrator.
	pub fn intent(&self, chain_id: u64) -> Option<TradeIntent> {
		match self.clone() {
			Command::Buy {
				token,
				amount,
				slippage_bps,
			} => Some(TradeIntent::Buy {
				token,
				amount,
				slippage_bps,
			}),
			Command::Sell {
				token,
				amount,
				slippage_bps,
			} => Some(TradeIntent::Sell {
				token,
				amount,
				slippage_bps,
			}),
			Command::TopUp { amount } => Some(TradeIntent::TopUp { amount }),
			Command::Withdraw { amount } => Some(TradeIntent::Withdraw { amount }),
			Command::Deploy {
				bytecode,
				value,
				gas_limit,
			} => Some(TradeIntent::Contract(Transaction {
				chain_id,
				to: None,
				data: bytecode,
				value,
				gas_limit,
				max_fee_per_gas: None,
				max_priority_fee_per_gas: None,
			})),
			Command::Status { .. } | Command::Balance { .. } | Command::TokenData { .. } => None,
		}
	}
}

/// Parses an amount given in wei, or in ether with an `eth` suffix.
pub fn parse_amount(input: &str) -> Result<U256, String> {
	let input = input.trim();
	let Some(ether) = input.strip_suffix("eth") else {
		return input
			.parse::<U256>()
			.map_err(|e| format!("invalid amount '{}': {}", input, e));
	};

	let ether = ether.trim();
	let (whole, fraction) = ether.split_once('.').unwrap_or((ether, ""));
	if fraction.len() > ETHER_DECIMALS as usize {
		return Err(format!("'{}' has more than {} decimals", input, ETHER_DECIMALS));
	}
	let whole = if whole.is_empty() { "0" } else { whole };
	let digits = format!("{}{:0<width$}", whole, fraction, width = ETHER_DECIMALS as usize);
	if !digits.chars().all(|c| c.is_ascii_digit()) {
		return Err(format!("invalid amount '{}'", input));
	}
	digits
		.parse::<U256>()
		.map_err(|e| format!("invalid amount '{}': {}", input, e))
}

pub fn parse_address(input: &str) -> Result<Address, String> {
	input
		.trim()
		.parse::<Address>()
		.map_err(|e| format!("invalid address '{}': {}", input, e))
}

pub fn parse_bytes(input: &str) -> Result<Bytes, String> {
	input
		.trim()
		.parse::<Bytes>()
		.map_err(|e| format!("invalid hex '{}': {}", input, e))
}

pub fn parse_hash(input: &str) -> Result<TransactionHash, String> {
	let hash: TransactionHash = input
		.trim()
		.parse()
		.map_err(|e| format!("invalid hash '{}': {}", input, e))?;
	if hash.0.len() != 32 {
		return Err(format!("hash must be 32 bytes, got {}", hash.0.len()));
	}
	Ok(hash)
}

/// Runs one CLI command to completion.
pub async fn run(trader: &Trader, command: Command) -> Result<(), Box<dyn std::error::Error>> {
	if let Some(intent) = command.intent(trader.config.chain.chain_id) {
		return run_trade(&trader.orchestrator, intent, &trader.event_bus).await;
	}

	match command {
		Command::Status { hash } => {
			let outcome = trader.delivery.confirm(&hash, &AbortSignal::never()).await;
			println!("{:?}", outcome);
		},
		Command::Balance { address } => {
			let address = address.unwrap_or(trader.config.trader.wallet_address);
			let balance = trader.delivery.get_balance(address).await?;
			println!(
				"{} {} ETH ({} wei)",
				address,
				format_units(balance, ETHER_DECIMALS),
				balance
			);
		},
		Command::TokenData {
			token,
			interval,
			limit,
		} => {
			let data = trader.token_data.get(token, &interval, limit).await?;
			println!("{}", serde_json::to_string_pretty(&data)?);
		},
		_ => {},
	}
	Ok(())
}

async fn run_trade(
	orchestrator: &Arc<TradeOrchestrator>,
	intent: TradeIntent,
	event_bus: &trader_core::EventBus,
) -> Result<(), Box<dyn std::error::Error>> {
	let mut events = event_bus.subscribe();
	let printer = tokio::spawn(async move {
		loop {
			match events.recv().await {
				Ok(event) => {
					if let Some(line) = describe_event(&event) {
						println!("{}", line);
					}
					if matches!(&event, TradeEvent::StatusChanged { status, .. } if status.is_terminal()) {
						break;
					}
				},
				Err(RecvError::Lagged(missed)) => {
					tracing::warn!(missed, "Dropped trade events");
				},
				Err(RecvError::Closed) => break,
			}
		}
	});

	let mut handle = orchestrator.spawn(intent);
	let result = tokio::select! {
		result = &mut handle => result?,
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Interrupted, no longer waiting for confirmation");
			orchestrator.cancel();
			handle.await?
		}
	};

	if tokio::time::timeout(PRINTER_DRAIN, printer).await.is_err() {
		tracing::debug!("Event printer did not see a terminal status");
	}

	let outcome = result?;
	println!("{}", describe_outcome(&outcome));
	Ok(())
}

fn describe_event(event: &TradeEvent) -> Option<String> {
	match event {
		TradeEvent::StatusChanged {
			trade_id, status, ..
		} => Some(format!("[{}] {}", trade_id, describe_status(status))),
		TradeEvent::TransactionPending { .. } | TradeEvent::Completed { .. } => None,
	}
}

pub fn describe_status(status: &TradeStatus) -> String {
	match status {
		TradeStatus::Idle => "idle".to_string(),
		TradeStatus::Submitting => "submitting".to_string(),
		TradeStatus::AwaitingConfirmation { hash } => format!("awaiting confirmation of {}", hash),
		TradeStatus::Succeeded { hash, address } => match address {
			Some(address) => format!("succeeded in {} ({})", hash, address),
			None => format!("succeeded in {}", hash),
		},
		TradeStatus::Failed { message, top_up } => match top_up {
			Some(top_up) => match top_up.trading_wallet {
				Some(wallet) => format!(
					"failed: {}. Run `trader top-up {}` to fund trading wallet {}",
					message, top_up.need_wei, wallet
				),
				None => format!("failed: {}", message),
			},
			None => format!("failed: {}", message),
		},
	}
}

pub fn describe_outcome(outcome: &TradeOutcome) -> String {
	match outcome {
		TradeOutcome::Success { hash, address } => match address {
			Some(address) => format!("Success: {} at {}", hash, address),
			None => format!("Success: {}", hash),
		},
		TradeOutcome::Reverted { hash, reason } => format!("Reverted: {} ({})", hash, reason),
		TradeOutcome::TimedOut { hash } => {
			format!("Timed out waiting for {}; check it on a block explorer", hash)
		},
		TradeOutcome::InsufficientFunds { need_wei } => format!(
			"Insufficient funds: need {} more ETH ({} wei)",
			format_units(*need_wei, ETHER_DECIMALS),
			need_wei
		),
	}
}
