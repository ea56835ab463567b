//! Trade orchestration.
//!
//! Sequences submission and confirmation for one trade slot at a time and
//! maintains the slot's [`TradeStatus`]. Buy, sell and withdraw are executed by
//! the backend from the trading wallet; top-up and contract intents are signed
//! by the local wallet. Every status change is published on the event bus.

use crate::event_bus::EventBus;
use crate::TradeError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::instrument;
use trader_backend::{BackendError, BackendService, BuyRequest, SellRequest};
use trader_delivery::{
	abort_pair, AbortHandle, AbortSignal, DeliveryError, DeliveryService, PollOutcome,
};
use trader_types::{
	abbreviate_hex, Address, InsufficientFunds, TopUpSuggestion, TradeEvent, TradeIntent, TradeKind,
	TradeOutcome, TradeStatus, Transaction, TransactionHash, U256,
};

/// Why a submission did not produce a hash.
enum SubmitFailure {
	/// The paying wallet is short; carries the node's `have`/`want`.
	InsufficientFunds(InsufficientFunds),
	Error(TradeError),
}

impl From<DeliveryError> for SubmitFailure {
	fn from(err: DeliveryError) -> Self {
		match err {
			DeliveryError::InsufficientFunds { have, want } => {
				SubmitFailure::InsufficientFunds(InsufficientFunds { have, want })
			},
			DeliveryError::ProviderUnavailable => {
				SubmitFailure::Error(TradeError::ProviderUnavailable)
			},
			DeliveryError::UserRejected => SubmitFailure::Error(TradeError::UserRejected),
			DeliveryError::Broadcast(msg) | DeliveryError::Network(msg) => {
				SubmitFailure::Error(TradeError::Broadcast(msg))
			},
		}
	}
}

impl From<BackendError> for SubmitFailure {
	fn from(err: BackendError) -> Self {
		match err {
			BackendError::InsufficientFunds { have, want } => {
				SubmitFailure::InsufficientFunds(InsufficientFunds { have, want })
			},
			other => SubmitFailure::Error(TradeError::Backend(other.to_string())),
		}
	}
}

/// Runs trades for one connected wallet, one at a time.
pub struct TradeOrchestrator {
	/// The user's connected wallet.
	wallet: Address,
	chain_id: u64,
	delivery: Arc<DeliveryService>,
	backend: Arc<BackendService>,
	event_bus: EventBus,
	status: Mutex<TradeStatus>,
	/// Abort handle of the trade in flight, if any.
	abort: Mutex<Option<AbortHandle>>,
	next_trade: AtomicU64,
}

impl TradeOrchestrator {
	pub fn new(
		wallet: Address,
		chain_id: u64,
		delivery: Arc<DeliveryService>,
		backend: Arc<BackendService>,
		event_bus: EventBus,
	) -> Self {
		Self {
			wallet,
			chain_id,
			delivery,
			backend,
			event_bus,
			status: Mutex::new(TradeStatus::Idle),
			abort: Mutex::new(None),
			next_trade: AtomicU64::new(1),
		}
	}

	pub fn wallet(&self) -> Address {
		self.wallet
	}

	pub fn status(&self) -> TradeStatus {
		self.lock_status().clone()
	}

	/// Whether a trade is being submitted or confirmed.
	pub fn is_trading(&self) -> bool {
		self.lock_status().is_in_flight()
	}

	/// Returns a finished slot to `Idle`.
	pub fn clear_status(&self) -> Result<(), TradeError> {
		let mut status = self.lock_status();
		if status.is_in_flight() {
			return Err(TradeError::Busy);
		}
		*status = TradeStatus::Idle;
		Ok(())
	}

	/// Fires the abort signal of the trade in flight.
	///
	/// Returns `false` when nothing is in flight.
	pub fn cancel(&self) -> bool {
		match self.abort.lock().unwrap_or_else(PoisonError::into_inner).take() {
			Some(handle) => {
				handle.abort();
				true
			},
			None => false,
		}
	}

	/// Runs `execute` on a background task.
	pub fn spawn(
		self: &Arc<Self>,
		intent: TradeIntent,
	) -> JoinHandle<Result<TradeOutcome, TradeError>> {
		let orchestrator = Arc::clone(self);
		tokio::spawn(async move { orchestrator.execute(intent).await })
	}

	/// Submits `intent` and waits for its final classification.
	///
	/// Insufficient funds and mined results come back as a [`TradeOutcome`];
	/// submission errors and cancellation as a [`TradeError`]. Either way the
	/// status ends in `Succeeded` or `Failed`.
	#[instrument(skip_all, fields(kind = %intent.kind()))]
	pub async fn execute(&self, intent: TradeIntent) -> Result<TradeOutcome, TradeError> {
		let kind = intent.kind();
		let signal = self.begin()?;
		let trade_id = format!("{}-{}", kind, self.next_trade.fetch_add(1, Ordering::Relaxed));
		self.publish_status(&trade_id, kind, TradeStatus::Submitting);

		let result = match self.submit(&intent).await {
			Ok(hash) => self.await_confirmation(&trade_id, kind, hash, &signal).await,
			Err(SubmitFailure::InsufficientFunds(funds)) => {
				Ok(self.fail_insufficient(&trade_id, kind, funds).await)
			},
			Err(SubmitFailure::Error(err)) => {
				tracing::warn!(trade_id = %trade_id, error = %err, "Submission failed");
				self.transition(&trade_id, kind, TradeStatus::Failed {
					message: err.to_string(),
					top_up: None,
				});
				Err(err)
			},
		};

		self.abort.lock().unwrap_or_else(PoisonError::into_inner).take();

		if let Ok(outcome) = &result {
			self.event_bus
				.publish(TradeEvent::Completed {
					trade_id,
					outcome: outcome.clone(),
				})
				.ok();
		}
		result
	}

	/// Claims the slot and arms a fresh abort signal.
	fn begin(&self) -> Result<AbortSignal, TradeError> {
		let mut status = self.lock_status();
		if status.is_in_flight() {
			return Err(TradeError::Busy);
		}
		if *status != TradeStatus::Idle {
			return Err(TradeError::NotCleared);
		}
		*status = TradeStatus::Submitting;

		let (handle, signal) = abort_pair();
		*self.abort.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
		Ok(signal)
	}

	async fn submit(&self, intent: &TradeIntent) -> Result<TransactionHash, SubmitFailure> {
		match intent {
			TradeIntent::Buy {
				token,
				amount,
				slippage_bps,
			} => {
				let request = BuyRequest {
					token: *token,
					amount: *amount,
					wallet: self.wallet,
					slippage_bps: *slippage_bps,
				};
				Ok(self.backend.buy_token(&request).await?)
			},
			TradeIntent::Sell {
				token,
				amount,
				slippage_bps,
			} => {
				let request = SellRequest {
					token: *token,
					amount: *amount,
					wallet: self.wallet,
					slippage_bps: *slippage_bps,
				};
				Ok(self.backend.sell_token(&request).await?)
			},
			TradeIntent::Withdraw { amount } => {
				Ok(self.backend.withdraw(self.wallet, *amount).await?)
			},
			TradeIntent::TopUp { amount } => {
				let trading_wallet = self.backend.trading_wallet(self.wallet).await?.ok_or_else(|| {
					SubmitFailure::Error(TradeError::Backend(format!(
						"No trading wallet found for {}",
						self.wallet
					)))
				})?;
				let tx = Transaction::transfer(self.chain_id, trading_wallet, *amount);
				Ok(self.delivery.deliver(tx).await?.hash)
			},
			TradeIntent::Contract(tx) => Ok(self.delivery.deliver(tx.clone()).await?.hash),
		}
	}

	async fn await_confirmation(
		&self,
		trade_id: &str,
		kind: TradeKind,
		hash: TransactionHash,
		signal: &AbortSignal,
	) -> Result<TradeOutcome, TradeError> {
		tracing::info!(trade_id, tx_hash = %abbreviate_hex(&hash.to_hex()), "Awaiting confirmation");
		self.transition(trade_id, kind, TradeStatus::AwaitingConfirmation { hash: hash.clone() });
		self.event_bus
			.publish(TradeEvent::TransactionPending {
				trade_id: trade_id.to_string(),
				tx_hash: hash.clone(),
			})
			.ok();

		match self.delivery.confirm(&hash, signal).await {
			PollOutcome::Confirmed(receipt) => {
				let address = receipt.contract_or_recipient();
				self.transition(trade_id, kind, TradeStatus::Succeeded {
					hash: hash.clone(),
					address,
				});
				Ok(TradeOutcome::Success { hash, address })
			},
			PollOutcome::Reverted { reason, .. } => {
				self.transition(trade_id, kind, TradeStatus::Failed {
					message: reason.clone(),
					top_up: None,
				});
				Ok(TradeOutcome::Reverted { hash, reason })
			},
			PollOutcome::TimedOut { attempts, elapsed } => {
				tracing::warn!(trade_id, attempts, elapsed_secs = elapsed.as_secs(), "Confirmation timed out");
				self.transition(trade_id, kind, TradeStatus::Failed {
					message: format!(
						"Transaction {} was not confirmed after {}s. It may still succeed; verify its status manually.",
						hash,
						elapsed.as_secs()
					),
					top_up: None,
				});
				Ok(TradeOutcome::TimedOut { hash })
			},
			PollOutcome::Cancelled => {
				let err = TradeError::Cancelled(hash);
				self.transition(trade_id, kind, TradeStatus::Failed {
					message: err.to_string(),
					top_up: None,
				});
				Err(err)
			},
		}
	}

	async fn fail_insufficient(
		&self,
		trade_id: &str,
		kind: TradeKind,
		funds: InsufficientFunds,
	) -> TradeOutcome {
		let need_wei = funds.need();
		let trading_wallet = match self.backend.trading_wallet(self.wallet).await {
			Ok(wallet) => wallet,
			Err(e) => {
				tracing::warn!(error = %e, "Could not look up trading wallet for top-up");
				None
			},
		};
		tracing::info!(trade_id, %need_wei, "Insufficient funds, suggesting top-up");

		self.transition(trade_id, kind, TradeStatus::Failed {
			message: insufficient_funds_message(need_wei),
			top_up: Some(TopUpSuggestion {
				need_wei,
				trading_wallet,
			}),
		});
		TradeOutcome::InsufficientFunds { need_wei }
	}

	fn transition(&self, trade_id: &str, kind: TradeKind, next: TradeStatus) {
		{
			let mut status = self.lock_status();
			if !status.can_transition_to(&next) {
				tracing::error!(from = ?*status, to = ?next, "Rejected status transition");
				return;
			}
			*status = next.clone();
		}
		self.publish_status(trade_id, kind, next);
	}

	fn publish_status(&self, trade_id: &str, kind: TradeKind, status: TradeStatus) {
		self.event_bus
			.publish(TradeEvent::StatusChanged {
				trade_id: trade_id.to_string(),
				kind,
				status,
			})
			.ok();
	}

	fn lock_status(&self) -> MutexGuard<'_, TradeStatus> {
		self.status.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

fn insufficient_funds_message(need_wei: U256) -> String {
	format!("Insufficient funds: top up at least {} wei to continue", need_wei)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::MockBackend;
	use std::time::Duration;
	use trader_config::PollerConfig;
	use trader_delivery::testing::{ReceiptStep, ScriptedChain};
	use trader_types::Bytes;

	const CHAIN_ID: u64 = 31337;

	fn wallet() -> Address {
		Address::repeat_byte(0x11)
	}

	fn poller() -> PollerConfig {
		PollerConfig {
			interval_ms: 5_000,
			max_attempts: None,
			max_wait_ms: Some(300_000),
			required_confirmations: 1,
		}
	}

	fn orchestrator(
		chain: Arc<ScriptedChain>,
		backend: MockBackend,
	) -> (Arc<TradeOrchestrator>, EventBus) {
		let bus = EventBus::new(64);
		let delivery = Arc::new(DeliveryService::new(chain, poller()));
		let backend = Arc::new(BackendService::new(Box::new(backend)));
		let orchestrator = Arc::new(TradeOrchestrator::new(
			wallet(),
			CHAIN_ID,
			delivery,
			backend,
			bus.clone(),
		));
		(orchestrator, bus)
	}

	fn statuses(rx: &mut tokio::sync::broadcast::Receiver<TradeEvent>) -> Vec<TradeStatus> {
		let mut out = Vec::new();
		while let Ok(event) = rx.try_recv() {
			if let TradeEvent::StatusChanged { status, .. } = event {
				out.push(status);
			}
		}
		out
	}

	fn buy() -> TradeIntent {
		TradeIntent::Buy {
			token: Address::repeat_byte(0x33),
			amount: U256::from(1_000),
			slippage_bps: Some(100),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_buy_confirms_after_pending_polls() {
		let chain = Arc::new(ScriptedChain::new());
		chain.script_receipts([
			ReceiptStep::Pending,
			ReceiptStep::Pending,
			ReceiptStep::Pending,
			ReceiptStep::Mined {
				success: true,
				block_number: 100,
			},
		]);
		let backend = MockBackend::new().with_hash(chain.hash());
		let (orchestrator, bus) = orchestrator(chain.clone(), backend.clone());
		let mut rx = bus.subscribe();

		let start = tokio::time::Instant::now();
		let outcome = orchestrator.execute(buy()).await.unwrap();

		assert_eq!(
			outcome,
			TradeOutcome::Success {
				hash: chain.hash(),
				address: Some(Address::repeat_byte(0x22)),
			}
		);
		assert_eq!(start.elapsed(), Duration::from_secs(15));
		assert_eq!(chain.receipt_queries(), 4);
		assert_eq!(chain.submissions(), 0);
		assert_eq!(backend.buys(), 1);

		assert_eq!(
			statuses(&mut rx),
			vec![
				TradeStatus::Submitting,
				TradeStatus::AwaitingConfirmation { hash: chain.hash() },
				TradeStatus::Succeeded {
					hash: chain.hash(),
					address: Some(Address::repeat_byte(0x22)),
				},
			]
		);
		assert!(!orchestrator.is_trading());
	}

	#[tokio::test(start_paused = true)]
	async fn test_backend_insufficient_funds_suggests_top_up() {
		let chain = Arc::new(ScriptedChain::new());
		let backend = MockBackend::new()
			.with_trading_wallet(Address::repeat_byte(0x44))
			.fail_trades_with_funds(100, 250);
		let (orchestrator, _bus) = orchestrator(chain.clone(), backend);

		let intent = TradeIntent::Sell {
			token: Address::repeat_byte(0x33),
			amount: U256::from(5),
			slippage_bps: None,
		};
		let outcome = orchestrator.execute(intent).await.unwrap();

		assert_eq!(outcome, TradeOutcome::InsufficientFunds { need_wei: U256::from(150) });
		match orchestrator.status() {
			TradeStatus::Failed { top_up, .. } => assert_eq!(
				top_up,
				Some(TopUpSuggestion {
					need_wei: U256::from(150),
					trading_wallet: Some(Address::repeat_byte(0x44)),
				})
			),
			other => panic!("unexpected {other:?}"),
		}
		assert_eq!(chain.receipt_queries(), 0);
	}

	#[tokio::test(start_paused = true)]
	async fn test_reverted_deployment_fails_with_reason() {
		let chain = Arc::new(ScriptedChain::new());
		chain.script_receipts([ReceiptStep::Mined {
			success: false,
			block_number: 7,
		}]);
		chain.set_transaction_input(None, vec![0x60, 0x80, 0x60, 0x40]);
		let (orchestrator, _bus) = orchestrator(chain.clone(), MockBackend::new());

		let tx = Transaction {
			chain_id: CHAIN_ID,
			to: None,
			data: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
			value: U256::ZERO,
			gas_limit: None,
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
		};
		let outcome = orchestrator.execute(TradeIntent::Contract(tx)).await.unwrap();

		assert_eq!(
			outcome,
			TradeOutcome::Reverted {
				hash: chain.hash(),
				reason: "Contract deployment reverted".to_string(),
			}
		);
		assert_eq!(
			orchestrator.status(),
			TradeStatus::Failed {
				message: "Contract deployment reverted".to_string(),
				top_up: None,
			}
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_top_up_sends_to_trading_wallet() {
		let chain = Arc::new(ScriptedChain::new());
		chain.script_receipts([ReceiptStep::Mined {
			success: true,
			block_number: 1,
		}]);
		let backend = MockBackend::new().with_trading_wallet(Address::repeat_byte(0x44));
		let (orchestrator, _bus) = orchestrator(chain.clone(), backend);

		let outcome = orchestrator
			.execute(TradeIntent::TopUp { amount: U256::from(150) })
			.await
			.unwrap();

		assert!(outcome.is_success());
		let submitted = chain.submitted();
		assert_eq!(submitted.len(), 1);
		assert_eq!(submitted[0].to, Some(Address::repeat_byte(0x44)));
		assert_eq!(submitted[0].value, U256::from(150));
		assert_eq!(submitted[0].chain_id, CHAIN_ID);
	}

	#[tokio::test]
	async fn test_top_up_without_trading_wallet_fails() {
		let chain = Arc::new(ScriptedChain::new());
		let (orchestrator, _bus) = orchestrator(chain.clone(), MockBackend::new());

		let result = orchestrator
			.execute(TradeIntent::TopUp { amount: U256::from(1) })
			.await;

		assert!(matches!(result, Err(TradeError::Backend(msg)) if msg.contains("No trading wallet")));
		assert_eq!(chain.submissions(), 0);
		assert!(matches!(orchestrator.status(), TradeStatus::Failed { .. }));
	}

	#[tokio::test]
	async fn test_node_insufficient_funds_on_top_up() {
		let chain = Arc::new(ScriptedChain::new());
		chain.fail_submit(DeliveryError::InsufficientFunds {
			have: U256::from(1),
			want: U256::from(3),
		});
		let backend = MockBackend::new().with_trading_wallet(Address::repeat_byte(0x44));
		let (orchestrator, _bus) = orchestrator(chain, backend);

		let outcome = orchestrator
			.execute(TradeIntent::TopUp { amount: U256::from(2) })
			.await
			.unwrap();
		assert_eq!(outcome, TradeOutcome::InsufficientFunds { need_wei: U256::from(2) });
	}

	#[tokio::test]
	async fn test_user_rejection_is_surfaced() {
		let chain = Arc::new(ScriptedChain::new());
		chain.fail_submit(DeliveryError::UserRejected);
		let (orchestrator, bus) = orchestrator(chain, MockBackend::new());
		let mut rx = bus.subscribe();

		let tx = Transaction::transfer(CHAIN_ID, Address::repeat_byte(0x55), U256::from(1));
		let result = orchestrator.execute(TradeIntent::Contract(tx)).await;

		assert!(matches!(result, Err(TradeError::UserRejected)));
		assert_eq!(
			statuses(&mut rx),
			vec![
				TradeStatus::Submitting,
				TradeStatus::Failed {
					message: "Transaction rejected by user".to_string(),
					top_up: None,
				},
			]
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_asks_for_manual_verification() {
		let chain = Arc::new(ScriptedChain::new());
		let backend = MockBackend::new().with_hash(chain.hash());
		let (orchestrator, _bus) = orchestrator(chain, backend);

		let outcome = orchestrator.execute(buy()).await.unwrap();

		assert!(matches!(outcome, TradeOutcome::TimedOut { .. }));
		match orchestrator.status() {
			TradeStatus::Failed { message, top_up } => {
				assert!(message.contains("verify its status manually"));
				assert_eq!(top_up, None);
			},
			other => panic!("unexpected {other:?}"),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_second_trade_refused_while_in_flight_then_cancel() {
		let chain = Arc::new(ScriptedChain::new());
		let backend = MockBackend::new().with_hash(chain.hash());
		let (orchestrator, _bus) = orchestrator(chain.clone(), backend);

		let first = orchestrator.spawn(buy());
		tokio::time::sleep(Duration::from_secs(7)).await;
		assert!(orchestrator.is_trading());

		assert!(matches!(orchestrator.execute(buy()).await, Err(TradeError::Busy)));
		assert!(matches!(orchestrator.clear_status(), Err(TradeError::Busy)));

		assert!(orchestrator.cancel());
		let result = first.await.unwrap();
		assert!(matches!(result, Err(TradeError::Cancelled(hash)) if hash == chain.hash()));
		assert!(!orchestrator.is_trading());
		assert!(!orchestrator.cancel());
	}

	#[tokio::test]
	async fn test_finished_slot_must_be_cleared() {
		let chain = Arc::new(ScriptedChain::new());
		chain.fail_submit(DeliveryError::Broadcast("nonce too low".into()));
		let (orchestrator, _bus) = orchestrator(chain.clone(), MockBackend::new());
		let tx = Transaction::transfer(CHAIN_ID, Address::repeat_byte(0x55), U256::from(1));

		let result = orchestrator.execute(TradeIntent::Contract(tx.clone())).await;
		assert!(matches!(result, Err(TradeError::Broadcast(msg)) if msg == "nonce too low"));
		assert!(matches!(
			orchestrator.execute(TradeIntent::Contract(tx.clone())).await,
			Err(TradeError::NotCleared)
		));

		orchestrator.clear_status().unwrap();
		assert_eq!(orchestrator.status(), TradeStatus::Idle);

		chain.script_receipts([ReceiptStep::Mined {
			success: true,
			block_number: 3,
		}]);
		let outcome = orchestrator.execute(TradeIntent::Contract(tx)).await.unwrap();
		assert!(outcome.is_success());
	}

	#[tokio::test]
	async fn test_deployment_success_reports_contract_address() {
		let chain = Arc::new(ScriptedChain::new());
		chain.set_contract_address(Address::repeat_byte(0x77));
		chain.script_receipts([ReceiptStep::Mined {
			success: true,
			block_number: 12,
		}]);
		let (orchestrator, _bus) = orchestrator(chain.clone(), MockBackend::new());

		let tx = Transaction {
			chain_id: CHAIN_ID,
			to: None,
			data: Bytes::from(vec![0x60, 0x80]),
			value: U256::ZERO,
			gas_limit: None,
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
		};
		let outcome = orchestrator.execute(TradeIntent::Contract(tx)).await.unwrap();

		assert_eq!(
			outcome,
			TradeOutcome::Success {
				hash: chain.hash(),
				address: Some(Address::repeat_byte(0x77)),
			}
		);
	}
}
