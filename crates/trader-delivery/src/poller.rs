//! Confirmation polling for broadcast transactions.
//!
//! A single poller covers both budgets a caller may want: a bounded number of
//! receipt queries and a wall-clock limit. Running out of either yields
//! `PollOutcome::TimedOut`, which means "unknown", not "failed". A missing
//! receipt or a transient RPC error only causes another poll.

use crate::DeliveryInterface;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::instrument;
use trader_config::PollerConfig;
use trader_types::{abbreviate_hex, TransactionHash, TransactionInfo, TransactionReceipt};

/// Fallback when the original transaction gives nothing to go on.
pub const GENERIC_REVERT_REASON: &str = "Transaction reverted";

/// Result of polling a transaction hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
	/// Mined successfully. Confirmation depth is best-effort within the budget.
	Confirmed(TransactionReceipt),
	/// Mined with a failed status.
	Reverted {
		receipt: TransactionReceipt,
		reason: String,
	},
	/// The budget ran out before a terminal state was observed.
	TimedOut { attempts: u32, elapsed: Duration },
	/// The abort signal fired.
	Cancelled,
}

/// Cancels polls that hold the matching [`AbortSignal`].
#[derive(Debug)]
pub struct AbortHandle(watch::Sender<bool>);

impl AbortHandle {
	pub fn abort(&self) {
		self.0.send_replace(true);
	}
}

/// Receiving side of an [`AbortHandle`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AbortSignal(watch::Receiver<bool>);

impl AbortSignal {
	/// A signal that never fires.
	pub fn never() -> Self {
		let (_tx, rx) = watch::channel(false);
		Self(rx)
	}

	pub fn is_aborted(&self) -> bool {
		*self.0.borrow()
	}

	/// Resolves once the handle aborts. Pends forever if the handle is dropped
	/// without aborting.
	async fn aborted(&mut self) {
		loop {
			if *self.0.borrow_and_update() {
				return;
			}
			if self.0.changed().await.is_err() {
				std::future::pending::<()>().await;
			}
		}
	}
}

/// Creates a connected abort handle and signal.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
	let (tx, rx) = watch::channel(false);
	(AbortHandle(tx), AbortSignal(rx))
}

/// Polls a chain for transaction receipts.
pub struct ConfirmationPoller {
	provider: Arc<dyn DeliveryInterface>,
	config: PollerConfig,
}

impl ConfirmationPoller {
	pub fn new(provider: Arc<dyn DeliveryInterface>, config: PollerConfig) -> Self {
		Self { provider, config }
	}

	pub fn config(&self) -> &PollerConfig {
		&self.config
	}

	/// Polls `hash` until it reaches a terminal state, the budget runs out, or
	/// `abort` fires.
	///
	/// Every chain query (receipt or block height) counts against
	/// `max_attempts`. A successful receipt is final: if the budget runs out
	/// while waiting for confirmation depth, the receipt is still reported as
	/// `Confirmed`. Polling is read-only, so calling this again for a hash that
	/// already has a terminal receipt returns the same classification.
	#[instrument(skip_all, fields(tx_hash = %abbreviate_hex(&hash.to_hex())))]
	pub async fn poll(&self, hash: &TransactionHash, abort: &AbortSignal) -> PollOutcome {
		let mut abort = abort.clone();
		let start = Instant::now();
		let mut attempts: u32 = 0;
		let mut mined: Option<TransactionReceipt> = None;

		loop {
			if abort.is_aborted() {
				tracing::info!(attempts, "Polling cancelled");
				return PollOutcome::Cancelled;
			}
			attempts += 1;

			match mined.take() {
				None => match self.provider.get_receipt(hash).await {
					Ok(Some(receipt)) if !receipt.success => {
						let reason = self.revert_reason(hash).await;
						tracing::warn!(block = receipt.block_number, %reason, "Transaction reverted");
						return PollOutcome::Reverted { receipt, reason };
					},
					Ok(Some(receipt)) => {
						if self.config.required_confirmations <= 1 {
							tracing::info!(block = receipt.block_number, attempts, "Confirmed");
							return PollOutcome::Confirmed(receipt);
						}
						tracing::debug!(block = receipt.block_number, "Mined, waiting for confirmations");
						mined = Some(receipt);
					},
					Ok(None) => {
						tracing::debug!(attempts, "Waiting for transaction to be mined");
					},
					Err(e) => {
						tracing::warn!(attempts, error = %e, "Failed to query receipt");
					},
				},
				Some(receipt) => {
					let target = receipt.block_number + self.config.required_confirmations - 1;
					match self.provider.get_block_number().await {
						Ok(current) if current >= target => {
							tracing::info!(block = receipt.block_number, current, attempts, "Confirmed");
							return PollOutcome::Confirmed(receipt);
						},
						Ok(current) => {
							tracing::debug!(
								remaining = target - current,
								"Waiting for more confirmations"
							);
						},
						Err(e) => {
							tracing::warn!(attempts, error = %e, "Failed to query block number");
						},
					}
					mined = Some(receipt);
				},
			}

			if self.budget_exhausted(attempts, start) {
				if let Some(receipt) = mined {
					tracing::warn!(
						block = receipt.block_number,
						attempts,
						"Budget ran out before full confirmation depth, accepting successful receipt"
					);
					return PollOutcome::Confirmed(receipt);
				}
				let elapsed = start.elapsed();
				tracing::warn!(
					attempts,
					elapsed_secs = elapsed.as_secs(),
					"Gave up waiting for transaction, it may still confirm"
				);
				return PollOutcome::TimedOut { attempts, elapsed };
			}

			tokio::select! {
				_ = tokio::time::sleep(self.config.interval()) => {},
				_ = abort.aborted() => {
					tracing::info!(attempts, "Polling cancelled");
					return PollOutcome::Cancelled;
				}
			}
		}
	}

	fn budget_exhausted(&self, attempts: u32, start: Instant) -> bool {
		if self.config.max_attempts.is_some_and(|max| attempts >= max) {
			return true;
		}
		self.config
			.max_wait()
			.is_some_and(|max_wait| start.elapsed() + self.config.interval() > max_wait)
	}

	/// Best-effort explanation of a revert, derived from the original transaction.
	async fn revert_reason(&self, hash: &TransactionHash) -> String {
		match self.provider.get_transaction(hash).await {
			Ok(Some(tx)) => describe_revert(&tx),
			Ok(None) => GENERIC_REVERT_REASON.to_string(),
			Err(e) => {
				tracing::debug!(error = %e, "Could not fetch reverted transaction");
				GENERIC_REVERT_REASON.to_string()
			},
		}
	}
}

/// Describes a reverted transaction from its input.
pub fn describe_revert(tx: &TransactionInfo) -> String {
	match (tx.to, tx.input.len()) {
		(None, _) => "Contract deployment reverted".to_string(),
		(Some(to), len) if len >= 4 => format!(
			"Call to {} reverted (selector 0x{})",
			to,
			hex::encode(&tx.input[..4])
		),
		(Some(to), _) => format!("Transfer to {} reverted", to),
	}
}
