//! Trade intents, outcomes and status.
//!
//! A trade moves through `Idle -> Submitting -> AwaitingConfirmation` and ends
//! in either `Succeeded` or `Failed`. Only an explicit clear returns it to `Idle`.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Transaction, TransactionHash};

/// What the user asked the trader to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeIntent {
	/// Buy `amount` wei worth of `token` through the backend.
	Buy {
		token: Address,
		amount: U256,
		slippage_bps: Option<u32>,
	},
	/// Sell `amount` base units of `token` through the backend.
	Sell {
		token: Address,
		amount: U256,
		slippage_bps: Option<u32>,
	},
	/// Transfer `amount` wei from the connected wallet to the trading wallet.
	TopUp { amount: U256 },
	/// Ask the backend to move `amount` wei from the trading wallet back to the user.
	Withdraw { amount: U256 },
	/// Sign and broadcast an arbitrary transaction (token creation, approvals).
	Contract(Transaction),
}

impl TradeIntent {
	pub fn kind(&self) -> TradeKind {
		match self {
			TradeIntent::Buy { .. } => TradeKind::Buy,
			TradeIntent::Sell { .. } => TradeKind::Sell,
			TradeIntent::TopUp { .. } => TradeKind::TopUp,
			TradeIntent::Withdraw { .. } => TradeKind::Withdraw,
			TradeIntent::Contract(_) => TradeKind::Contract,
		}
	}
}

/// Discriminant of [`TradeIntent`], used for logging and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
	Buy,
	Sell,
	TopUp,
	Withdraw,
	Contract,
}

impl fmt::Display for TradeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			TradeKind::Buy => "buy",
			TradeKind::Sell => "sell",
			TradeKind::TopUp => "top-up",
			TradeKind::Withdraw => "withdraw",
			TradeKind::Contract => "contract",
		};
		f.write_str(name)
	}
}

/// Final classification of a submitted trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOutcome {
	/// Mined with a successful status. `address` is the deployed contract
	/// when there is one, otherwise the recipient.
	Success {
		hash: TransactionHash,
		address: Option<Address>,
	},
	/// Mined with a failed status.
	Reverted {
		hash: TransactionHash,
		reason: String,
	},
	/// No terminal receipt within the polling budget. The transaction may
	/// still confirm later.
	TimedOut { hash: TransactionHash },
	/// The wallet lacked `need_wei` to cover the trade.
	InsufficientFunds { need_wei: U256 },
}

impl TradeOutcome {
	pub fn is_success(&self) -> bool {
		matches!(self, TradeOutcome::Success { .. })
	}
}

/// Suggested transfer into the trading wallet after an insufficient-funds failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUpSuggestion {
	pub need_wei: U256,
	pub trading_wallet: Option<Address>,
}

/// Per-trade status as seen by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
	Idle,
	Submitting,
	AwaitingConfirmation {
		hash: TransactionHash,
	},
	Succeeded {
		hash: TransactionHash,
		address: Option<Address>,
	},
	Failed {
		message: String,
		top_up: Option<TopUpSuggestion>,
	},
}

impl TradeStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, TradeStatus::Succeeded { .. } | TradeStatus::Failed { .. })
	}

	pub fn is_in_flight(&self) -> bool {
		matches!(
			self,
			TradeStatus::Submitting | TradeStatus::AwaitingConfirmation { .. }
		)
	}

	/// Checks if moving from `self` to `next` is a forward transition.
	///
	/// `Idle` is not reachable from here; it is only re-entered by an explicit clear.
	pub fn can_transition_to(&self, next: &TradeStatus) -> bool {
		matches!(
			(self, next),
			(TradeStatus::Idle, TradeStatus::Submitting)
				| (TradeStatus::Submitting, TradeStatus::AwaitingConfirmation { .. })
				| (TradeStatus::Submitting, TradeStatus::Failed { .. })
				| (TradeStatus::AwaitingConfirmation { .. }, TradeStatus::Succeeded { .. })
				| (TradeStatus::AwaitingConfirmation { .. }, TradeStatus::Failed { .. })
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn hash() -> TransactionHash {
		TransactionHash(vec![0xab; 32])
	}

	#[test]
	fn test_forward_transitions() {
		let awaiting = TradeStatus::AwaitingConfirmation { hash: hash() };
		assert!(TradeStatus::Idle.can_transition_to(&TradeStatus::Submitting));
		assert!(TradeStatus::Submitting.can_transition_to(&awaiting));
		assert!(awaiting.can_transition_to(&TradeStatus::Succeeded {
			hash: hash(),
			address: None
		}));
	}

	#[test]
	fn test_no_backward_transitions() {
		let failed = TradeStatus::Failed {
			message: "boom".into(),
			top_up: None,
		};
		let awaiting = TradeStatus::AwaitingConfirmation { hash: hash() };
		assert!(!awaiting.can_transition_to(&TradeStatus::Submitting));
		assert!(!failed.can_transition_to(&TradeStatus::Submitting));
		assert!(!failed.can_transition_to(&TradeStatus::Idle));
		assert!(!TradeStatus::Idle.can_transition_to(&awaiting));
		assert!(!TradeStatus::Submitting.can_transition_to(&TradeStatus::Succeeded {
			hash: hash(),
			address: None
		}));
	}

	#[test]
	fn test_terminal_states() {
		assert!(TradeStatus::Failed {
			message: String::new(),
			top_up: None
		}
		.is_terminal());
		assert!(!TradeStatus::Submitting.is_terminal());
		assert!(TradeStatus::Submitting.is_in_flight());
		assert!(!TradeStatus::Idle.is_in_flight());
	}
}
