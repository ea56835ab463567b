//! Event types for trade progress.
//!
//! The orchestrator publishes these on an event bus so that the UI layer
//! can render progress without polling the orchestrator's state.

use serde::{Deserialize, Serialize};

use crate::{TradeKind, TradeOutcome, TradeStatus, TransactionHash};

/// Events emitted while a trade progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TradeEvent {
	/// The trade status changed.
	StatusChanged {
		trade_id: String,
		kind: TradeKind,
		status: TradeStatus,
	},
	/// A transaction was broadcast and is pending confirmation.
	TransactionPending {
		trade_id: String,
		tx_hash: TransactionHash,
	},
	/// The trade reached its final classification.
	Completed {
		trade_id: String,
		outcome: TradeOutcome,
	},
}
