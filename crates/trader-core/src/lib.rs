//! Core trading engine for the SteakHouse trader.
//!
//! This module ties the delivery and backend services together: the
//! [`TradeOrchestrator`] runs one trade at a time through submission and
//! confirmation, publishing progress on an [`EventBus`], and the
//! [`TokenDataCache`] keeps recently fetched chart data.

use thiserror::Error;
use trader_types::TransactionHash;

pub mod event_bus;
pub mod orchestrator;
pub mod token_data;

#[cfg(test)]
mod test_support;

pub use event_bus::EventBus;
pub use orchestrator::TradeOrchestrator;
pub use token_data::{CacheError, TokenDataCache};

/// Errors that end a trade without a mined result.
#[derive(Debug, Error)]
pub enum TradeError {
	/// Another trade is being submitted or confirmed.
	#[error("A trade is already in progress")]
	Busy,
	/// The previous trade finished but its status was not cleared.
	#[error("Previous trade status must be cleared first")]
	NotCleared,
	/// No signer is configured for a locally signed intent.
	#[error("No signing provider available")]
	ProviderUnavailable,
	/// The wallet refused to sign.
	#[error("Transaction rejected by user")]
	UserRejected,
	/// Broadcast failure, with the provider's message verbatim.
	#[error("{0}")]
	Broadcast(String),
	/// Backend failure, with the backend's message verbatim.
	#[error("{0}")]
	Backend(String),
	/// Polling was aborted. The transaction may still confirm.
	#[error("Stopped waiting for transaction {0}")]
	Cancelled(TransactionHash),
}
