//! Transaction delivery module for the SteakHouse trader.
//!
//! This module handles the submission and monitoring of blockchain transactions.
//! The submitter signs and broadcasts exactly once per call; the confirmation
//! poller watches for the receipt and classifies the result.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use trader_config::PollerConfig;
use trader_types::{
	parse_insufficient_funds, Address, PendingTransaction, Transaction, TransactionHash,
	TransactionInfo, TransactionReceipt, U256,
};

pub mod poller;

pub use poller::{abort_pair, AbortHandle, AbortSignal, ConfirmationPoller, PollOutcome};

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// JSON-RPC code wallets use when the user declines a request (EIP-1193).
const USER_REJECTED_CODE: i64 = 4001;

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// No signing provider is connected.
	#[error("No signing provider available")]
	ProviderUnavailable,
	/// The signer declined the request.
	#[error("Transaction rejected by user")]
	UserRejected,
	/// The node refused the transaction because the sender cannot pay for it.
	#[error("Insufficient funds: have {have} want {want}")]
	InsufficientFunds { have: U256, want: U256 },
	/// Any other broadcast failure, with the provider's message.
	#[error("Broadcast failed: {0}")]
	Broadcast(String),
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
}

/// Maps a provider error to a delivery error.
///
/// `code` is the JSON-RPC error code when the provider returned one.
pub fn classify_provider_error(code: Option<i64>, message: &str) -> DeliveryError {
	let lower = message.to_lowercase();
	if code == Some(USER_REJECTED_CODE)
		|| lower.contains("user rejected")
		|| lower.contains("user denied")
	{
		return DeliveryError::UserRejected;
	}
	if lower.contains("insufficient funds") {
		if let Some(funds) = parse_insufficient_funds(message) {
			return DeliveryError::InsufficientFunds {
				have: funds.have,
				want: funds.want,
			};
		}
	}
	DeliveryError::Broadcast(message.to_string())
}

/// Trait defining the interface for chain access.
///
/// Combines the signing provider (for `submit`) with the read-only RPC calls
/// the poller needs. Implementations without a signer return
/// `DeliveryError::ProviderUnavailable` from `submit`.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Whether a signer is connected.
	fn can_sign(&self) -> bool;

	/// Signs and broadcasts a transaction, returning its hash.
	///
	/// Broadcasts exactly once and never retries.
	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError>;

	/// Retrieves the receipt for a transaction, `None` while it is not mined.
	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError>;

	/// Retrieves the original transaction, `None` when the node does not know it.
	async fn get_transaction(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionInfo>, DeliveryError>;

	/// Gets the current block number.
	async fn get_block_number(&self) -> Result<u64, DeliveryError>;

	/// Gets the native balance of an address in wei.
	async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError>;

	/// Gets the current gas price in wei.
	async fn get_gas_price(&self) -> Result<u128, DeliveryError>;
}

/// Service that pairs the chain provider with the confirmation poller.
pub struct DeliveryService {
	provider: Arc<dyn DeliveryInterface>,
	poller: ConfirmationPoller,
}

impl DeliveryService {
	pub fn new(provider: Arc<dyn DeliveryInterface>, poller_config: PollerConfig) -> Self {
		Self {
			poller: ConfirmationPoller::new(provider.clone(), poller_config),
			provider,
		}
	}

	/// Signs and broadcasts a transaction.
	pub async fn deliver(&self, tx: Transaction) -> Result<PendingTransaction, DeliveryError> {
		if !self.provider.can_sign() {
			return Err(DeliveryError::ProviderUnavailable);
		}
		let hash = self.provider.submit(tx).await?;
		Ok(PendingTransaction::new(hash))
	}

	/// Polls until the transaction reaches a terminal state, the budget runs
	/// out, or `abort` fires.
	pub async fn confirm(&self, hash: &TransactionHash, abort: &AbortSignal) -> PollOutcome {
		self.poller.poll(hash, abort).await
	}

	pub async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError> {
		self.provider.get_balance(address).await
	}

	pub async fn get_gas_price(&self) -> Result<u128, DeliveryError> {
		self.provider.get_gas_price().await
	}

	pub fn poller(&self) -> &ConfirmationPoller {
		&self.poller
	}
}

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::ScriptedChain;

	#[test]
	fn test_classify_user_rejection() {
		assert!(matches!(
			classify_provider_error(Some(4001), "whatever"),
			DeliveryError::UserRejected
		));
		assert!(matches!(
			classify_provider_error(None, "MetaMask Tx Signature: User denied transaction signature."),
			DeliveryError::UserRejected
		));
	}

	#[test]
	fn test_classify_insufficient_funds() {
		let err = classify_provider_error(
			Some(-32000),
			"insufficient funds for gas * price + value: have 100 want 250",
		);
		match err {
			DeliveryError::InsufficientFunds { have, want } => {
				assert_eq!(have, U256::from(100));
				assert_eq!(want, U256::from(250));
			},
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn test_classify_insufficient_funds_without_amounts_is_broadcast() {
		let err = classify_provider_error(Some(-32000), "insufficient funds for transfer");
		assert!(matches!(err, DeliveryError::Broadcast(msg) if msg == "insufficient funds for transfer"));
	}

	#[test]
	fn test_classify_other_errors_verbatim() {
		let err = classify_provider_error(Some(-32000), "nonce too low");
		assert_eq!(err.to_string(), "Broadcast failed: nonce too low");
	}

	#[tokio::test]
	async fn test_deliver_without_signer() {
		let chain = Arc::new(ScriptedChain::read_only());
		let service = DeliveryService::new(chain.clone(), PollerConfig::default());
		let tx = Transaction::transfer(1, Address::ZERO, U256::from(1));

		let result = service.deliver(tx).await;
		assert!(matches!(result, Err(DeliveryError::ProviderUnavailable)));
		assert_eq!(chain.submissions(), 0);
	}

	#[tokio::test]
	async fn test_deliver_broadcasts_once() {
		let chain = Arc::new(ScriptedChain::new());
		let service = DeliveryService::new(chain.clone(), PollerConfig::default());
		let tx = Transaction::transfer(1, Address::ZERO, U256::from(1));

		let pending = service.deliver(tx).await.unwrap();
		assert_eq!(pending.hash, chain.hash());
		assert_eq!(chain.submissions(), 1);
	}

	#[tokio::test]
	async fn test_deliver_surfaces_submit_error() {
		let chain = Arc::new(ScriptedChain::new());
		chain.fail_submit(DeliveryError::UserRejected);
		let service = DeliveryService::new(chain.clone(), PollerConfig::default());
		let tx = Transaction::transfer(1, Address::ZERO, U256::from(1));

		assert!(matches!(service.deliver(tx).await, Err(DeliveryError::UserRejected)));
		assert_eq!(chain.submissions(), 1);
	}

	#[tokio::test]
	async fn test_balance_and_gas_price_pass_through() {
		let chain = Arc::new(ScriptedChain::read_only());
		chain.set_balance(U256::from(42));
		let service = DeliveryService::new(chain, PollerConfig::default());

		assert_eq!(service.get_balance(Address::ZERO).await.unwrap(), U256::from(42));
		assert_eq!(service.get_gas_price().await.unwrap(), 1_000_000_000);
		assert_eq!(service.poller().config().interval_ms, 5_000);
	}
}
