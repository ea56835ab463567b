//! Backend API client for the SteakHouse trader.
//!
//! The backend executes buy, sell and withdraw trades from the user's
//! trading wallet and returns the resulting transaction hash. It also serves
//! user profiles and token chart data. Error bodies are parsed once here into
//! [`BackendError`] so callers never inspect raw JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trader_types::{parse_insufficient_funds, Address, TransactionHash, U256};

/// Re-export implementations
pub mod implementations {
	pub mod http;
}

/// Backend error code for a trading wallet that cannot cover the trade.
pub const INSUFFICIENT_FUNDS_CODE: &str = "INSUFFICIENT_FUNDS";

/// Errors returned by the backend client.
#[derive(Debug, Error)]
pub enum BackendError {
	/// The trading wallet cannot cover the trade.
	#[error("Insufficient funds: have {have} want {want}")]
	InsufficientFunds { have: U256, want: U256 },
	/// The backend rejected the request with an error body.
	#[error("{message}")]
	Api { code: String, message: String },
	/// The requested resource does not exist.
	#[error("Not found: {0}")]
	NotFound(String),
	/// The request never produced a response.
	#[error("HTTP error: {0}")]
	Http(String),
	/// The response body did not have the expected shape.
	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

/// Parameters for a backend buy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyRequest {
	pub token: Address,
	/// Amount of native currency to spend, in wei.
	pub amount: U256,
	pub wallet: Address,
	pub slippage_bps: Option<u32>,
}

/// Parameters for a backend sell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellRequest {
	pub token: Address,
	/// Amount of tokens to sell, in base units.
	pub amount: U256,
	pub wallet: Address,
	pub slippage_bps: Option<u32>,
}

/// User profile as served by `GET /users/:wallet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	#[serde(default)]
	pub trading_wallet: Option<Address>,
	#[serde(default)]
	pub username: Option<String>,
}

/// Token chart data. The backend shape is passed through untouched.
pub type TokenData = serde_json::Value;

/// Error body returned by the backend:
/// `{ "error": { "code", "shortMessage", "info": { "error": { "message" } } } }`.
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
	#[serde(default)]
	error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
	#[serde(default)]
	code: Option<String>,
	#[serde(default)]
	short_message: Option<String>,
	#[serde(default)]
	message: Option<String>,
	#[serde(default)]
	info: Option<ErrorInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorInfo {
	#[serde(default)]
	error: Option<NestedError>,
}

#[derive(Debug, Default, Deserialize)]
struct NestedError {
	#[serde(default)]
	message: Option<String>,
}

/// Parses a backend error response body.
///
/// Insufficient-funds errors are recognised by their code or by a
/// `have X want Y` pair anywhere in the messages. An insufficient-funds code
/// without amounts stays an `Api` error since no top-up can be computed.
pub fn parse_error_body(status: u16, body: &str) -> BackendError {
	let envelope: ErrorEnvelope = match serde_json::from_str(body) {
		Ok(envelope) => envelope,
		Err(_) => {
			return BackendError::Api {
				code: status.to_string(),
				message: if body.trim().is_empty() {
					format!("Backend returned status {}", status)
				} else {
					body.trim().to_string()
				},
			};
		},
	};
	let error = envelope.error;

	let nested = error
		.info
		.and_then(|info| info.error)
		.and_then(|nested| nested.message);
	let messages = [nested.as_deref(), error.short_message.as_deref(), error.message.as_deref()];

	if let Some(funds) = messages.iter().flatten().find_map(|m| parse_insufficient_funds(m)) {
		return BackendError::InsufficientFunds {
			have: funds.have,
			want: funds.want,
		};
	}

	let message = messages
		.iter()
		.flatten()
		.next()
		.map(|m| m.to_string())
		.unwrap_or_else(|| format!("Backend returned status {}", status));
	let code = error.code.unwrap_or_else(|| status.to_string());
	if code == INSUFFICIENT_FUNDS_CODE {
		tracing::warn!(%message, "Insufficient funds error without amounts");
	}

	BackendError::Api { code, message }
}

/// Trait defining the backend operations the trader relies on.
#[async_trait]
pub trait BackendInterface: Send + Sync {
	/// Buys a token from the trading wallet, returning the transaction hash.
	async fn buy_token(&self, request: &BuyRequest) -> Result<TransactionHash, BackendError>;

	/// Sells a token from the trading wallet, returning the transaction hash.
	async fn sell_token(&self, request: &SellRequest) -> Result<TransactionHash, BackendError>;

	/// Moves `amount` wei from the trading wallet back to `wallet`.
	async fn withdraw(&self, wallet: Address, amount: U256)
		-> Result<TransactionHash, BackendError>;

	/// Fetches the profile of `wallet`.
	async fn get_user(&self, wallet: Address) -> Result<UserProfile, BackendError>;

	/// Fetches chart data for a token.
	async fn get_token_data(
		&self,
		token: Address,
		interval: &str,
		limit: u32,
	) -> Result<TokenData, BackendError>;
}

/// Service wrapper around a backend implementation.
pub struct BackendService {
	implementation: Box<dyn BackendInterface>,
}

impl BackendService {
	pub fn new(implementation: Box<dyn BackendInterface>) -> Self {
		Self { implementation }
	}

	pub async fn buy_token(&self, request: &BuyRequest) -> Result<TransactionHash, BackendError> {
		self.implementation.buy_token(request).await
	}

	pub async fn sell_token(&self, request: &SellRequest) -> Result<TransactionHash, BackendError> {
		self.implementation.sell_token(request).await
	}

	pub async fn withdraw(
		&self,
		wallet: Address,
		amount: U256,
	) -> Result<TransactionHash, BackendError> {
		self.implementation.withdraw(wallet, amount).await
	}

	pub async fn get_user(&self, wallet: Address) -> Result<UserProfile, BackendError> {
		self.implementation.get_user(wallet).await
	}

	/// Returns the user's trading wallet, `None` when the profile has none or
	/// the user is unknown.
	pub async fn trading_wallet(&self, wallet: Address) -> Result<Option<Address>, BackendError> {
		match self.implementation.get_user(wallet).await {
			Ok(profile) => Ok(profile.trading_wallet),
			Err(BackendError::NotFound(_)) => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub async fn get_token_data(
		&self,
		token: Address,
		interval: &str,
		limit: u32,
	) -> Result<TokenData, BackendError> {
		self.implementation
			.get_token_data(token, interval, limit)
			.await
	}
}
