//! HTTP backend client built on reqwest.

use crate::{
	parse_error_body, BackendError, BackendInterface, BuyRequest, SellRequest, TokenData,
	UserProfile,
};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trader_config::BackendConfig;
use trader_types::{Address, TransactionHash, U256};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BuyTokenBody {
	token_address: String,
	buy_amount: String,
	wallet_address: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	slippage_bps: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SellTokenBody {
	token_address: String,
	sell_amount: String,
	wallet_address: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	slippage_bps: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawBody {
	wallet_address: String,
	amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxResponse {
	tx_hash: String,
}

/// Backend client speaking JSON over HTTP.
pub struct HttpBackend {
	client: Client,
	base_url: String,
}

impl HttpBackend {
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| BackendError::Http(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}

	async fn post_for_hash<B: Serialize>(
		&self,
		path: &str,
		body: &B,
	) -> Result<TransactionHash, BackendError> {
		let response = self
			.client
			.post(self.url(path))
			.json(body)
			.send()
			.await
			.map_err(|e| BackendError::Http(e.to_string()))?;

		let TxResponse { tx_hash } = read_json(response).await?;
		let hash: TransactionHash = tx_hash
			.parse()
			.map_err(|e| BackendError::InvalidResponse(format!("Bad txHash {}: {}", tx_hash, e)))?;
		if hash.0.len() != 32 {
			return Err(BackendError::InvalidResponse(format!(
				"txHash must be 32 bytes, got {}",
				hash.0.len()
			)));
		}

		tracing::info!(path, tx_hash = %hash, "Backend accepted trade");
		Ok(hash)
	}
}

/// Decodes a successful JSON response or parses the error body.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
	let status = response.status();
	let body = response
		.text()
		.await
		.map_err(|e| BackendError::Http(format!("Failed to read response: {}", e)))?;

	if status == StatusCode::NOT_FOUND {
		return Err(BackendError::NotFound(body));
	}
	if !status.is_success() {
		return Err(parse_error_body(status.as_u16(), &body));
	}

	serde_json::from_str(&body).map_err(|e| BackendError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl BackendInterface for HttpBackend {
	async fn buy_token(&self, request: &BuyRequest) -> Result<TransactionHash, BackendError> {
		let body = BuyTokenBody {
			token_address: request.token.to_string(),
			buy_amount: request.amount.to_string(),
			wallet_address: request.wallet.to_string(),
			slippage_bps: request.slippage_bps,
		};
		self.post_for_hash("/buyToken", &body).await
	}

	async fn sell_token(&self, request: &SellRequest) -> Result<TransactionHash, BackendError> {
		let body = SellTokenBody {
			token_address: request.token.to_string(),
			sell_amount: request.amount.to_string(),
			wallet_address: request.wallet.to_string(),
			slippage_bps: request.slippage_bps,
		};
		self.post_for_hash("/sellToken", &body).await
	}

	async fn withdraw(
		&self,
		wallet: Address,
		amount: U256,
	) -> Result<TransactionHash, BackendError> {
		let body = WithdrawBody {
			wallet_address: wallet.to_string(),
			amount: amount.to_string(),
		};
		self.post_for_hash("/withdraw", &body).await
	}

	async fn get_user(&self, wallet: Address) -> Result<UserProfile, BackendError> {
		let response = self
			.client
			.get(self.url(&format!("/users/{}", wallet)))
			.send()
			.await
			.map_err(|e| BackendError::Http(e.to_string()))?;
		read_json(response).await
	}

	async fn get_token_data(
		&self,
		token: Address,
		interval: &str,
		limit: u32,
	) -> Result<TokenData, BackendError> {
		let response = self
			.client
			.get(self.url(&format!("/tokens/{}/chart", token)))
			.query(&[("interval", interval.to_string()), ("limit", limit.to_string())])
			.send()
			.await
			.map_err(|e| BackendError::Http(e.to_string()))?;
		read_json(response).await
	}
}

/// Factory function to create a backend client from configuration.
pub fn create_backend(config: &BackendConfig) -> Result<Box<dyn BackendInterface>, BackendError> {
	Ok(Box::new(HttpBackend::new(
		&config.base_url,
		Duration::from_secs(config.timeout_seconds),
	)?))
}
