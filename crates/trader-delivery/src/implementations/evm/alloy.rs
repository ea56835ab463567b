//! Alloy-based EVM delivery implementation.
//!
//! Submits transactions through an HTTP provider with a wallet filler (the
//! stand-in for the injected browser wallet) and serves the read-only RPC
//! calls the poller needs.

use crate::{classify_provider_error, DeliveryError, DeliveryInterface};
use alloy_consensus::Transaction as _;
use alloy_network::EthereumWallet;
use alloy_primitives::{FixedBytes, TxKind};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::{TransactionInput, TransactionRequest};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use std::sync::Arc;
use trader_types::{
	Address, SecretString, Transaction, TransactionHash, TransactionInfo, TransactionReceipt, U256,
};

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Alloy-based EVM delivery implementation for a single chain.
pub struct AlloyDelivery {
	chain_id: u64,
	provider: HttpProvider,
	can_sign: bool,
}

impl AlloyDelivery {
	/// Creates a new AlloyDelivery instance.
	///
	/// Without a signer the instance is read-only and `submit` fails with
	/// `ProviderUnavailable`.
	pub fn new(
		chain_id: u64,
		rpc_url: &str,
		signer: Option<PrivateKeySigner>,
	) -> Result<Self, DeliveryError> {
		let url: reqwest::Url = rpc_url
			.parse()
			.map_err(|e| DeliveryError::Network(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

		let (provider, can_sign): (HttpProvider, bool) = match signer {
			Some(signer) => {
				let wallet = EthereumWallet::from(signer.with_chain_id(Some(chain_id)));
				let provider = ProviderBuilder::new()
					.with_recommended_fillers()
					.wallet(wallet)
					.on_http(url);
				(Arc::new(provider), true)
			},
			None => (Arc::new(ProviderBuilder::new().on_http(url)), false),
		};

		Ok(Self {
			chain_id,
			provider,
			can_sign,
		})
	}

	fn to_fixed(hash: &TransactionHash) -> Result<FixedBytes<32>, DeliveryError> {
		if hash.0.len() != 32 {
			return Err(DeliveryError::Network(format!(
				"Transaction hash must be 32 bytes, got {}",
				hash.0.len()
			)));
		}
		Ok(FixedBytes::<32>::from_slice(&hash.0))
	}
}

/// Converts a trader transaction into an alloy request.
fn to_request(tx: Transaction) -> TransactionRequest {
	TransactionRequest {
		to: Some(match tx.to {
			Some(to) => TxKind::Call(to),
			None => TxKind::Create,
		}),
		input: TransactionInput::new(tx.data),
		value: Some(tx.value),
		chain_id: Some(tx.chain_id),
		gas: tx.gas_limit,
		max_fee_per_gas: tx.max_fee_per_gas,
		max_priority_fee_per_gas: tx.max_priority_fee_per_gas,
		..Default::default()
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn can_sign(&self) -> bool {
		self.can_sign
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		if !self.can_sign {
			return Err(DeliveryError::ProviderUnavailable);
		}
		if tx.chain_id != self.chain_id {
			return Err(DeliveryError::Broadcast(format!(
				"Transaction targets chain {} but provider is on chain {}",
				tx.chain_id, self.chain_id
			)));
		}

		let pending_tx = self
			.provider
			.send_transaction(to_request(tx))
			.await
			.map_err(|e| match e.as_error_resp() {
				Some(payload) => classify_provider_error(Some(payload.code), &payload.message),
				None => classify_provider_error(None, &e.to_string()),
			})?;

		let tx_hash = *pending_tx.tx_hash();
		let hash = TransactionHash(tx_hash.0.to_vec());
		tracing::info!(tx_hash = %hash, chain_id = self.chain_id, "Submitted transaction");

		Ok(hash)
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		let tx_hash = Self::to_fixed(hash)?;

		let receipt = self
			.provider
			.get_transaction_receipt(tx_hash)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {}", e)))?;

		Ok(receipt.map(|receipt| TransactionReceipt {
			hash: TransactionHash(receipt.transaction_hash.0.to_vec()),
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
			contract_address: receipt.contract_address,
			to: receipt.to,
		}))
	}

	async fn get_transaction(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionInfo>, DeliveryError> {
		let tx_hash = Self::to_fixed(hash)?;

		let tx = self
			.provider
			.get_transaction_by_hash(tx_hash)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get transaction: {}", e)))?;

		Ok(tx.map(|tx| TransactionInfo {
			hash: hash.clone(),
			from: tx.from,
			to: tx.to(),
			input: tx.input().clone(),
			value: tx.value(),
		}))
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get block number: {}", e)))
	}

	async fn get_balance(&self, address: Address) -> Result<U256, DeliveryError> {
		self.provider
			.get_balance(address)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get balance: {}", e)))
	}

	async fn get_gas_price(&self) -> Result<u128, DeliveryError> {
		self.provider
			.get_gas_price()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get gas price: {}", e)))
	}
}

/// Factory function to create an HTTP-based delivery provider.
///
/// The private key is optional; without it the provider is read-only.
pub fn create_http_delivery(
	chain_id: u64,
	rpc_url: &str,
	private_key: Option<&SecretString>,
) -> Result<Arc<dyn DeliveryInterface>, DeliveryError> {
	let signer = private_key
		.map(|key| {
			key.with_exposed(|key| {
				key.trim()
					.parse::<PrivateKeySigner>()
					.map_err(|_| DeliveryError::Network("Invalid private key format".to_string()))
			})
		})
		.transpose()?;

	Ok(Arc::new(AlloyDelivery::new(chain_id, rpc_url, signer)?))
}
