//! Account management module for the SteakHouse trader.
//!
//! This module provides the signing account that stands in for the injected
//! wallet: it exposes the wallet address and hands the key to the delivery
//! layer, which signs and broadcasts transactions with it.

use async_trait::async_trait;
use thiserror::Error;
use trader_types::{Address, SecretString};

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Trait defining the interface for account implementations.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Retrieves the address associated with this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Returns the private key as a SecretString with 0x prefix.
	///
	/// Used by delivery implementations for transaction signing.
	fn get_private_key(&self) -> SecretString;
}

/// Service that manages account operations.
pub struct AccountService {
	/// The underlying account implementation.
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	/// Creates a new AccountService with the specified implementation.
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	/// Retrieves the address associated with the managed account.
	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// Returns the private key as a SecretString.
	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}
}
