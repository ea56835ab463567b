//! Local private-key account.

use crate::{AccountError, AccountInterface};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use trader_types::{ensure_hex_prefix, Address, SecretString};

/// Account backed by a private key held in memory.
pub struct LocalWallet {
	signer: PrivateKeySigner,
	private_key: SecretString,
}

impl LocalWallet {
	/// Parses a hex private key, with or without `0x`.
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer: PrivateKeySigner = private_key.with_exposed(|key| {
			key.trim()
				.parse()
				.map_err(|_| AccountError::InvalidKey("Invalid private key format".to_string()))
		})?;
		let normalized = private_key.with_exposed(|key| SecretString::new(ensure_hex_prefix(key.trim())));
		Ok(Self {
			signer,
			private_key: normalized,
		})
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	fn get_private_key(&self) -> SecretString {
		self.private_key.clone()
	}
}

/// Factory function to create a local account from a private key.
pub fn create_account(private_key: &SecretString) -> Result<Box<dyn AccountInterface>, AccountError> {
	Ok(Box::new(LocalWallet::new(private_key)?))
}

#[cfg(test)]
mod tests {
	use super::*;

	// First default anvil account
	const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[tokio::test]
	async fn test_address_from_key() {
		let wallet = LocalWallet::new(&SecretString::from(ANVIL_KEY)).unwrap();
		let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
		assert_eq!(wallet.address().await.unwrap(), expected);
	}

	#[test]
	fn test_key_without_prefix_is_normalized() {
		let wallet = LocalWallet::new(&SecretString::from(&ANVIL_KEY[2..])).unwrap();
		assert_eq!(wallet.get_private_key().with_exposed(|k| k.to_string()), ANVIL_KEY);
	}

	#[test]
	fn test_invalid_key_rejected() {
		let result = LocalWallet::new(&SecretString::from("not-a-key"));
		assert!(matches!(result, Err(AccountError::InvalidKey(_))));
	}
}
