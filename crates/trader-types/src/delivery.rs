//! Transaction delivery types for the trader.
//!
//! This module defines types related to blockchain transaction submission
//! and monitoring: the transaction to broadcast, its hash, the pending record
//! created on broadcast, and the receipt observed once it is mined.

use alloy_primitives::{Address, Bytes, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::strip_hex_prefix;

/// Blockchain transaction hash representation.
///
/// Stores transaction hashes as raw bytes; displayed as `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHash(pub Vec<u8>);

impl TransactionHash {
	/// Returns the hash as a `0x`-prefixed lowercase hex string.
	pub fn to_hex(&self) -> String {
		format!("0x{}", hex::encode(&self.0))
	}
}

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

impl FromStr for TransactionHash {
	type Err = hex::FromHexError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		hex::decode(strip_hex_prefix(s)).map(TransactionHash)
	}
}

/// A transaction to be signed and broadcast by the wallet provider.
///
/// A missing `to` address means the transaction deploys a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	/// Chain the transaction targets.
	pub chain_id: u64,
	/// Target contract or recipient.
	pub to: Option<Address>,
	/// Encoded call data (or init code for deployments).
	pub data: Bytes,
	/// Native value in wei.
	pub value: U256,
	/// Explicit gas limit; estimated by the provider when absent.
	pub gas_limit: Option<u64>,
	/// EIP-1559 fee cap in wei.
	pub max_fee_per_gas: Option<u128>,
	/// EIP-1559 priority fee in wei.
	pub max_priority_fee_per_gas: Option<u128>,
}

impl Transaction {
	/// Builds a plain native-value transfer.
	pub fn transfer(chain_id: u64, to: Address, value: U256) -> Self {
		Self {
			chain_id,
			to: Some(to),
			data: Bytes::new(),
			value,
			gas_limit: None,
			max_fee_per_gas: None,
			max_priority_fee_per_gas: None,
		}
	}
}

/// A broadcast transaction awaiting its receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
	pub hash: TransactionHash,
	pub submitted_at: DateTime<Utc>,
}

impl PendingTransaction {
	pub fn new(hash: TransactionHash) -> Self {
		Self {
			hash,
			submitted_at: Utc::now(),
		}
	}
}

/// Transaction receipt containing execution details.
///
/// Provides information about a transaction after it has been included in a block,
/// including its success status, block number and the addresses it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
	/// Address of the contract created by a deployment.
	pub contract_address: Option<Address>,
	/// Recipient of the transaction.
	pub to: Option<Address>,
}

impl TransactionReceipt {
	/// Returns the deployed contract address, falling back to the recipient.
	pub fn contract_or_recipient(&self) -> Option<Address> {
		self.contract_address.or(self.to)
	}
}

/// The subset of an on-chain transaction used to explain reverts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
	pub hash: TransactionHash,
	pub from: Address,
	pub to: Option<Address>,
	pub input: Bytes,
	pub value: U256,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_hash_hex_roundtrip() {
		let hash: TransactionHash = "0x0abc".parse().unwrap();
		assert_eq!(hash.0, vec![0x0a, 0xbc]);
		assert_eq!(hash.to_string(), "0x0abc");
	}

	#[test]
	fn test_contract_or_recipient_prefers_contract() {
		let contract = Address::repeat_byte(0x11);
		let recipient = Address::repeat_byte(0x22);
		let mut receipt = TransactionReceipt {
			hash: TransactionHash(vec![1]),
			block_number: 1,
			success: true,
			contract_address: Some(contract),
			to: Some(recipient),
		};
		assert_eq!(receipt.contract_or_recipient(), Some(contract));

		receipt.contract_address = None;
		assert_eq!(receipt.contract_or_recipient(), Some(recipient));
	}
}
