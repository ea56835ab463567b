//! Scripted in-memory chain for tests.
//!
//! Each receipt query consumes the next scripted step; once the script runs
//! out the last step repeats, so a mined receipt stays mined.

use crate::{DeliveryError, DeliveryInterface};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use trader_types::{
	Address, Bytes, Transaction, TransactionHash, TransactionInfo, TransactionReceipt, U256,
};

/// One scripted answer to `get_receipt`.
#[derive(Debug, Clone)]
pub enum ReceiptStep {
	Pending,
	Mined { success: bool, block_number: u64 },
	RpcError(String),
}

pub struct ScriptedChain {
	can_sign: bool,
	hash: TransactionHash,
	receipts: Mutex<VecDeque<ReceiptStep>>,
	last_receipt: Mutex<ReceiptStep>,
	blocks: Mutex<VecDeque<u64>>,
	last_block: Mutex<u64>,
	transaction: Mutex<Option<TransactionInfo>>,
	contract_address: Mutex<Option<Address>>,
	submit_error: Mutex<Option<DeliveryError>>,
	balance: Mutex<U256>,
	submitted: Mutex<Vec<Transaction>>,
	receipt_queries: AtomicUsize,
}

impl Default for ScriptedChain {
	fn default() -> Self {
		Self::new()
	}
}

impl ScriptedChain {
	/// A chain with a connected signer whose transactions stay pending.
	pub fn new() -> Self {
		Self {
			can_sign: true,
			hash: TransactionHash(vec![0xab; 32]),
			receipts: Mutex::new(VecDeque::new()),
			last_receipt: Mutex::new(ReceiptStep::Pending),
			blocks: Mutex::new(VecDeque::new()),
			last_block: Mutex::new(0),
			transaction: Mutex::new(None),
			contract_address: Mutex::new(None),
			submit_error: Mutex::new(None),
			balance: Mutex::new(U256::ZERO),
			submitted: Mutex::new(Vec::new()),
			receipt_queries: AtomicUsize::new(0),
		}
	}

	/// A chain without a signer.
	pub fn read_only() -> Self {
		Self {
			can_sign: false,
			..Self::new()
		}
	}

	/// The hash every submission returns.
	pub fn hash(&self) -> TransactionHash {
		self.hash.clone()
	}

	pub fn script_receipts(&self, steps: impl IntoIterator<Item = ReceiptStep>) {
		self.receipts.lock().unwrap().extend(steps);
	}

	pub fn script_blocks(&self, blocks: impl IntoIterator<Item = u64>) {
		self.blocks.lock().unwrap().extend(blocks);
	}

	pub fn set_transaction_input(&self, to: Option<Address>, input: Vec<u8>) {
		*self.transaction.lock().unwrap() = Some(TransactionInfo {
			hash: self.hash.clone(),
			from: Address::repeat_byte(0x01),
			to,
			input: Bytes::from(input),
			value: U256::ZERO,
		});
	}

	pub fn set_contract_address(&self, address: Address) {
		*self.contract_address.lock().unwrap() = Some(address);
	}

	pub fn set_balance(&self, balance: U256) {
		*self.balance.lock().unwrap() = balance;
	}

	/// Makes the next `submit` fail with `error`.
	pub fn fail_submit(&self, error: DeliveryError) {
		*self.submit_error.lock().unwrap() = Some(error);
	}

	pub fn submissions(&self) -> usize {
		self.submitted.lock().unwrap().len()
	}

	pub fn submitted(&self) -> Vec<Transaction> {
		self.submitted.lock().unwrap().clone()
	}

	pub fn receipt_queries(&self) -> usize {
		self.receipt_queries.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl DeliveryInterface for ScriptedChain {
	fn can_sign(&self) -> bool {
		self.can_sign
	}

	async fn submit(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		if !self.can_sign {
			return Err(DeliveryError::ProviderUnavailable);
		}
		self.submitted.lock().unwrap().push(tx);
		match self.submit_error.lock().unwrap().take() {
			Some(err) => Err(err),
			None => Ok(self.hash.clone()),
		}
	}

	async fn get_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<Option<TransactionReceipt>, DeliveryError> {
		self.receipt_queries.fetch_add(1, Ordering::SeqCst);
		let step = {
			let mut last = self.last_receipt.lock().unwrap();
			if let Some(next) = self.receipts.lock().unwrap().pop_front() {
				*last = next;
			}
			last.clone()
		};
		match step {
			ReceiptStep::Pending => Ok(None),
			ReceiptStep::Mined {
				success,
				block_number,
			} => Ok(Some(TransactionReceipt {
				hash: hash.clone(),
				block_number,
				success,
				contract_address: *self.contract_address.lock().unwrap(),
				to: Some(Address::repeat_byte(0x22)),
			})),
			ReceiptStep::RpcError(msg) => Err(DeliveryError::Network(msg)),
		}
	}

	async fn get_transaction(
		&self,
		_hash: &TransactionHash,
	) -> Result<Option<TransactionInfo>, DeliveryError> {
		Ok(self.transaction.lock().unwrap().clone())
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		let mut last = self.last_block.lock().unwrap();
		if let Some(next) = self.blocks.lock().unwrap().pop_front() {
			*last = next;
		}
		Ok(*last)
	}

	async fn get_balance(&self, _address: Address) -> Result<U256, DeliveryError> {
		Ok(*self.balance.lock().unwrap())
	}

	async fn get_gas_price(&self) -> Result<u128, DeliveryError> {
		Ok(1_000_000_000)
	}
}
