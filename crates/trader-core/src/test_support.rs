//! In-memory backend double shared by the core tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trader_backend::{BackendError, BackendInterface, BuyRequest, SellRequest, TokenData, UserProfile};
use trader_types::{Address, TransactionHash, U256};

#[derive(Default)]
struct State {
	hash: Option<TransactionHash>,
	trading_wallet: Option<Address>,
	funds_error: Option<(u64, u64)>,
	buys: AtomicUsize,
	chart_requests: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MockBackend {
	state: Arc<Mutex<State>>,
}

impl MockBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_hash(self, hash: TransactionHash) -> Self {
		self.state.lock().unwrap().hash = Some(hash);
		self
	}

	pub fn with_trading_wallet(self, wallet: Address) -> Self {
		self.state.lock().unwrap().trading_wallet = Some(wallet);
		self
	}

	pub fn fail_trades_with_funds(self, have: u64, want: u64) -> Self {
		self.state.lock().unwrap().funds_error = Some((have, want));
		self
	}

	pub fn buys(&self) -> usize {
		self.state.lock().unwrap().buys.load(Ordering::SeqCst)
	}

	pub fn chart_requests(&self) -> usize {
		self.state.lock().unwrap().chart_requests.load(Ordering::SeqCst)
	}

	fn trade(&self) -> Result<TransactionHash, BackendError> {
		let state = self.state.lock().unwrap();
		if let Some((have, want)) = state.funds_error {
			return Err(BackendError::InsufficientFunds {
				have: U256::from(have),
				want: U256::from(want),
			});
		}
		state.hash.clone().ok_or_else(|| BackendError::Api {
			code: "UNSCRIPTED".into(),
			message: "no hash scripted".into(),
		})
	}
}

#[async_trait]
impl BackendInterface for MockBackend {
	async fn buy_token(&self, _request: &BuyRequest) -> Result<TransactionHash, BackendError> {
		self.state.lock().unwrap().buys.fetch_add(1, Ordering::SeqCst);
		self.trade()
	}

	async fn sell_token(&self, _request: &SellRequest) -> Result<TransactionHash, BackendError> {
		self.trade()
	}

	async fn withdraw(
		&self,
		_wallet: Address,
		_amount: U256,
	) -> Result<TransactionHash, BackendError> {
		self.trade()
	}

	async fn get_user(&self, _wallet: Address) -> Result<UserProfile, BackendError> {
		Ok(UserProfile {
			trading_wallet: self.state.lock().unwrap().trading_wallet,
			username: None,
		})
	}

	async fn get_token_data(
		&self,
		token: Address,
		interval: &str,
		limit: u32,
	) -> Result<TokenData, BackendError> {
		let n = self
			.state
			.lock()
			.unwrap()
			.chart_requests
			.fetch_add(1, Ordering::SeqCst);
		Ok(serde_json::json!({
			"token": token.to_string(),
			"interval": interval,
			"limit": limit,
			"fetch": n,
		}))
	}
}
