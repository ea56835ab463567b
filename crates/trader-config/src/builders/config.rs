//! Configuration builder for creating test and development configurations.
//!
//! This module provides utilities for constructing Config instances with
//! sensible defaults, particularly useful for testing scenarios.

use crate::{
	AccountConfig, BackendConfig, CacheConfig, ChainConfig, Config, PollerConfig, TraderConfig,
};
use trader_types::{Address, SecretString};

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	trader_id: String,
	wallet_address: Address,
	chain_id: u64,
	rpc_url: String,
	private_key: Option<SecretString>,
	poller: PollerConfig,
	backend_url: String,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` pointed at a local node and backend.
	pub fn new() -> Self {
		Self {
			trader_id: "test-trader".to_string(),
			wallet_address: Address::repeat_byte(0x11),
			chain_id: 31337,
			rpc_url: "http://localhost:8545".to_string(),
			private_key: None,
			poller: PollerConfig {
				interval_ms: 10,
				max_attempts: Some(10),
				max_wait_ms: Some(1_000),
				required_confirmations: 1,
			},
			backend_url: "http://localhost:4000".to_string(),
		}
	}

	pub fn wallet_address(mut self, address: Address) -> Self {
		self.wallet_address = address;
		self
	}

	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn private_key(mut self, key: &str) -> Self {
		self.private_key = Some(SecretString::from(key));
		self
	}

	pub fn poller(mut self, poller: PollerConfig) -> Self {
		self.poller = poller;
		self
	}

	pub fn backend_url(mut self, url: String) -> Self {
		self.backend_url = url;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			trader: TraderConfig {
				id: self.trader_id,
				wallet_address: self.wallet_address,
			},
			chain: ChainConfig {
				chain_id: self.chain_id,
				rpc_url: self.rpc_url,
			},
			account: self.private_key.map(|private_key| AccountConfig { private_key }),
			poller: self.poller,
			backend: BackendConfig {
				base_url: self.backend_url,
				timeout_seconds: 5,
			},
			cache: CacheConfig::default(),
		}
	}
}
