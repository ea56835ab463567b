//! Configuration module for the SteakHouse trader.
//!
//! This module provides structures and utilities for managing trader configuration.
//! Configuration is loaded from TOML, `${VAR}` and `${VAR:-default}` references are
//! resolved from the environment, and the result is validated before use.

#[cfg(feature = "testing")]
pub mod builders;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use trader_types::{Address, SecretString};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, not the input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the trader.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Identity of this trader instance and the user it acts for.
	pub trader: TraderConfig,
	/// Chain RPC endpoint.
	pub chain: ChainConfig,
	/// Signing account. Without it the trader is read-only.
	#[serde(default)]
	pub account: Option<AccountConfig>,
	/// Confirmation polling budget.
	#[serde(default)]
	pub poller: PollerConfig,
	/// Backend trade and profile API.
	pub backend: BackendConfig,
	/// Token data cache.
	#[serde(default)]
	pub cache: CacheConfig,
}

/// Configuration specific to the trader instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TraderConfig {
	/// Identifier used in logs.
	pub id: String,
	/// The user's connected wallet.
	pub wallet_address: Address,
}

/// Chain connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
	pub chain_id: u64,
	pub rpc_url: String,
}

/// Local signing account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	pub private_key: SecretString,
}

/// Confirmation polling budget.
///
/// Both an attempt budget and a wall-clock budget may be set; polling stops at
/// whichever runs out first.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollerConfig {
	/// Delay between receipt queries.
	#[serde(default = "default_interval_ms")]
	pub interval_ms: u64,
	/// Maximum receipt queries before giving up. Unbounded when absent.
	#[serde(default)]
	pub max_attempts: Option<u32>,
	/// Maximum wall-clock time before giving up.
	#[serde(default = "default_max_wait_ms")]
	pub max_wait_ms: Option<u64>,
	/// Blocks required on top of (and including) the receipt block.
	#[serde(default = "default_confirmations")]
	pub required_confirmations: u64,
}

impl Default for PollerConfig {
	fn default() -> Self {
		Self {
			interval_ms: default_interval_ms(),
			max_attempts: None,
			max_wait_ms: default_max_wait_ms(),
			required_confirmations: default_confirmations(),
		}
	}
}

impl PollerConfig {
	pub fn interval(&self) -> Duration {
		Duration::from_millis(self.interval_ms)
	}

	pub fn max_wait(&self) -> Option<Duration> {
		self.max_wait_ms.map(Duration::from_millis)
	}
}

fn default_interval_ms() -> u64 {
	5_000
}

/// Five minutes.
fn default_max_wait_ms() -> Option<u64> {
	Some(300_000)
}

fn default_confirmations() -> u64 {
	1
}

/// Backend API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
	pub base_url: String,
	#[serde(default = "default_backend_timeout")]
	pub timeout_seconds: u64,
}

fn default_backend_timeout() -> u64 {
	30
}

/// Token data cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
	/// How long fetched token data stays fresh.
	#[serde(default = "default_token_data_ttl")]
	pub token_data_ttl_seconds: u64,
	/// Interval for sweeping expired entries.
	#[serde(default = "default_cleanup_interval")]
	pub cleanup_interval_seconds: u64,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			token_data_ttl_seconds: default_token_data_ttl(),
			cleanup_interval_seconds: default_cleanup_interval(),
		}
	}
}

fn default_token_data_ttl() -> u64 {
	30
}

fn default_cleanup_interval() -> u64 {
	60
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, resolving environment variables.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path.as_ref()).await?;
		content.parse()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.trader.id.is_empty() {
			return Err(ConfigError::Validation("Trader ID cannot be empty".into()));
		}

		if self.chain.chain_id == 0 {
			return Err(ConfigError::Validation("chain_id must be non-zero".into()));
		}
		if !self.chain.rpc_url.starts_with("http://") && !self.chain.rpc_url.starts_with("https://")
		{
			return Err(ConfigError::Validation(format!(
				"rpc_url must be an http(s) URL, got '{}'",
				self.chain.rpc_url
			)));
		}

		if let Some(account) = &self.account {
			if account.private_key.is_empty() {
				return Err(ConfigError::Validation(
					"account.private_key cannot be empty".into(),
				));
			}
		}

		if self.poller.interval_ms == 0 {
			return Err(ConfigError::Validation(
				"poller.interval_ms must be greater than 0".into(),
			));
		}
		if self.poller.max_attempts.is_none() && self.poller.max_wait_ms.is_none() {
			return Err(ConfigError::Validation(
				"poller needs max_attempts, max_wait_ms, or both".into(),
			));
		}
		if self.poller.max_attempts == Some(0) {
			return Err(ConfigError::Validation(
				"poller.max_attempts must be at least 1".into(),
			));
		}
		if self.poller.required_confirmations == 0 {
			return Err(ConfigError::Validation(
				"required_confirmations must be at least 1".into(),
			));
		}
		if self.poller.required_confirmations > 100 {
			return Err(ConfigError::Validation(
				"required_confirmations cannot exceed 100".into(),
			));
		}

		if self.backend.base_url.is_empty() {
			return Err(ConfigError::Validation(
				"backend.base_url cannot be empty".into(),
			));
		}

		if self.cache.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"cache.cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.cache.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"cache.cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
