//! Cached token chart data.
//!
//! Chart requests are keyed by `(address, interval, limit)` and held in the
//! injected storage service for a fixed time-to-live.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use trader_backend::{BackendService, TokenData};
use trader_config::CacheConfig;
use trader_storage::{StorageError, StorageService};
use trader_types::{Address, StorageKey};

/// Errors from a token data lookup.
#[derive(Debug, Error)]
pub enum CacheError {
	/// The backend fetch failed on a cache miss.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Reading or writing the cached entry failed.
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Read-through cache of backend chart data with a fixed TTL.
pub struct TokenDataCache {
	storage: Arc<StorageService>,
	backend: Arc<BackendService>,
	ttl: Duration,
	cleanup_interval: Duration,
}

impl TokenDataCache {
	pub fn new(
		storage: Arc<StorageService>,
		backend: Arc<BackendService>,
		config: &CacheConfig,
	) -> Self {
		Self {
			storage,
			backend,
			ttl: Duration::from_secs(config.token_data_ttl_seconds),
			cleanup_interval: Duration::from_secs(config.cleanup_interval_seconds),
		}
	}

	fn key(token: Address, interval: &str, limit: u32) -> String {
		format!("{}:{}:{}", token.to_string().to_lowercase(), interval, limit)
	}

	/// Returns chart data, fetching from the backend on a miss.
	pub async fn get(
		&self,
		token: Address,
		interval: &str,
		limit: u32,
	) -> Result<TokenData, CacheError> {
		let key = Self::key(token, interval, limit);
		let namespace = StorageKey::TokenData.as_str();

		match self.storage.retrieve::<TokenData>(namespace, &key).await {
			Ok(data) => {
				tracing::debug!(%key, "Token data cache hit");
				return Ok(data);
			},
			Err(StorageError::NotFound) => {},
			Err(e) => tracing::warn!(%key, error = %e, "Token data cache read failed"),
		}

		let data = self
			.backend
			.get_token_data(token, interval, limit)
			.await
			.map_err(|e| CacheError::Backend(e.to_string()))?;

		self.storage
			.store_with_ttl(namespace, &key, &data, Some(self.ttl))
			.await
			.map_err(|e| CacheError::Storage(e.to_string()))?;

		Ok(data)
	}

	/// Drops a cached entry so the next `get` refetches.
	pub async fn invalidate(
		&self,
		token: Address,
		interval: &str,
		limit: u32,
	) -> Result<(), CacheError> {
		self.storage
			.remove(
				StorageKey::TokenData.as_str(),
				&Self::key(token, interval, limit),
			)
			.await
			.map_err(|e| CacheError::Storage(e.to_string()))
	}

	/// Sweeps expired entries every `cleanup_interval_seconds`.
	pub fn spawn_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
		let cache = Arc::clone(self);
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(cache.cleanup_interval);
			ticker.tick().await;
			loop {
				ticker.tick().await;
				if let Err(e) = cache.storage.cleanup_expired().await {
					tracing::warn!(error = %e, "Token data cleanup failed");
				}
			}
		})
	}
}
