//! Storage-related types for the trader.

use std::str::FromStr;

/// Storage namespaces for cached collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Token chart data keyed by address, interval and limit
	TokenData,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::TokenData => "token_data",
		}
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"token_data" => Ok(Self::TokenData),
			_ => Err(()),
		}
	}
}
