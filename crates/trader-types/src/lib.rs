//! Common types module for the SteakHouse trader.
//!
//! This module defines the data types shared by every trader component:
//! transaction hashes and receipts, trade intents and outcomes, status events,
//! and small helpers for formatting and error-message parsing.

/// Transaction submission and receipt types.
pub mod delivery;
/// Event types published while a trade progresses.
pub mod events;
/// Secure string wrapper for private keys.
pub mod secret_string;
/// Storage namespaces for cached data.
pub mod storage;
/// Trade intents, outcomes and the per-trade status machine.
pub mod trade;
/// Utility functions for formatting and parsing.
pub mod utils;

pub use delivery::*;
pub use events::*;
pub use secret_string::SecretString;
pub use storage::*;
pub use trade::*;
pub use utils::{
	abbreviate_hex, ensure_hex_prefix, format_units, parse_insufficient_funds, strip_hex_prefix,
	InsufficientFunds,
};

/// Re-exported so downstream crates agree on the numeric and address types.
pub use alloy_primitives::{Address, Bytes, U256};
