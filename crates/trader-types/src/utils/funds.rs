//! Insufficient-funds error parsing.
//!
//! Nodes reject underfunded transactions with messages such as
//! `insufficient funds for gas * price + value: have 100 want 250`, and the
//! backend forwards the same text inside its error body.

use alloy_primitives::U256;
use once_cell::sync::Lazy;
use regex::Regex;

static HAVE_WANT: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?i)have\s+(\d+)\s+want\s+(\d+)").expect("valid regex"));

/// Balance and cost reported by an insufficient-funds rejection, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientFunds {
	pub have: U256,
	pub want: U256,
}

impl InsufficientFunds {
	/// Amount missing to cover the transaction.
	pub fn need(&self) -> U256 {
		self.want.saturating_sub(self.have)
	}
}

/// Extracts `have X want Y` from an error message.
///
/// Returns `None` when the message carries no such pair or the numbers do not
/// fit in 256 bits.
pub fn parse_insufficient_funds(message: &str) -> Option<InsufficientFunds> {
	let caps = HAVE_WANT.captures(message)?;
	let have = U256::from_str_radix(caps.get(1)?.as_str(), 10).ok()?;
	let want = U256::from_str_radix(caps.get(2)?.as_str(), 10).ok()?;
	Some(InsufficientFunds { have, want })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_need_is_want_minus_have() {
		let funds = parse_insufficient_funds("have 100 want 250").unwrap();
		assert_eq!(funds.need(), U256::from(150));
	}

	#[test]
	fn test_parses_geth_message() {
		let msg = "insufficient funds for gas * price + value: address 0x70997970C51812dc3A010C7d01b50e0d17dc79C8 have 2000000000000000 want 5000000000000000";
		let funds = parse_insufficient_funds(msg).unwrap();
		assert_eq!(funds.have, U256::from(2_000_000_000_000_000u64));
		assert_eq!(funds.need(), U256::from(3_000_000_000_000_000u64));
	}

	#[test]
	fn test_no_match() {
		assert!(parse_insufficient_funds("nonce too low").is_none());
		assert!(parse_insufficient_funds("have lots want more").is_none());
	}

	#[test]
	fn test_need_never_underflows() {
		let funds = parse_insufficient_funds("have 300 want 250").unwrap();
		assert_eq!(funds.need(), U256::ZERO);
	}
}
