//! Utility functions for formatting and parsing.
//!
//! This module provides hex and amount formatting used in logs and CLI output,
//! and the parser that recognises insufficient-funds errors from nodes and the
//! backend.

pub mod formatting;
pub mod funds;

pub use formatting::{abbreviate_hex, ensure_hex_prefix, format_units, strip_hex_prefix};
pub use funds::{parse_insufficient_funds, InsufficientFunds};
