//! Hex and amount formatting for log lines and CLI output.

use alloy_primitives::U256;

/// Shortens a hex string to its head and tail, e.g. `0xabcdef12…5678`.
///
/// Strings of 14 characters or fewer are returned unchanged.
pub fn abbreviate_hex(hex: &str) -> String {
	const HEAD: usize = 10;
	const TAIL: usize = 4;
	if hex.len() <= HEAD + TAIL || !hex.is_ascii() {
		return hex.to_string();
	}
	format!("{}…{}", &hex[..HEAD], &hex[hex.len() - TAIL..])
}

/// Strips a leading `0x` or `0X`.
pub fn strip_hex_prefix(hex: &str) -> &str {
	match hex.as_bytes() {
		[b'0', b'x' | b'X', ..] => &hex[2..],
		_ => hex,
	}
}

/// Returns `hex` with a lowercase `0x` prefix.
pub fn ensure_hex_prefix(hex: &str) -> String {
	format!("0x{}", strip_hex_prefix(hex))
}

/// Formats a base-unit amount with `decimals` places, without trailing zeros.
///
/// `format_units(U256::from(1_500_000_000_000_000_000u128), 18)` is `"1.5"`.
pub fn format_units(amount: U256, decimals: u8) -> String {
	let unit = U256::from(10u8).pow(U256::from(decimals));
	let whole = amount / unit;
	let fraction = amount % unit;
	if fraction.is_zero() {
		return whole.to_string();
	}
	let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
	format!("{}.{}", whole, fraction.trim_end_matches('0'))
}
