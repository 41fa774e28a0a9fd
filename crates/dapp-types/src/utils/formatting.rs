//! String formatting utilities.
//!
//! Hex prefix management, amount formatting and truncation for log readability.

/// Truncates a hex string for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

/// Removes "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Formats a raw integer amount with the given number of decimals.
///
/// `format_units("1500000000000000000", 18)` yields `"1.5"`.
pub fn format_units(amount: &str, decimals: u8) -> String {
	if decimals == 0 {
		return amount.to_string();
	}

	let decimal_places = decimals as usize;
	let (integer_part, decimal_part) = if amount.len() <= decimal_places {
		let decimal_str = format!("{:0>width$}", amount, width = decimal_places);
		("0".to_string(), decimal_str)
	} else {
		let split_pos = amount.len() - decimal_places;
		(
			amount[..split_pos].to_string(),
			amount[split_pos..].to_string(),
		)
	};

	let decimal_trimmed = decimal_part.trim_end_matches('0');
	if decimal_trimmed.is_empty() {
		integer_part
	} else {
		format!("{}.{}", integer_part, decimal_trimmed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(truncate_id("0x1234567890abcdef"), "0x123456..");
	}

	#[test]
	fn test_strip_prefix() {
		assert_eq!(without_0x_prefix("0X5fbdb231"), "5fbdb231");
		assert_eq!(without_0x_prefix("5fbdb231"), "5fbdb231");
	}

	#[test]
	fn test_format_units() {
		assert_eq!(format_units("1000000000000000000", 18), "1");
		assert_eq!(format_units("100000000000000000", 18), "0.1");
		assert_eq!(format_units("0", 18), "0");
		assert_eq!(format_units("1500000", 6), "1.5");
		assert_eq!(format_units("42", 0), "42");
	}
}
