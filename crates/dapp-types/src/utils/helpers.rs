//! Helper utilities for common operations.

use super::constants::LOCAL_CHAIN_IDS;

/// Whether the chain id belongs to a local development network.
pub fn is_local_chain(chain_id: u64) -> bool {
	LOCAL_CHAIN_IDS.contains(&chain_id)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_local_chain() {
		assert!(is_local_chain(31337));
		assert!(is_local_chain(1337));
		assert!(!is_local_chain(1));
		assert!(!is_local_chain(11155111));
	}
}
