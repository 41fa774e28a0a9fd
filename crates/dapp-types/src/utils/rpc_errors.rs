//! Classification of JSON-RPC and wallet error messages.
//!
//! Providers report failures as free-form strings; callers need to know whether an
//! error is worth retrying.

/// Coarse category of an RPC or wallet failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
	/// The user declined the signature request (EIP-1193 code 4001).
	UserRejected,
	/// The sender cannot cover value plus gas.
	InsufficientFunds,
	/// The endpoint could not be reached.
	NetworkUnavailable,
	/// The request did not complete in time.
	Timeout,
	/// Anything else the provider reported.
	Other,
}

impl RpcErrorKind {
	/// Whether a caller may reasonably try again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::NetworkUnavailable | Self::Timeout | Self::Other)
	}
}

/// Maps a provider error message onto a [`RpcErrorKind`].
pub fn classify_rpc_error(message: &str) -> RpcErrorKind {
	let message = message.to_lowercase();

	if message.contains("user rejected")
		|| message.contains("user denied")
		|| message.contains("rejected by user")
		|| message.contains("code 4001")
	{
		RpcErrorKind::UserRejected
	} else if message.contains("insufficient funds") || message.contains("insufficient balance") {
		RpcErrorKind::InsufficientFunds
	} else if message.contains("timed out") || message.contains("timeout") {
		RpcErrorKind::Timeout
	} else if message.contains("connection refused")
		|| message.contains("error sending request")
		|| message.contains("dns error")
		|| message.contains("connection reset")
		|| message.contains("network unreachable")
	{
		RpcErrorKind::NetworkUnavailable
	} else {
		RpcErrorKind::Other
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_classification() {
		assert_eq!(
			classify_rpc_error("MetaMask Tx Signature: User denied transaction signature."),
			RpcErrorKind::UserRejected
		);
		assert_eq!(
			classify_rpc_error("server returned an error response: error code -32000: insufficient funds for gas * price + value"),
			RpcErrorKind::InsufficientFunds
		);
		assert_eq!(
			classify_rpc_error("error sending request for url (http://localhost:8545/)"),
			RpcErrorKind::NetworkUnavailable
		);
		assert_eq!(classify_rpc_error("operation timed out"), RpcErrorKind::Timeout);
		assert_eq!(classify_rpc_error("nonce too low"), RpcErrorKind::Other);
	}

	#[test]
	fn test_retryable() {
		assert!(!RpcErrorKind::UserRejected.is_retryable());
		assert!(!RpcErrorKind::InsufficientFunds.is_retryable());
		assert!(RpcErrorKind::NetworkUnavailable.is_retryable());
	}
}
