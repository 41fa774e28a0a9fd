//! Redacted string for private keys and explorer API tokens.
//!
//! The inner buffer is zeroed on drop and never shows up in `Debug`, `Display`
//! or serialized output.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

/// Sensitive string that zeroes its memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(s: impl Into<String>) -> Self {
		Self(Zeroizing::new(s.into()))
	}

	/// Exposes the secret to a closure, keeping the borrow scoped.
	pub fn with_exposed<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&str) -> R,
	{
		f(&self.0)
	}

	/// Exposes the raw secret. Never log the result.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString({})", REDACTED)
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(s: String) -> Self {
		Self::new(s)
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s)
	}
}

impl Serialize for SecretString {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(SecretString::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_never_printed() {
		let key = SecretString::from("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");
		assert_eq!(format!("{:?}", key), "SecretString(***REDACTED***)");
		assert_eq!(key.to_string(), REDACTED);
		assert_eq!(serde_json::to_string(&key).unwrap(), "\"***REDACTED***\"");
	}

	#[test]
	fn test_with_exposed() {
		let token = SecretString::from("ETHERSCAN_TOKEN");
		assert_eq!(token.with_exposed(|s| s.len()), 15);
		assert_eq!(token.expose_secret(), "ETHERSCAN_TOKEN");
	}

	#[test]
	fn test_deserialize_and_blank() {
		let token: SecretString = serde_json::from_str("\"  \"").unwrap();
		assert!(token.is_empty());
		assert_eq!(token, SecretString::new("  "));
	}
}
