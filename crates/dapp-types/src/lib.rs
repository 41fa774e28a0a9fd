//! Common types module for the dApp toolkit.
//!
//! This module defines the core data types shared by the deployment, verification,
//! registry, wallet and dispatch crates. Keeping them in one place ensures every
//! component agrees on the shape of records, requests and events.

/// Transaction delivery types for blockchain interactions.
pub mod delivery;
/// Deployment inputs and records.
pub mod deployment;
/// Event types for inter-component communication.
pub mod events;
/// Network descriptor types.
pub mod networks;
/// Bounded retry policy with exponential backoff.
pub mod retry;
/// Secure string type for keys and API tokens.
pub mod secret_string;
/// Utility functions for common conversions and formatting.
pub mod utils;

// Re-export all types for convenient access
pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use delivery::*;
pub use deployment::*;
pub use events::*;
pub use networks::{NetworkDescriptor, NetworksConfig};
pub use retry::{RetryOutcome, RetryPolicy};
pub use secret_string::SecretString;
pub use utils::{
	classify_rpc_error, format_units, is_local_chain, truncate_id, without_0x_prefix,
	RpcErrorKind, WEI_DECIMALS,
};
