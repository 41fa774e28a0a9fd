//! Utility functions for common conversions and formatting.

pub mod constants;
pub mod formatting;
pub mod helpers;
pub mod rpc_errors;

pub use constants::{LOCAL_CHAIN_IDS, WEI_DECIMALS};
pub use formatting::{format_units, truncate_id, without_0x_prefix};
pub use helpers::is_local_chain;
pub use rpc_errors::{classify_rpc_error, RpcErrorKind};
