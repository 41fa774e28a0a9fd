//! Constants shared across the toolkit.

/// Chain ids of development networks (hardhat/anvil and ganache).
///
/// Contracts deployed to these chains are never submitted for source verification.
pub const LOCAL_CHAIN_IDS: [u64; 2] = [31337, 1337];

/// Decimals of the native currency.
pub const WEI_DECIMALS: u8 = 18;
