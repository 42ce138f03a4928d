//! Ethereum contract ABI: interface descriptors, tokens, and calldata codec.
//!
//! Covers the subset the marketplace contract uses: `uint<N>`, `bool`,
//! `address` and `string`, as flat parameter lists (public struct getters are
//! flattened into several outputs by the compiler).

mod codec;
mod descriptor;
mod token;

pub use codec::{decode, encode};
pub use descriptor::{Function, InterfaceDescriptor, Param};
pub use token::{ParamType, Token};

use crate::AbiError;

/// `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with or without `0x` prefix. An empty payload (`0x`) is valid.
pub fn from_hex(s: &str) -> Result<Vec<u8>, AbiError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(digits).map_err(|e| AbiError::InvalidHex(format!("{s}: {e}")))
}

/// Parse a `0x`-prefixed 20-byte address.
pub fn parse_address(s: &str) -> Result<[u8; 20], AbiError> {
    let bytes = from_hex(s)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| AbiError::InvalidHex(format!("address must be 20 bytes: {s}")))
}

/// Parse a JSON-RPC quantity (`0x`-prefixed, no leading zeros required).
pub fn parse_quantity(s: &str) -> Result<u128, AbiError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| AbiError::InvalidHex(format!("quantity missing 0x prefix: {s}")))?;
    if digits.is_empty() {
        return Err(AbiError::InvalidHex("empty quantity".into()));
    }
    u128::from_str_radix(digits, 16).map_err(|e| AbiError::Overflow(format!("{s}: {e}")))
}

/// Format a JSON-RPC quantity.
pub fn to_quantity(value: u128) -> String {
    format!("{value:#x}")
}
