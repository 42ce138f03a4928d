//! Shared types and pure-logic utilities for the marketplace client.
//! No provider or network dependency; usable by any front end and by tests.

pub mod abi;
mod amount;
mod error;
mod product;

pub use abi::{Function, InterfaceDescriptor, Param, ParamType, Token};
pub use amount::Wei;
pub use error::AbiError;
pub use product::{Account, NetworkId, Product};
