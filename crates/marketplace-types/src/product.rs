//! Marketplace domain types.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Wei;

/// Active signing identity as reported by the provider. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(String);

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Account {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for Account {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifies which deployment of the contract to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub u64);

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NetworkId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(NetworkId)
    }
}

/// A product record as stored by the contract.
///
/// Ids start at 1 and are contiguous up to the contract's product count.
/// Only `sold` ever changes, from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub price: Wei,
    /// Seller, or buyer once sold. Absent when the contract does not expose it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub sold: bool,
}
