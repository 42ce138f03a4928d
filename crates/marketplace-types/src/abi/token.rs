//! ABI parameter types and values.

use std::str::FromStr;

use crate::AbiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Bit width, 8..=256 in steps of 8.
    Uint(usize),
    Bool,
    Address,
    String,
}

impl ParamType {
    pub fn is_dynamic(self) -> bool {
        matches!(self, Self::String)
    }

    /// Canonical name used in function signatures (`uint` becomes `uint256`).
    pub fn canonical(self) -> String {
        match self {
            Self::Uint(bits) => format!("uint{bits}"),
            Self::Bool => "bool".into(),
            Self::Address => "address".into(),
            Self::String => "string".into(),
        }
    }
}

impl FromStr for ParamType {
    type Err = AbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(Self::Bool),
            "address" | "address payable" => Ok(Self::Address),
            "string" => Ok(Self::String),
            "uint" => Ok(Self::Uint(256)),
            other => {
                let bits = other
                    .strip_prefix("uint")
                    .and_then(|b| b.parse::<usize>().ok())
                    .filter(|b| *b > 0 && *b <= 256 && b % 8 == 0)
                    .ok_or_else(|| AbiError::UnsupportedType(other.to_string()))?;
                Ok(Self::Uint(bits))
            }
        }
    }
}

/// A decoded (or to-be-encoded) ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Unsigned integer; values above `u128::MAX` are rejected on decode.
    Uint(u128),
    Bool(bool),
    Address([u8; 20]),
    String(String),
}

impl Token {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Uint(_) => "uint",
            Self::Bool(_) => "bool",
            Self::Address(_) => "address",
            Self::String(_) => "string",
        }
    }

    pub fn matches(&self, ty: ParamType) -> bool {
        matches!(
            (self, ty),
            (Self::Uint(_), ParamType::Uint(_))
                | (Self::Bool(_), ParamType::Bool)
                | (Self::Address(_), ParamType::Address)
                | (Self::String(_), ParamType::String)
        )
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            Self::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<[u8; 20]> {
        match self {
            Self::Address(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uint(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Address(a) => write!(f, "{}", super::to_hex(a)),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}
