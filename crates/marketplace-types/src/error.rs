/// Contract ABI encoding/decoding error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    InvalidHex(String),
    InvalidDescriptor(String),
    UnsupportedType(String),
    UnknownFunction(String),
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },
    TypeMismatch {
        expected: String,
        got: String,
    },
    /// Value does not fit the Rust-side integer type.
    Overflow(String),
    Truncated {
        needed: usize,
        available: usize,
    },
    InvalidUtf8,
}

impl std::fmt::Display for AbiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidHex(msg) => write!(f, "invalid hex: {msg}"),
            Self::InvalidDescriptor(msg) => write!(f, "invalid interface descriptor: {msg}"),
            Self::UnsupportedType(ty) => write!(f, "unsupported ABI type: {ty}"),
            Self::UnknownFunction(name) => write!(f, "function not in descriptor: {name}"),
            Self::ArityMismatch {
                function,
                expected,
                got,
            } => write!(f, "{function} takes {expected} argument(s), got {got}"),
            Self::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, got {got}")
            }
            Self::Overflow(msg) => write!(f, "value overflow: {msg}"),
            Self::Truncated { needed, available } => {
                write!(f, "truncated data: need {needed} bytes, have {available}")
            }
            Self::InvalidUtf8 => write!(f, "string is not valid utf-8"),
        }
    }
}

impl std::error::Error for AbiError {}
