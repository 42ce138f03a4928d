//! Provider interface: account identity, network identity, contract reads and
//! transaction submission. Implemented by [`crate::JsonRpcProvider`] and
//! [`crate::LocalLedger`]; the session only ever talks to this trait.

use async_trait::async_trait;
use marketplace_types::{AbiError, Account, NetworkId, Token, Wei};
use std::fmt;
use std::sync::Arc;

use crate::registry::ContractHandle;

/// Failure reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No signing capability (no wallet, no accounts, node unreachable at connect).
    Unavailable(String),
    /// HTTP or connection failure.
    Transport(String),
    /// JSON-RPC error object returned by the node.
    Rpc { code: i64, message: String },
    /// Write refused: contract revert, user denial, or failed receipt.
    Rejected(String),
    /// Calldata or return data could not be encoded/decoded.
    Codec(String),
    Timeout(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "provider unavailable: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Rpc { code, message } => write!(f, "rpc error {code}: {message}"),
            Self::Rejected(msg) => write!(f, "rejected: {msg}"),
            Self::Codec(msg) => write!(f, "codec error: {msg}"),
            Self::Timeout(msg) => write!(f, "timed out: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<AbiError> for ProviderError {
    fn from(e: AbiError) -> Self {
        Self::Codec(e.to_string())
    }
}

/// Sender and attached value of a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub from: Account,
    pub value: Option<Wei>,
}

/// Provider's acknowledgement that a write was accepted by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_id: String,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Ask for account authorization. May prompt the user.
    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError>;

    async fn current_network_id(&self) -> Result<NetworkId, ProviderError>;

    /// Side-effect-free contract call.
    async fn call_read(
        &self,
        contract: &ContractHandle,
        method: &str,
        args: &[Token],
    ) -> Result<Vec<Token>, ProviderError>;

    /// State-changing call. Resolves once the network has accepted the
    /// transaction; the caller does no confirmation polling of its own.
    async fn submit_write(
        &self,
        contract: &ContractHandle,
        method: &str,
        args: &[Token],
        options: &WriteOptions,
    ) -> Result<Confirmation, ProviderError>;
}

#[async_trait]
impl<T: Provider + ?Sized> Provider for Arc<T> {
    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        (**self).request_accounts().await
    }

    async fn current_network_id(&self) -> Result<NetworkId, ProviderError> {
        (**self).current_network_id().await
    }

    async fn call_read(
        &self,
        contract: &ContractHandle,
        method: &str,
        args: &[Token],
    ) -> Result<Vec<Token>, ProviderError> {
        (**self).call_read(contract, method, args).await
    }

    async fn submit_write(
        &self,
        contract: &ContractHandle,
        method: &str,
        args: &[Token],
        options: &WriteOptions,
    ) -> Result<Confirmation, ProviderError> {
        (**self).submit_write(contract, method, args, options).await
    }
}
