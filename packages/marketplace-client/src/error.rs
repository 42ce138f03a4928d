//! Error types for the marketplace client.

use marketplace_types::NetworkId;
use std::fmt;

use crate::provider::{Confirmation, ProviderError};

/// Client error type. Every failure of a session operation is one of these.
#[derive(Debug)]
pub enum Error {
    /// No usable signing provider (absent, unreachable, or no accounts).
    ProviderUnavailable(String),
    /// The deployment registry has no contract for the provider's network.
    UnsupportedNetwork(NetworkId),
    /// Rejected before any provider call.
    InvalidInput(String),
    /// A read during refresh failed; the stored view was left as it was.
    SyncFailure {
        reason: String,
        /// Set when the refresh followed a write that was already confirmed.
        committed: Option<Confirmation>,
    },
    /// A write was rejected by the provider or by the contract.
    TransactionFailed(ProviderError),
    /// Another write from this session has not resolved yet.
    OperationInProgress,
    /// Configuration or registry loading error.
    Config(String),
}

impl Error {
    pub(crate) fn sync(reason: impl Into<String>) -> Self {
        Self::SyncFailure {
            reason: reason.into(),
            committed: None,
        }
    }

    /// Message suitable for showing to an end user. One distinct message per kind.
    pub fn user_message(&self) -> String {
        match self {
            Error::ProviderUnavailable(_) => {
                "No wallet provider is available. Install or unlock a wallet, then reconnect."
                    .into()
            }
            Error::UnsupportedNetwork(id) => {
                format!("The marketplace contract is not deployed to the detected network ({id}).")
            }
            Error::InvalidInput(msg) => format!("Please check your input: {msg}."),
            Error::SyncFailure {
                committed: Some(c), ..
            } => format!(
                "Transaction {} went through, but the product list could not be refreshed. Try refreshing again.",
                c.tx_id
            ),
            Error::SyncFailure { committed: None, .. } => {
                "Could not load products from the marketplace. Try refreshing again.".into()
            }
            Error::TransactionFailed(cause) => format!("The transaction was not accepted: {cause}."),
            Error::OperationInProgress => {
                "Another transaction is still pending. Wait for it to finish and try again.".into()
            }
            Error::Config(msg) => format!("Configuration problem: {msg}."),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ProviderUnavailable(msg) => write!(f, "provider unavailable: {msg}"),
            Error::UnsupportedNetwork(id) => write!(f, "no deployment for network {id}"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::SyncFailure {
                reason,
                committed: Some(c),
            } => write!(f, "sync failure after committed tx {}: {reason}", c.tx_id),
            Error::SyncFailure {
                reason,
                committed: None,
            } => write!(f, "sync failure: {reason}"),
            Error::TransactionFailed(cause) => write!(f, "transaction failed: {cause}"),
            Error::OperationInProgress => write!(f, "a write operation is already in progress"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::TransactionFailed(cause) => Some(cause),
            _ => None,
        }
    }
}
