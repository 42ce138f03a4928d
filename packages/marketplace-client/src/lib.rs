//! # Marketplace Client
//!
//! Keeps a local view of a contract-backed product ledger, submits product
//! creation and purchase transactions through a [`Provider`], and re-reads the
//! ledger after every state change.
//!
//! ## Quick Start
//! ```bash
//! # against a local dev node with a deployed contract artifact
//! cargo run --bin marketplace -- list
//!
//! # fully in-process, no node required
//! MARKETPLACE_PROVIDER=local cargo run --bin marketplace -- shell
//! ```
//!
//! ## Flow
//! `Session::connect` → `list_unsold_products` ⇄ (`create_product` | `buy_product`)

mod client;
pub mod config;
mod error;
pub mod local;
pub mod provider;
pub mod registry;
pub mod rpc;
pub mod shell;

pub use client::{ProductListView, Session};
pub use config::Config;
pub use error::Error;
pub use local::LocalLedger;
pub use provider::{Confirmation, Provider, ProviderError, WriteOptions};
pub use registry::{ContractHandle, DeploymentRegistry};
pub use rpc::JsonRpcProvider;

pub use marketplace_types::{Account, NetworkId, Product, Token, Wei};
