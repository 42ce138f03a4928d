//! Client configuration.
//!
//! Loaded from an optional `marketplace.{toml,json,yaml}` file, then
//! `MARKETPLACE_*` environment variables (nested keys use `__`, e.g.
//! `MARKETPLACE_METHODS__PRODUCT_COUNT=product_count`).

use serde::Deserialize;
use tracing::warn;

/// Upper bound on concurrent per-product reads during a refresh.
pub const MAX_READ_CONCURRENCY: usize = 16;

/// Which provider backs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Node JSON-RPC endpoint with node-managed accounts.
    Rpc,
    /// In-process ledger; nothing leaves the process.
    Local,
}

/// Contract method names. Defaults match the deployed marketplace contract.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContractMethods {
    #[serde(default = "defaults::product_count")]
    pub product_count: String,

    #[serde(default = "defaults::products")]
    pub products: String,

    #[serde(default = "defaults::create_product")]
    pub create_product: String,

    #[serde(default = "defaults::purchase_product")]
    pub purchase_product: String,
}

impl Default for ContractMethods {
    fn default() -> Self {
        Self {
            product_count: defaults::product_count(),
            products: defaults::products(),
            create_product: defaults::create_product(),
            purchase_product: defaults::purchase_product(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::provider")]
    pub provider: ProviderKind,

    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    /// Contract artifact holding the ABI and per-network deployments.
    #[serde(default = "defaults::registry_path")]
    pub registry_path: String,

    #[serde(default = "defaults::request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "defaults::receipt_poll_ms")]
    pub receipt_poll_ms: u64,

    #[serde(default = "defaults::receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    /// Gas limit attached to every write.
    #[serde(default = "defaults::gas")]
    pub gas: u64,

    #[serde(default = "defaults::read_concurrency")]
    pub read_concurrency: usize,

    /// Network id reported by the in-process ledger.
    #[serde(default = "defaults::local_network_id")]
    pub local_network_id: u64,

    #[serde(default)]
    pub methods: ContractMethods,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: defaults::provider(),
            rpc_url: defaults::rpc_url(),
            registry_path: defaults::registry_path(),
            request_timeout_ms: defaults::request_timeout_ms(),
            receipt_poll_ms: defaults::receipt_poll_ms(),
            receipt_timeout_secs: defaults::receipt_timeout_secs(),
            gas: defaults::gas(),
            read_concurrency: defaults::read_concurrency(),
            local_network_id: defaults::local_network_id(),
            methods: ContractMethods::default(),
        }
    }
}

impl Config {
    /// Load from `path` (required when given) or `marketplace.*` (optional),
    /// overlaid with `MARKETPLACE_*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, crate::Error> {
        let file = match path {
            Some(p) => config::File::with_name(p).required(true),
            None => config::File::with_name("marketplace").required(false),
        };

        let config: Config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("MARKETPLACE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| crate::Error::Config(format!("failed to load configuration: {e}")))?;

        config.validate()
    }

    /// Reject unusable values and clamp read concurrency into `1..=16`.
    pub fn validate(mut self) -> Result<Self, crate::Error> {
        if self.rpc_url.trim().is_empty() && self.provider == ProviderKind::Rpc {
            return Err(crate::Error::Config("rpc_url must not be empty".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(crate::Error::Config("request_timeout_ms must be > 0".into()));
        }
        if self.receipt_poll_ms == 0 {
            return Err(crate::Error::Config("receipt_poll_ms must be > 0".into()));
        }
        for (field, name) in [
            ("product_count", &self.methods.product_count),
            ("products", &self.methods.products),
            ("create_product", &self.methods.create_product),
            ("purchase_product", &self.methods.purchase_product),
        ] {
            if name.trim().is_empty() {
                return Err(crate::Error::Config(format!(
                    "methods.{field} must not be empty"
                )));
            }
        }

        let clamped = self.read_concurrency.clamp(1, MAX_READ_CONCURRENCY);
        if clamped != self.read_concurrency {
            warn!(
                requested = self.read_concurrency,
                using = clamped,
                "read_concurrency out of range, clamped"
            );
            self.read_concurrency = clamped;
        }
        Ok(self)
    }
}

mod defaults {
    use super::ProviderKind;

    pub fn provider() -> ProviderKind {
        ProviderKind::Rpc
    }

    pub fn rpc_url() -> String {
        "http://127.0.0.1:8545".into()
    }

    pub fn registry_path() -> String {
        "build/contracts/Marketplace.json".into()
    }

    pub fn request_timeout_ms() -> u64 {
        10_000
    }

    pub fn receipt_poll_ms() -> u64 {
        500
    }

    pub fn receipt_timeout_secs() -> u64 {
        120
    }

    pub fn gas() -> u64 {
        2_000_000
    }

    pub fn read_concurrency() -> usize {
        8
    }

    pub fn local_network_id() -> u64 {
        5777
    }

    pub fn product_count() -> String {
        "productCount".into()
    }

    pub fn products() -> String {
        "products".into()
    }

    pub fn create_product() -> String {
        "createProduct".into()
    }

    pub fn purchase_product() -> String {
        "purchaseProduct".into()
    }
}
