//! Deployment registry: maps network ids to deployed contract addresses.
//!
//! Reads the compiled contract artifact written by the deployment tooling:
//! `{"contractName": "...", "abi": [...], "networks": {"5777": {"address": "0x..."}}}`.

use marketplace_types::{InterfaceDescriptor, NetworkId};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// A resolved contract deployment on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractHandle {
    pub address: String,
    pub interface: InterfaceDescriptor,
    pub network_id: NetworkId,
}

#[derive(Debug, Clone)]
pub struct DeploymentRegistry {
    contract_name: Option<String>,
    interface: InterfaceDescriptor,
    networks: BTreeMap<NetworkId, String>,
}

impl DeploymentRegistry {
    pub fn new(interface: InterfaceDescriptor) -> Self {
        Self {
            contract_name: None,
            interface,
            networks: BTreeMap::new(),
        }
    }

    /// Add or replace the deployment for `network_id`.
    pub fn with_deployment(mut self, network_id: NetworkId, address: impl Into<String>) -> Self {
        self.networks.insert(network_id, address.into());
        self
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!(
                "failed to read deployment registry {}: {e}",
                path.display()
            ))
        })?;
        let registry = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            contract = registry.contract_name.as_deref().unwrap_or("?"),
            networks = registry.networks.len(),
            "Deployment registry loaded"
        );
        Ok(registry)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, crate::Error> {
        let doc: Value = serde_json::from_str(raw)
            .map_err(|e| crate::Error::Config(format!("invalid registry JSON: {e}")))?;
        Self::from_json(&doc)
    }

    pub fn from_json(doc: &Value) -> Result<Self, crate::Error> {
        let abi = doc
            .get("abi")
            .ok_or_else(|| crate::Error::Config("registry has no `abi` field".into()))?;
        let interface = InterfaceDescriptor::from_json(abi)
            .map_err(|e| crate::Error::Config(format!("registry abi: {e}")))?;

        let mut networks = BTreeMap::new();
        if let Some(entries) = doc.get("networks").and_then(Value::as_object) {
            for (key, entry) in entries {
                let Ok(network_id) = key.parse::<NetworkId>() else {
                    warn!(network = %key, "Skipping registry entry with non-numeric network id");
                    continue;
                };
                match entry.get("address").and_then(Value::as_str) {
                    Some(address) => {
                        networks.insert(network_id, address.to_string());
                    }
                    None => warn!(network = %key, "Skipping registry entry without address"),
                }
            }
        }

        Ok(Self {
            contract_name: doc
                .get("contractName")
                .and_then(Value::as_str)
                .map(str::to_string),
            interface,
            networks,
        })
    }

    pub fn contract_name(&self) -> Option<&str> {
        self.contract_name.as_deref()
    }

    pub fn networks(&self) -> impl Iterator<Item = NetworkId> + '_ {
        self.networks.keys().copied()
    }

    pub fn resolve(&self, network_id: NetworkId) -> Option<ContractHandle> {
        self.networks.get(&network_id).map(|address| ContractHandle {
            address: address.clone(),
            interface: self.interface.clone(),
            network_id,
        })
    }
}
