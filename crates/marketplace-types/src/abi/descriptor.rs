//! Interface descriptors: the `abi` array of a compiled contract artifact.

use serde::Deserialize;
use serde_json::Value;
use sha3::{Digest, Keccak256};

use super::ParamType;
use crate::AbiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// May be empty for unnamed outputs.
    pub name: String,
    pub kind: ParamType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
    pub payable: bool,
}

impl Function {
    /// Canonical signature, e.g. `createProduct(string,uint256)`.
    pub fn signature(&self) -> String {
        let args: Vec<String> = self.inputs.iter().map(|p| p.kind.canonical()).collect();
        format!("{}({})", self.name, args.join(","))
    }

    /// First 4 bytes of Keccak-256 over the signature.
    pub fn selector(&self) -> [u8; 4] {
        let hash = Keccak256::digest(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    pub fn input_types(&self) -> Vec<ParamType> {
        self.inputs.iter().map(|p| p.kind).collect()
    }

    pub fn output_types(&self) -> Vec<ParamType> {
        self.outputs.iter().map(|p| p.kind).collect()
    }

    /// Position of the output called `name`, if the descriptor names its outputs.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }
}

/// Functions exposed by a deployed contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    functions: Vec<Function>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    entry_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<RawParam>,
    #[serde(default)]
    outputs: Vec<RawParam>,
    #[serde(default, rename = "stateMutability")]
    state_mutability: Option<String>,
    #[serde(default)]
    payable: Option<bool>,
}

#[derive(Deserialize)]
struct RawParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

fn default_entry_type() -> String {
    "function".into()
}

impl InterfaceDescriptor {
    pub fn new(functions: Vec<Function>) -> Self {
        Self { functions }
    }

    /// Build from a JSON `abi` array. Events, constructors and fallbacks are
    /// skipped; functions with unsupported parameter types are skipped too,
    /// so lookups for them fail with `UnknownFunction`.
    pub fn from_json(abi: &Value) -> Result<Self, AbiError> {
        let entries: Vec<RawEntry> = serde_json::from_value(abi.clone())
            .map_err(|e| AbiError::InvalidDescriptor(e.to_string()))?;

        let functions = entries
            .into_iter()
            .filter(|e| e.entry_type == "function")
            .filter_map(|e| {
                let payable = e.payable.unwrap_or(false)
                    || e.state_mutability.as_deref() == Some("payable");
                let inputs = convert_params(&e.inputs).ok()?;
                let outputs = convert_params(&e.outputs).ok()?;
                Some(Function {
                    name: e.name,
                    inputs,
                    outputs,
                    payable,
                })
            })
            .collect();

        Ok(Self { functions })
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// First function named `name`. Overloads are not distinguished.
    pub fn function(&self, name: &str) -> Result<&Function, AbiError> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))
    }

    /// Lookup by 4-byte selector (used when serving calldata).
    pub fn function_by_selector(&self, selector: [u8; 4]) -> Option<&Function> {
        self.functions.iter().find(|f| f.selector() == selector)
    }
}

fn convert_params(raw: &[RawParam]) -> Result<Vec<Param>, AbiError> {
    raw.iter()
        .map(|p| {
            Ok(Param {
                name: p.name.clone(),
                kind: p.kind.parse()?,
            })
        })
        .collect()
}
