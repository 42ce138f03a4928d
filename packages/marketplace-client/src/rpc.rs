//! JSON-RPC provider for an Ethereum-compatible node with node-managed accounts.
//!
//! Accounts are whatever the node exposes; no key material is held here.

use async_trait::async_trait;
use marketplace_types::abi::{self, from_hex, parse_quantity, to_hex, to_quantity};
use marketplace_types::{Account, NetworkId, Token};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::provider::{Confirmation, Provider, ProviderError, WriteOptions};
use crate::registry::ContractHandle;

/// JSON-RPC "method not found".
const METHOD_NOT_FOUND: i64 = -32601;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct JsonRpcProvider {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    gas: u64,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl JsonRpcProvider {
    pub fn new(config: &Config) -> Result<Self, crate::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| crate::Error::Config(format!("HTTP client build failed: {e}")))?;

        info!(url = %config.rpc_url, "JSON-RPC provider initialized");
        Ok(Self {
            http,
            url: config.rpc_url.clone(),
            next_id: AtomicU64::new(1),
            gas: config.gas,
            receipt_poll: Duration::from_millis(config.receipt_poll_ms),
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One JSON-RPC round trip. Returns the `result` member.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        debug!(id, method, "JSON-RPC request");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{method}: {e}")))?;
        let status = response.status();
        let reply: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("{method}: HTTP {status}: {e}")))?;

        parse_reply(reply)
    }

    async fn wait_for_receipt(&self, tx_id: &str) -> Result<Confirmation, ProviderError> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            let receipt = self
                .request("eth_getTransactionReceipt", json!([tx_id]))
                .await?;
            if !receipt.is_null() {
                return confirmation_from_receipt(tx_id, &receipt);
            }
            if Instant::now() >= deadline {
                warn!(tx = tx_id, "Receipt wait timed out");
                return Err(ProviderError::Timeout(format!(
                    "no receipt for {tx_id} after {}s",
                    self.receipt_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }
}

#[async_trait]
impl Provider for JsonRpcProvider {
    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        let result = match self.request("eth_requestAccounts", json!([])).await {
            Err(ProviderError::Rpc { code, .. }) if code == METHOD_NOT_FOUND => {
                debug!("eth_requestAccounts not supported, falling back to eth_accounts");
                self.request("eth_accounts", json!([])).await
            }
            other => other,
        };
        let result = result.map_err(|e| match e {
            ProviderError::Transport(msg) => ProviderError::Unavailable(msg),
            other => other,
        })?;

        let accounts: Vec<Account> = result
            .as_array()
            .ok_or_else(|| ProviderError::Codec("account list is not an array".into()))?
            .iter()
            .filter_map(Value::as_str)
            .map(Account::from)
            .collect();
        if accounts.is_empty() {
            return Err(ProviderError::Unavailable("node exposes no accounts".into()));
        }
        Ok(accounts)
    }

    async fn current_network_id(&self) -> Result<NetworkId, ProviderError> {
        let result = self.request("net_version", json!([])).await?;
        parse_network_id(&result)
    }

    async fn call_read(
        &self,
        contract: &ContractHandle,
        method: &str,
        args: &[Token],
    ) -> Result<Vec<Token>, ProviderError> {
        let function = contract.interface.function(method)?;
        let data = encode_call(function, args)?;
        let result = self
            .request("eth_call", json!([{"to": contract.address, "data": data}, "latest"]))
            .await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ProviderError::Codec(format!("{method}: eth_call result is not a string")))?;
        let bytes = from_hex(raw)?;
        if bytes.is_empty() && !function.outputs.is_empty() {
            // Empty return data: no code at the address, or a revert without reason.
            return Err(ProviderError::Rpc {
                code: -32000,
                message: format!("{method} returned no data from {}", contract.address),
            });
        }
        Ok(abi::decode(&function.output_types(), &bytes)?)
    }

    async fn submit_write(
        &self,
        contract: &ContractHandle,
        method: &str,
        args: &[Token],
        options: &WriteOptions,
    ) -> Result<Confirmation, ProviderError> {
        let function = contract.interface.function(method)?;
        let data = encode_call(function, args)?;

        let mut tx = json!({
            "from": options.from.as_str(),
            "to": contract.address,
            "data": data,
            "gas": to_quantity(u128::from(self.gas)),
        });
        if let Some(value) = options.value.filter(|v| v.as_u128() > 0) {
            tx["value"] = Value::String(to_quantity(value.as_u128()));
        }

        let result = self
            .request("eth_sendTransaction", json!([tx]))
            .await
            .map_err(|e| match e {
                ProviderError::Rpc { message, .. } => ProviderError::Rejected(message),
                other => other,
            })?;
        let tx_id = result
            .as_str()
            .ok_or_else(|| ProviderError::Codec("transaction hash is not a string".into()))?
            .to_string();
        info!(tx = %tx_id, method, "Transaction submitted");

        self.wait_for_receipt(&tx_id).await
    }
}

fn encode_call(function: &marketplace_types::Function, args: &[Token]) -> Result<String, ProviderError> {
    let mut data = function.selector().to_vec();
    data.extend(abi::encode(&function.input_types(), args)?);
    Ok(to_hex(&data))
}

fn parse_reply(reply: Value) -> Result<Value, ProviderError> {
    if let Some(error) = reply.get("error").filter(|e| !e.is_null()) {
        return Err(ProviderError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    match reply {
        Value::Object(mut map) => Ok(map.remove("result").unwrap_or(Value::Null)),
        other => Err(ProviderError::Codec(format!("malformed JSON-RPC reply: {other}"))),
    }
}

/// `net_version` is a decimal string; some nodes answer with a number.
fn parse_network_id(value: &Value) -> Result<NetworkId, ProviderError> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|_| ProviderError::Codec(format!("invalid network id {s:?}"))),
        Value::Number(n) => n
            .as_u64()
            .map(NetworkId)
            .ok_or_else(|| ProviderError::Codec(format!("invalid network id {n}"))),
        other => Err(ProviderError::Codec(format!("invalid network id {other}"))),
    }
}

fn confirmation_from_receipt(tx_id: &str, receipt: &Value) -> Result<Confirmation, ProviderError> {
    if let Some(status) = receipt.get("status").and_then(Value::as_str) {
        if parse_quantity(status)? == 0 {
            return Err(ProviderError::Rejected(format!("transaction {tx_id} reverted")));
        }
    }
    let block_number = receipt
        .get("blockNumber")
        .and_then(Value::as_str)
        .map(parse_quantity)
        .transpose()?
        .and_then(|n| u64::try_from(n).ok());
    Ok(Confirmation {
        tx_id: tx_id.to_string(),
        block_number,
    })
}
