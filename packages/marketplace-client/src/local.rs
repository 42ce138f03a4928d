//! In-process marketplace ledger.
//!
//! Holds the product table in memory and enforces the same rules as the
//! deployed contract, so the whole client flow runs without a node:
//! non-empty names, ids in `1..=productCount`, one purchase per product,
//! attached value equal to the price, and no value on non-payable calls.

use async_trait::async_trait;
use marketplace_types::abi::{parse_address, to_hex};
use marketplace_types::{Account, InterfaceDescriptor, NetworkId, Token, Wei};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::provider::{Confirmation, Provider, ProviderError, WriteOptions};
use crate::registry::{ContractHandle, DeploymentRegistry};

/// Address the ledger answers on.
pub const LOCAL_CONTRACT_ADDRESS: &str = "0x00000000000000000000000000000000000c0de1";

const MARKETPLACE_ABI: &str = r#"[
    {"type": "function", "name": "productCount", "stateMutability": "view",
     "inputs": [], "outputs": [{"name": "", "type": "uint256"}]},
    {"type": "function", "name": "products", "stateMutability": "view",
     "inputs": [{"name": "", "type": "uint256"}],
     "outputs": [
        {"name": "id", "type": "uint256"},
        {"name": "name", "type": "string"},
        {"name": "price", "type": "uint256"},
        {"name": "owner", "type": "address"},
        {"name": "sold", "type": "bool"}
     ]},
    {"type": "function", "name": "createProduct", "stateMutability": "nonpayable",
     "inputs": [{"name": "_name", "type": "string"}, {"name": "_price", "type": "uint256"}],
     "outputs": []},
    {"type": "function", "name": "purchaseProduct", "stateMutability": "payable",
     "inputs": [{"name": "_id", "type": "uint256"}], "outputs": []}
]"#;

struct StoredProduct {
    name: String,
    price: u128,
    owner: [u8; 20],
    sold: bool,
}

#[derive(Default)]
struct LedgerState {
    products: Vec<StoredProduct>,
    block: u64,
}

pub struct LocalLedger {
    network_id: NetworkId,
    accounts: Vec<Account>,
    interface: InterfaceDescriptor,
    state: Mutex<LedgerState>,
}

impl LocalLedger {
    pub fn new(network_id: NetworkId, accounts: Vec<Account>) -> Self {
        info!(network = %network_id, accounts = accounts.len(), "Local ledger initialized");
        Self {
            network_id,
            accounts,
            interface: Self::interface(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Ledger with three deterministic development accounts.
    pub fn with_dev_accounts(network_id: NetworkId) -> Self {
        Self::new(network_id, (1..=3).map(dev_account).collect())
    }

    /// Interface of the marketplace contract the ledger emulates.
    ///
    /// The ABI is a compile-time constant covered by the module tests, so the
    /// empty-descriptor fallbacks below are unreachable.
    pub fn interface() -> InterfaceDescriptor {
        let abi: serde_json::Value =
            serde_json::from_str(MARKETPLACE_ABI).unwrap_or(serde_json::Value::Null);
        InterfaceDescriptor::from_json(&abi).unwrap_or_default()
    }

    /// Registry document pointing the ledger's network at its address.
    pub fn registry(&self) -> DeploymentRegistry {
        DeploymentRegistry::new(self.interface.clone())
            .with_deployment(self.network_id, LOCAL_CONTRACT_ADDRESS)
    }

    pub fn network_id(&self) -> NetworkId {
        self.network_id
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn product_count(&self) -> u64 {
        self.lock().products.len() as u64
    }

    /// Add a product directly, bypassing transaction rules. Returns its id.
    ///
    /// `seller` becomes the recorded owner and must be a `0x` address.
    pub fn seed(&self, name: &str, price: Wei, seller: &Account) -> Result<u64, ProviderError> {
        let owner = parse_address(seller.as_str())
            .map_err(|_| ProviderError::Rejected(format!("seller {seller} is not an address")))?;
        let mut state = self.lock();
        state.products.push(StoredProduct {
            name: name.to_string(),
            price: price.as_u128(),
            owner,
            sold: false,
        });
        Ok(state.products.len() as u64)
    }

    /// Execute a view function.
    pub fn read(&self, method: &str, args: &[Token]) -> Result<Vec<Token>, ProviderError> {
        let function = self.interface.function(method)?;
        check_args(method, &function.input_types(), args)?;
        let state = self.lock();
        match method {
            "productCount" => Ok(vec![Token::Uint(state.products.len() as u128)]),
            "products" => {
                let id = uint_arg(args, 0)?;
                // Out-of-range ids read as the zero record, like an unset mapping slot.
                let record = usize::try_from(id)
                    .ok()
                    .and_then(|i| i.checked_sub(1))
                    .and_then(|i| state.products.get(i));
                Ok(match record {
                    Some(p) => vec![
                        Token::Uint(id),
                        Token::String(p.name.clone()),
                        Token::Uint(p.price),
                        Token::Address(p.owner),
                        Token::Bool(p.sold),
                    ],
                    None => vec![
                        Token::Uint(0),
                        Token::String(String::new()),
                        Token::Uint(0),
                        Token::Address([0u8; 20]),
                        Token::Bool(false),
                    ],
                })
            }
            other => Err(ProviderError::Rejected(format!("{other} is not a view function"))),
        }
    }

    /// Execute a state-changing function on behalf of `from`.
    pub fn write(
        &self,
        method: &str,
        args: &[Token],
        from: &Account,
        value: Wei,
    ) -> Result<Confirmation, ProviderError> {
        let function = self.interface.function(method)?;
        check_args(method, &function.input_types(), args)?;
        if !function.payable && value != Wei::ZERO {
            return Err(ProviderError::Rejected(format!("{method} is not payable")));
        }
        let sender = parse_address(from.as_str())
            .map_err(|_| ProviderError::Rejected(format!("sender {from} is not an address")))?;

        let mut state = self.lock();
        match method {
            "createProduct" => {
                let name = args
                    .first()
                    .and_then(Token::as_str)
                    .ok_or_else(|| ProviderError::Codec("missing name".into()))?;
                if name.is_empty() {
                    return Err(ProviderError::Rejected("product name is required".into()));
                }
                let price = uint_arg(args, 1)?;
                state.products.push(StoredProduct {
                    name: name.to_string(),
                    price,
                    owner: sender,
                    sold: false,
                });
                debug!(id = state.products.len(), name, price = %price, "Product created");
            }
            "purchaseProduct" => {
                let id = uint_arg(args, 0)?;
                let product = usize::try_from(id)
                    .ok()
                    .and_then(|i| i.checked_sub(1))
                    .and_then(|i| state.products.get_mut(i))
                    .ok_or_else(|| ProviderError::Rejected(format!("invalid product id {id}")))?;
                if product.sold {
                    return Err(ProviderError::Rejected(format!("product {id} already sold")));
                }
                if value.as_u128() != product.price {
                    return Err(ProviderError::Rejected(format!(
                        "incorrect payment: sent {value}, price is {}",
                        product.price
                    )));
                }
                product.sold = true;
                product.owner = sender;
                debug!(id = %id, buyer = %from, "Product purchased");
            }
            other => {
                return Err(ProviderError::Rejected(format!(
                    "{other} is not a state-changing function"
                )))
            }
        }

        state.block += 1;
        Ok(Confirmation {
            tx_id: format!("0x{:064x}", state.block),
            block_number: Some(state.block),
        })
    }

    fn check_contract(&self, contract: &ContractHandle) -> Result<(), ProviderError> {
        if !contract.address.eq_ignore_ascii_case(LOCAL_CONTRACT_ADDRESS) {
            return Err(ProviderError::Rpc {
                code: -32000,
                message: format!("no contract at {}", contract.address),
            });
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Provider for LocalLedger {
    async fn request_accounts(&self) -> Result<Vec<Account>, ProviderError> {
        if self.accounts.is_empty() {
            return Err(ProviderError::Unavailable("local ledger has no accounts".into()));
        }
        Ok(self.accounts.clone())
    }

    async fn current_network_id(&self) -> Result<NetworkId, ProviderError> {
        Ok(self.network_id)
    }

    async fn call_read(
        &self,
        contract: &ContractHandle,
        method: &str,
        args: &[Token],
    ) -> Result<Vec<Token>, ProviderError> {
        self.check_contract(contract)?;
        self.read(method, args)
    }

    async fn submit_write(
        &self,
        contract: &ContractHandle,
        method: &str,
        args: &[Token],
        options: &WriteOptions,
    ) -> Result<Confirmation, ProviderError> {
        self.check_contract(contract)?;
        self.write(method, args, &options.from, options.value.unwrap_or_default())
    }
}

/// Deterministic development account `n`, as a `0x` address.
pub fn dev_account(n: u64) -> Account {
    Account::new(to_hex(&{
        let mut addr = [0u8; 20];
        addr[12..].copy_from_slice(&(0xa11ce000 + n).to_be_bytes());
        addr
    }))
}

fn check_args(
    method: &str,
    types: &[marketplace_types::ParamType],
    args: &[Token],
) -> Result<(), ProviderError> {
    if types.len() != args.len() || !args.iter().zip(types).all(|(a, t)| a.matches(*t)) {
        return Err(ProviderError::Codec(format!(
            "bad arguments for {method}: {}",
            args.iter().map(Token::to_string).collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(())
}

fn uint_arg(args: &[Token], index: usize) -> Result<u128, ProviderError> {
    args.get(index)
        .and_then(Token::as_uint)
        .ok_or_else(|| ProviderError::Codec(format!("argument {index} must be a uint")))
}
