//! Marketplace session: the connect → refresh ⇄ (create | purchase) flow.

use futures::stream::{self, StreamExt, TryStreamExt};
use marketplace_types::abi::to_hex;
use marketplace_types::{Account, Function, Product, Token, Wei};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::config::{Config, ContractMethods};
use crate::provider::{Confirmation, Provider, WriteOptions};
use crate::registry::{ContractHandle, DeploymentRegistry};

/// Unsold products in ascending id order. Replaced wholesale on every refresh.
pub type ProductListView = Arc<[Product]>;

/// A connected marketplace session.
///
/// Holds the account and contract resolved at connect time and the last
/// product view. At most one write is outstanding at a time; a second write
/// fails fast with [`crate::Error::OperationInProgress`].
pub struct Session<P> {
    provider: P,
    account: Account,
    contract: ContractHandle,
    methods: ContractMethods,
    read_concurrency: usize,
    /// Stored view and the refresh tag that produced it.
    view: RwLock<(u64, ProductListView)>,
    /// Tag handed to the next refresh. A refresh only replaces a view with a
    /// lower tag, so a slow refresh never overwrites a newer one.
    next_refresh: AtomicU64,
    /// Highest product count observed; the remote count never shrinks.
    last_count: AtomicU64,
    write_in_flight: AtomicBool,
}

impl<P: Provider> Session<P> {
    /// Authorize an account, detect the network, and resolve the contract.
    ///
    /// Fails with `ProviderUnavailable` when the provider cannot supply an
    /// account and `UnsupportedNetwork` when `registry` has no deployment for
    /// the provider's network. Neither is retried.
    pub async fn connect(
        provider: P,
        registry: &DeploymentRegistry,
        config: &Config,
    ) -> Result<Self, crate::Error> {
        let accounts = provider.request_accounts().await.map_err(|e| {
            warn!(error = %e, "Account authorization failed");
            crate::Error::ProviderUnavailable(e.to_string())
        })?;
        let account = accounts.into_iter().next().ok_or_else(|| {
            crate::Error::ProviderUnavailable("provider returned no accounts".into())
        })?;

        let network_id = provider
            .current_network_id()
            .await
            .map_err(|e| crate::Error::ProviderUnavailable(e.to_string()))?;

        let contract = registry.resolve(network_id).ok_or_else(|| {
            warn!(network = %network_id, "Contract not deployed to detected network");
            crate::Error::UnsupportedNetwork(network_id)
        })?;

        info!(
            account = %account,
            network = %network_id,
            contract = %contract.address,
            "Session connected"
        );

        Ok(Self {
            provider,
            account,
            contract,
            methods: config.methods.clone(),
            read_concurrency: config
                .read_concurrency
                .clamp(1, crate::config::MAX_READ_CONCURRENCY),
            view: RwLock::new((0, Arc::from(Vec::new()))),
            next_refresh: AtomicU64::new(1),
            last_count: AtomicU64::new(0),
            write_in_flight: AtomicBool::new(false),
        })
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn contract(&self) -> &ContractHandle {
        &self.contract
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The view stored by the last successful refresh (empty before the first).
    pub fn products(&self) -> ProductListView {
        Arc::clone(&self.view.read().unwrap_or_else(|e| e.into_inner()).1)
    }

    /// Look up a product in the stored view.
    pub fn find_product(&self, id: u64) -> Option<Product> {
        self.products().iter().find(|p| p.id == id).cloned()
    }

    // --- Refresh ---

    /// Re-read the whole catalog and store the unsold products.
    ///
    /// All-or-nothing: any failed read aborts with `SyncFailure` and leaves the
    /// stored view untouched. When a refresh started later has already stored
    /// its result, that newer view is kept and returned instead.
    pub async fn list_unsold_products(&self) -> Result<ProductListView, crate::Error> {
        let tag = self.next_refresh.fetch_add(1, Ordering::AcqRel);
        let count = self.read_product_count().await?;
        let previous = self.last_count.load(Ordering::Acquire);
        if count < previous {
            return Err(crate::Error::sync(format!(
                "product count went backwards: {previous} -> {count}"
            )));
        }

        let getter = self
            .contract
            .interface
            .function(&self.methods.products)
            .map_err(|e| crate::Error::sync(e.to_string()))?;

        // `buffered` yields in submission order, so ids stay ascending.
        let products: Vec<Product> = stream::iter(1..=count)
            .map(|id| self.read_product(getter, id))
            .buffered(self.read_concurrency)
            .try_collect()
            .await?;

        let view: ProductListView = products.into_iter().filter(|p| !p.sold).collect();
        self.last_count.fetch_max(count, Ordering::AcqRel);

        let mut stored = self.view.write().unwrap_or_else(|e| e.into_inner());
        if stored.0 > tag {
            debug!(tag, current = stored.0, "Discarding superseded refresh");
            return Ok(Arc::clone(&stored.1));
        }
        *stored = (tag, Arc::clone(&view));
        drop(stored);

        info!(count, unsold = view.len(), "Product list refreshed");
        Ok(view)
    }

    async fn read_product_count(&self) -> Result<u64, crate::Error> {
        let tokens = self
            .provider
            .call_read(&self.contract, &self.methods.product_count, &[])
            .await
            .map_err(|e| {
                warn!(error = %e, "productCount read failed");
                crate::Error::sync(format!("{}: {e}", self.methods.product_count))
            })?;
        let count = tokens
            .first()
            .and_then(Token::as_uint)
            .ok_or_else(|| crate::Error::sync("product count is not an unsigned integer"))?;
        u64::try_from(count).map_err(|_| crate::Error::sync(format!("product count {count} too large")))
    }

    async fn read_product(&self, getter: &Function, id: u64) -> Result<Product, crate::Error> {
        debug!(id, "Reading product");
        let tokens = self
            .provider
            .call_read(&self.contract, &getter.name, &[Token::Uint(u128::from(id))])
            .await
            .map_err(|e| {
                warn!(id, error = %e, "Product read failed");
                crate::Error::sync(format!("{}({id}): {e}", getter.name))
            })?;

        let product = decode_product(getter, &tokens)
            .map_err(|e| crate::Error::sync(format!("{}({id}): {e}", getter.name)))?;
        if product.id != id {
            return Err(crate::Error::sync(format!(
                "product ids are not contiguous: slot {id} holds id {}",
                product.id
            )));
        }
        Ok(product)
    }

    // --- Writes ---

    /// Create a product listing. `price` is in wei and must be non-negative.
    ///
    /// Input is validated before the provider is touched. On success the view
    /// is refreshed; a failed refresh is reported as `SyncFailure` carrying the
    /// committed transaction. The write slot stays taken until that refresh
    /// resolves.
    pub async fn create_product(&self, name: &str, price: i128) -> Result<Confirmation, crate::Error> {
        if name.trim().is_empty() {
            return Err(crate::Error::InvalidInput("product name must not be empty".into()));
        }
        let price = Wei::from_signed(price).ok_or_else(|| {
            crate::Error::InvalidInput(format!("price must be a non-negative integer, got {price}"))
        })?;

        // Held until the follow-up refresh has finished.
        let _slot = self.acquire_write_slot()?;
        info!(name, price = %price, from = %self.account, "Submitting createProduct");
        let confirmation = self
            .provider
            .submit_write(
                &self.contract,
                &self.methods.create_product,
                &[Token::String(name.to_string()), Token::Uint(price.as_u128())],
                &WriteOptions {
                    from: self.account.clone(),
                    value: None,
                },
            )
            .await
            .map_err(|e| {
                warn!(error = %e, "createProduct rejected");
                crate::Error::TransactionFailed(e)
            })?;

        info!(tx = %confirmation.tx_id, "Product created");
        self.refresh_after_write(confirmation).await
    }

    /// Buy a listed product, attaching `price` as the transferred value.
    ///
    /// `id` must be in the current view and `price` must equal the price last
    /// observed for it. The contract remains the judge of whether the product
    /// is still unsold; a rejection there is `TransactionFailed`.
    pub async fn buy_product(&self, id: u64, price: Wei) -> Result<Confirmation, crate::Error> {
        let listed = self
            .find_product(id)
            .ok_or_else(|| crate::Error::InvalidInput(format!("product {id} is not listed for sale")))?;
        if listed.price != price {
            return Err(crate::Error::InvalidInput(format!(
                "price {price} does not match listed price {} for product {id}",
                listed.price
            )));
        }

        // Held until the follow-up refresh has finished.
        let _slot = self.acquire_write_slot()?;
        info!(id, price = %price, from = %self.account, "Submitting purchaseProduct");
        let confirmation = self
            .provider
            .submit_write(
                &self.contract,
                &self.methods.purchase_product,
                &[Token::Uint(u128::from(id))],
                &WriteOptions {
                    from: self.account.clone(),
                    value: Some(price),
                },
            )
            .await
            .map_err(|e| {
                warn!(id, error = %e, "purchaseProduct rejected");
                crate::Error::TransactionFailed(e)
            })?;

        info!(id, tx = %confirmation.tx_id, "Product purchased");
        self.refresh_after_write(confirmation).await
    }

    async fn refresh_after_write(&self, confirmation: Confirmation) -> Result<Confirmation, crate::Error> {
        match self.list_unsold_products().await {
            Ok(_) => Ok(confirmation),
            Err(crate::Error::SyncFailure { reason, .. }) => Err(crate::Error::SyncFailure {
                reason,
                committed: Some(confirmation),
            }),
            Err(other) => Err(other),
        }
    }

    fn acquire_write_slot(&self) -> Result<WriteSlot<'_>, crate::Error> {
        self.write_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| crate::Error::OperationInProgress)?;
        Ok(WriteSlot {
            flag: &self.write_in_flight,
        })
    }
}

/// RAII guard for the session's single write slot. Releases on drop, so a
/// cancelled or failed write never leaves the slot held.
struct WriteSlot<'a> {
    flag: &'a AtomicBool,
}

impl Drop for WriteSlot<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Map getter outputs onto a [`Product`]. Outputs are matched by name
/// (`id`, `name`, `price`, `owner`, `sold`); unnamed outputs fall back to
/// positions `0, 1, 2` and the last slot for `sold`.
fn decode_product(getter: &Function, tokens: &[Token]) -> Result<Product, String> {
    if tokens.len() < 4 {
        return Err(format!("expected at least 4 outputs, got {}", tokens.len()));
    }
    let index = |name: &str, fallback: usize| getter.output_index(name).unwrap_or(fallback);
    let field = |name: &str, fallback: usize| {
        tokens
            .get(index(name, fallback))
            .ok_or_else(|| format!("missing `{name}` output"))
    };

    let id = field("id", 0)?
        .as_uint()
        .ok_or("`id` is not an unsigned integer")?;
    let id = u64::try_from(id).map_err(|_| format!("id {id} too large"))?;
    let name = field("name", 1)?.as_str().ok_or("`name` is not a string")?.to_string();
    let price = field("price", 2)?
        .as_uint()
        .ok_or("`price` is not an unsigned integer")?;
    let sold_index = getter
        .output_index("sold")
        .or_else(|| getter.output_index("purchased"))
        .unwrap_or(tokens.len() - 1);
    let sold = tokens
        .get(sold_index)
        .and_then(Token::as_bool)
        .ok_or("`sold` is not a bool")?;
    let owner = getter
        .output_index("owner")
        .and_then(|i| tokens.get(i))
        .and_then(Token::as_address)
        .map(|a| to_hex(&a));

    Ok(Product {
        id,
        name,
        price: Wei(price),
        owner,
        sold,
    })
}
