use thiserror::Error;

use stockroom_core::ProductId;
use stockroom_inventory::{MovementError, MovementPlan, Product};

/// Balance store operation error.
///
/// These are **infrastructure errors** (storage, locking, uniqueness) as opposed
/// to movement rejections, which come from the domain.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The unit of work stopped before commit; nothing was written.
    #[error("unit of work interrupted: {0}")]
    Interrupted(String),

    /// A staged plan no longer matches the locked row.
    #[error("rejected at commit: {0}")]
    Plan(#[from] MovementError),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Authoritative holder of product balances.
///
/// Reads go through [`BalanceStore::find`]. The only write path is a
/// [`BalanceTx`] obtained from [`BalanceStore::begin`], which holds an exclusive
/// lock on the product row until it is committed or dropped.
///
/// ## Implementation Requirements
///
/// - `begin` must block other `begin` calls for the same product until the
///   returned handle is committed or dropped
/// - staged writes must stay invisible until `commit`
/// - `commit` must publish the movement and the balance together, or neither
/// - `commit` must re-check the staged plan against the locked row
/// - dropping a handle without `commit` must discard staged writes
pub trait BalanceStore: Send + Sync {
    type Tx<'a>: BalanceTx
    where
        Self: 'a;

    /// Lock the product row and open a unit of work on it.
    fn begin(&self, product_id: ProductId) -> Result<Self::Tx<'_>, StoreError>;

    /// Committed snapshot of a product, without locking.
    fn find(&self, product_id: ProductId) -> Result<Option<Product>, StoreError>;
}

/// Unit of work scoped to one locked product row.
pub trait BalanceTx {
    /// The row as read under the lock.
    fn product(&self) -> &Product;

    /// Stage a decided plan: its ledger row and the balance write it implies.
    ///
    /// The movement is always taken from the plan, so a ledger row cannot be
    /// staged without the balance change that goes with it. A plan decided for
    /// another product is refused, and so is a second plan.
    fn stage(&mut self, plan: &MovementPlan) -> Result<(), StoreError>;

    /// Publish staged writes atomically and return the row as persisted.
    ///
    /// With nothing staged this writes nothing and returns the locked row.
    fn commit(self) -> Result<Product, StoreError>;
}
