use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use stockroom_core::{Entity, ProductId};
use stockroom_inventory::{MovementError, MovementPlan, Product, StockMovement};

use super::r#trait::{BalanceStore, BalanceTx, StoreError};
use crate::query::{InventoryQuery, MovementFilter, MovementPage, Pagination};

type Row = Arc<Mutex<Product>>;

#[derive(Debug, Default)]
struct Catalog {
    by_id: HashMap<ProductId, Row>,
    by_sku: HashMap<String, ProductId>,
}

/// In-memory balance store.
///
/// Intended for tests/dev. Each product row sits behind its own mutex, which a
/// [`InMemoryTx`] holds for its whole lifetime (row-level exclusive lock).
/// The movement log is append-only.
#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    catalog: RwLock<Catalog>,
    movements: RwLock<Vec<StockMovement>>,
}

impl InMemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product as created by product management.
    ///
    /// Its `stock_quantity` is the opening balance; ids and SKUs must be unique.
    pub fn insert_product(&self, product: Product) -> Result<(), StoreError> {
        let mut catalog = self
            .catalog
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let id = *product.id();
        if catalog.by_id.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("product id {id} already exists")));
        }
        if catalog.by_sku.contains_key(product.sku()) {
            return Err(StoreError::Duplicate(format!(
                "sku '{}' already exists",
                product.sku()
            )));
        }

        catalog.by_sku.insert(product.sku().to_string(), id);
        catalog.by_id.insert(id, Arc::new(Mutex::new(product)));
        Ok(())
    }

    fn row(&self, product_id: ProductId) -> Result<Option<Row>, StoreError> {
        let catalog = self
            .catalog
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(catalog.by_id.get(&product_id).cloned())
    }

    fn rows(&self) -> Result<Vec<Row>, StoreError> {
        let catalog = self
            .catalog
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(catalog.by_id.values().cloned().collect())
    }
}

impl BalanceStore for InMemoryBalanceStore {
    type Tx<'a>
        = InMemoryTx<'a>
    where
        Self: 'a;

    fn begin(&self, product_id: ProductId) -> Result<Self::Tx<'_>, StoreError> {
        let row = self
            .row(product_id)?
            .ok_or(StoreError::ProductNotFound(product_id))?;

        Ok(InMemoryTx {
            movements: &self.movements,
            row: row.lock_arc(),
            staged: None,
        })
    }

    fn find(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        // Waits for an open unit of work on the row, so only committed state is seen.
        Ok(self.row(product_id)?.map(|row| row.lock().clone()))
    }
}

/// Unit of work holding the row lock of one product.
///
/// Dropping it without [`BalanceTx::commit`] discards everything staged.
pub struct InMemoryTx<'a> {
    movements: &'a RwLock<Vec<StockMovement>>,
    row: ArcMutexGuard<RawMutex, Product>,
    staged: Option<MovementPlan>,
}

impl BalanceTx for InMemoryTx<'_> {
    fn product(&self) -> &Product {
        &self.row
    }

    fn stage(&mut self, plan: &MovementPlan) -> Result<(), StoreError> {
        let planned_for = plan.movement().product_id;
        if planned_for != self.row.id_typed() {
            return Err(StoreError::Plan(MovementError::ProductMismatch {
                expected: self.row.id_typed(),
                actual: planned_for,
            }));
        }
        if self.staged.is_some() {
            return Err(StoreError::Backend(
                "a unit of work appends exactly one movement".to_string(),
            ));
        }
        self.staged = Some(plan.clone());
        Ok(())
    }

    fn commit(mut self) -> Result<Product, StoreError> {
        let Some(plan) = self.staged.take() else {
            return Ok((*self.row).clone());
        };

        // Validate against the locked row before touching anything.
        let mut next = (*self.row).clone();
        plan.apply_to(&mut next)?;

        let mut log = self
            .movements
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        log.push(plan.into_movement());
        *self.row = next.clone();

        Ok(next)
    }
}

impl InventoryQuery for InMemoryBalanceStore {
    fn product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        self.find(product_id)
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = self
            .rows()?
            .into_iter()
            .map(|row| row.lock().clone())
            .collect();
        products.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.sku().cmp(b.sku())));
        Ok(products)
    }

    fn movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StoreError> {
        let log = self
            .movements
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        let mut matching: Vec<StockMovement> =
            log.iter().filter(|m| filter.matches(m)).cloned().collect();
        drop(log);

        // Newest first; v7 ids break ties in insertion order.
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id().cmp(a.id())));

        Ok(MovementPage::slice(matching, pagination))
    }

    fn history(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        let log = self
            .movements
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        let mut history: Vec<StockMovement> = log
            .iter()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect();
        drop(log);

        history.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id().cmp(b.id())));
        Ok(history)
    }
}
