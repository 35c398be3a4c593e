//! Postgres-backed balance store.
//!
//! A [`PostgresTx`] is one database transaction that holds the product row lock
//! (`SELECT … FOR UPDATE`) from `begin` until it is committed or dropped.
//!
//! The async methods are the native API. The [`BalanceStore`] and
//! [`InventoryQuery`] impls block on the current tokio runtime, so the
//! [`LedgerEngine`](crate::LedgerEngine) must run on a blocking thread
//! (`tokio::task::spawn_blocking`), never directly inside an async task.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE products (
//!     id               UUID PRIMARY KEY,
//!     sku              TEXT NOT NULL UNIQUE,
//!     name             TEXT NOT NULL,
//!     description      TEXT,
//!     category_id      UUID,
//!     supplier_id      UUID,
//!     cost_price_cents BIGINT NOT NULL DEFAULT 0 CHECK (cost_price_cents >= 0),
//!     unit_price_cents BIGINT NOT NULL DEFAULT 0 CHECK (unit_price_cents >= 0),
//!     stock_quantity   BIGINT NOT NULL DEFAULT 0 CHECK (stock_quantity >= 0),
//!     min_stock        BIGINT NOT NULL DEFAULT 0 CHECK (min_stock >= 0),
//!     is_active        BOOLEAN NOT NULL DEFAULT TRUE,
//!     updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE stock_movements (
//!     id            UUID PRIMARY KEY,
//!     product_id    UUID NOT NULL REFERENCES products (id),
//!     movement_type TEXT NOT NULL CHECK (movement_type IN ('entry', 'exit', 'adjustment')),
//!     quantity      BIGINT NOT NULL CHECK (quantity <> 0),
//!     reason        TEXT,
//!     user_id       UUID NOT NULL,
//!     created_at    TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX stock_movements_product_created ON stock_movements (product_id, created_at);
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (check violation) | `23514` | `Backend` |
//! | Database (serialization / deadlock) | `40001`, `40P01` | `Interrupted` |
//! | PoolClosed, PoolTimedOut, Io | N/A | `Unavailable` |
//! | Other | N/A | `Backend` |

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::{instrument, Span};

use stockroom_core::{CategoryId, Money, MovementId, ProductId, SupplierId, UserId};
use stockroom_inventory::{
    MovementError, MovementPlan, MovementType, NewProduct, Product, StockMovement,
};

use super::r#trait::{BalanceStore, BalanceTx, StoreError};
use crate::config::LedgerConfig;
use crate::query::{InventoryQuery, MovementFilter, MovementPage, Pagination};

const PRODUCT_COLUMNS: &str = "id, sku, name, description, category_id, supplier_id, \
     cost_price_cents, unit_price_cents, stock_quantity, min_stock, is_active";

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, reason, user_id, created_at";

/// Postgres-backed product balances and movement log.
///
/// `Send + Sync`; clones share the same pool.
#[derive(Debug, Clone)]
pub struct PostgresBalanceStore {
    pool: Arc<PgPool>,
}

impl PostgresBalanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool from configuration.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, StoreError> {
        let url = config
            .require_database_url()
            .map_err(|e| StoreError::Unavailable(format!("{e:#}")))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Ok(Self::new(pool))
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(product_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    /// Add a product as created by product management.
    #[instrument(skip(self, product), fields(product_id = %product.id_typed(), sku = product.sku()), err)]
    pub async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(product.id_typed().as_uuid())
        .bind(product.sku())
        .bind(product.name())
        .bind(product.description())
        .bind(product.category_id().map(|id| *id.as_uuid()))
        .bind(product.supplier_id().map(|id| *id.as_uuid()))
        .bind(cents_to_db(product.cost_price())?)
        .bind(cents_to_db(product.unit_price())?)
        .bind(product.stock_quantity())
        .bind(product.min_stock())
        .bind(product.is_active())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        Ok(())
    }

    /// Every product, ordered by name then SKU.
    #[instrument(skip(self), err)]
    pub async fn fetch_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC, sku ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    /// Movements matching `filter`, newest first. Dates compare on the UTC day.
    #[instrument(skip(self), fields(movement_count = tracing::field::Empty), err)]
    pub async fn fetch_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StoreError> {
        let span = Span::current();

        const WHERE: &str = "($1::uuid IS NULL OR product_id = $1) \
             AND ($2::text IS NULL OR movement_type = $2) \
             AND ($3::date IS NULL OR (created_at AT TIME ZONE 'UTC')::date >= $3) \
             AND ($4::date IS NULL OR (created_at AT TIME ZONE 'UTC')::date <= $4)";

        let product_id = filter.product_id.map(|id| *id.as_uuid());
        let movement_type = filter.movement_type.map(|ty| ty.as_str());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM stock_movements WHERE {WHERE}"))
            .bind(product_id)
            .bind(movement_type)
            .bind(filter.date_from)
            .bind(filter.date_to)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_movements", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE {WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
        ))
        .bind(product_id)
        .bind(movement_type)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        let items = rows
            .iter()
            .map(movement_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let total = u64::try_from(total).unwrap_or(0);
        let has_more = u64::from(pagination.offset) + (items.len() as u64) < total;
        span.record("movement_count", items.len());

        Ok(MovementPage {
            items,
            total,
            pagination,
            has_more,
        })
    }

    /// Full history of one product, oldest `created_at` first, ties by id.
    ///
    /// `created_at` is when the movement occurred as reported by the caller,
    /// so a backdated movement sorts before rows committed earlier.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn fetch_history(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE product_id = $1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("history", e))?;

        rows.iter().map(movement_from_row).collect()
    }
}

fn runtime_handle() -> Result<Handle, StoreError> {
    Handle::try_current().map_err(|_| {
        StoreError::Unavailable("PostgresBalanceStore requires a tokio runtime".to_string())
    })
}

impl BalanceStore for PostgresBalanceStore {
    type Tx<'a>
        = PostgresTx
    where
        Self: 'a;

    fn begin(&self, product_id: ProductId) -> Result<Self::Tx<'_>, StoreError> {
        let runtime = runtime_handle()?;

        let (tx, product) = runtime.block_on(async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin_transaction", e))?;
            let product = lock_product(&mut tx, product_id)
                .await?
                .ok_or(StoreError::ProductNotFound(product_id))?;
            Ok::<_, StoreError>((tx, product))
        })?;

        Ok(PostgresTx {
            runtime,
            tx: Some(tx),
            product,
            staged: None,
        })
    }

    fn find(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        runtime_handle()?.block_on(self.find_product(product_id))
    }
}

/// Open database transaction holding the `FOR UPDATE` lock of one product.
///
/// Dropping it without [`BalanceTx::commit`] rolls the transaction back.
pub struct PostgresTx {
    runtime: Handle,
    tx: Option<Transaction<'static, Postgres>>,
    product: Product,
    staged: Option<MovementPlan>,
}

impl BalanceTx for PostgresTx {
    fn product(&self) -> &Product {
        &self.product
    }

    fn stage(&mut self, plan: &MovementPlan) -> Result<(), StoreError> {
        let planned_for = plan.movement().product_id;
        if planned_for != self.product.id_typed() {
            return Err(StoreError::Plan(MovementError::ProductMismatch {
                expected: self.product.id_typed(),
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
        let plan = self.staged.take();
        if let Some(plan) = &plan {
            // Same check the UPDATE repeats in SQL; fails before any write.
            plan.apply_to(&mut self.product.clone())?;
        }

        let mut tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Interrupted("transaction already closed".to_string()))?;
        let locked = self.product.clone();

        self.runtime.block_on(async move {
            let committed = match &plan {
                Some(plan) => {
                    insert_movement(&mut tx, plan.movement()).await?;
                    update_balance(&mut tx, plan).await?
                }
                None => locked,
            };
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", e))?;
            Ok::<_, StoreError>(committed)
        })
    }
}

impl Drop for PostgresTx {
    fn drop(&mut self) {
        // Releasing the connection spawns onto the runtime.
        let _guard = self.runtime.enter();
        self.tx.take();
    }
}

impl InventoryQuery for PostgresBalanceStore {
    fn product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        runtime_handle()?.block_on(self.find_product(product_id))
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        runtime_handle()?.block_on(self.fetch_products())
    }

    fn movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StoreError> {
        runtime_handle()?.block_on(self.fetch_movements(filter, pagination))
    }

    fn history(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        runtime_handle()?.block_on(self.fetch_history(product_id))
    }
}

async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<Option<Product>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
    ))
    .bind(product_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_product", e))?;

    row.as_ref().map(product_from_row).transpose()
}

async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    movement: &StockMovement,
) -> Result<(), StoreError> {
    sqlx::query(&format!(
        "INSERT INTO stock_movements ({MOVEMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
    ))
    .bind(movement.id.as_uuid())
    .bind(movement.product_id.as_uuid())
    .bind(movement.movement_type.as_str())
    .bind(movement.quantity)
    .bind(movement.reason.as_deref())
    .bind(movement.user_id.as_uuid())
    .bind(movement.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_movement", e))?;

    Ok(())
}

/// Write the plan's balance and read the row back under the same lock.
async fn update_balance(
    tx: &mut Transaction<'_, Postgres>,
    plan: &MovementPlan,
) -> Result<Product, StoreError> {
    let product_id = plan.movement().product_id;
    let row = sqlx::query(&format!(
        "UPDATE products SET stock_quantity = $2, updated_at = NOW() \
         WHERE id = $1 AND stock_quantity = $3 \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product_id.as_uuid())
    .bind(plan.new_balance())
    .bind(plan.previous_balance())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_balance", e))?;

    match row {
        Some(row) => product_from_row(&row),
        // The row lock makes this unreachable unless the row was deleted.
        None => Err(StoreError::Interrupted(format!(
            "product {product_id} no longer holds balance {}",
            plan.previous_balance()
        ))),
    }
}

fn cents_to_db(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Backend(format!("amount {money} does not fit BIGINT")))
}

fn cents_from_db(column: &str, cents: i64) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Backend(format!("negative amount in {column}: {cents}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let read = |e: sqlx::Error| StoreError::Backend(format!("failed to read product row: {e}"));

    let draft = NewProduct {
        id: ProductId::from_uuid(row.try_get("id").map_err(read)?),
        sku: row.try_get("sku").map_err(read)?,
        name: row.try_get("name").map_err(read)?,
        description: row.try_get("description").map_err(read)?,
        category_id: row
            .try_get::<Option<uuid::Uuid>, _>("category_id")
            .map_err(read)?
            .map(CategoryId::from_uuid),
        supplier_id: row
            .try_get::<Option<uuid::Uuid>, _>("supplier_id")
            .map_err(read)?
            .map(SupplierId::from_uuid),
        cost_price: cents_from_db("cost_price_cents", row.try_get("cost_price_cents").map_err(read)?)?,
        unit_price: cents_from_db("unit_price_cents", row.try_get("unit_price_cents").map_err(read)?)?,
        stock_quantity: row.try_get("stock_quantity").map_err(read)?,
        min_stock: row.try_get("min_stock").map_err(read)?,
        is_active: row.try_get("is_active").map_err(read)?,
    };

    Product::new(draft).map_err(|e| StoreError::Backend(format!("invalid product row: {e}")))
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, StoreError> {
    let read = |e: sqlx::Error| StoreError::Backend(format!("failed to read movement row: {e}"));

    let movement_type: String = row.try_get("movement_type").map_err(read)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(read)?;

    Ok(StockMovement {
        id: MovementId::from_uuid(row.try_get("id").map_err(read)?),
        product_id: ProductId::from_uuid(row.try_get("product_id").map_err(read)?),
        movement_type: MovementType::from_str(&movement_type)
            .map_err(|e| StoreError::Backend(format!("invalid movement row: {e}")))?,
        quantity: row.try_get("quantity").map_err(read)?,
        reason: row.try_get("reason").map_err(read)?,
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(read)?),
        created_at,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(msg),
                Some("40001") | Some("40P01") => StoreError::Interrupted(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        sqlx::Error::RowNotFound => {
            StoreError::Backend(format!("unexpected row not found in {}", operation))
        }
        other => StoreError::Backend(format!("sqlx error in {}: {}", operation, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_are_unavailable() {
        assert!(matches!(
            map_sqlx_error("find_product", sqlx::Error::PoolClosed),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("find_product", sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error("find_product", sqlx::Error::RowNotFound),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn money_columns_round_trip_through_cents() {
        assert_eq!(cents_to_db(Money::from_cents(1250)).unwrap(), 1250);
        assert!(cents_to_db(Money::from_cents(u64::MAX)).is_err());
        assert_eq!(cents_from_db("unit_price_cents", 99).unwrap(), Money::from_cents(99));
        assert!(cents_from_db("unit_price_cents", -1).is_err());
    }

    #[tokio::test]
    async fn connect_requires_a_database_url() {
        let err = PostgresBalanceStore::connect(&LedgerConfig::default())
            .await
            .unwrap_err();
        match err {
            StoreError::Unavailable(msg) => assert!(msg.contains(crate::config::ENV_DATABASE_URL)),
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    /// Pool that never connects until first use.
    fn lazy_store(url: &str) -> PostgresBalanceStore {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(500))
            .connect_lazy(url)
            .unwrap();
        PostgresBalanceStore::new(pool)
    }

    #[test]
    fn sync_calls_outside_a_runtime_are_unavailable() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = {
            let _guard = runtime.enter();
            lazy_store("postgres://stockroom@127.0.0.1:1/stockroom")
        };

        let id = ProductId::new();
        assert!(matches!(store.find(id), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.begin(id).map(|_| ()), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.products(), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.history(id), Err(StoreError::Unavailable(_))));

        let _guard = runtime.enter();
        drop(store);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_database_is_unavailable_through_the_sync_api() {
        let store = lazy_store("postgres://stockroom@127.0.0.1:1/stockroom");

        let err = tokio::task::spawn_blocking(move || match store.begin(ProductId::new()) {
            Ok(_) => None,
            Err(err) => Some(err),
        })
        .await
        .unwrap();

        assert!(matches!(err, Some(StoreError::Unavailable(_))));
    }
}
