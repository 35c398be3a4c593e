//! Movement registration pipeline.
//!
//! ```text
//! RegisterMovement
//!   ↓
//! 1. Input checks (type/quantity rules; no lock taken)
//!   ↓
//! 2. Lock the product row (BalanceStore::begin)
//!   ↓
//! 3. Decide against the locked row (MovementPlan::decide, pure)
//!   ↓
//! 4. Stage the plan (movement + balance), commit as one unit
//!   ↓
//! 5. Build the outcome from the row as committed
//! ```
//!
//! Any failure before commit drops the unit of work, which discards what was
//! staged. The engine never retries on its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use stockroom_core::{ProductId, UserId};
use stockroom_inventory::{
    MovementError, MovementOutcome, MovementPlan, MovementRequest, MovementType, Product,
    RegisterMovement,
};

use crate::balance_store::{BalanceStore, BalanceTx, StoreError};
use crate::config::LedgerConfig;

/// Error returned to callers of the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("product not found: {0}")]
    NotFound(ProductId),

    /// The movement broke a business rule; nothing was written.
    #[error(transparent)]
    Rejected(#[from] MovementError),

    #[error("store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ProductNotFound(id) => LedgerError::NotFound(id),
            StoreError::Plan(err) => LedgerError::Rejected(err),
            other => LedgerError::Store(other),
        }
    }
}

impl LedgerError {
    /// Whether repeating the same call may succeed. Rejections never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::NotFound(_) | LedgerError::Rejected(_) => false,
            LedgerError::Store(err) => matches!(
                err,
                StoreError::Unavailable(_) | StoreError::Interrupted(_) | StoreError::Backend(_)
            ),
        }
    }
}

/// Validates and records stock movements against a [`BalanceStore`].
#[derive(Debug)]
pub struct LedgerEngine<S> {
    store: Arc<S>,
    max_reason_len: usize,
}

impl<S> Clone for LedgerEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_reason_len: self.max_reason_len,
        }
    }
}

impl<S> LedgerEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, &LedgerConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: &LedgerConfig) -> Self {
        Self {
            store,
            max_reason_len: config.max_reason_len,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S: BalanceStore> LedgerEngine<S> {
    /// Record one movement and update the product balance atomically.
    #[instrument(
        skip(self, command),
        fields(
            product_id = %command.product_id,
            movement_type = %command.movement_type,
            quantity = command.quantity,
            user_id = %command.user_id
        ),
        err(level = "debug")
    )]
    pub fn register_movement(&self, command: RegisterMovement) -> Result<MovementOutcome, LedgerError> {
        // 1) Input checks
        command.validate()?;

        // 2) Lock
        let mut tx = self.store.begin(command.product_id)?;

        // 3) Decide (no mutation)
        // Rejections surface through the span's `err` event.
        let plan = MovementPlan::decide(tx.product(), &command)?;

        // 4) Stage + commit
        tx.stage(&plan)?;
        let committed = tx.commit()?;

        // 5) Outcome from the committed row
        let previous_balance = plan.previous_balance();
        let outcome = MovementOutcome::new(plan.into_movement(), &committed);

        info!(
            movement_id = %outcome.movement.id,
            previous_balance,
            new_balance = outcome.new_balance,
            "movement registered"
        );
        if outcome.is_low_stock_after {
            warn!(
                product = %outcome.product_name,
                new_balance = outcome.new_balance,
                min_stock = outcome.min_stock,
                "stock below minimum"
            );
        }

        Ok(outcome)
    }

    pub fn register_entry(
        &self,
        product_id: ProductId,
        quantity: i64,
        reason: Option<String>,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<MovementOutcome, LedgerError> {
        self.register_typed(MovementType::Entry, product_id, quantity, reason, user_id, occurred_at)
    }

    pub fn register_exit(
        &self,
        product_id: ProductId,
        quantity: i64,
        reason: Option<String>,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<MovementOutcome, LedgerError> {
        self.register_typed(MovementType::Exit, product_id, quantity, reason, user_id, occurred_at)
    }

    /// `quantity` is signed: negative to remove stock, positive to add.
    pub fn register_adjustment(
        &self,
        product_id: ProductId,
        quantity: i64,
        reason: Option<String>,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<MovementOutcome, LedgerError> {
        self.register_typed(
            MovementType::Adjustment,
            product_id,
            quantity,
            reason,
            user_id,
            occurred_at,
        )
    }

    /// Parse primitive request input, then register it.
    pub fn register_request(
        &self,
        request: MovementRequest,
        occurred_at: DateTime<Utc>,
    ) -> Result<MovementOutcome, LedgerError> {
        let command = request
            .into_command_with_limit(self.max_reason_len, occurred_at)
            .inspect_err(|err| debug!(error = %err, "movement request rejected"))?;
        self.register_movement(command)
    }

    /// Committed snapshot of a product.
    pub fn product(&self, product_id: ProductId) -> Result<Product, LedgerError> {
        self.store
            .find(product_id)?
            .ok_or(LedgerError::NotFound(product_id))
    }

    pub fn current_balance(&self, product_id: ProductId) -> Result<i64, LedgerError> {
        Ok(self.product(product_id)?.stock_quantity())
    }

    fn register_typed(
        &self,
        movement_type: MovementType,
        product_id: ProductId,
        quantity: i64,
        reason: Option<String>,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<MovementOutcome, LedgerError> {
        self.register_movement(RegisterMovement {
            product_id,
            movement_type,
            quantity,
            reason,
            user_id,
            occurred_at,
        })
    }
}
