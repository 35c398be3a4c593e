//! Inventory ledger domain module.
//!
//! This crate contains the business rules for stock movements and product
//! balances, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage). Adapters in `stockroom-infra` supply locking and persistence.

pub mod error;
pub mod ledger;
pub mod movement;
pub mod product;
pub mod report;
pub mod request;

pub use error::MovementError;
pub use ledger::{replay_balance, MovementOutcome, MovementPlan};
pub use movement::{MovementType, RegisterMovement, StockMovement};
pub use product::{NewProduct, Product};
pub use report::{
    DailyMovements, InventoryTotals, Reconciliation, StockSummary, inventory_totals,
    low_stock, movements_by_day, reconcile, stock_summary, top_by_value,
};
pub use request::{MAX_REASON_LEN, MovementRequest};
