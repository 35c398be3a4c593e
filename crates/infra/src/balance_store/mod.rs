//! Balance store boundary.
//!
//! The store owns `stock_quantity`. It hands out row-locked units of work to the
//! ledger engine and committed snapshots to everyone else.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryBalanceStore, InMemoryTx};
pub use postgres::{PostgresBalanceStore, PostgresTx};
pub use r#trait::{BalanceStore, BalanceTx, StoreError};
