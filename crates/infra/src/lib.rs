//! Infrastructure layer: balance stores, the ledger engine, read queries, config.

pub mod balance_store;
pub mod config;
pub mod ledger_engine;
pub mod query;

pub use balance_store::{
    BalanceStore, BalanceTx, InMemoryBalanceStore, InMemoryTx, PostgresBalanceStore, PostgresTx,
    StoreError,
};
pub use config::LedgerConfig;
pub use ledger_engine::{LedgerEngine, LedgerError};
pub use query::{InventoryQuery, InventoryReader, MovementFilter, MovementPage, Pagination};
