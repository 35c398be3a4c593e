//! Movement rejection reasons.

use thiserror::Error;

use stockroom_core::ProductId;

/// Why a stock movement was rejected.
///
/// Every variant is deterministic and caller-correctable: retrying the same
/// input yields the same error and leaves balances untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MovementError {
    /// The movement type is not one of `entry`, `exit`, `adjustment`.
    #[error("invalid movement type: {0}")]
    InvalidMovementType(String),

    /// Zero or non-positive quantity where the movement type disallows it.
    #[error("{message}")]
    InvalidQuantity { message: &'static str, quantity: i64 },

    /// The resulting balance would be negative.
    #[error(
        "insufficient stock for \"{product_name}\": current stock {current}, requested quantity {requested}; stock cannot go negative"
    )]
    InsufficientStock {
        product_name: String,
        current: i64,
        requested: i64,
    },

    /// The free-text reason exceeds the accepted length.
    #[error("reason cannot exceed {max} characters (got {len})")]
    ReasonTooLong { len: usize, max: usize },

    /// The resulting balance does not fit the balance type.
    #[error("balance overflow: current stock {current}, requested quantity {requested}")]
    BalanceOverflow { current: i64, requested: i64 },

    /// The row no longer holds the balance the plan was computed from.
    #[error("stale balance: planned from {expected}, row holds {actual}")]
    StaleBalance { expected: i64, actual: i64 },

    /// A plan or command was applied to a different product.
    #[error("movement targets product {expected}, got {actual}")]
    ProductMismatch { expected: ProductId, actual: ProductId },
}

impl MovementError {
    pub(crate) const NON_POSITIVE: &'static str =
        "quantity must be greater than 0 for entries and exits";
    pub(crate) const ZERO_ADJUSTMENT: &'static str = "adjustment quantity cannot be zero";
}
