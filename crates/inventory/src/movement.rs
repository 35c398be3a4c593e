use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Entity, MovementId, ProductId, UserId};

use crate::error::MovementError;

/// Kind of balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Inbound stock; quantity must be positive.
    Entry,
    /// Outbound stock; quantity must be positive and is subtracted.
    Exit,
    /// Signed reconciliation correction; quantity must be non-zero.
    Adjustment,
}

impl MovementType {
    pub const ALL: [MovementType; 3] = [
        MovementType::Entry,
        MovementType::Exit,
        MovementType::Adjustment,
    ];

    /// Stable wire name (`entry`, `exit`, `adjustment`).
    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::Entry => "entry",
            MovementType::Exit => "exit",
            MovementType::Adjustment => "adjustment",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            MovementType::Entry => "Entry",
            MovementType::Exit => "Exit",
            MovementType::Adjustment => "Adjustment",
        }
    }

    /// Check the quantity rule for this type.
    pub fn validate_quantity(self, quantity: i64) -> Result<(), MovementError> {
        match self {
            MovementType::Entry | MovementType::Exit if quantity <= 0 => {
                Err(MovementError::InvalidQuantity {
                    message: MovementError::NON_POSITIVE,
                    quantity,
                })
            }
            MovementType::Adjustment if quantity == 0 => Err(MovementError::InvalidQuantity {
                message: MovementError::ZERO_ADJUSTMENT,
                quantity,
            }),
            _ => Ok(()),
        }
    }

    /// Effect on the balance of a movement of this type with `quantity` as entered.
    ///
    /// `None` when negating the quantity overflows.
    pub fn signed_effect(self, quantity: i64) -> Option<i64> {
        match self {
            MovementType::Entry | MovementType::Adjustment => Some(quantity),
            MovementType::Exit => quantity.checked_neg(),
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = MovementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(MovementType::Entry),
            "exit" => Ok(MovementType::Exit),
            "adjustment" => Ok(MovementType::Adjustment),
            other => Err(MovementError::InvalidMovementType(other.to_string())),
        }
    }
}

/// Immutable ledger row: one balance change.
///
/// `quantity` is stored exactly as entered (positive for entries and exits,
/// signed for adjustments).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: Option<String>,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command: RegisterMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMovement {
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub reason: Option<String>,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl RegisterMovement {
    pub fn entry(product_id: ProductId, quantity: i64, user_id: UserId, occurred_at: DateTime<Utc>) -> Self {
        Self::of_type(MovementType::Entry, product_id, quantity, user_id, occurred_at)
    }

    pub fn exit(product_id: ProductId, quantity: i64, user_id: UserId, occurred_at: DateTime<Utc>) -> Self {
        Self::of_type(MovementType::Exit, product_id, quantity, user_id, occurred_at)
    }

    pub fn adjustment(
        product_id: ProductId,
        quantity: i64,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::of_type(MovementType::Adjustment, product_id, quantity, user_id, occurred_at)
    }

    fn of_type(
        movement_type: MovementType,
        product_id: ProductId,
        quantity: i64,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            movement_type,
            quantity,
            reason: None,
            user_id,
            occurred_at,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Input checks that do not need the product row.
    pub fn validate(&self) -> Result<(), MovementError> {
        self.movement_type.validate_quantity(self.quantity)
    }
}
