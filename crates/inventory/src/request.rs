//! Primitive movement input as handed over by a request layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{ProductId, UserId};

use crate::error::MovementError;
use crate::movement::{MovementType, RegisterMovement};

/// Default upper bound for the free-text reason, in characters.
pub const MAX_REASON_LEN: usize = 1000;

/// Movement input before parsing: the type is still a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub product_id: ProductId,
    #[serde(rename = "type")]
    pub movement_type: String,
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    pub user_id: UserId,
}

impl MovementRequest {
    pub fn into_command(self, occurred_at: DateTime<Utc>) -> Result<RegisterMovement, MovementError> {
        self.into_command_with_limit(MAX_REASON_LEN, occurred_at)
    }

    /// Parse the type and bound the reason. Blank reasons become `None`.
    ///
    /// Quantity rules are left to the ledger so that every entry point shares them.
    pub fn into_command_with_limit(
        self,
        max_reason_len: usize,
        occurred_at: DateTime<Utc>,
    ) -> Result<RegisterMovement, MovementError> {
        let movement_type: MovementType = self.movement_type.trim().parse()?;

        let reason = self
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        if let Some(reason) = &reason {
            let len = reason.chars().count();
            if len > max_reason_len {
                return Err(MovementError::ReasonTooLong {
                    len,
                    max: max_reason_len,
                });
            }
        }

        Ok(RegisterMovement {
            product_id: self.product_id,
            movement_type,
            quantity: self.quantity,
            reason,
            user_id: self.user_id,
            occurred_at,
        })
    }
}
