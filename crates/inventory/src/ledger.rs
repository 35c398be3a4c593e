//! Ledger decisions: turn a command plus the current row into a validated plan.
//!
//! Decision logic is pure. Adapters lock the product row, call
//! [`MovementPlan::decide`], then persist the plan's movement and apply its
//! balance within one transaction.

use serde::{Deserialize, Serialize};

use stockroom_core::MovementId;

use crate::error::MovementError;
use crate::movement::{RegisterMovement, StockMovement};
use crate::product::Product;

/// A validated movement together with the balance transition it causes.
///
/// Plans can only be built by [`MovementPlan::decide`], which makes them the
/// single way to change a product's `stock_quantity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPlan {
    movement: StockMovement,
    previous_balance: i64,
    new_balance: i64,
}

impl MovementPlan {
    /// Decide a movement against the current product row.
    pub fn decide(product: &Product, command: &RegisterMovement) -> Result<Self, MovementError> {
        Self::decide_with_id(product, command, MovementId::new())
    }

    /// Same as [`MovementPlan::decide`] with an explicit movement id (deterministic).
    pub fn decide_with_id(
        product: &Product,
        command: &RegisterMovement,
        movement_id: MovementId,
    ) -> Result<Self, MovementError> {
        if command.product_id != product.id_typed() {
            return Err(MovementError::ProductMismatch {
                expected: product.id_typed(),
                actual: command.product_id,
            });
        }
        command.validate()?;

        let current = product.stock_quantity();
        let new_balance = command
            .movement_type
            .signed_effect(command.quantity)
            .and_then(|effect| current.checked_add(effect))
            .ok_or(MovementError::BalanceOverflow {
                current,
                requested: command.quantity,
            })?;

        if new_balance < 0 {
            return Err(MovementError::InsufficientStock {
                product_name: product.name().to_string(),
                current,
                requested: command.quantity,
            });
        }

        Ok(Self {
            movement: StockMovement {
                id: movement_id,
                product_id: command.product_id,
                movement_type: command.movement_type,
                quantity: command.quantity,
                reason: command.reason.clone(),
                user_id: command.user_id,
                created_at: command.occurred_at,
            },
            previous_balance: current,
            new_balance,
        })
    }

    pub fn movement(&self) -> &StockMovement {
        &self.movement
    }

    pub fn into_movement(self) -> StockMovement {
        self.movement
    }

    pub fn previous_balance(&self) -> i64 {
        self.previous_balance
    }

    pub fn new_balance(&self) -> i64 {
        self.new_balance
    }

    /// Write the new balance into a product row.
    ///
    /// The row must be the one the plan was decided against and must still hold
    /// the balance the plan started from.
    pub fn apply_to(&self, product: &mut Product) -> Result<(), MovementError> {
        if product.id_typed() != self.movement.product_id {
            return Err(MovementError::ProductMismatch {
                expected: self.movement.product_id,
                actual: product.id_typed(),
            });
        }
        if product.stock_quantity() != self.previous_balance {
            return Err(MovementError::StaleBalance {
                expected: self.previous_balance,
                actual: product.stock_quantity(),
            });
        }
        product.set_stock_quantity(self.new_balance);
        Ok(())
    }
}

/// Result of a registered movement, enriched with alert metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementOutcome {
    pub movement: StockMovement,
    pub new_balance: i64,
    pub is_low_stock_after: bool,
    pub product_name: String,
    pub min_stock: i64,
}

impl MovementOutcome {
    /// Build the outcome from the movement and the product row as committed.
    pub fn new(movement: StockMovement, committed: &Product) -> Self {
        Self {
            movement,
            new_balance: committed.stock_quantity(),
            is_low_stock_after: committed.is_low_stock(),
            product_name: committed.name().to_string(),
            min_stock: committed.min_stock(),
        }
    }

    /// Warning text for callers that surface low stock next to the success notice.
    pub fn low_stock_warning(&self) -> Option<String> {
        self.is_low_stock_after.then(|| {
            format!(
                "Low stock alert: product \"{}\" has {} units left (minimum: {}).",
                self.product_name, self.new_balance, self.min_stock
            )
        })
    }
}

/// Replay a movement history on top of an opening balance.
///
/// `None` when the sum overflows.
pub fn replay_balance<'a>(
    opening: i64,
    movements: impl IntoIterator<Item = &'a StockMovement>,
) -> Option<i64> {
    movements
        .into_iter()
        .try_fold(opening, |balance, m| {
            m.movement_type
                .signed_effect(m.quantity)
                .and_then(|effect| balance.checked_add(effect))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use stockroom_core::{ProductId, UserId};

    use crate::movement::MovementType;
    use crate::product::NewProduct;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn product(stock: i64, min_stock: i64) -> Product {
        Product::new(NewProduct {
            stock_quantity: stock,
            min_stock,
            ..NewProduct::new(ProductId::new(), "SKU-100", "Steel bolt")
        })
        .unwrap()
    }

    fn command(product: &Product, ty: MovementType, quantity: i64) -> RegisterMovement {
        RegisterMovement {
            product_id: product.id_typed(),
            movement_type: ty,
            quantity,
            reason: None,
            user_id: UserId::new(),
            occurred_at: test_time(),
        }
    }

    fn register(product: &mut Product, ty: MovementType, quantity: i64) -> Result<MovementOutcome, MovementError> {
        let plan = MovementPlan::decide(product, &command(product, ty, quantity))?;
        plan.apply_to(product)?;
        Ok(MovementOutcome::new(plan.into_movement(), product))
    }

    #[test]
    fn entry_raises_balance_and_keeps_quantity_as_entered() {
        let mut p = product(10, 5);
        let outcome = register(&mut p, MovementType::Entry, 20).unwrap();
        assert_eq!(outcome.new_balance, 30);
        assert!(!outcome.is_low_stock_after);
        assert_eq!(outcome.movement.quantity, 20);
        assert_eq!(outcome.movement.movement_type, MovementType::Entry);
        assert_eq!(outcome.product_name, "Steel bolt");
        assert_eq!(outcome.min_stock, 5);
        assert_eq!(outcome.low_stock_warning(), None);
    }

    #[test]
    fn exit_to_exactly_threshold_is_not_low() {
        let mut p = product(30, 5);
        let outcome = register(&mut p, MovementType::Exit, 25).unwrap();
        assert_eq!(outcome.new_balance, 5);
        assert!(!outcome.is_low_stock_after);
    }

    #[test]
    fn exit_below_threshold_is_low() {
        let mut p = product(30, 5);
        let outcome = register(&mut p, MovementType::Exit, 26).unwrap();
        assert_eq!(outcome.new_balance, 4);
        assert!(outcome.is_low_stock_after);
        assert_eq!(
            outcome.low_stock_warning().unwrap(),
            "Low stock alert: product \"Steel bolt\" has 4 units left (minimum: 5)."
        );
    }

    #[test]
    fn exit_beyond_balance_is_rejected_without_change() {
        let mut p = product(4, 5);
        let err = register(&mut p, MovementType::Exit, 10).unwrap_err();
        assert_eq!(
            err,
            MovementError::InsufficientStock {
                product_name: "Steel bolt".to_string(),
                current: 4,
                requested: 10,
            }
        );
        assert_eq!(p.stock_quantity(), 4);
    }

    #[test]
    fn negative_adjustment_respects_floor() {
        let mut p = product(4, 5);
        let err = register(&mut p, MovementType::Adjustment, -5).unwrap_err();
        assert!(matches!(err, MovementError::InsufficientStock { current: 4, requested: -5, .. }));
        assert_eq!(p.stock_quantity(), 4);

        let outcome = register(&mut p, MovementType::Adjustment, -3).unwrap();
        assert_eq!(outcome.new_balance, 1);
        assert_eq!(outcome.movement.quantity, -3);
    }

    #[test]
    fn zero_adjustment_is_invalid() {
        let p = product(4, 5);
        let err = MovementPlan::decide(&p, &command(&p, MovementType::Adjustment, 0)).unwrap_err();
        assert!(matches!(err, MovementError::InvalidQuantity { quantity: 0, .. }));
    }

    #[test]
    fn decide_rejects_foreign_product() {
        let p = product(4, 5);
        let other = product(4, 5);
        let err = MovementPlan::decide(&p, &command(&other, MovementType::Entry, 1)).unwrap_err();
        assert!(matches!(err, MovementError::ProductMismatch { .. }));
    }

    #[test]
    fn entry_overflow_is_reported() {
        let p = product(i64::MAX - 1, 0);
        let err = MovementPlan::decide(&p, &command(&p, MovementType::Entry, 2)).unwrap_err();
        assert_eq!(err, MovementError::BalanceOverflow { current: i64::MAX - 1, requested: 2 });
    }

    #[test]
    fn apply_to_detects_stale_row() {
        let mut p = product(10, 0);
        let first = MovementPlan::decide(&p, &command(&p, MovementType::Exit, 3)).unwrap();
        let second = MovementPlan::decide(&p, &command(&p, MovementType::Exit, 3)).unwrap();
        first.apply_to(&mut p).unwrap();
        let err = second.apply_to(&mut p).unwrap_err();
        assert_eq!(err, MovementError::StaleBalance { expected: 10, actual: 7 });
        assert_eq!(p.stock_quantity(), 7);
    }

    #[test]
    fn decide_does_not_mutate_and_is_deterministic() {
        let p = product(10, 5);
        let before = p.clone();
        let cmd = command(&p, MovementType::Exit, 3);
        let id = MovementId::new();
        let a = MovementPlan::decide_with_id(&p, &cmd, id).unwrap();
        let b = MovementPlan::decide_with_id(&p, &cmd, id).unwrap();
        assert_eq!(a, b);
        assert_eq!(p, before);
    }

    #[test]
    fn replay_matches_effects() {
        let p = product(100, 0);
        let movements: Vec<_> = [
            (MovementType::Entry, 10),
            (MovementType::Exit, 4),
            (MovementType::Adjustment, -1),
            (MovementType::Adjustment, 2),
        ]
        .into_iter()
        .map(|(ty, q)| MovementPlan::decide(&p, &command(&p, ty, q)).unwrap().into_movement())
        .collect();
        assert_eq!(replay_balance(3, &movements), Some(10));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: after any sequence of attempted movements, the balance is
        /// never negative and equals the opening balance plus the effects of
        /// the accepted movements.
        #[test]
        fn balance_equals_opening_plus_accepted_effects(
            opening in 0i64..1_000,
            ops in prop::collection::vec((0usize..3, -200i64..200), 0..40)
        ) {
            let mut p = product(opening, 10);
            let mut accepted = Vec::new();

            for (ty_idx, quantity) in ops {
                let ty = MovementType::ALL[ty_idx];
                let before = p.stock_quantity();
                match register(&mut p, ty, quantity) {
                    Ok(outcome) => {
                        prop_assert_eq!(outcome.new_balance, p.stock_quantity());
                        prop_assert_eq!(outcome.is_low_stock_after, p.stock_quantity() < 10);
                        accepted.push(outcome.movement);
                    }
                    Err(_) => prop_assert_eq!(p.stock_quantity(), before),
                }
                prop_assert!(p.stock_quantity() >= 0);
            }

            prop_assert_eq!(replay_balance(opening, &accepted), Some(p.stock_quantity()));
        }

        /// Property: invalid input fails the same way every time.
        #[test]
        fn rejection_is_idempotent(opening in 0i64..50, quantity in -100i64..=0) {
            let p = product(opening, 0);
            let cmd = command(&p, MovementType::Exit, quantity);
            let first = MovementPlan::decide(&p, &cmd).unwrap_err();
            let second = MovementPlan::decide(&p, &cmd).unwrap_err();
            prop_assert_eq!(first, second);
            prop_assert_eq!(p.stock_quantity(), opening);
        }
    }
}
