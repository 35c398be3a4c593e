//! Read-side computations over products and movement history.
//!
//! Everything here is derived data; nothing writes balances.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use stockroom_core::{Money, ProductId};

use crate::ledger::replay_balance;
use crate::movement::{MovementType, StockMovement};
use crate::product::Product;

/// Per-product movement totals and valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub product_id: ProductId,
    pub stock_quantity: i64,
    /// Sum of entry quantities.
    pub total_entries: i64,
    /// Sum of exit quantities (positive).
    pub total_exits: i64,
    /// Number of adjustment rows (their signs differ, so a sum says little).
    pub adjustment_count: usize,
    pub inventory_value: Option<Money>,
    pub inventory_cost: Option<Money>,
    /// `inventory_value - inventory_cost` in cents; may be negative.
    pub potential_profit_cents: Option<i64>,
}

/// Movement counts for one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMovements {
    pub date: NaiveDate,
    pub entries: usize,
    pub exits: usize,
    pub adjustments: usize,
    pub total: usize,
}

/// Catalogue-wide stock figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTotals {
    pub product_count: usize,
    pub active_count: usize,
    /// Active stock valued at sale price.
    pub total_value: Money,
    /// Active stock valued at cost price.
    pub total_cost: Money,
    /// Active products strictly below their threshold.
    pub low_stock_count: usize,
}

/// Stored balance versus the balance replayed from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub product_id: ProductId,
    pub opening_balance: i64,
    pub movement_count: usize,
    pub replayed_balance: Option<i64>,
    pub stored_balance: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.replayed_balance == Some(self.stored_balance)
    }
}

/// Active products below threshold, lowest stock first.
pub fn low_stock<'a>(products: impl IntoIterator<Item = &'a Product>, limit: usize) -> Vec<Product> {
    let mut low: Vec<Product> = products
        .into_iter()
        .filter(|p| p.is_active() && p.is_low_stock())
        .cloned()
        .collect();
    low.sort_by(|a, b| {
        a.stock_quantity()
            .cmp(&b.stock_quantity())
            .then_with(|| a.name().cmp(b.name()))
    });
    low.truncate(limit);
    low
}

/// Active products with stock, most valuable stock (at sale price) first.
///
/// A value too large for [`Money`] ranks above every other.
pub fn top_by_value<'a>(products: impl IntoIterator<Item = &'a Product>, limit: usize) -> Vec<Product> {
    let value = |p: &Product| p.inventory_value().unwrap_or(Money::from_cents(u64::MAX));

    let mut stocked: Vec<Product> = products
        .into_iter()
        .filter(|p| p.is_active() && p.stock_quantity() > 0)
        .cloned()
        .collect();
    stocked.sort_by(|a, b| value(b).cmp(&value(a)).then_with(|| a.name().cmp(b.name())));
    stocked.truncate(limit);
    stocked
}

/// Summarize one product's history. Movements for other products are ignored.
pub fn stock_summary<'a>(
    product: &Product,
    movements: impl IntoIterator<Item = &'a StockMovement>,
) -> StockSummary {
    let mut total_entries = 0i64;
    let mut total_exits = 0i64;
    let mut adjustment_count = 0usize;

    for m in movements
        .into_iter()
        .filter(|m| m.product_id == product.id_typed())
    {
        match m.movement_type {
            MovementType::Entry => total_entries = total_entries.saturating_add(m.quantity),
            MovementType::Exit => total_exits = total_exits.saturating_add(m.quantity),
            MovementType::Adjustment => adjustment_count += 1,
        }
    }

    let inventory_value = product.inventory_value();
    let inventory_cost = product.inventory_cost();
    let potential_profit_cents = match (inventory_value, inventory_cost) {
        (Some(value), Some(cost)) => i64::try_from(value.diff_cents(cost)).ok(),
        _ => None,
    };

    StockSummary {
        product_id: product.id_typed(),
        stock_quantity: product.stock_quantity(),
        total_entries,
        total_exits,
        adjustment_count,
        inventory_value,
        inventory_cost,
        potential_profit_cents,
    }
}

/// Daily counts for the `days` days ending at `today`, oldest first.
///
/// Days without movements are included with zero counts.
pub fn movements_by_day<'a>(
    movements: impl IntoIterator<Item = &'a StockMovement>,
    today: NaiveDate,
    days: u32,
) -> Vec<DailyMovements> {
    if days == 0 {
        return vec![];
    }
    let Some(start) = today.checked_sub_days(Days::new(u64::from(days - 1))) else {
        return vec![];
    };

    let mut buckets: Vec<DailyMovements> = start
        .iter_days()
        .take(days as usize)
        .map(|date| DailyMovements {
            date,
            entries: 0,
            exits: 0,
            adjustments: 0,
            total: 0,
        })
        .collect();

    for m in movements {
        let date = m.created_at.date_naive();
        if date < start || date > today {
            continue;
        }
        let Ok(idx) = usize::try_from((date - start).num_days()) else {
            continue;
        };
        let Some(bucket) = buckets.get_mut(idx) else {
            continue;
        };
        match m.movement_type {
            MovementType::Entry => bucket.entries += 1,
            MovementType::Exit => bucket.exits += 1,
            MovementType::Adjustment => bucket.adjustments += 1,
        }
        bucket.total += 1;
    }

    buckets
}

/// Counts and valuation across the catalogue. Inactive products are counted
/// but not valued.
pub fn inventory_totals<'a>(products: impl IntoIterator<Item = &'a Product>) -> InventoryTotals {
    let mut totals = InventoryTotals {
        product_count: 0,
        active_count: 0,
        total_value: Money::ZERO,
        total_cost: Money::ZERO,
        low_stock_count: 0,
    };

    for p in products {
        totals.product_count += 1;
        if !p.is_active() {
            continue;
        }
        totals.active_count += 1;
        totals.total_value = totals
            .total_value
            .saturating_add(p.inventory_value().unwrap_or(Money::from_cents(u64::MAX)));
        totals.total_cost = totals
            .total_cost
            .saturating_add(p.inventory_cost().unwrap_or(Money::from_cents(u64::MAX)));
        if p.is_low_stock() {
            totals.low_stock_count += 1;
        }
    }

    totals
}

/// Compare a product's stored balance with its replayed history.
pub fn reconcile<'a>(
    product: &Product,
    opening_balance: i64,
    movements: impl IntoIterator<Item = &'a StockMovement>,
) -> Reconciliation {
    let own: Vec<&StockMovement> = movements
        .into_iter()
        .filter(|m| m.product_id == product.id_typed())
        .collect();

    Reconciliation {
        product_id: product.id_typed(),
        opening_balance,
        movement_count: own.len(),
        replayed_balance: replay_balance(opening_balance, own.iter().copied()),
        stored_balance: product.stock_quantity(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use stockroom_core::{MovementId, UserId};

    use crate::product::NewProduct;

    fn product(name: &str, stock: i64, min_stock: i64, active: bool) -> Product {
        Product::new(NewProduct {
            cost_price: Money::from_cents(150),
            unit_price: Money::from_cents(200),
            stock_quantity: stock,
            min_stock,
            is_active: active,
            ..NewProduct::new(ProductId::new(), format!("SKU-{name}"), name)
        })
        .unwrap()
    }

    fn movement(
        product_id: ProductId,
        ty: MovementType,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> StockMovement {
        StockMovement {
            id: MovementId::new(),
            product_id,
            movement_type: ty,
            quantity,
            reason: None,
            user_id: UserId::new(),
            created_at: at,
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, 10, 0, 0).unwrap()
    }

    #[test]
    fn low_stock_filters_inactive_and_orders_by_stock() {
        let products = vec![
            product("a", 3, 5, true),
            product("b", 1, 5, true),
            product("c", 0, 5, false),
            product("d", 5, 5, true),
            product("e", 2, 5, true),
        ];
        let low = low_stock(&products, 2);
        let names: Vec<_> = low.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["b", "e"]);
    }

    #[test]
    fn top_by_value_skips_empty_and_inactive_stock() {
        let products = vec![
            product("a", 3, 0, true),
            product("b", 9, 0, false),
            product("c", 0, 0, true),
            product("d", 7, 0, true),
            product("e", 3, 0, true),
        ];
        let top = top_by_value(&products, 5);
        let names: Vec<_> = top.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["d", "a", "e"]);
        assert_eq!(top[0].inventory_value(), Some(Money::from_cents(1400)));

        assert_eq!(top_by_value(&products, 1).len(), 1);
    }

    #[test]
    fn summary_totals_by_type() {
        let p = product("bolt", 12, 0, true);
        let other = ProductId::new();
        let history = vec![
            movement(p.id_typed(), MovementType::Entry, 10, day(1)),
            movement(p.id_typed(), MovementType::Entry, 5, day(2)),
            movement(p.id_typed(), MovementType::Exit, 4, day(2)),
            movement(p.id_typed(), MovementType::Adjustment, 1, day(3)),
            movement(p.id_typed(), MovementType::Adjustment, -2, day(3)),
            movement(other, MovementType::Entry, 99, day(3)),
        ];

        let summary = stock_summary(&p, &history);
        assert_eq!(summary.total_entries, 15);
        assert_eq!(summary.total_exits, 4);
        assert_eq!(summary.adjustment_count, 2);
        assert_eq!(summary.inventory_value, Some(Money::from_cents(2400)));
        assert_eq!(summary.inventory_cost, Some(Money::from_cents(1800)));
        assert_eq!(summary.potential_profit_cents, Some(600));
    }

    #[test]
    fn by_day_includes_empty_days_and_skips_out_of_window() {
        let p = ProductId::new();
        let history = vec![
            movement(p, MovementType::Entry, 1, day(1)),
            movement(p, MovementType::Entry, 1, day(5)),
            movement(p, MovementType::Exit, 1, day(5)),
            movement(p, MovementType::Adjustment, 1, day(7)),
        ];
        let today = day(7).date_naive();

        let series = movements_by_day(&history, today, 3);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].date, day(5).date_naive());
        assert_eq!((series[0].entries, series[0].exits, series[0].total), (1, 1, 2));
        assert_eq!(series[1].total, 0);
        assert_eq!((series[2].adjustments, series[2].total), (1, 1));

        assert!(movements_by_day(&history, today, 0).is_empty());
    }

    #[test]
    fn totals_value_active_stock_only() {
        let products = vec![
            product("a", 10, 0, true),
            product("b", 1, 2, true),
            product("c", 100, 200, false),
        ];
        let totals = inventory_totals(&products);
        assert_eq!(totals.product_count, 3);
        assert_eq!(totals.active_count, 2);
        assert_eq!(totals.total_value, Money::from_cents(2200));
        assert_eq!(totals.total_cost, Money::from_cents(1650));
        assert_eq!(totals.low_stock_count, 1);
    }

    #[test]
    fn reconcile_flags_drift() {
        let p = product("bolt", 7, 0, true);
        let history = vec![
            movement(p.id_typed(), MovementType::Entry, 10, day(1)),
            movement(p.id_typed(), MovementType::Exit, 3, day(2)),
        ];
        assert!(reconcile(&p, 0, &history).is_consistent());

        let drifted = reconcile(&p, 1, &history);
        assert!(!drifted.is_consistent());
        assert_eq!(drifted.replayed_balance, Some(8));
        assert_eq!(drifted.movement_count, 2);
    }
}
