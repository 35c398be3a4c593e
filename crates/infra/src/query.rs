//! Read-only inventory queries.
//!
//! Nothing in this module writes balances. Movement listings are paginated
//! by default and ordered newest first.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockroom_core::ProductId;
use stockroom_inventory::{
    DailyMovements, InventoryTotals, MovementType, Product, Reconciliation, StockMovement,
    StockSummary,
};

use crate::balance_store::StoreError;
use crate::config::LedgerConfig;

/// Pagination parameters for movement listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of movements to return.
    pub limit: u32,
    /// Offset (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// No limit. Only for internal aggregations, never for listings.
    pub(crate) fn everything() -> Self {
        Self {
            limit: u32::MAX,
            offset: 0,
        }
    }
}

/// Filter criteria for movement listings. Dates are inclusive UTC days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub movement_type: Option<MovementType>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl MovementFilter {
    pub fn for_product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, movement: &StockMovement) -> bool {
        let day = movement.created_at.date_naive();
        self.product_id.is_none_or(|id| movement.product_id == id)
            && self.movement_type.is_none_or(|ty| movement.movement_type == ty)
            && self.date_from.is_none_or(|from| day >= from)
            && self.date_to.is_none_or(|to| day <= to)
    }
}

/// One page of movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPage {
    pub items: Vec<StockMovement>,
    /// Number of movements matching the filter, across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl MovementPage {
    /// Cut a page out of an already filtered and ordered list.
    pub fn slice(all: Vec<StockMovement>, pagination: Pagination) -> Self {
        let total = all.len() as u64;
        let items: Vec<StockMovement> = all
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        let has_more = u64::from(pagination.offset) + (items.len() as u64) < total;

        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }
}

/// Read access to products and the movement log.
pub trait InventoryQuery: Send + Sync {
    fn product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError>;

    /// All products, ordered by name.
    fn products(&self) -> Result<Vec<Product>, StoreError>;

    /// Movements matching `filter`, newest first.
    fn movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StoreError>;

    /// Full history of one product, oldest `created_at` first, ties broken by id.
    fn history(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError>;
}

impl<Q: InventoryQuery + ?Sized> InventoryQuery for Arc<Q> {
    fn product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).product(product_id)
    }

    fn products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).products()
    }

    fn movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StoreError> {
        (**self).movements(filter, pagination)
    }

    fn history(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        (**self).history(product_id)
    }
}

/// Reporting facade over an [`InventoryQuery`].
#[derive(Debug, Clone)]
pub struct InventoryReader<Q> {
    query: Q,
    low_stock_limit: usize,
    top_value_limit: usize,
    activity_window_days: u32,
}

impl<Q: InventoryQuery> InventoryReader<Q> {
    pub fn new(query: Q) -> Self {
        Self::with_config(query, &LedgerConfig::default())
    }

    pub fn with_config(query: Q, config: &LedgerConfig) -> Self {
        Self {
            query,
            low_stock_limit: config.low_stock_report_limit,
            top_value_limit: config.top_value_report_limit,
            activity_window_days: config.activity_window_days,
        }
    }

    pub fn product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        self.query.product(product_id)
    }

    pub fn products(&self) -> Result<Vec<Product>, StoreError> {
        self.query.products()
    }

    pub fn movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<MovementPage, StoreError> {
        self.query.movements(filter, pagination)
    }

    /// Active products strictly below their threshold, lowest stock first,
    /// capped at the configured report limit.
    pub fn low_stock_products(&self) -> Result<Vec<Product>, StoreError> {
        self.low_stock_products_limited(self.low_stock_limit)
    }

    pub fn low_stock_products_limited(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        let products = self.query.products()?;
        Ok(stockroom_inventory::low_stock(&products, limit))
    }

    /// Active products with stock, highest value at sale price first,
    /// capped at the configured report limit.
    pub fn top_products_by_value(&self) -> Result<Vec<Product>, StoreError> {
        self.top_products_by_value_limited(self.top_value_limit)
    }

    pub fn top_products_by_value_limited(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        let products = self.query.products()?;
        Ok(stockroom_inventory::top_by_value(&products, limit))
    }

    /// `None` when the product does not exist.
    pub fn stock_summary(&self, product_id: ProductId) -> Result<Option<StockSummary>, StoreError> {
        let Some(product) = self.query.product(product_id)? else {
            return Ok(None);
        };
        let history = self.query.history(product_id)?;
        Ok(Some(stockroom_inventory::stock_summary(&product, &history)))
    }

    /// Daily movement counts for the configured window ending at `today`.
    pub fn movements_by_day(&self, today: NaiveDate) -> Result<Vec<DailyMovements>, StoreError> {
        self.movements_by_day_window(today, self.activity_window_days)
    }

    pub fn movements_by_day_window(
        &self,
        today: NaiveDate,
        days: u32,
    ) -> Result<Vec<DailyMovements>, StoreError> {
        if days == 0 {
            return Ok(vec![]);
        }
        let filter = MovementFilter {
            date_from: today.checked_sub_days(chrono::Days::new(u64::from(days - 1))),
            date_to: Some(today),
            ..Default::default()
        };
        let page = self.query.movements(&filter, Pagination::everything())?;
        Ok(stockroom_inventory::movements_by_day(&page.items, today, days))
    }

    pub fn inventory_totals(&self) -> Result<InventoryTotals, StoreError> {
        let products = self.query.products()?;
        Ok(stockroom_inventory::inventory_totals(&products))
    }

    /// Replay the product's history on top of `opening_balance` and compare it
    /// with the stored balance. `None` when the product does not exist.
    pub fn reconcile(
        &self,
        product_id: ProductId,
        opening_balance: i64,
    ) -> Result<Option<Reconciliation>, StoreError> {
        let Some(product) = self.query.product(product_id)? else {
            return Ok(None);
        };
        let history = self.query.history(product_id)?;
        Ok(Some(stockroom_inventory::reconcile(
            &product,
            opening_balance,
            &history,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use stockroom_core::{MovementId, UserId};

    fn movement(product_id: ProductId, ty: MovementType, day: u32) -> StockMovement {
        StockMovement {
            id: MovementId::new(),
            product_id,
            movement_type: ty,
            quantity: 1,
            reason: None,
            user_id: UserId::new(),
            created_at: Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn pagination_caps_limit() {
        assert_eq!(Pagination::new(Some(5000), None).limit, 1000);
        assert_eq!(Pagination::new(None, Some(3)), Pagination { limit: 50, offset: 3 });
    }

    #[test]
    fn filter_combines_criteria() {
        let p = ProductId::new();
        let filter = MovementFilter {
            product_id: Some(p),
            movement_type: Some(MovementType::Exit),
            date_from: NaiveDate::from_ymd_opt(2025, 6, 2),
            date_to: NaiveDate::from_ymd_opt(2025, 6, 3),
        };

        assert!(filter.matches(&movement(p, MovementType::Exit, 2)));
        assert!(filter.matches(&movement(p, MovementType::Exit, 3)));
        assert!(!filter.matches(&movement(p, MovementType::Exit, 4)));
        assert!(!filter.matches(&movement(p, MovementType::Entry, 2)));
        assert!(!filter.matches(&movement(ProductId::new(), MovementType::Exit, 2)));
        assert!(MovementFilter::default().matches(&movement(p, MovementType::Adjustment, 9)));
    }

    #[test]
    fn page_reports_has_more() {
        let p = ProductId::new();
        let all: Vec<_> = (1..=5).map(|d| movement(p, MovementType::Entry, d)).collect();

        let first = MovementPage::slice(all.clone(), Pagination::new(Some(2), None));
        assert_eq!((first.items.len(), first.total, first.has_more), (2, 5, true));

        let last = MovementPage::slice(all, Pagination::new(Some(2), Some(4)));
        assert_eq!((last.items.len(), last.has_more), (1, false));
    }
}
