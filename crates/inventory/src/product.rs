use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, Entity, Money, ProductId, SupplierId};

/// Input for constructing (or rehydrating) a [`Product`].
///
/// `stock_quantity` is the balance present when the product enters the ledger;
/// every later change goes through a `MovementPlan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default)]
    pub cost_price: Money,
    #[serde(default)]
    pub unit_price: Money,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewProduct {
    /// Minimal draft: active, zero stock, zero threshold, zero prices.
    pub fn new(id: ProductId, sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            sku: sku.into(),
            name: name.into(),
            description: None,
            category_id: None,
            supplier_id: None,
            cost_price: Money::ZERO,
            unit_price: Money::ZERO,
            stock_quantity: 0,
            min_stock: 0,
            is_active: true,
        }
    }
}

/// A stockable item with its running balance.
///
/// `stock_quantity` has no public setter: the ledger is the only writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NewProduct")]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    description: Option<String>,
    category_id: Option<CategoryId>,
    supplier_id: Option<SupplierId>,
    cost_price: Money,
    unit_price: Money,
    stock_quantity: i64,
    min_stock: i64,
    is_active: bool,
}

impl Product {
    pub fn new(draft: NewProduct) -> DomainResult<Self> {
        let sku = draft.sku.trim().to_string();
        if sku.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if draft.stock_quantity < 0 {
            return Err(DomainError::invariant("stock_quantity cannot be negative"));
        }
        if draft.min_stock < 0 {
            return Err(DomainError::validation("min_stock cannot be negative"));
        }

        Ok(Self {
            id: draft.id,
            sku,
            name,
            description: draft.description,
            category_id: draft.category_id,
            supplier_id: draft.supplier_id,
            cost_price: draft.cost_price,
            unit_price: draft.unit_price,
            stock_quantity: draft.stock_quantity,
            min_stock: draft.min_stock,
            is_active: draft.is_active,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn cost_price(&self) -> Money {
        self.cost_price
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn stock_quantity(&self) -> i64 {
        self.stock_quantity
    }

    pub fn min_stock(&self) -> i64 {
        self.min_stock
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Strictly below the threshold; a balance equal to `min_stock` is not low.
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity < self.min_stock
    }

    /// Markup over cost, in percent. Zero when the cost price is zero.
    pub fn profit_margin(&self) -> f64 {
        if self.cost_price.is_zero() {
            return 0.0;
        }
        let diff = self.unit_price.diff_cents(self.cost_price) as f64;
        diff / self.cost_price.cents() as f64 * 100.0
    }

    /// Stock on hand valued at the sale price. `None` on overflow.
    pub fn inventory_value(&self) -> Option<Money> {
        self.unit_price.checked_times(self.units_on_hand())
    }

    /// Stock on hand valued at the cost price. `None` on overflow.
    pub fn inventory_cost(&self) -> Option<Money> {
        self.cost_price.checked_times(self.units_on_hand())
    }

    fn units_on_hand(&self) -> u64 {
        u64::try_from(self.stock_quantity).unwrap_or(0)
    }

    pub(crate) fn set_stock_quantity(&mut self, balance: i64) {
        self.stock_quantity = balance;
    }
}

impl TryFrom<NewProduct> for Product {
    type Error = DomainError;

    fn try_from(value: NewProduct) -> Result<Self, Self::Error> {
        Product::new(value)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
