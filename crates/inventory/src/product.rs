use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_accounting::{Money, stock_value};
use shopledger_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, TenantId, typed_id,
};
use shopledger_events::Event;

typed_id!(
    /// Product identifier (tenant-scoped via `tenant_id` fields in events/commands).
    ProductId
);

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    sku: String,
    name: String,
    stock: i64,
    cost_price: Money,
    opening_stock: i64,
    opening_cost: Money,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            sku: String::new(),
            name: String::new(),
            stock: 0,
            cost_price: Money::ZERO,
            opening_stock: 0,
            opening_cost: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn cost_price(&self) -> Money {
        self.cost_price
    }

    /// Whether `cmd` describes the product as it was registered here,
    /// regardless of stock that has moved since.
    pub fn is_replay_of(&self, cmd: &RegisterProduct) -> bool {
        self.created
            && self.sku == cmd.sku.trim()
            && self.name == cmd.name.trim()
            && self.opening_cost == cmd.cost_price
            && self.opening_stock == cmd.opening_stock
    }

    /// On-hand stock valued at the last purchase cost.
    pub fn valuation(&self) -> DomainResult<Money> {
        stock_value(self.stock, self.cost_price)
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// What caused a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockMovement {
    /// Goods received (GRN line).
    Receipt {
        document_id: AggregateId,
        unit_cost: Money,
    },
    /// Goods sent back to the supplier (debit note line).
    SupplierReturn { document_id: AggregateId },
}

/// Command: RegisterProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub cost_price: Money,
    pub opening_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub movement: StockMovement,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    Register(RegisterProduct),
    AdjustStock(AdjustStock),
}

/// Event: ProductRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRegistered {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub cost_price: Money,
    pub opening_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub movement: StockMovement,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    Registered(ProductRegistered),
    StockAdjusted(StockAdjusted),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::Registered(_) => "inventory.product.registered",
            ProductEvent::StockAdjusted(_) => "inventory.product.stock_adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::Registered(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::Registered(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.cost_price = e.cost_price;
                self.stock = e.opening_stock;
                self.opening_cost = e.cost_price;
                self.opening_stock = e.opening_stock;
                self.created = true;
            }
            ProductEvent::StockAdjusted(e) => {
                self.stock += e.delta;
                if let StockMovement::Receipt { unit_cost, .. } = e.movement {
                    self.cost_price = unit_cost;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::Register(cmd) => self.handle_register(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl Product {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "product {} already registered",
                self.id
            )));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.cost_price.is_negative() {
            return Err(DomainError::validation("cost_price cannot be negative"));
        }
        if cmd.opening_stock < 0 {
            return Err(DomainError::validation("opening_stock cannot be negative"));
        }

        Ok(vec![ProductEvent::Registered(ProductRegistered {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku: cmd.sku.trim().to_string(),
            name: cmd.name.trim().to_string(),
            cost_price: cmd.cost_price,
            opening_stock: cmd.opening_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("product {}", cmd.product_id)));
        }
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_product_id(cmd.product_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        match cmd.movement {
            StockMovement::Receipt { unit_cost, .. } => {
                if cmd.delta < 0 {
                    return Err(DomainError::validation("a receipt must increase stock"));
                }
                if unit_cost.is_negative() {
                    return Err(DomainError::validation("unit_cost cannot be negative"));
                }
            }
            StockMovement::SupplierReturn { .. } => {
                if cmd.delta > 0 {
                    return Err(DomainError::validation("a supplier return must decrease stock"));
                }
            }
        }

        let new_stock = self
            .stock
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::invariant("stock overflow"))?;
        if new_stock < 0 {
            return Err(DomainError::InsufficientStock {
                product: self.id.to_string(),
                requested: -cmd.delta,
                available: self.stock,
            });
        }

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            delta: cmd.delta,
            movement: cmd.movement,
            occurred_at: cmd.occurred_at,
        })])
    }
}
