//! Purchase lifecycle orchestration (PO → GRN → Bill → Return).
//!
//! Every operation rehydrates the documents it touches, runs their commands
//! inside one [`UnitOfWork`] and commits atomically. A commit that loses a
//! race against a concurrent operation is re-run on fresh state, up to
//! `max_conflict_retries` times.
//!
//! Creation requests may carry a caller-chosen document id. Re-submitting the
//! same request returns the document already recorded under that id without
//! repeating any stock or settlement effect.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use shopledger_accounting::Money;
use shopledger_core::{DomainError, TenantId};
use shopledger_events::{EventBus, EventEnvelope};
use shopledger_inventory::{
    AdjustStock, Product, ProductCommand, ProductId, RegisterProduct, StockMovement,
};
use shopledger_payables::{
    ApplyDebitNote, BillLine, CreateBill, PaymentId, PurchaseBill, PurchaseBillCommand,
    PurchaseBillId, PurchaseReturn, PurchaseReturnCommand, PurchaseReturnId, RecordPayment,
    RecordPurchaseReturn, ReturnLine, ReviseBillLines,
};
use shopledger_purchasing::{
    AmendPurchaseOrder, ApplyReceipt, CancelPurchaseOrder, ConfirmPurchaseOrder,
    CreatePurchaseOrder, GoodsReceipt, GoodsReceiptCommand, GoodsReceiptId, GoodsReceiptLine,
    NewOrderLine, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderId, RecordGoodsReceipt,
    SupplierId,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::numbering::{DocumentKind, DocumentNumbers};
use crate::suppliers::{Supplier, SupplierDirectory};
use crate::unit_of_work::{Tracked, UnitOfWork};

pub const PRODUCT_STREAM: &str = "inventory.product";
pub const PURCHASE_ORDER_STREAM: &str = "purchasing.order";
pub const GOODS_RECEIPT_STREAM: &str = "purchasing.goods_receipt";
pub const PURCHASE_BILL_STREAM: &str = "payables.bill";
pub const PURCHASE_RETURN_STREAM: &str = "payables.purchase_return";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How many times a commit that lost a race is re-run before giving up.
    pub max_conflict_retries: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub product_id: Option<ProductId>,
    pub sku: String,
    pub name: String,
    pub cost_price: Money,
    pub opening_stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseOrder {
    pub order_id: Option<PurchaseOrderId>,
    pub po_number: Option<String>,
    pub supplier_id: SupplierId,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGoodsReceipt {
    pub receipt_id: Option<GoodsReceiptId>,
    pub grn_number: Option<String>,
    pub order_id: Option<PurchaseOrderId>,
    pub supplier_id: SupplierId,
    pub lines: Vec<GoodsReceiptLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBill {
    pub bill_id: Option<PurchaseBillId>,
    pub bill_no: Option<String>,
    pub supplier_id: SupplierId,
    pub receipt_id: Option<GoodsReceiptId>,
    pub lines: Vec<BillLine>,
    /// Amount settled when the bill is entered.
    pub paid_amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPayment {
    pub payment_id: Option<PaymentId>,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseReturn {
    pub return_id: Option<PurchaseReturnId>,
    pub return_no: Option<String>,
    pub supplier_id: SupplierId,
    pub bill_id: Option<PurchaseBillId>,
    pub receipt_id: Option<GoodsReceiptId>,
    pub lines: Vec<ReturnLine>,
    pub reason: Option<String>,
}

/// A document number held for one operation.
///
/// Assigned on first use and handed back on drop unless the operation
/// recorded a new document with it.
struct NumberReservation<'n> {
    numbers: &'n dyn DocumentNumbers,
    tenant_id: TenantId,
    kind: DocumentKind,
    requested: Option<&'n str>,
    number: Option<String>,
    kept: bool,
}

impl<'n> NumberReservation<'n> {
    fn new(
        numbers: &'n dyn DocumentNumbers,
        tenant_id: TenantId,
        kind: DocumentKind,
        requested: Option<&'n str>,
    ) -> Self {
        Self {
            numbers,
            tenant_id,
            kind,
            requested,
            number: None,
            kept: false,
        }
    }

    fn number(&mut self) -> Result<String, DomainError> {
        if let Some(number) = &self.number {
            return Ok(number.clone());
        }
        let number = self.numbers.assign(self.tenant_id, self.kind, self.requested)?;
        self.number = Some(number.clone());
        Ok(number)
    }

    fn keep(&mut self) {
        self.kept = true;
    }
}

impl Drop for NumberReservation<'_> {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        if let Some(number) = self.number.take() {
            self.numbers.release(self.tenant_id, self.kind, &number);
        }
    }
}

/// Lifecycle orchestrator for purchase documents.
pub struct PurchaseLifecycle<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    numbers: Arc<dyn DocumentNumbers>,
    suppliers: Arc<dyn SupplierDirectory>,
    config: LifecycleConfig,
}

impl<S, B> PurchaseLifecycle<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: CommandDispatcher<S, B>,
        numbers: Arc<dyn DocumentNumbers>,
        suppliers: Arc<dyn SupplierDirectory>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            dispatcher,
            numbers,
            suppliers,
            config,
        }
    }

    pub fn suppliers(&self) -> &dyn SupplierDirectory {
        self.suppliers.as_ref()
    }

    // ---- products -------------------------------------------------------

    #[tracing::instrument(skip(self, req), fields(tenant = %tenant_id))]
    pub fn register_product(
        &self,
        tenant_id: TenantId,
        req: NewProduct,
    ) -> Result<Product, DispatchError> {
        let product_id = req.product_id.unwrap_or_else(ProductId::generate);

        self.with_retries("register_product", || {
            let mut uow = self.dispatcher.begin(tenant_id);
            let mut product = uow.load(product_id.0, PRODUCT_STREAM, Product::empty(product_id))?;
            let cmd = RegisterProduct {
                tenant_id,
                product_id,
                sku: req.sku.clone(),
                name: req.name.clone(),
                cost_price: req.cost_price,
                opening_stock: req.opening_stock,
                occurred_at: Utc::now(),
            };
            if product.is_replay_of(&cmd) {
                return Ok(product.into_inner());
            }

            uow.execute(&mut product, &ProductCommand::Register(cmd))?;
            uow.commit()?;
            tracing::info!(%product_id, sku = product.sku(), "product registered");
            Ok(product.into_inner())
        })
    }

    pub fn product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Product, DispatchError> {
        let (product, _) = self
            .dispatcher
            .load(tenant_id, product_id.0, Product::empty(product_id))?;
        if !product.exists() {
            return Err(DomainError::not_found(format!("product {product_id}")).into());
        }
        Ok(product)
    }

    // ---- purchase orders ------------------------------------------------

    #[tracing::instrument(skip(self, req), fields(tenant = %tenant_id, supplier = %req.supplier_id))]
    pub fn create_purchase_order(
        &self,
        tenant_id: TenantId,
        req: NewPurchaseOrder,
    ) -> Result<PurchaseOrder, DispatchError> {
        self.require_supplier(tenant_id, req.supplier_id)?;
        self.require_products(tenant_id, req.lines.iter().map(|l| l.product_id))?;

        let order_id = req.order_id.unwrap_or_else(PurchaseOrderId::generate);
        let mut number = NumberReservation::new(
            self.numbers.as_ref(),
            tenant_id,
            DocumentKind::PurchaseOrder,
            req.po_number.as_deref(),
        );

        self.with_retries("create_purchase_order", || {
            let mut uow = self.dispatcher.begin(tenant_id);
            let mut order = uow.load(
                order_id.0,
                PURCHASE_ORDER_STREAM,
                PurchaseOrder::empty(order_id),
            )?;
            let mut cmd = CreatePurchaseOrder {
                tenant_id,
                order_id,
                po_number: String::new(),
                supplier_id: req.supplier_id,
                lines: req.lines.clone(),
                occurred_at: Utc::now(),
            };
            if order.is_replay_of(&cmd) {
                return Ok(order.into_inner());
            }
            if !order.exists() {
                cmd.po_number = number.number()?;
            }

            uow.execute(&mut order, &PurchaseOrderCommand::Create(cmd))?;
            uow.commit()?;
            number.keep();
            tracing::info!(%order_id, po_number = order.po_number(), "purchase order created");
            Ok(order.into_inner())
        })
    }

    /// Replace the lines of a draft order.
    #[tracing::instrument(skip(self, lines), fields(tenant = %tenant_id))]
    pub fn amend_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        lines: Vec<NewOrderLine>,
    ) -> Result<PurchaseOrder, DispatchError> {
        self.require_products(tenant_id, lines.iter().map(|l| l.product_id))?;
        self.update_order(tenant_id, order_id, "amend_purchase_order", || {
            PurchaseOrderCommand::Amend(AmendPurchaseOrder {
                tenant_id,
                order_id,
                lines: lines.clone(),
                occurred_at: Utc::now(),
            })
        })
    }

    #[tracing::instrument(skip(self), fields(tenant = %tenant_id))]
    pub fn confirm_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOrder, DispatchError> {
        self.update_order(tenant_id, order_id, "confirm_purchase_order", || {
            PurchaseOrderCommand::Confirm(ConfirmPurchaseOrder {
                tenant_id,
                order_id,
                occurred_at: Utc::now(),
            })
        })
    }

    #[tracing::instrument(skip(self, reason), fields(tenant = %tenant_id))]
    pub fn cancel_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        reason: Option<String>,
    ) -> Result<PurchaseOrder, DispatchError> {
        self.update_order(tenant_id, order_id, "cancel_purchase_order", || {
            PurchaseOrderCommand::Cancel(CancelPurchaseOrder {
                tenant_id,
                order_id,
                reason: reason.clone(),
                occurred_at: Utc::now(),
            })
        })
    }

    pub fn purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<PurchaseOrder, DispatchError> {
        let (order, _) = self
            .dispatcher
            .load(tenant_id, order_id.0, PurchaseOrder::empty(order_id))?;
        if !order.exists() {
            return Err(DomainError::not_found(format!("purchase order {order_id}")).into());
        }
        Ok(order)
    }

    fn update_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        operation: &'static str,
        command: impl Fn() -> PurchaseOrderCommand,
    ) -> Result<PurchaseOrder, DispatchError> {
        self.with_retries(operation, || {
            let mut uow = self.dispatcher.begin(tenant_id);
            let mut order = uow.load(
                order_id.0,
                PURCHASE_ORDER_STREAM,
                PurchaseOrder::empty(order_id),
            )?;
            uow.execute(&mut order, &command())?;
            uow.commit()?;
            tracing::info!(%order_id, status = %order.status(), operation, "purchase order updated");
            Ok(order.into_inner())
        })
    }

    // ---- goods receipts -------------------------------------------------

    /// Record a GRN, add its quantities to stock and, when it is linked to a
    /// purchase order, advance that order. All three happen or none does.
    #[tracing::instrument(skip(self, req), fields(tenant = %tenant_id, supplier = %req.supplier_id))]
    pub fn receive_goods(
        &self,
        tenant_id: TenantId,
        req: NewGoodsReceipt,
    ) -> Result<GoodsReceipt, DispatchError> {
        self.require_supplier(tenant_id, req.supplier_id)?;

        let receipt_id = req.receipt_id.unwrap_or_else(GoodsReceiptId::generate);
        let mut number = NumberReservation::new(
            self.numbers.as_ref(),
            tenant_id,
            DocumentKind::GoodsReceipt,
            req.grn_number.as_deref(),
        );

        self.with_retries("receive_goods", || {
            let mut uow = self.dispatcher.begin(tenant_id);
            let mut receipt = uow.load(
                receipt_id.0,
                GOODS_RECEIPT_STREAM,
                GoodsReceipt::empty(receipt_id),
            )?;
            let mut cmd = RecordGoodsReceipt {
                tenant_id,
                receipt_id,
                grn_number: String::new(),
                order_id: req.order_id,
                supplier_id: req.supplier_id,
                lines: req.lines.clone(),
                occurred_at: Utc::now(),
            };
            if receipt.is_replay_of(&cmd) {
                return Ok(receipt.into_inner());
            }
            if !receipt.exists() {
                cmd.grn_number = number.number()?;
            }
            let occurred_at = cmd.occurred_at;
            uow.execute(&mut receipt, &GoodsReceiptCommand::Record(cmd))?;

            if let Some(order_id) = req.order_id {
                let mut order = uow.load(
                    order_id.0,
                    PURCHASE_ORDER_STREAM,
                    PurchaseOrder::empty(order_id),
                )?;
                uow.execute(
                    &mut order,
                    &PurchaseOrderCommand::ApplyReceipt(ApplyReceipt {
                        tenant_id,
                        order_id,
                        receipt_id,
                        supplier_id: req.supplier_id,
                        quantities: receipt.received_quantities(),
                        occurred_at,
                    }),
                )?;
            }

            let mut products = BTreeMap::new();
            for line in receipt.lines() {
                let product = load_product(&uow, &mut products, line.product_id)?;
                uow.execute(
                    product,
                    &ProductCommand::AdjustStock(AdjustStock {
                        tenant_id,
                        product_id: line.product_id,
                        delta: line.received_qty,
                        movement: StockMovement::Receipt {
                            document_id: receipt_id.0,
                            unit_cost: line.unit_cost,
                        },
                        occurred_at,
                    }),
                )?;
            }

            uow.commit()?;
            number.keep();
            tracing::info!(
                %receipt_id,
                grn_number = receipt.grn_number(),
                lines = receipt.lines().len(),
                "goods received"
            );
            Ok(receipt.into_inner())
        })
    }

    pub fn goods_receipt(
        &self,
        tenant_id: TenantId,
        receipt_id: GoodsReceiptId,
    ) -> Result<GoodsReceipt, DispatchError> {
        let (receipt, _) = self
            .dispatcher
            .load(tenant_id, receipt_id.0, GoodsReceipt::empty(receipt_id))?;
        if !receipt.exists() {
            return Err(DomainError::not_found(format!("goods receipt {receipt_id}")).into());
        }
        Ok(receipt)
    }

    // ---- bills ----------------------------------------------------------

    #[tracing::instrument(skip(self, req), fields(tenant = %tenant_id, supplier = %req.supplier_id))]
    pub fn create_bill(&self, tenant_id: TenantId, req: NewBill) -> Result<PurchaseBill, DispatchError> {
        self.require_supplier(tenant_id, req.supplier_id)?;
        self.require_products(tenant_id, req.lines.iter().map(|l| l.product_id))?;
        if let Some(receipt_id) = req.receipt_id {
            self.require_receipt_of(tenant_id, receipt_id, req.supplier_id)?;
        }

        let bill_id = req.bill_id.unwrap_or_else(PurchaseBillId::generate);
        let mut number = NumberReservation::new(
            self.numbers.as_ref(),
            tenant_id,
            DocumentKind::PurchaseBill,
            req.bill_no.as_deref(),
        );

        self.with_retries("create_bill", || {
            let mut uow = self.dispatcher.begin(tenant_id);
            let mut bill = uow.load(bill_id.0, PURCHASE_BILL_STREAM, PurchaseBill::empty(bill_id))?;
            let mut cmd = CreateBill {
                tenant_id,
                bill_id,
                bill_no: String::new(),
                supplier_id: req.supplier_id,
                receipt_id: req.receipt_id,
                lines: req.lines.clone(),
                paid_amount: req.paid_amount,
                occurred_at: Utc::now(),
            };
            if bill.is_replay_of(&cmd) {
                return Ok(bill.into_inner());
            }
            if !bill.exists() {
                cmd.bill_no = number.number()?;
            }

            uow.execute(&mut bill, &PurchaseBillCommand::Create(cmd))?;
            uow.commit()?;
            number.keep();
            tracing::info!(
                %bill_id,
                bill_no = bill.bill_no(),
                total = %bill.totals().total_amount,
                due = %bill.due_amount(),
                "purchase bill created"
            );
            Ok(bill.into_inner())
        })
    }

    /// Replace the lines of a bill that has no payment or debit note yet.
    #[tracing::instrument(skip(self, lines), fields(tenant = %tenant_id))]
    pub fn revise_bill(
        &self,
        tenant_id: TenantId,
        bill_id: PurchaseBillId,
        lines: Vec<BillLine>,
    ) -> Result<PurchaseBill, DispatchError> {
        self.require_products(tenant_id, lines.iter().map(|l| l.product_id))?;

        self.with_retries("revise_bill", || {
            let mut uow = self.dispatcher.begin(tenant_id);
            let mut bill = uow.load(bill_id.0, PURCHASE_BILL_STREAM, PurchaseBill::empty(bill_id))?;
            uow.execute(
                &mut bill,
                &PurchaseBillCommand::ReviseLines(ReviseBillLines {
                    tenant_id,
                    bill_id,
                    lines: lines.clone(),
                    occurred_at: Utc::now(),
                }),
            )?;
            uow.commit()?;
            tracing::info!(
                %bill_id,
                total = %bill.totals().total_amount,
                due = %bill.due_amount(),
                "purchase bill lines revised"
            );
            Ok(bill.into_inner())
        })
    }

    /// Record a payment against a bill. A repeated `payment_id` changes nothing.
    #[tracing::instrument(skip(self, req), fields(tenant = %tenant_id, amount = %req.amount))]
    pub fn record_payment(
        &self,
        tenant_id: TenantId,
        bill_id: PurchaseBillId,
        req: NewPayment,
    ) -> Result<PurchaseBill, DispatchError> {
        let payment_id = req.payment_id.unwrap_or_else(PaymentId::generate);

        self.with_retries("record_payment", || {
            let mut uow = self.dispatcher.begin(tenant_id);
            let mut bill = uow.load(bill_id.0, PURCHASE_BILL_STREAM, PurchaseBill::empty(bill_id))?;
            let applied = uow.execute(
                &mut bill,
                &PurchaseBillCommand::RecordPayment(RecordPayment {
                    tenant_id,
                    bill_id,
                    payment_id,
                    amount: req.amount,
                    occurred_at: Utc::now(),
                }),
            )?;
            uow.commit()?;
            if !applied.is_empty() {
                tracing::info!(
                    %bill_id,
                    %payment_id,
                    paid = %bill.paid_amount(),
                    due = %bill.due_amount(),
                    "payment recorded"
                );
            }
            Ok(bill.into_inner())
        })
    }

    pub fn bill(&self, tenant_id: TenantId, bill_id: PurchaseBillId) -> Result<PurchaseBill, DispatchError> {
        let (bill, _) = self
            .dispatcher
            .load(tenant_id, bill_id.0, PurchaseBill::empty(bill_id))?;
        if !bill.exists() {
            return Err(DomainError::not_found(format!("purchase bill {bill_id}")).into());
        }
        Ok(bill)
    }

    // ---- purchase returns -----------------------------------------------

    /// Record a debit note: stock leaves, and a linked bill owes less.
    #[tracing::instrument(skip(self, req), fields(tenant = %tenant_id, supplier = %req.supplier_id))]
    pub fn create_return(
        &self,
        tenant_id: TenantId,
        req: NewPurchaseReturn,
    ) -> Result<PurchaseReturn, DispatchError> {
        self.require_supplier(tenant_id, req.supplier_id)?;
        if let Some(receipt_id) = req.receipt_id {
            self.require_receipt_of(tenant_id, receipt_id, req.supplier_id)?;
        }

        let return_id = req.return_id.unwrap_or_else(PurchaseReturnId::generate);
        let mut number = NumberReservation::new(
            self.numbers.as_ref(),
            tenant_id,
            DocumentKind::PurchaseReturn,
            req.return_no.as_deref(),
        );

        self.with_retries("create_return", || {
            let mut uow = self.dispatcher.begin(tenant_id);
            let mut ret = uow.load(
                return_id.0,
                PURCHASE_RETURN_STREAM,
                PurchaseReturn::empty(return_id),
            )?;
            let mut cmd = RecordPurchaseReturn {
                tenant_id,
                return_id,
                return_no: String::new(),
                supplier_id: req.supplier_id,
                bill_id: req.bill_id,
                receipt_id: req.receipt_id,
                lines: req.lines.clone(),
                reason: req.reason.clone(),
                occurred_at: Utc::now(),
            };
            if ret.is_replay_of(&cmd) {
                return Ok(ret.into_inner());
            }
            if !ret.exists() {
                cmd.return_no = number.number()?;
            }
            let occurred_at = cmd.occurred_at;
            uow.execute(&mut ret, &PurchaseReturnCommand::Record(cmd))?;

            if let Some(bill_id) = req.bill_id {
                let mut bill =
                    uow.load(bill_id.0, PURCHASE_BILL_STREAM, PurchaseBill::empty(bill_id))?;
                uow.execute(
                    &mut bill,
                    &PurchaseBillCommand::ApplyDebitNote(ApplyDebitNote {
                        tenant_id,
                        bill_id,
                        return_id,
                        supplier_id: req.supplier_id,
                        amount: ret.totals().total_amount,
                        occurred_at,
                    }),
                )?;
            }

            let mut products = BTreeMap::new();
            for line in ret.lines() {
                let product = load_product(&uow, &mut products, line.product_id)?;
                uow.execute(
                    product,
                    &ProductCommand::AdjustStock(AdjustStock {
                        tenant_id,
                        product_id: line.product_id,
                        delta: -line.quantity,
                        movement: StockMovement::SupplierReturn {
                            document_id: return_id.0,
                        },
                        occurred_at,
                    }),
                )?;
            }

            uow.commit()?;
            number.keep();
            tracing::info!(
                %return_id,
                return_no = ret.return_no(),
                total = %ret.totals().total_amount,
                "purchase return recorded"
            );
            Ok(ret.into_inner())
        })
    }

    pub fn purchase_return(
        &self,
        tenant_id: TenantId,
        return_id: PurchaseReturnId,
    ) -> Result<PurchaseReturn, DispatchError> {
        let (ret, _) = self
            .dispatcher
            .load(tenant_id, return_id.0, PurchaseReturn::empty(return_id))?;
        if !ret.exists() {
            return Err(DomainError::not_found(format!("purchase return {return_id}")).into());
        }
        Ok(ret)
    }

    // ---- helpers --------------------------------------------------------

    fn with_retries<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<T, DispatchError>,
    ) -> Result<T, DispatchError> {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(err) if err.is_retryable() && retries < self.config.max_conflict_retries => {
                    retries += 1;
                    tracing::warn!(operation, retries, error = %err, "lost a concurrent update, retrying");
                }
                other => return other,
            }
        }
    }

    fn require_supplier(&self, tenant_id: TenantId, supplier_id: SupplierId) -> Result<Supplier, DomainError> {
        self.suppliers
            .get(tenant_id, supplier_id)
            .ok_or_else(|| DomainError::not_found(format!("supplier {supplier_id}")))
    }

    fn require_products(
        &self,
        tenant_id: TenantId,
        product_ids: impl IntoIterator<Item = ProductId>,
    ) -> Result<(), DispatchError> {
        for product_id in product_ids {
            self.product(tenant_id, product_id)?;
        }
        Ok(())
    }

    /// A document linked to a GRN must exist and name the GRN's supplier.
    fn require_receipt_of(
        &self,
        tenant_id: TenantId,
        receipt_id: GoodsReceiptId,
        supplier_id: SupplierId,
    ) -> Result<(), DispatchError> {
        let receipt = self.goods_receipt(tenant_id, receipt_id)?;
        if receipt.supplier_id() != Some(supplier_id) {
            return Err(DomainError::validation(format!(
                "supplier {supplier_id} does not match goods receipt {}",
                receipt.grn_number()
            ))
            .into());
        }
        Ok(())
    }
}

/// Load each product once per unit of work; later lines reuse the tracked copy.
fn load_product<'m, S, B>(
    uow: &UnitOfWork<'_, S, B>,
    products: &'m mut BTreeMap<ProductId, Tracked<Product>>,
    product_id: ProductId,
) -> Result<&'m mut Tracked<Product>, DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    match products.entry(product_id) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            let product = uow.load(product_id.0, PRODUCT_STREAM, Product::empty(product_id))?;
            Ok(entry.insert(product))
        }
    }
}
