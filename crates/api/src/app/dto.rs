use core::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use shopledger_accounting::{DocumentTotals, Money, TaxPercent};
use shopledger_core::{AggregateRoot, DomainError};
use shopledger_infra::{
    NewBill, NewGoodsReceipt, NewPayment, NewProduct, NewPurchaseOrder, NewPurchaseReturn,
    NewSupplier, Supplier,
};
use shopledger_inventory::{Product, ProductId};
use shopledger_payables::{BillLine, PurchaseBill, PurchaseReturn, ReturnLine};
use shopledger_purchasing::{GoodsReceipt, GoodsReceiptLine, NewOrderLine, PurchaseOrder};

// -------------------------
// Request DTOs
//
// Numeric fields are optional at the serde level so that a missing value is
// reported as a validation error instead of being defaulted.
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateSupplierRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub id: Option<String>,
    pub sku: Option<String>,
    pub name: Option<String>,
    /// Minor units.
    pub cost_price: Option<Decimal>,
    pub opening_stock: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: Option<String>,
    pub qty_ordered: Option<i64>,
    pub unit_cost: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub id: Option<String>,
    pub po_number: Option<String>,
    pub supplier_id: Option<String>,
    pub lines: Option<Vec<OrderLineRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct AmendPurchaseOrderRequest {
    pub lines: Option<Vec<OrderLineRequest>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelPurchaseOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoodsReceiptLineRequest {
    pub product_id: Option<String>,
    pub received_qty: Option<i64>,
    pub unit_cost: Option<Decimal>,
    pub batch_no: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGoodsReceiptRequest {
    pub id: Option<String>,
    pub grn_number: Option<String>,
    pub po_id: Option<String>,
    pub supplier_id: Option<String>,
    pub lines: Option<Vec<GoodsReceiptLineRequest>>,
}

/// Priced line shared by bills and returns.
#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub rate: Option<Decimal>,
    /// Percent, e.g. `18` or `"12.5"`.
    pub tax: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBillRequest {
    pub id: Option<String>,
    pub bill_no: Option<String>,
    pub supplier_id: Option<String>,
    pub grn_id: Option<String>,
    pub items: Option<Vec<ItemRequest>>,
    pub paid_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ReviseBillRequest {
    pub items: Option<Vec<ItemRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub payment_id: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseReturnRequest {
    pub id: Option<String>,
    pub return_no: Option<String>,
    pub supplier_id: Option<String>,
    pub purchase_id: Option<String>,
    pub grn_id: Option<String>,
    pub items: Option<Vec<ItemRequest>>,
    pub reason: Option<String>,
}

// -------------------------
// Request -> engine mapping
// -------------------------

fn required<T>(value: Option<T>, field: &str) -> Result<T, DomainError> {
    value.ok_or_else(|| DomainError::validation(format!("{field} is required")))
}

pub fn parse_id<T>(raw: &str) -> Result<T, DomainError>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim().parse()
}

fn optional_id<T>(raw: Option<String>) -> Result<Option<T>, DomainError>
where
    T: FromStr<Err = DomainError>,
{
    raw.as_deref().map(parse_id).transpose()
}

fn required_id<T>(raw: Option<String>, field: &str) -> Result<T, DomainError>
where
    T: FromStr<Err = DomainError>,
{
    parse_id(&required(raw, field)?)
}

fn money(value: Option<Decimal>, field: &str) -> Result<Money, DomainError> {
    required(value, field).map(Money::new)
}

fn tax(value: Option<Decimal>, field: &str) -> Result<TaxPercent, DomainError> {
    TaxPercent::new(required(value, field)?)
}

impl CreateSupplierRequest {
    pub fn into_new_supplier(self) -> Result<NewSupplier, DomainError> {
        Ok(NewSupplier {
            supplier_id: optional_id(self.id)?,
            name: required(self.name, "name")?,
            phone: self.phone,
            email: self.email,
        })
    }
}

impl CreateProductRequest {
    pub fn into_new_product(self) -> Result<NewProduct, DomainError> {
        Ok(NewProduct {
            product_id: optional_id(self.id)?,
            sku: required(self.sku, "sku")?,
            name: required(self.name, "name")?,
            cost_price: money(self.cost_price, "cost_price")?,
            opening_stock: required(self.opening_stock, "opening_stock")?,
        })
    }
}

fn order_lines(lines: Option<Vec<OrderLineRequest>>) -> Result<Vec<NewOrderLine>, DomainError> {
    required(lines, "lines")?
        .into_iter()
        .enumerate()
        .map(|(i, l)| {
            Ok(NewOrderLine {
                product_id: required_id(l.product_id, &format!("lines[{i}].product_id"))?,
                qty_ordered: required(l.qty_ordered, &format!("lines[{i}].qty_ordered"))?,
                unit_cost: money(l.unit_cost, &format!("lines[{i}].unit_cost"))?,
            })
        })
        .collect()
}

impl CreatePurchaseOrderRequest {
    pub fn into_new_order(self) -> Result<NewPurchaseOrder, DomainError> {
        Ok(NewPurchaseOrder {
            order_id: optional_id(self.id)?,
            po_number: self.po_number,
            supplier_id: required_id(self.supplier_id, "supplier_id")?,
            lines: order_lines(self.lines)?,
        })
    }
}

impl AmendPurchaseOrderRequest {
    pub fn into_lines(self) -> Result<Vec<NewOrderLine>, DomainError> {
        order_lines(self.lines)
    }
}

impl CreateGoodsReceiptRequest {
    pub fn into_new_receipt(self) -> Result<NewGoodsReceipt, DomainError> {
        let lines = required(self.lines, "lines")?
            .into_iter()
            .enumerate()
            .map(|(i, l)| {
                Ok(GoodsReceiptLine {
                    product_id: required_id(l.product_id, &format!("lines[{i}].product_id"))?,
                    batch_no: l.batch_no,
                    received_qty: required(l.received_qty, &format!("lines[{i}].received_qty"))?,
                    unit_cost: money(l.unit_cost, &format!("lines[{i}].unit_cost"))?,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(NewGoodsReceipt {
            receipt_id: optional_id(self.id)?,
            grn_number: self.grn_number,
            order_id: optional_id(self.po_id)?,
            supplier_id: required_id(self.supplier_id, "supplier_id")?,
            lines,
        })
    }
}

/// `(product, quantity, rate, tax)` of each item, validated.
fn priced_items<L>(
    items: Option<Vec<ItemRequest>>,
    make: impl Fn(ProductId, i64, Money, TaxPercent) -> L,
) -> Result<Vec<L>, DomainError> {
    required(items, "items")?
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            Ok(make(
                required_id(item.product_id, &format!("items[{i}].product_id"))?,
                required(item.quantity, &format!("items[{i}].quantity"))?,
                money(item.rate, &format!("items[{i}].rate"))?,
                tax(item.tax, &format!("items[{i}].tax"))?,
            ))
        })
        .collect()
}

impl CreateBillRequest {
    pub fn into_new_bill(self) -> Result<NewBill, DomainError> {
        Ok(NewBill {
            bill_id: optional_id(self.id)?,
            bill_no: self.bill_no,
            supplier_id: required_id(self.supplier_id, "supplier_id")?,
            receipt_id: optional_id(self.grn_id)?,
            lines: priced_items(self.items, bill_line)?,
            paid_amount: money(self.paid_amount, "paid_amount")?,
        })
    }
}

impl ReviseBillRequest {
    pub fn into_lines(self) -> Result<Vec<BillLine>, DomainError> {
        priced_items(self.items, bill_line)
    }
}

fn bill_line(product_id: ProductId, quantity: i64, rate: Money, tax_percent: TaxPercent) -> BillLine {
    BillLine {
        product_id,
        quantity,
        rate,
        tax_percent,
    }
}

impl RecordPaymentRequest {
    pub fn into_new_payment(self) -> Result<NewPayment, DomainError> {
        Ok(NewPayment {
            payment_id: optional_id(self.payment_id)?,
            amount: money(self.amount, "amount")?,
        })
    }
}

impl CreatePurchaseReturnRequest {
    pub fn into_new_return(self) -> Result<NewPurchaseReturn, DomainError> {
        Ok(NewPurchaseReturn {
            return_id: optional_id(self.id)?,
            return_no: self.return_no,
            supplier_id: required_id(self.supplier_id, "supplier_id")?,
            bill_id: optional_id(self.purchase_id)?,
            receipt_id: optional_id(self.grn_id)?,
            lines: priced_items(self.items, |product_id, quantity, rate, tax_percent| ReturnLine {
                product_id,
                quantity,
                rate,
                tax_percent,
            })?,
            reason: self.reason,
        })
    }
}

// -------------------------
// Response mapping (money in minor units)
// -------------------------

fn minor(m: Money) -> i64 {
    m.to_minor_units()
}

fn totals_to_json(t: &DocumentTotals) -> serde_json::Value {
    json!({
        "subtotal": minor(t.subtotal),
        "tax_total": minor(t.tax_total),
        "total_amount": minor(t.total_amount),
    })
}

fn priced_line_to_json(product_id: impl ToString, quantity: i64, rate: Money, tax: TaxPercent) -> serde_json::Value {
    json!({
        "product_id": product_id.to_string(),
        "quantity": quantity,
        "rate": minor(rate),
        "tax": tax.value().normalize().to_string(),
    })
}

fn opt_string(id: Option<impl ToString>) -> Option<String> {
    id.map(|i| i.to_string())
}

pub fn supplier_to_json(s: &Supplier) -> serde_json::Value {
    json!({
        "id": s.supplier_id.to_string(),
        "name": s.name,
        "phone": s.phone,
        "email": s.email,
    })
}

pub fn product_to_json(p: &Product) -> Result<serde_json::Value, DomainError> {
    Ok(json!({
        "id": p.id_typed().to_string(),
        "sku": p.sku(),
        "name": p.name(),
        "stock": p.stock(),
        "cost_price": minor(p.cost_price()),
        "valuation": minor(p.valuation()?),
    }))
}

pub fn purchase_order_to_json(po: &PurchaseOrder) -> serde_json::Value {
    json!({
        "id": po.id_typed().to_string(),
        "po_number": po.po_number(),
        "supplier_id": opt_string(po.supplier_id()),
        "status": po.status().as_str(),
        "ordered_at": po.ordered_at(),
        "cancel_reason": po.cancel_reason(),
        "order_value": po.order_value().ok().map(minor),
        "lines": po.lines().iter().map(|l| json!({
            "line_no": l.line_no,
            "product_id": l.product_id.to_string(),
            "qty_ordered": l.qty_ordered,
            "qty_received": l.qty_received,
            "remaining": l.remaining(),
            "unit_cost": minor(l.unit_cost),
        })).collect::<Vec<_>>(),
        "receipts": po.receipts().iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        "version": po.version(),
    })
}

pub fn goods_receipt_to_json(grn: &GoodsReceipt) -> serde_json::Value {
    json!({
        "id": grn.id_typed().to_string(),
        "grn_number": grn.grn_number(),
        "po_id": opt_string(grn.order_id()),
        "supplier_id": opt_string(grn.supplier_id()),
        "received_at": grn.received_at(),
        "lines": grn.lines().iter().map(|l| json!({
            "product_id": l.product_id.to_string(),
            "batch_no": l.batch_no,
            "received_qty": l.received_qty,
            "unit_cost": minor(l.unit_cost),
        })).collect::<Vec<_>>(),
    })
}

pub fn bill_to_json(bill: &PurchaseBill) -> serde_json::Value {
    json!({
        "id": bill.id_typed().to_string(),
        "bill_no": bill.bill_no(),
        "supplier_id": opt_string(bill.supplier_id()),
        "grn_id": opt_string(bill.receipt_id()),
        "billed_at": bill.billed_at(),
        "items": bill.lines().iter()
            .map(|l| priced_line_to_json(l.product_id, l.quantity, l.rate, l.tax_percent))
            .collect::<Vec<_>>(),
        "totals": totals_to_json(&bill.totals()),
        "paid_amount": minor(bill.paid_amount()),
        "returned_amount": minor(bill.returned_amount()),
        "due_amount": minor(bill.due_amount()),
        "credit_balance": minor(bill.credit_balance()),
        "payment_status": bill.payment_status().as_str(),
        "payments": bill.payments().iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        "debit_notes": bill.debit_notes().iter().map(|d| d.to_string()).collect::<Vec<_>>(),
    })
}

pub fn purchase_return_to_json(ret: &PurchaseReturn) -> serde_json::Value {
    json!({
        "id": ret.id_typed().to_string(),
        "return_no": ret.return_no(),
        "supplier_id": opt_string(ret.supplier_id()),
        "purchase_id": opt_string(ret.bill_id()),
        "grn_id": opt_string(ret.receipt_id()),
        "reason": ret.reason(),
        "returned_at": ret.returned_at(),
        "items": ret.lines().iter()
            .map(|l| priced_line_to_json(l.product_id, l.quantity, l.rate, l.tax_percent))
            .collect::<Vec<_>>(),
        "totals": totals_to_json(&ret.totals()),
    })
}
