//! Stock Adjuster (event-sourced).
//!
//! A `Product` stream owns on-hand stock and the last purchase cost. Stock
//! only moves through goods receipts (up) and supplier returns (down), and
//! never goes below zero.

pub mod product;

pub use product::{
    AdjustStock, Product, ProductCommand, ProductEvent, ProductId, ProductRegistered,
    RegisterProduct, StockAdjusted, StockMovement,
};
