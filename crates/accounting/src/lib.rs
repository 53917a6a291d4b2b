//! Ledger arithmetic shared by every purchase document.
//!
//! Pure functions over exact decimal amounts: line totals, tax, document
//! totals, settlement (due / credit balance) and stock valuation. Amounts are
//! denominated in the smallest currency subunit and are never rounded here;
//! rounding happens only when a value is presented.

pub mod money;
pub mod totals;

pub use money::{Money, TaxPercent};
pub use totals::{DocumentTotals, LineAmounts, Priced, Settlement, line_amounts, stock_value};
