//! Line, document and settlement arithmetic.

use serde::{Deserialize, Serialize};

use shopledger_core::{DomainError, DomainResult, ValueObject};

use crate::money::{Money, TaxPercent};

/// Anything with a quantity, a rate and a tax percent (bill and return lines).
pub trait Priced {
    fn quantity(&self) -> i64;
    fn rate(&self) -> Money;
    fn tax_percent(&self) -> TaxPercent;
}

/// Amounts of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub net: Money,
    pub tax: Money,
    pub gross: Money,
}

/// `net = quantity × rate`, `tax = net × tax% / 100`, `gross = net + tax`.
pub fn line_amounts(quantity: i64, rate: Money, tax: TaxPercent) -> DomainResult<LineAmounts> {
    let net = rate.checked_times(quantity)?;
    let tax = tax.of(net)?;
    let gross = net.checked_add(tax)?;
    Ok(LineAmounts { net, tax, gross })
}

/// Computed totals of a priced document (bill or debit note).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: Money,
    pub tax_total: Money,
    pub total_amount: Money,
}

impl ValueObject for DocumentTotals {}

impl DocumentTotals {
    /// Sum every line exactly; nothing is rounded along the way.
    pub fn compute<'a, L, I>(lines: I) -> DomainResult<Self>
    where
        L: Priced + 'a,
        I: IntoIterator<Item = &'a L>,
    {
        let mut subtotal = Money::ZERO;
        let mut tax_total = Money::ZERO;
        for line in lines {
            let amounts = line_amounts(line.quantity(), line.rate(), line.tax_percent())?;
            subtotal = subtotal.checked_add(amounts.net)?;
            tax_total = tax_total.checked_add(amounts.tax)?;
        }
        let total_amount = subtotal.checked_add(tax_total)?;
        Ok(Self {
            subtotal,
            tax_total,
            total_amount,
        })
    }
}

/// Outstanding balance of a bill.
///
/// `due_amount` is signed: a negative value means the supplier owes us, and
/// `credit_balance` carries its magnitude. The due amount is never clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub due_amount: Money,
    pub credit_balance: Money,
}

impl Settlement {
    pub fn of(total: Money, returned: Money, paid: Money) -> DomainResult<Self> {
        let due_amount = total.checked_sub(returned)?.checked_sub(paid)?;
        let credit_balance = if due_amount.is_negative() {
            due_amount.abs()
        } else {
            Money::ZERO
        };
        Ok(Self {
            due_amount,
            credit_balance,
        })
    }

    /// What can still be paid: the due amount, or zero when in credit.
    pub fn payable(&self) -> Money {
        if self.due_amount.is_negative() {
            Money::ZERO
        } else {
            self.due_amount
        }
    }

    pub fn has_credit(&self) -> bool {
        self.credit_balance.is_positive()
    }
}

/// Value of `stock` units at `unit_cost`.
pub fn stock_value(stock: i64, unit_cost: Money) -> DomainResult<Money> {
    if stock < 0 {
        return Err(DomainError::invariant("stock cannot be negative"));
    }
    unit_cost.checked_times(stock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[derive(Debug, Clone)]
    struct Line {
        quantity: i64,
        rate: Money,
        tax: TaxPercent,
    }

    impl Priced for Line {
        fn quantity(&self) -> i64 {
            self.quantity
        }

        fn rate(&self) -> Money {
            self.rate
        }

        fn tax_percent(&self) -> TaxPercent {
            self.tax
        }
    }

    fn line(quantity: i64, rate: i64, tax: Decimal) -> Line {
        Line {
            quantity,
            rate: Money::from_minor(rate),
            tax: TaxPercent::new(tax).unwrap(),
        }
    }

    #[test]
    fn totals_add_tax_per_line() {
        let lines = vec![line(2, 250, dec!(18)), line(1, 500, dec!(0))];
        let totals = DocumentTotals::compute(&lines).unwrap();

        assert_eq!(totals.subtotal, Money::from_minor(1000));
        assert_eq!(totals.tax_total, Money::from_minor(90));
        assert_eq!(totals.total_amount, Money::from_minor(1090));
    }

    #[test]
    fn fractional_tax_is_not_rounded_per_line() {
        // 3 lines of 1 × 1 at 12.5% = 0.125 each; rounding per line would give 0.
        let lines = vec![line(1, 1, dec!(12.5)); 3];
        let totals = DocumentTotals::compute(&lines).unwrap();

        assert_eq!(totals.tax_total, Money::new(dec!(0.375)));
        assert_eq!(totals.total_amount.to_minor_units(), 3);
    }

    #[test]
    fn settlement_surfaces_credit_instead_of_clamping() {
        let s = Settlement::of(
            Money::from_minor(1000),
            Money::from_minor(200),
            Money::from_minor(1000),
        )
        .unwrap();

        assert_eq!(s.due_amount, Money::from_minor(-200));
        assert_eq!(s.credit_balance, Money::from_minor(200));
        assert_eq!(s.payable(), Money::ZERO);
        assert!(s.has_credit());
    }

    #[test]
    fn stock_value_rejects_negative_stock() {
        assert_eq!(
            stock_value(4, Money::from_minor(125)).unwrap(),
            Money::from_minor(500)
        );
        assert!(stock_value(-1, Money::from_minor(1)).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the document total equals the exact sum of per-line gross
        /// amounts, whatever the order or count of lines.
        #[test]
        fn total_is_exact_sum_of_line_gross(
            raw in prop::collection::vec((1i64..1_000, 0i64..100_000, 0u32..=10_000), 1..40)
        ) {
            let lines: Vec<Line> = raw
                .iter()
                .map(|(q, r, bp)| line(*q, *r, Decimal::new(*bp as i64, 2)))
                .collect();

            let totals = DocumentTotals::compute(&lines).unwrap();
            let gross: Money = lines
                .iter()
                .map(|l| line_amounts(l.quantity, l.rate, l.tax).unwrap().gross)
                .sum();

            prop_assert_eq!(totals.total_amount, gross);
            prop_assert_eq!(totals.total_amount, totals.subtotal + totals.tax_total);

            let mut reversed = lines.clone();
            reversed.reverse();
            prop_assert_eq!(DocumentTotals::compute(&reversed).unwrap(), totals);
        }

        /// Property: due == total − returned − paid, and a credit balance is
        /// reported exactly when the due amount is negative.
        #[test]
        fn settlement_is_consistent(
            total in 0i64..1_000_000,
            returned in 0i64..1_000_000,
            paid in 0i64..1_000_000,
        ) {
            let s = Settlement::of(
                Money::from_minor(total),
                Money::from_minor(returned),
                Money::from_minor(paid),
            ).unwrap();

            prop_assert_eq!(s.due_amount, Money::from_minor(total - returned - paid));
            prop_assert_eq!(s.has_credit(), s.due_amount.is_negative());
            prop_assert_eq!(s.due_amount + s.credit_balance, s.payable());
        }
    }
}
