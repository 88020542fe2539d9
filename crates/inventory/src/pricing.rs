//! Cost, margin and tax arithmetic.
//!
//! Every monetary figure in the ledger is derived here. All functions are pure and
//! use decimal arithmetic; monetary outputs are rounded to 2 places, midpoint away
//! from zero.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult};

const MONEY_DP: u32 = 2;
const RATIO_DP: u32 = 4;

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

fn ensure_non_negative(value: Decimal, what: &str) -> DomainResult<()> {
    if value < Decimal::ZERO {
        return Err(DomainError::invalid_price(format!("{what} cannot be negative")));
    }
    Ok(())
}

/// Net/tax/gross split of a single price.
///
/// `net_price + tax_amount == gross_price` holds exactly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub net_price: Decimal,
    pub tax_amount: Decimal,
    pub gross_price: Decimal,
}

/// Inputs for a full price breakdown.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingInput {
    pub unit_price: Decimal,
    #[serde(default)]
    pub cost_price: Decimal,
    /// Percentage, e.g. `10` for 10%.
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub tax_inclusive: bool,
    #[serde(default)]
    pub tax_exempt: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub net_price: Decimal,
    pub tax_amount: Decimal,
    pub gross_price: Decimal,
    /// Fraction of the net price kept after cost; `None` when the net price is zero.
    pub margin: Option<Decimal>,
    /// Fraction of cost added on top; `None` when cost is zero.
    pub markup: Option<Decimal>,
}

/// `(unit_price - cost_price) / unit_price`, or `None` when `unit_price` is zero.
pub fn margin(unit_price: Decimal, cost_price: Decimal) -> DomainResult<Option<Decimal>> {
    ensure_non_negative(unit_price, "unit price")?;
    ensure_non_negative(cost_price, "cost price")?;
    if unit_price.is_zero() {
        return Ok(None);
    }
    ratio(unit_price, cost_price, unit_price)
        .map(Some)
        .ok_or_else(|| DomainError::invalid_price("margin overflows"))
}

/// `(unit_price - cost_price) / cost_price`, or `None` when `cost_price` is zero.
pub fn markup(unit_price: Decimal, cost_price: Decimal) -> DomainResult<Option<Decimal>> {
    ensure_non_negative(unit_price, "unit price")?;
    ensure_non_negative(cost_price, "cost price")?;
    if cost_price.is_zero() {
        return Ok(None);
    }
    ratio(unit_price, cost_price, cost_price)
        .map(Some)
        .ok_or_else(|| DomainError::invalid_price("markup overflows"))
}

fn ratio(unit_price: Decimal, cost_price: Decimal, base: Decimal) -> Option<Decimal> {
    unit_price
        .checked_sub(cost_price)?
        .checked_div(base)
        .map(|r| r.round_dp_with_strategy(RATIO_DP, RoundingStrategy::MidpointAwayFromZero))
}

/// `unit_cost * quantity`, rounded to cents.
pub fn total_cost(unit_cost: Decimal, quantity: u64) -> DomainResult<Decimal> {
    ensure_non_negative(unit_cost, "unit cost")?;
    unit_cost
        .checked_mul(Decimal::from(quantity))
        .map(round_money)
        .ok_or_else(|| DomainError::invalid_price("total cost overflows"))
}

/// Split a price into net/tax/gross.
///
/// - exclusive: `tax = price * rate / 100`, gross = price + tax
/// - inclusive: `tax = price * rate / (100 + rate)`, net = price - tax
/// - exempt: tax is zero and net == gross == price
pub fn apply_tax(
    unit_price: Decimal,
    tax_rate: Decimal,
    tax_inclusive: bool,
    tax_exempt: bool,
) -> DomainResult<TaxBreakdown> {
    ensure_non_negative(unit_price, "unit price")?;
    ensure_non_negative(tax_rate, "tax rate")?;

    let price = round_money(unit_price);
    if tax_exempt || tax_rate.is_zero() {
        return Ok(TaxBreakdown {
            net_price: price,
            tax_amount: Decimal::ZERO,
            gross_price: price,
        });
    }

    let overflow = || DomainError::invalid_price("tax computation overflows");
    let taxed = unit_price.checked_mul(tax_rate).ok_or_else(overflow)?;
    if tax_inclusive {
        let divisor = Decimal::ONE_HUNDRED
            .checked_add(tax_rate)
            .ok_or_else(overflow)?;
        let tax_amount = round_money(taxed.checked_div(divisor).ok_or_else(overflow)?);
        Ok(TaxBreakdown {
            net_price: price.checked_sub(tax_amount).ok_or_else(overflow)?,
            tax_amount,
            gross_price: price,
        })
    } else {
        let tax_amount = round_money(
            taxed
                .checked_div(Decimal::ONE_HUNDRED)
                .ok_or_else(overflow)?,
        );
        Ok(TaxBreakdown {
            net_price: price,
            tax_amount,
            gross_price: price.checked_add(tax_amount).ok_or_else(overflow)?,
        })
    }
}

/// Full pricing preview: tax split plus margin and markup on the net price.
pub fn breakdown(input: &PricingInput) -> DomainResult<PriceBreakdown> {
    let tax = apply_tax(
        input.unit_price,
        input.tax_rate,
        input.tax_inclusive,
        input.tax_exempt,
    )?;

    Ok(PriceBreakdown {
        net_price: tax.net_price,
        tax_amount: tax.tax_amount,
        gross_price: tax.gross_price,
        margin: margin(tax.net_price, input.cost_price)?,
        markup: markup(tax.net_price, input.cost_price)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn inclusive_tax_splits_gross_price() {
        let t = apply_tax(dec!(100), dec!(10), true, false).unwrap();
        assert_eq!(t.tax_amount, dec!(9.09));
        assert_eq!(t.net_price, dec!(90.91));
        assert_eq!(t.gross_price, dec!(100.00));
    }

    #[test]
    fn exclusive_tax_is_added_on_top() {
        let t = apply_tax(dec!(100), dec!(10), false, false).unwrap();
        assert_eq!(t.tax_amount, dec!(10.00));
        assert_eq!(t.gross_price, dec!(110.00));
    }

    #[test]
    fn exempt_short_circuits_tax() {
        let t = apply_tax(dec!(59.99), dec!(20), true, true).unwrap();
        assert_eq!(t.tax_amount, Decimal::ZERO);
        assert_eq!(t.net_price, dec!(59.99));
    }

    #[test]
    fn zero_price_has_no_margin() {
        assert_eq!(margin(Decimal::ZERO, dec!(5)).unwrap(), None);
        assert_eq!(margin(dec!(200), dec!(150)).unwrap(), Some(dec!(0.25)));
        assert_eq!(markup(dec!(150), Decimal::ZERO).unwrap(), None);
    }

    #[test]
    fn negative_inputs_are_invalid_price() {
        let err = apply_tax(dec!(-1), dec!(10), false, false).unwrap_err();
        assert_eq!(err.code(), "INVALID_PRICE");
        assert!(margin(dec!(10), dec!(-3)).is_err());
        assert!(total_cost(dec!(-0.01), 3).is_err());
    }

    #[test]
    fn total_cost_multiplies_and_rounds() {
        assert_eq!(total_cost(dec!(2.505), 2).unwrap(), dec!(5.01));
        assert_eq!(total_cost(dec!(12.50), 0).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn breakdown_uses_net_price_for_margin() {
        let b = breakdown(&PricingInput {
            unit_price: dec!(110),
            cost_price: dec!(50),
            tax_rate: dec!(10),
            tax_inclusive: true,
            tax_exempt: false,
        })
        .unwrap();
        assert_eq!(b.net_price, dec!(100.00));
        assert_eq!(b.margin, Some(dec!(0.5)));
        assert_eq!(b.markup, Some(dec!(1)));
    }

    #[test]
    fn oversized_prices_are_rejected_not_panicked() {
        let err = apply_tax(Decimal::MAX, dec!(10), false, false).unwrap_err();
        assert_eq!(err.code(), "INVALID_PRICE");
        assert!(apply_tax(Decimal::MAX, dec!(10), true, false).is_err());
        assert_eq!(
            apply_tax(Decimal::MAX, dec!(10), false, true).unwrap().gross_price,
            Decimal::MAX
        );
    }

    #[test]
    fn tiny_cost_price_overflows_markup() {
        let err = markup(dec!(1000000000000), Decimal::new(1, 28)).unwrap_err();
        assert_eq!(err.code(), "INVALID_PRICE");

        let err = breakdown(&PricingInput {
            unit_price: dec!(1000000000000),
            cost_price: Decimal::new(1, 28),
            tax_rate: Decimal::ZERO,
            tax_inclusive: false,
            tax_exempt: false,
        })
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_PRICE");
    }

    proptest! {
        /// Property: the rounded split always adds back up to the gross price.
        #[test]
        fn net_plus_tax_equals_gross(
            cents in 0i64..10_000_000i64,
            rate_bp in 0i64..5_000i64,
            inclusive in any::<bool>(),
        ) {
            let price = Decimal::new(cents, 2);
            let rate = Decimal::new(rate_bp, 2);
            let t = apply_tax(price, rate, inclusive, false).unwrap();
            prop_assert_eq!(t.net_price + t.tax_amount, t.gross_price);
            prop_assert!(t.tax_amount >= Decimal::ZERO);
        }
    }
}
