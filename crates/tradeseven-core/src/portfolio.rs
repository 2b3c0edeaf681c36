//! Portfolio construction and validation.
//!
//! A portfolio is built from percentage allocations over a fixed notional
//! of $1,000,000:
//!
//! ```text
//! amount = percentage / 100 * 1_000_000
//! ```
//!
//! Shape rules: 7..=13 assets, each allocation in [7.5, 20] percent and the
//! allocations summing to 100 within 0.01. On top of the shape, a portfolio
//! must be homogeneous (all stocks or all crypto) and free of duplicates.

use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::asset::{AssetClass, PortfolioAsset};
use crate::error::PortfolioError;

/// Notional portfolio size in dollars.
pub const NOTIONAL: Decimal = dec!(1000000);
pub const MIN_ASSETS: usize = 7;
pub const MAX_ASSETS: usize = 13;
pub const MIN_ALLOCATION: Decimal = dec!(7.5);
pub const MAX_ALLOCATION: Decimal = dec!(20);
pub const SUM_TOLERANCE: Decimal = dec!(0.01);

/// A percentage allocation picked in the portfolio builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub symbol: String,
    pub name: String,
    pub asset_class: AssetClass,
    /// Quote at the time the asset was added.
    pub price: Decimal,
    pub percentage: Decimal,
}

impl Allocation {
    pub fn amount(&self) -> Decimal {
        self.percentage / dec!(100) * NOTIONAL
    }
}

/// Shape check only: asset count, per-asset range and total.
pub fn is_portfolio_valid(allocations: &[Allocation]) -> bool {
    check_shape(allocations).is_ok()
}

fn check_shape(allocations: &[Allocation]) -> Result<(), PortfolioError> {
    let count = allocations.len();
    if count < MIN_ASSETS {
        return Err(PortfolioError::TooFewAssets { count, min: MIN_ASSETS });
    }
    if count > MAX_ASSETS {
        return Err(PortfolioError::TooManyAssets { count, max: MAX_ASSETS });
    }

    if let Some(a) = allocations
        .iter()
        .find(|a| a.percentage < MIN_ALLOCATION || a.percentage > MAX_ALLOCATION)
    {
        return Err(PortfolioError::AllocationOutOfRange {
            symbol: a.symbol.clone(),
            percentage: a.percentage,
            min: MIN_ALLOCATION,
            max: MAX_ALLOCATION,
        });
    }

    let total: Decimal = allocations.iter().map(|a| a.percentage).sum();
    if (total - dec!(100)).abs() >= SUM_TOLERANCE {
        return Err(PortfolioError::AllocationSum { total });
    }

    Ok(())
}

/// Full validation. Returns the portfolio's asset class.
pub fn validate_allocations(allocations: &[Allocation]) -> Result<AssetClass, PortfolioError> {
    check_shape(allocations)?;

    let mut seen = HashSet::new();
    for a in allocations {
        if !seen.insert(a.symbol.as_str()) {
            return Err(PortfolioError::DuplicateAsset(a.symbol.clone()));
        }
    }

    // check_shape guarantees at least MIN_ASSETS entries
    let class = allocations[0].asset_class;
    if allocations.iter().any(|a| a.asset_class != class) {
        return Err(PortfolioError::MixedAssetClasses);
    }

    Ok(class)
}

/// Validate allocations and convert them to dollar positions.
pub fn build_portfolio(allocations: &[Allocation]) -> Result<Vec<PortfolioAsset>, PortfolioError> {
    validate_allocations(allocations)?;

    Ok(allocations
        .iter()
        .map(|a| PortfolioAsset {
            symbol: a.symbol.clone(),
            name: a.name.clone(),
            asset_class: a.asset_class,
            price: a.price,
            amount: a.amount(),
        })
        .collect())
}

/// Asset class of an already-built portfolio (taken from its first asset).
pub fn portfolio_class(portfolio: &[PortfolioAsset]) -> Option<AssetClass> {
    portfolio.first().map(|a| a.asset_class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alloc(symbol: &str, percentage: Decimal) -> Allocation {
        Allocation {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            asset_class: AssetClass::Stock,
            price: dec!(100),
            percentage,
        }
    }

    fn even(n: usize) -> Vec<Allocation> {
        let pct = dec!(100) / Decimal::from(n as u64);
        (0..n).map(|i| alloc(&format!("S{}", i), pct)).collect()
    }

    #[test]
    fn test_seven_even_allocations_are_valid() {
        // 100/7 repeats, but the sum stays within tolerance
        let allocs = even(7);
        assert!(is_portfolio_valid(&allocs));
        assert_eq!(validate_allocations(&allocs), Ok(AssetClass::Stock));
    }

    #[test]
    fn test_too_few_and_too_many() {
        assert!(matches!(
            validate_allocations(&even(6)),
            Err(PortfolioError::TooFewAssets { count: 6, .. })
        ));
        let mut many = even(10);
        many.extend(even(4).into_iter().map(|mut a| {
            a.symbol.push('X');
            a
        }));
        assert!(matches!(
            validate_allocations(&many),
            Err(PortfolioError::TooManyAssets { count: 14, .. })
        ));
    }

    #[test]
    fn test_allocation_bounds_are_inclusive() {
        // 6 x 15 + 10 = 100, all in range
        let mut allocs: Vec<_> = (0..6).map(|i| alloc(&format!("A{}", i), dec!(15))).collect();
        allocs.push(alloc("B", dec!(10)));
        assert!(is_portfolio_valid(&allocs));

        // 20 x 4 + 7.5 x 2 + 5 would break the minimum
        let mut low: Vec<_> = (0..4).map(|i| alloc(&format!("A{}", i), dec!(20))).collect();
        low.push(alloc("B", dec!(7.5)));
        low.push(alloc("C", dec!(7.5)));
        low.push(alloc("D", dec!(5)));
        assert!(matches!(
            validate_allocations(&low),
            Err(PortfolioError::AllocationOutOfRange { .. })
        ));
    }

    #[test]
    fn test_sum_must_be_100() {
        let allocs: Vec<_> = (0..7).map(|i| alloc(&format!("A{}", i), dec!(10))).collect();
        assert!(matches!(
            validate_allocations(&allocs),
            Err(PortfolioError::AllocationSum { .. })
        ));
    }

    #[test]
    fn test_mixed_classes_rejected() {
        let mut allocs = even(10);
        allocs[3].asset_class = AssetClass::Crypto;
        // shape is fine, class mix is not
        assert!(is_portfolio_valid(&allocs));
        assert_eq!(validate_allocations(&allocs), Err(PortfolioError::MixedAssetClasses));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut allocs = even(10);
        allocs[1].symbol = allocs[0].symbol.clone();
        assert!(matches!(
            validate_allocations(&allocs),
            Err(PortfolioError::DuplicateAsset(_))
        ));
    }

    #[test]
    fn test_build_converts_to_dollars() {
        let mut allocs: Vec<_> = (0..6).map(|i| alloc(&format!("A{}", i), dec!(15))).collect();
        allocs.push(alloc("B", dec!(10)));
        let portfolio = build_portfolio(&allocs).unwrap();
        assert_eq!(portfolio[0].amount, dec!(150000));
        assert_eq!(portfolio[6].amount, dec!(100000));
        let total: Decimal = portfolio.iter().map(|a| a.amount).sum();
        assert_eq!(total, NOTIONAL);
    }

    proptest! {
        #[test]
        fn prop_validity_matches_shape_rules(
            tenths in proptest::collection::vec(50u32..=250, 5..=15)
        ) {
            let allocs: Vec<_> = tenths
                .iter()
                .enumerate()
                .map(|(i, t)| alloc(&format!("P{}", i), Decimal::new(*t as i64, 1)))
                .collect();
            let total: Decimal = allocs.iter().map(|a| a.percentage).sum();
            let expected = allocs.len() >= MIN_ASSETS
                && allocs.len() <= MAX_ASSETS
                && allocs.iter().all(|a| a.percentage >= MIN_ALLOCATION && a.percentage <= MAX_ALLOCATION)
                && (total - dec!(100)).abs() < SUM_TOLERANCE;
            prop_assert_eq!(is_portfolio_valid(&allocs), expected);
        }
    }
}
