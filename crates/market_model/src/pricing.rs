//! Pricing engine: live probabilities and trade projections
//!
//! Probability of a side is its share of cumulative sales
//! (`side_sold / total_sold`), with a uniform 0.5 prior when no trade
//! history exists. Price equals probability under the 1-unit-payout-
//! per-share convention, so price is always in [0, 1].

use crate::state::{Market, Side};
use crate::ModelError;

/// Projection of a hypothetical purchase.
///
/// `estimated_shares` uses the simplifying 1 share = 1 minimal-unit
/// projection; the shift a large purchase causes in realized average
/// price is deliberately not modeled. The profit figure applies the
/// proportional-pool-split settlement rule to the post-trade pool, so
/// the number shown before a trade and the number paid on resolution
/// come from the same formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeProjection {
    /// Shares received for the spend, smallest currency unit
    pub estimated_shares: u64,
    /// Payout if the chosen side wins, after the trade lands
    pub projected_payout: u64,
    /// `projected_payout - spend`; negative when the pool cannot
    /// return the full spend even on a win
    pub projected_profit: i64,
}

/// Live probability of `side`, in [0, 1].
///
/// Display-only: payout math never goes through this float path.
pub fn quote(market: &Market, side: Side) -> f64 {
    let total = market.total_shares_sold();
    if total == 0 {
        return 0.5;
    }
    let p_yes = market.yes_shares_sold as f64 / total as f64;
    match side {
        Side::Yes => p_yes,
        Side::No => 1.0 - p_yes,
    }
}

/// Whole-percent display pair `(yes, no)`.
///
/// YES is rounded to the nearest point; NO is defined as `100 - yes`
/// rather than rounded independently, so the pair sums to 100.
pub fn display_percentages(market: &Market) -> (u8, u8) {
    // Round half up by hand; f64::round lives in std, not core
    let yes = (quote(market, Side::Yes) * 100.0 + 0.5) as u8;
    (yes, 100 - yes)
}

/// Project buying `spend` smallest currency units of `side`.
///
/// Rejects a zero spend and resolved markets outright; the caller must
/// surface the rejection instead of submitting the trade.
pub fn project_trade(
    market: &Market,
    side: Side,
    spend: u64,
) -> Result<TradeProjection, ModelError> {
    if spend == 0 {
        return Err(ModelError::InvalidInput);
    }
    if market.resolved {
        return Err(ModelError::MarketResolved);
    }

    let estimated_shares = spend;

    // Post-trade pool state if this purchase lands
    let winning_sold = market
        .shares_sold(side)
        .checked_add(spend)
        .ok_or(ModelError::Overflow)?;
    let pool = market
        .total_funds
        .checked_add(spend)
        .ok_or(ModelError::Overflow)?;

    // payout = shares * pool / winning_sold, in u128
    let payout_wide = (estimated_shares as u128)
        .checked_mul(pool as u128)
        .ok_or(ModelError::Overflow)?
        / winning_sold as u128;
    let projected_payout =
        u64::try_from(payout_wide).map_err(|_| ModelError::Overflow)?;

    let profit_wide = payout_wide as i128 - spend as i128;
    let projected_profit =
        i64::try_from(profit_wide).map_err(|_| ModelError::Overflow)?;

    Ok(TradeProjection {
        estimated_shares,
        projected_payout,
        projected_profit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MarketId;
    use crate::SCALE;
    use proptest::prelude::*;

    fn market(yes: u64, no: u64, funds: u64) -> Market {
        Market {
            id: MarketId([9; 32]),
            deadline_ms: 1_800_000_000_000,
            yes_shares_sold: yes,
            no_shares_sold: no,
            total_funds: funds,
            resolved: false,
            outcome: None,
        }
    }

    #[test]
    fn empty_market_is_even_odds() {
        let m = market(0, 0, 0);
        assert_eq!(quote(&m, Side::Yes), 0.5);
        assert_eq!(quote(&m, Side::No), 0.5);
        assert_eq!(display_percentages(&m), (50, 50));
    }

    #[test]
    fn three_to_one_market_prices_at_75() {
        let m = market(3_000_000, 1_000_000, 5_000_000);
        assert_eq!(quote(&m, Side::Yes), 0.75);
        assert_eq!(quote(&m, Side::No), 0.25);
        assert_eq!(display_percentages(&m), (75, 25));
    }

    #[test]
    fn ten_whole_units_project_to_ten_million_shares() {
        let m = market(3_000_000, 1_000_000, 5_000_000);
        let p = project_trade(&m, Side::Yes, 10 * SCALE).unwrap();
        assert_eq!(p.estimated_shares, 10_000_000);
    }

    #[test]
    fn projection_uses_post_trade_pool_split() {
        // 1M YES / 1M NO, pool 2M; buying 1M YES makes the pool 3M
        // against 2M winning shares: payout 1.5M, profit 0.5M.
        let m = market(1_000_000, 1_000_000, 2_000_000);
        let p = project_trade(&m, Side::Yes, 1_000_000).unwrap();
        assert_eq!(p.projected_payout, 1_500_000);
        assert_eq!(p.projected_profit, 500_000);
    }

    #[test]
    fn underfunded_pool_projects_a_loss() {
        // Fees drained the pool below the share count: even a win
        // returns less than the spend.
        let m = market(9_000_000, 0, 1_000_000);
        let p = project_trade(&m, Side::Yes, 1_000_000).unwrap();
        assert!(p.projected_payout < 1_000_000);
        assert!(p.projected_profit < 0);
    }

    #[test]
    fn zero_spend_is_rejected_not_clamped() {
        let m = market(1, 1, 2);
        assert_eq!(
            project_trade(&m, Side::Yes, 0).unwrap_err(),
            ModelError::InvalidInput
        );
    }

    #[test]
    fn resolved_market_rejects_projection() {
        let mut m = market(5, 5, 10);
        m.resolved = true;
        m.outcome = Some(Side::No);
        assert_eq!(
            project_trade(&m, Side::Yes, 100).unwrap_err(),
            ModelError::MarketResolved
        );
    }

    proptest! {
        #[test]
        fn percentages_always_sum_to_100(yes in 0u64..u64::MAX / 2, no in 0u64..u64::MAX / 2) {
            let m = market(yes, no, 0);
            let (y, n) = display_percentages(&m);
            prop_assert_eq!(y as u16 + n as u16, 100);
        }

        #[test]
        fn quotes_of_both_sides_sum_to_one(yes in 0u64..1_000_000_000u64, no in 0u64..1_000_000_000u64) {
            let m = market(yes, no, 0);
            let sum = quote(&m, Side::Yes) + quote(&m, Side::No);
            prop_assert!((sum - 1.0).abs() < 1e-9);
        }
    }
}
