//! Portfolio roll-up across markets
//!
//! Joins a user's open positions against live market snapshots and
//! produces the top-level totals: value locked in positions, total
//! account value and unrealized PnL. Read-time computation only;
//! nothing here is persisted.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::pricing;
use crate::settlement;
use crate::state::{Market, MarketId, Position, PositionId, Side};
use crate::ModelError;

/// One position joined with its market's live probability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionValuation {
    pub position_id: PositionId,
    pub market_id: MarketId,
    pub side: Side,
    pub shares: u64,
    /// Mark-to-probability value, smallest currency unit
    pub value: u64,
    /// Current price of the held side, in [0, 1] (display only)
    pub price: f64,
    pub cost_basis: Option<u64>,
    /// `value - cost_basis`; `None` when no cost basis was recorded
    pub pnl: Option<i64>,
    /// Percent return on cost; `None` without a positive cost basis
    pub pnl_percent: Option<f64>,
    pub resolved: bool,
    pub deadline_ms: u64,
}

/// Account-level totals over all valued positions
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    /// Unlocked balance, as reported by the caller
    pub available_balance: u64,
    /// Sum of mark-to-probability values of all valued positions
    pub in_positions_value: u64,
    /// `available_balance + in_positions_value`
    pub total_value: u64,
    /// Unrealized PnL over positions that carry a cost basis
    pub total_pnl: i64,
    /// Percent return over the summed cost basis, when positive
    pub total_pnl_percent: Option<f64>,
    /// Positions valued but excluded from the PnL sums (no cost basis)
    pub positions_without_cost_basis: usize,
    /// Positions dropped entirely (their market snapshot was absent)
    pub positions_skipped: usize,
    pub positions: Vec<PositionValuation>,
}

/// Roll up `positions` against `markets` into portfolio totals.
///
/// A position without a recorded cost basis is a PnL gap: its value
/// still counts toward `in_positions_value`, but it is excluded from
/// the PnL sums instead of being reported as a misleading 0% return.
/// Positions whose market is missing from `markets` are skipped.
pub fn aggregate_portfolio(
    positions: &[Position],
    markets: &BTreeMap<MarketId, Market>,
    available_balance: u64,
) -> Result<PortfolioSummary, ModelError> {
    let mut valuations = Vec::with_capacity(positions.len());
    let mut in_positions: u128 = 0;
    let mut cost_sum: u128 = 0;
    let mut pnl_sum: i128 = 0;
    let mut without_cost_basis = 0usize;
    let mut skipped = 0usize;

    for pos in positions {
        let market = match markets.get(&pos.market_id) {
            Some(m) => m,
            None => {
                skipped += 1;
                continue;
            }
        };

        let value = settlement::mark_to_market_value(pos, market)?;
        in_positions += value as u128;

        let (pnl, pnl_percent) = match pos.cost_basis {
            Some(cost) => {
                let pnl_wide = value as i128 - cost as i128;
                let pnl = i64::try_from(pnl_wide).map_err(|_| ModelError::Overflow)?;
                cost_sum += cost as u128;
                pnl_sum += pnl_wide;
                let percent = if cost > 0 {
                    Some(pnl as f64 / cost as f64 * 100.0)
                } else {
                    None
                };
                (Some(pnl), percent)
            }
            None => {
                without_cost_basis += 1;
                (None, None)
            }
        };

        valuations.push(PositionValuation {
            position_id: pos.id,
            market_id: pos.market_id,
            side: pos.side,
            shares: pos.shares,
            value,
            price: pricing::quote(market, pos.side),
            cost_basis: pos.cost_basis,
            pnl,
            pnl_percent,
            resolved: market.resolved,
            deadline_ms: market.deadline_ms,
        });
    }

    let in_positions_value =
        u64::try_from(in_positions).map_err(|_| ModelError::Overflow)?;
    let total_value = available_balance
        .checked_add(in_positions_value)
        .ok_or(ModelError::Overflow)?;
    let total_pnl = i64::try_from(pnl_sum).map_err(|_| ModelError::Overflow)?;
    let total_pnl_percent = if cost_sum > 0 {
        Some(pnl_sum as f64 / cost_sum as f64 * 100.0)
    } else {
        None
    };

    Ok(PortfolioSummary {
        available_balance,
        in_positions_value,
        total_value,
        total_pnl,
        total_pnl_percent,
        positions_without_cost_basis: without_cost_basis,
        positions_skipped: skipped,
        positions: valuations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(id_byte: u8, yes: u64, no: u64) -> Market {
        Market {
            id: MarketId([id_byte; 32]),
            deadline_ms: 1_750_000_000_000,
            yes_shares_sold: yes,
            no_shares_sold: no,
            total_funds: yes + no,
            resolved: false,
            outcome: None,
        }
    }

    fn position(
        id_byte: u8,
        market_byte: u8,
        side: Side,
        shares: u64,
        cost_basis: Option<u64>,
    ) -> Position {
        Position {
            id: PositionId([id_byte; 32]),
            market_id: MarketId([market_byte; 32]),
            side,
            shares,
            cost_basis,
        }
    }

    fn markets_by_id(markets: &[Market]) -> BTreeMap<MarketId, Market> {
        markets.iter().map(|m| (m.id, *m)).collect()
    }

    #[test]
    fn totals_add_up_across_markets() {
        let markets = markets_by_id(&[
            market(1, 3_000_000, 1_000_000), // YES at 0.75
            market(2, 1_000_000, 1_000_000), // either side at 0.50
        ]);
        let positions = [
            position(1, 1, Side::Yes, 1_000_000, Some(600_000)),
            position(2, 2, Side::No, 400_000, Some(250_000)),
        ];

        let summary = aggregate_portfolio(&positions, &markets, 2_000_000).unwrap();
        // 750_000 + 200_000 in positions
        assert_eq!(summary.in_positions_value, 950_000);
        assert_eq!(summary.total_value, 2_950_000);
        // (750k - 600k) + (200k - 250k)
        assert_eq!(summary.total_pnl, 100_000);
        let pct = summary.total_pnl_percent.unwrap();
        assert!((pct - 100_000.0 / 850_000.0 * 100.0).abs() < 1e-9);
        assert_eq!(summary.positions_without_cost_basis, 0);
        assert_eq!(summary.positions_skipped, 0);
    }

    #[test]
    fn missing_cost_basis_is_a_gap_not_a_zero_return() {
        let markets = markets_by_id(&[market(1, 1_000_000, 1_000_000)]);
        let positions = [
            position(1, 1, Side::Yes, 500_000, None),
            position(2, 1, Side::Yes, 500_000, Some(200_000)),
        ];

        let summary = aggregate_portfolio(&positions, &markets, 0).unwrap();
        // Both positions are valued...
        assert_eq!(summary.in_positions_value, 500_000);
        // ...but only the second contributes PnL.
        assert_eq!(summary.total_pnl, 50_000);
        assert_eq!(summary.positions_without_cost_basis, 1);
        assert_eq!(summary.positions[0].pnl, None);
        assert_eq!(summary.positions[0].pnl_percent, None);
    }

    #[test]
    fn positions_with_absent_markets_are_skipped() {
        let markets = markets_by_id(&[market(1, 10, 10)]);
        let positions = [
            position(1, 1, Side::Yes, 10, Some(5)),
            position(2, 9, Side::Yes, 10, Some(5)), // market 9 not fetched
        ];

        let summary = aggregate_portfolio(&positions, &markets, 0).unwrap();
        assert_eq!(summary.positions.len(), 1);
        assert_eq!(summary.positions_skipped, 1);
    }

    #[test]
    fn empty_portfolio_is_just_the_balance() {
        let summary =
            aggregate_portfolio(&[], &BTreeMap::new(), 1_234_567).unwrap();
        assert_eq!(summary.total_value, 1_234_567);
        assert_eq!(summary.in_positions_value, 0);
        assert_eq!(summary.total_pnl, 0);
        assert_eq!(summary.total_pnl_percent, None);
    }

    #[test]
    fn zero_cost_basis_still_counts_pnl_but_not_percent() {
        let markets = markets_by_id(&[market(1, 1_000_000, 1_000_000)]);
        let positions = [position(1, 1, Side::Yes, 100, Some(0))];

        let summary = aggregate_portfolio(&positions, &markets, 0).unwrap();
        assert_eq!(summary.positions[0].pnl, Some(50));
        assert_eq!(summary.positions[0].pnl_percent, None);
        assert_eq!(summary.total_pnl, 50);
        assert_eq!(summary.total_pnl_percent, None);
    }
}
