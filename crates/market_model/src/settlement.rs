//! Settlement and payout calculation
//!
//! The authoritative settlement rule is the proportional pool split:
//! a winner receives `shares / winning_shares_sold` of the pooled
//! funds. Winner payouts drain `total_funds` exactly, with no
//! shortfall when the pool holds less than one unit per share and no
//! surplus when it holds more. The "one currency unit per winning
//! share" convention is implemented nowhere in this crate.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use crate::state::{Market, Position, PositionId};
use crate::ModelError;

/// Display-only value of an open position at live probability:
/// `floor(shares * side_sold / total_sold)`, half the shares on the
/// empty market. Never used for a binding payout.
pub fn mark_to_market_value(
    position: &Position,
    market: &Market,
) -> Result<u64, ModelError> {
    if position.market_id != market.id {
        return Err(ModelError::MarketMismatch);
    }

    let total = market.total_shares_sold();
    if total == 0 {
        return Ok(position.shares / 2);
    }

    let side_sold = market.shares_sold(position.side);
    let value = (position.shares as u128)
        .checked_mul(side_sold as u128)
        .ok_or(ModelError::Overflow)?
        / total as u128;
    u64::try_from(value).map_err(|_| ModelError::Overflow)
}

/// Proceeds of selling `shares_to_sell` back at live probability,
/// mirroring the buy-side approximation. Rejects zero quantity,
/// over-selling and resolved markets.
pub fn sell_proceeds(
    position: &Position,
    market: &Market,
    shares_to_sell: u64,
) -> Result<u64, ModelError> {
    if position.market_id != market.id {
        return Err(ModelError::MarketMismatch);
    }
    if shares_to_sell == 0 {
        return Err(ModelError::InvalidInput);
    }
    if market.resolved {
        return Err(ModelError::MarketResolved);
    }
    if shares_to_sell > position.shares {
        return Err(ModelError::InsufficientShares);
    }

    let sold = Position {
        shares: shares_to_sell,
        ..*position
    };
    mark_to_market_value(&sold, market)
}

/// Payout of a single position on a resolved market.
///
/// Requires a snapshot taken at or after the resolution event;
/// `resolved == false` means the caller raced the resolve and the
/// computation is refused. A losing position settles to exactly 0.
pub fn settle(position: &Position, market: &Market) -> Result<u64, ModelError> {
    if position.market_id != market.id {
        return Err(ModelError::MarketMismatch);
    }
    if !market.resolved {
        return Err(ModelError::MarketNotResolved);
    }
    // Resolved markets always carry an outcome; a snapshot without one
    // is corrupt.
    let winning_side = market.outcome.ok_or(ModelError::InvalidInput)?;

    if position.side != winning_side {
        return Ok(0);
    }

    let winning_sold = market.shares_sold(winning_side);
    if winning_sold == 0 || position.shares > winning_sold {
        return Err(ModelError::InvalidInput);
    }

    let payout = (position.shares as u128)
        .checked_mul(market.total_funds as u128)
        .ok_or(ModelError::Overflow)?
        / winning_sold as u128;
    u64::try_from(payout).map_err(|_| ModelError::Overflow)
}

/// Settle every position of a resolved market at once, draining the
/// pool exactly.
///
/// `positions` must cover the entire winning side (the sum of winning
/// shares must equal the market's winning share count). Per-position
/// payouts are floored and the remainder (at most winners-1 units) is
/// distributed one unit each to the largest fractional remainders,
/// ties broken by ascending position id. Losing positions appear in
/// the result with payout 0.
pub fn settle_all(
    positions: &[Position],
    market: &Market,
) -> Result<Vec<(PositionId, u64)>, ModelError> {
    if !market.resolved {
        return Err(ModelError::MarketNotResolved);
    }
    let winning_side = market.outcome.ok_or(ModelError::InvalidInput)?;
    let winning_sold = market.shares_sold(winning_side);
    if winning_sold == 0 {
        return Err(ModelError::EmptyWinnerSide);
    }

    let mut covered: u64 = 0;
    for pos in positions {
        if pos.market_id != market.id {
            return Err(ModelError::MarketMismatch);
        }
        if pos.side == winning_side {
            covered = covered
                .checked_add(pos.shares)
                .ok_or(ModelError::Overflow)?;
        }
    }
    if covered != winning_sold {
        return Err(ModelError::InvalidInput);
    }

    let funds = market.total_funds as u128;
    let divisor = winning_sold as u128;
    let mut payouts: Vec<(PositionId, u64)> = Vec::with_capacity(positions.len());
    // (remainder, id, index into payouts) for the leftover pass
    let mut remainders: Vec<(u128, PositionId, usize)> = Vec::new();
    let mut distributed: u128 = 0;

    for pos in positions {
        if pos.side != winning_side {
            payouts.push((pos.id, 0));
            continue;
        }
        let numerator = (pos.shares as u128)
            .checked_mul(funds)
            .ok_or(ModelError::Overflow)?;
        let base = numerator / divisor;
        let base_u64 = u64::try_from(base).map_err(|_| ModelError::Overflow)?;
        distributed += base;
        remainders.push((numerator % divisor, pos.id, payouts.len()));
        payouts.push((pos.id, base_u64));
    }

    let mut leftover = funds - distributed;
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, _, idx) in remainders {
        if leftover == 0 {
            break;
        }
        payouts[idx].1 = payouts[idx]
            .1
            .checked_add(1)
            .ok_or(ModelError::Overflow)?;
        leftover -= 1;
    }

    // Runtime guard on the conservation invariant; must never fire.
    let total: u128 = payouts.iter().map(|(_, p)| *p as u128).sum();
    if total != funds {
        return Err(ModelError::PoolConservationViolation);
    }

    Ok(payouts)
}

/// Claim and sell bookkeeping over one owner's positions.
///
/// Transitions mirror the contract's lifecycle: a partial sell reduces
/// a position, a full sell consumes it, and a claim consumes a winning
/// position exactly once; a second claim of the same id fails rather
/// than silently paying twice. On any error the book is unchanged.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    open: BTreeMap<PositionId, Position>,
    claimed: BTreeSet<PositionId>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions<I: IntoIterator<Item = Position>>(positions: I) -> Self {
        let mut book = Self::new();
        for pos in positions {
            book.open.insert(pos.id, pos);
        }
        book
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.open.get(&id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    fn lookup(&self, id: PositionId) -> Result<&Position, ModelError> {
        if let Some(pos) = self.open.get(&id) {
            return Ok(pos);
        }
        if self.claimed.contains(&id) {
            Err(ModelError::AlreadyClaimed)
        } else {
            Err(ModelError::PositionNotFound)
        }
    }

    /// Reduce a position by `shares_to_sell`, returning the proceeds.
    /// A position sold down to zero shares is removed.
    pub fn apply_partial_sell(
        &mut self,
        id: PositionId,
        market: &Market,
        shares_to_sell: u64,
    ) -> Result<u64, ModelError> {
        let pos = self.lookup(id)?;
        let proceeds = sell_proceeds(pos, market, shares_to_sell)?;

        let remaining = pos.shares - shares_to_sell;
        if remaining == 0 {
            self.open.remove(&id);
        } else if let Some(pos) = self.open.get_mut(&id) {
            pos.shares = remaining;
        }
        Ok(proceeds)
    }

    /// Sell the entire position, consuming it.
    pub fn apply_full_sell(
        &mut self,
        id: PositionId,
        market: &Market,
    ) -> Result<u64, ModelError> {
        let pos = self.lookup(id)?;
        let proceeds = sell_proceeds(pos, market, pos.shares)?;
        self.open.remove(&id);
        Ok(proceeds)
    }

    /// Claim a winning position's payout, consuming it. Losing
    /// positions are not claimable and stay in the book untouched.
    pub fn apply_claim(
        &mut self,
        id: PositionId,
        market: &Market,
    ) -> Result<u64, ModelError> {
        let pos = self.lookup(id)?;
        let payout = settle(pos, market)?;
        if !pos.is_winner(market) {
            return Err(ModelError::NothingToClaim);
        }

        self.open.remove(&id);
        self.claimed.insert(id);
        Ok(payout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MarketId, Side};
    use proptest::prelude::*;

    fn market_id() -> MarketId {
        MarketId([4; 32])
    }

    fn resolved_market(yes: u64, no: u64, funds: u64, outcome: Side) -> Market {
        Market {
            id: market_id(),
            deadline_ms: 1_700_000_000_000,
            yes_shares_sold: yes,
            no_shares_sold: no,
            total_funds: funds,
            resolved: true,
            outcome: Some(outcome),
        }
    }

    fn open_market(yes: u64, no: u64, funds: u64) -> Market {
        Market {
            resolved: false,
            outcome: None,
            ..resolved_market(yes, no, funds, Side::Yes)
        }
    }

    fn position(id_byte: u8, side: Side, shares: u64) -> Position {
        Position {
            id: PositionId([id_byte; 32]),
            market_id: market_id(),
            side,
            shares,
            cost_basis: None,
        }
    }

    #[test]
    fn proportional_split_matches_worked_example() {
        // 3M YES vs 1M NO, 5M pooled, resolved YES: 300k shares claim
        // 300k/3M of the pool = 500k units.
        let market = resolved_market(3_000_000, 1_000_000, 5_000_000, Side::Yes);
        let winner = position(1, Side::Yes, 300_000);
        assert_eq!(settle(&winner, &market).unwrap(), 500_000);

        let loser = position(2, Side::No, 1_000_000);
        assert_eq!(settle(&loser, &market).unwrap(), 0);
    }

    #[test]
    fn settle_refuses_pre_resolution_snapshot() {
        let market = open_market(10, 10, 20);
        let pos = position(1, Side::Yes, 10);
        assert_eq!(settle(&pos, &market).unwrap_err(), ModelError::MarketNotResolved);
    }

    #[test]
    fn settle_rejects_foreign_market() {
        let mut market = resolved_market(10, 0, 10, Side::Yes);
        market.id = MarketId([7; 32]);
        let pos = position(1, Side::Yes, 10);
        assert_eq!(settle(&pos, &market).unwrap_err(), ModelError::MarketMismatch);
    }

    #[test]
    fn settle_all_drains_pool_exactly_with_remainder() {
        // 3 winners x 1 share, 10 units pooled: floors are 3/3/3 and
        // the leftover unit goes to the lowest position id (all
        // remainders tie).
        let market = resolved_market(3, 5, 10, Side::Yes);
        let positions = [
            position(1, Side::Yes, 1),
            position(2, Side::Yes, 1),
            position(3, Side::Yes, 1),
            position(4, Side::No, 5),
        ];
        let payouts = settle_all(&positions, &market).unwrap();
        let total: u64 = payouts.iter().map(|(_, p)| p).sum();
        assert_eq!(total, 10);
        assert_eq!(payouts[0].1, 4);
        assert_eq!(payouts[1].1, 3);
        assert_eq!(payouts[2].1, 3);
        assert_eq!(payouts[3].1, 0);
    }

    #[test]
    fn settle_all_requires_full_winning_coverage() {
        let market = resolved_market(10, 0, 10, Side::Yes);
        let partial = [position(1, Side::Yes, 4)];
        assert_eq!(
            settle_all(&partial, &market).unwrap_err(),
            ModelError::InvalidInput
        );
    }

    #[test]
    fn settle_all_rejects_empty_winning_side() {
        let market = resolved_market(0, 8, 8, Side::Yes);
        assert_eq!(
            settle_all(&[], &market).unwrap_err(),
            ModelError::EmptyWinnerSide
        );
    }

    #[test]
    fn mark_to_market_tracks_probability() {
        let market = open_market(3_000_000, 1_000_000, 5_000_000);
        let yes = position(1, Side::Yes, 1_000_000);
        let no = position(2, Side::No, 1_000_000);
        assert_eq!(mark_to_market_value(&yes, &market).unwrap(), 750_000);
        assert_eq!(mark_to_market_value(&no, &market).unwrap(), 250_000);

        let empty = open_market(0, 0, 0);
        let mut pos = yes;
        pos.shares = 10;
        assert_eq!(mark_to_market_value(&pos, &empty).unwrap(), 5);
    }

    #[test]
    fn partial_sell_reduces_then_removes() {
        let market = open_market(1_000_000, 1_000_000, 2_000_000);
        let mut book = PositionBook::from_positions([position(1, Side::Yes, 100)]);
        let id = PositionId([1; 32]);

        let proceeds = book.apply_partial_sell(id, &market, 60).unwrap();
        assert_eq!(proceeds, 30); // 60 shares at probability 0.5
        assert_eq!(book.get(id).unwrap().shares, 40);

        book.apply_partial_sell(id, &market, 40).unwrap();
        assert!(book.get(id).is_none());
    }

    #[test]
    fn overselling_is_rejected_and_book_unchanged() {
        let market = open_market(10, 10, 20);
        let mut book = PositionBook::from_positions([position(1, Side::Yes, 5)]);
        let id = PositionId([1; 32]);
        assert_eq!(
            book.apply_partial_sell(id, &market, 6).unwrap_err(),
            ModelError::InsufficientShares
        );
        assert_eq!(book.get(id).unwrap().shares, 5);
    }

    #[test]
    fn selling_on_resolved_market_is_rejected() {
        let market = resolved_market(10, 10, 20, Side::Yes);
        let mut book = PositionBook::from_positions([position(1, Side::Yes, 5)]);
        assert_eq!(
            book.apply_full_sell(PositionId([1; 32]), &market).unwrap_err(),
            ModelError::MarketResolved
        );
    }

    #[test]
    fn second_claim_fails_without_double_payout() {
        let market = resolved_market(100, 50, 150, Side::Yes);
        let mut book = PositionBook::from_positions([position(1, Side::Yes, 100)]);
        let id = PositionId([1; 32]);

        assert_eq!(book.apply_claim(id, &market).unwrap(), 150);
        assert_eq!(
            book.apply_claim(id, &market).unwrap_err(),
            ModelError::AlreadyClaimed
        );
    }

    #[test]
    fn unknown_position_claim_is_not_found() {
        let market = resolved_market(100, 50, 150, Side::Yes);
        let mut book = PositionBook::new();
        assert_eq!(
            book.apply_claim(PositionId([9; 32]), &market).unwrap_err(),
            ModelError::PositionNotFound
        );
    }

    #[test]
    fn losing_claim_is_refused_and_position_survives() {
        let market = resolved_market(100, 50, 150, Side::No);
        let mut book = PositionBook::from_positions([position(1, Side::Yes, 100)]);
        let id = PositionId([1; 32]);
        assert_eq!(
            book.apply_claim(id, &market).unwrap_err(),
            ModelError::NothingToClaim
        );
        assert!(book.get(id).is_some());
    }

    proptest! {
        #[test]
        fn pool_conservation_holds_for_any_split(
            shares in proptest::collection::vec(1u64..=1_000_000, 1..12),
            funds in 0u64..=10_000_000_000,
            losing in 0u64..=1_000_000,
        ) {
            let winning_total: u64 = shares.iter().sum();
            let market = resolved_market(winning_total, losing, funds, Side::Yes);

            let mut positions: Vec<Position> = shares
                .iter()
                .enumerate()
                .map(|(i, &s)| position(i as u8 + 1, Side::Yes, s))
                .collect();
            if losing > 0 {
                positions.push(position(200, Side::No, losing));
            }

            let payouts = settle_all(&positions, &market).unwrap();
            let total: u128 = payouts.iter().map(|(_, p)| *p as u128).sum();
            prop_assert_eq!(total, funds as u128);

            // No winner is ever paid more than one extra unit over its
            // floored proportional share.
            for (pos, (_, payout)) in positions.iter().zip(payouts.iter()) {
                if pos.side == Side::Yes {
                    let floor = (pos.shares as u128 * funds as u128) / winning_total as u128;
                    prop_assert!((*payout as u128) >= floor);
                    prop_assert!((*payout as u128) <= floor + 1);
                }
            }
        }
    }
}
