//! Market and position snapshot types

/// Opaque market identifier (an on-chain address, as raw bytes)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarketId(pub [u8; 32]);

/// Opaque position identifier, owned by exactly one user address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionId(pub [u8; 32]);

impl core::fmt::Debug for MarketId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "MarketId({:02x}{:02x}..{:02x})", self.0[0], self.0[1], self.0[31])
    }
}

impl core::fmt::Debug for PositionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PositionId({:02x}{:02x}..{:02x})", self.0[0], self.0[1], self.0[31])
    }
}

/// One side of a binary outcome market
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }

    /// The contract encodes sides as a bool (`true` = YES)
    pub fn from_is_yes(is_yes: bool) -> Side {
        if is_yes {
            Side::Yes
        } else {
            Side::No
        }
    }
}

/// Read-only snapshot of a market's on-chain state.
///
/// `total_funds` and the cumulative share counts are independently
/// tracked quantities: fees and liquidity seeding mean no invariant
/// ties the pool to the sum of shares sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Market {
    pub id: MarketId,
    /// Trading deadline, unix epoch milliseconds
    pub deadline_ms: u64,
    /// Cumulative YES shares sold, smallest currency unit
    pub yes_shares_sold: u64,
    /// Cumulative NO shares sold, smallest currency unit
    pub no_shares_sold: u64,
    /// Pooled funds available for payout, smallest currency unit
    pub total_funds: u64,
    pub resolved: bool,
    /// Winning side; set exactly once, when `resolved` flips to true
    pub outcome: Option<Side>,
}

impl Market {
    pub fn shares_sold(&self, side: Side) -> u64 {
        match side {
            Side::Yes => self.yes_shares_sold,
            Side::No => self.no_shares_sold,
        }
    }

    pub fn total_shares_sold(&self) -> u64 {
        // Both counts are bounded by the currency supply; the sum
        // cannot overflow u128 but may overflow u64 in adversarial
        // snapshots, so saturate for the display path.
        self.yes_shares_sold.saturating_add(self.no_shares_sold)
    }

    /// Cumulative shares on the winning side, once resolved
    pub fn winning_shares_sold(&self) -> Option<u64> {
        self.outcome.map(|side| self.shares_sold(side))
    }
}

/// Read-only snapshot of one user position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub id: PositionId,
    /// Reference to the market, not ownership of it
    pub market_id: MarketId,
    pub side: Side,
    /// Share quantity, smallest currency unit
    pub shares: u64,
    /// Currency paid to acquire the shares, if the contract recorded it
    pub cost_basis: Option<u64>,
}

impl Position {
    /// A position wins once its market resolved to its side
    pub fn is_winner(&self, market: &Market) -> bool {
        market.resolved && market.outcome == Some(self.side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(yes: u64, no: u64) -> Market {
        Market {
            id: MarketId([1; 32]),
            deadline_ms: 1_700_000_000_000,
            yes_shares_sold: yes,
            no_shares_sold: no,
            total_funds: 0,
            resolved: false,
            outcome: None,
        }
    }

    #[test]
    fn side_round_trips_through_bool_encoding() {
        assert_eq!(Side::from_is_yes(true), Side::Yes);
        assert_eq!(Side::from_is_yes(false), Side::No);
        assert_eq!(Side::Yes.opposite(), Side::No);
        assert_eq!(Side::No.opposite(), Side::Yes);
    }

    #[test]
    fn winning_shares_follow_outcome() {
        let mut m = market(300, 700);
        assert_eq!(m.winning_shares_sold(), None);

        m.resolved = true;
        m.outcome = Some(Side::No);
        assert_eq!(m.winning_shares_sold(), Some(700));
    }

    #[test]
    fn total_shares_saturate_instead_of_wrapping() {
        let m = market(u64::MAX, 1);
        assert_eq!(m.total_shares_sold(), u64::MAX);
    }
}
