//! Pricing and settlement model for binary outcome markets.
//!
//! Pure computation over already-fetched market/position snapshots:
//! no I/O, no shared mutable state, no panics in non-test code. The
//! authoritative market state lives in an external on-chain program;
//! this crate only derives probabilities, trade projections, payouts
//! and portfolio roll-ups from read-only copies of it.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod portfolio;
pub mod pricing;
pub mod settlement;
pub mod state;


pub use portfolio::{aggregate_portfolio, PortfolioSummary, PositionValuation};
pub use pricing::{display_percentages, project_trade, quote, TradeProjection};
pub use settlement::{
    mark_to_market_value, sell_proceeds, settle, settle_all, PositionBook,
};
pub use state::{Market, MarketId, Position, PositionId, Side};

/// Smallest-unit scale (1e6): one whole currency unit is 1,000,000
/// minimal units, and one share costs one minimal unit at price 1.0.
pub const SCALE: u64 = 1_000_000;

/// Error types for model operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelError {
    /// Zero/invalid amount or an inconsistent snapshot
    InvalidInput,
    /// Position references a different market than the one supplied
    MarketMismatch,
    /// Trade attempted on an already-resolved market
    MarketResolved,
    /// Settlement attempted against a pre-resolution snapshot
    MarketNotResolved,
    /// Unknown position id
    PositionNotFound,
    /// Position was already consumed by a prior claim
    AlreadyClaimed,
    /// Position is on the losing side and pays nothing
    NothingToClaim,
    /// Selling more shares than the position holds
    InsufficientShares,
    /// Resolved market has no shares on the winning side
    EmptyWinnerSide,
    /// Winner payouts do not drain the pool exactly
    PoolConservationViolation,
    /// Arithmetic overflow
    Overflow,
}
