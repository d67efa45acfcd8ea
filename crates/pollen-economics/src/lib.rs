// crates/pollen-economics/src/lib.rs
//
// pollen-economics: vote escrow, issuance schedule, portfolio accounting, and
// withdrawal settlement for the Pollen Protocol.
//
// All monetary values are tracked in base units (the smallest unit of PLN).
// 1 PLN = 1,000,000,000,000,000,000 base units (10^18).
//
// The in-memory `Ledger` and `StaticPriceFeed` stand in for the external token
// contracts and price oracle.

pub mod benchmark;
pub mod escrow;
pub mod issuance;
pub mod ledger;
pub mod oracle;
pub mod portfolio;
pub mod settlement;
pub mod token;
pub mod valuation;

// Re-export key types for ergonomic access from downstream crates.
pub use benchmark::BenchmarkPortfolio;
pub use escrow::{Lock, VoteEscrow};
pub use issuance::{IssuanceSchedule, IssuanceSegment};
pub use ledger::Ledger;
pub use oracle::{fresh_price, PriceSnapshot, StaticPriceFeed};
pub use portfolio::{
    rebase_benchmark_ref, MarketView, Portfolio, PortfolioBook, PortfolioLimits, Position,
};
pub use settlement::{
    compute_breakdown, settle_amount, Outcome, ReturnBreakdown, RewardSettlement,
    SettlementTerms, WithdrawalQuote,
};
pub use token::{KindAmounts, Pln, BASE_UNITS_PER_PLN};
pub use valuation::{validate_allocation, Holdings, WEIGHT_TOTAL};
