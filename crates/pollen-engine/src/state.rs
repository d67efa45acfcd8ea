// crates/pollen-engine/src/state.rs
//
// The mutable protocol state one call executes against.
//
// Everything a call may touch lives here so the engine can run the call on a
// clone and swap it in only on success. The price source and the admin
// authority are read-only collaborators and stay outside.

use serde::Serialize;

use pollen_core::config::ProtocolConfig;
use pollen_core::error::PollenError;
use pollen_core::identity::TokenKind;
use pollen_core::traits::TokenLedger;
use pollen_economics::benchmark::BenchmarkPortfolio;
use pollen_economics::escrow::VoteEscrow;
use pollen_economics::issuance::IssuanceSchedule;
use pollen_economics::ledger::Ledger;
use pollen_economics::portfolio::{PortfolioBook, PortfolioLimits};
use pollen_economics::settlement::SettlementTerms;

#[derive(Debug, Clone)]
pub struct ProtocolState {
    pub config: ProtocolConfig,
    pub escrow: VoteEscrow,
    pub issuance: IssuanceSchedule,
    pub benchmark: BenchmarkPortfolio,
    pub book: PortfolioBook,
    pub ledger: Ledger,
}

impl ProtocolState {
    /// Fresh state with the staking reward stream starting at `genesis`.
    pub fn new(config: ProtocolConfig, genesis: u64) -> Result<Self, PollenError> {
        config.validate()?;
        Ok(Self {
            escrow: VoteEscrow::from_config(&config, genesis),
            issuance: IssuanceSchedule::new(),
            benchmark: BenchmarkPortfolio::new(),
            book: PortfolioBook::new(),
            ledger: Ledger::new(),
            config,
        })
    }

    pub fn limits(&self) -> Result<PortfolioLimits, PollenError> {
        PortfolioLimits::from_config(&self.config)
    }

    pub fn terms(&self) -> SettlementTerms {
        SettlementTerms::from_config(&self.config)
    }

    /// Headline numbers, for CLI output and logs.
    pub fn summary(&self) -> ProtocolSummary {
        ProtocolSummary {
            pollen_supply: self.ledger.total_supply(TokenKind::Pollen),
            ve_pollen_supply: self.ledger.total_supply(TokenKind::VePollen),
            total_locked: self.escrow.total_locked(),
            locks: self.escrow.locks().count(),
            issued: self.issuance.issued(),
            total_delegated: self.book.total_delegated(),
            portfolios: self.book.portfolios().count(),
            open_portfolios: self.book.portfolios().filter(|p| p.is_open).count(),
        }
    }
}

/// Aggregate view of protocol state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolSummary {
    pub pollen_supply: u128,
    pub ve_pollen_supply: u128,
    pub total_locked: u128,
    pub locks: usize,
    pub issued: u128,
    pub total_delegated: u128,
    pub portfolios: usize,
    pub open_portfolios: usize,
}
