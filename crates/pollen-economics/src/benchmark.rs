// crates/pollen-economics/src/benchmark.rs
//
// The singleton benchmark allocation.
//
// Set once by the admin, long only, and never deposited into. It is a value
// index: holdings are derived so the benchmark is worth exactly 1.0 at the
// prices of the moment it is created. Portfolios record the benchmark's value
// at entry and settlement compares against its value at exit.

use serde::Serialize;

use pollen_core::config::AssetConfig;
use pollen_core::error::PollenError;
use pollen_core::events::ProtocolEvent;
use pollen_core::math::SCALE;

use crate::oracle::PriceSnapshot;
use crate::valuation::{validate_allocation, Holdings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Benchmark {
    weights: Vec<u8>,
    holdings: Holdings,
}

/// Admin-set reference allocation.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkPortfolio {
    inner: Option<Benchmark>,
}

impl BenchmarkPortfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the benchmark weights.
    ///
    /// # Errors
    /// `AlreadyInitialized` on a second call, plus any allocation error from
    /// `validate_allocation` (the benchmark carries no short legs).
    pub fn initialize(
        &mut self,
        weights: Vec<u8>,
        assets: &[AssetConfig],
        prices: &PriceSnapshot,
    ) -> Result<ProtocolEvent, PollenError> {
        if self.inner.is_some() {
            return Err(PollenError::AlreadyInitialized("benchmark portfolio".to_string()));
        }
        let longs = vec![false; weights.len()];
        validate_allocation(&weights, &longs, assets)?;
        let holdings = Holdings::derive(&weights, &longs, SCALE, prices)?;

        tracing::info!("Benchmark portfolio set: weights {:?}", weights);
        self.inner = Some(Benchmark {
            weights: weights.clone(),
            holdings,
        });
        Ok(ProtocolEvent::BenchmarkPortfolioCreated { weights })
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    pub fn weights(&self) -> Option<&[u8]> {
        self.inner.as_ref().map(|b| b.weights.as_slice())
    }

    /// Current value of the benchmark index (1e18 == its value at creation).
    pub fn value(&self, prices: &PriceSnapshot) -> Result<u128, PollenError> {
        self.inner
            .as_ref()
            .ok_or_else(|| PollenError::NotInitialized("benchmark portfolio".to_string()))?
            .holdings
            .value(prices)
    }
}
