// crates/pollen-economics/src/oracle.rs
//
// Price access for valuation.
//
// `StaticPriceFeed` is an in-memory `PriceSource` that hosts and tests set
// directly. `PriceSnapshot` is what the accounting modules consume: one
// staleness-checked price per whitelisted asset, taken once per call so every
// valuation inside a call sees the same prices.

use std::collections::BTreeMap;

use pollen_core::config::AssetConfig;
use pollen_core::error::PollenError;
use pollen_core::identity::{AssetId, CASH_ASSET};
use pollen_core::math::SCALE;
use pollen_core::traits::{PriceSource, Quote};

/// In-memory price feed.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceFeed {
    quotes: BTreeMap<AssetId, Quote>,
}

impl StaticPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a price (1e18 fixed point) observed at `updated_at`.
    pub fn set_price(&mut self, asset: AssetId, rate: u128, updated_at: u64) {
        self.quotes.insert(asset, Quote { rate, updated_at });
    }

    /// Re-stamp every quote with a new observation time, keeping the rates.
    pub fn touch_all(&mut self, updated_at: u64) {
        for quote in self.quotes.values_mut() {
            quote.updated_at = updated_at;
        }
    }
}

impl PriceSource for StaticPriceFeed {
    fn quote(&self, asset: AssetId) -> Result<Quote, PollenError> {
        self.quotes
            .get(&asset)
            .copied()
            .ok_or(PollenError::PriceUnavailable(asset))
    }
}

/// Validate a quote against the maximum age.
pub fn fresh_price(
    source: &dyn PriceSource,
    asset: AssetId,
    now: u64,
    max_age: u64,
) -> Result<u128, PollenError> {
    let quote = source.quote(asset)?;
    let age = now.saturating_sub(quote.updated_at);
    if age > max_age {
        return Err(PollenError::StalePriceFeed {
            asset,
            age,
            max_age,
        });
    }
    if quote.rate == 0 {
        return Err(PollenError::PriceUnavailable(asset));
    }
    Ok(quote.rate)
}

/// Prices for every whitelisted asset at one instant.
///
/// The cash leg is always priced at 1.0. A listed asset without a fresh quote
/// fails the snapshot; for a delisted asset the failure is kept and returned
/// only if something actually needs its price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSnapshot {
    prices: Vec<Result<u128, PollenError>>,
}

impl PriceSnapshot {
    pub fn fetch(
        source: &dyn PriceSource,
        assets: &[AssetConfig],
        now: u64,
        max_age: u64,
    ) -> Result<Self, PollenError> {
        let mut prices = Vec::with_capacity(assets.len());
        for (asset, config) in assets.iter().enumerate() {
            if asset == CASH_ASSET {
                prices.push(Ok(SCALE));
                continue;
            }
            match fresh_price(source, asset, now, max_age) {
                Err(e) if config.listed => return Err(e),
                Err(e) => {
                    tracing::debug!("No fresh price for delisted asset {}: {}", asset, e);
                    prices.push(Err(e));
                }
                price => prices.push(price),
            }
        }
        Ok(Self { prices })
    }

    /// Build a snapshot from explicit prices. Index 0 is forced to 1.0.
    pub fn from_prices(mut prices: Vec<u128>) -> Self {
        if let Some(cash) = prices.first_mut() {
            *cash = SCALE;
        }
        Self {
            prices: prices.into_iter().map(Ok).collect(),
        }
    }

    /// Price of `asset`, or the reason it could not be fetched.
    pub fn price(&self, asset: AssetId) -> Result<u128, PollenError> {
        self.prices
            .get(asset)
            .cloned()
            .unwrap_or_else(|| Err(PollenError::PriceUnavailable(asset)))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
