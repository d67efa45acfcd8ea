// crates/pollen-economics/src/valuation.rs
//
// Holdings derivation and mark-to-market valuation shared by user portfolios
// and the benchmark.
//
// Holdings describe a basket worth `value` at the prices it was derived at:
//   cash leg:      amount[0] = w0 * value / 100
//   other legs:    amount[i] = wi * value * SCALE / (100 * price[i])
// Short legs are written against a notional fixed at derivation time. Marked
// to market, a short leg is worth `2 * notional - current`, clamped at zero so
// a short that more than doubles cannot drive the portfolio negative:
//   value = long + max(0, 2 * short_notional - short_current)

use serde::Serialize;

use pollen_core::config::AssetConfig;
use pollen_core::error::PollenError;
use pollen_core::identity::CASH_ASSET;
use pollen_core::math::{checked_add, checked_mul, mul_div, SCALE};

use crate::oracle::PriceSnapshot;

/// Sum every allocation must reach.
pub const WEIGHT_TOTAL: u32 = 100;

/// Check a target allocation against the asset whitelist.
///
/// # Errors
/// `LengthMismatch` when `weights` or `is_short` do not cover every asset,
/// `InvalidWeights` when the weights do not sum to 100 or the cash leg is
/// flagged short, `AssetDelisted` when a delisted asset carries weight.
pub fn validate_allocation(
    weights: &[u8],
    is_short: &[bool],
    assets: &[AssetConfig],
) -> Result<(), PollenError> {
    if weights.len() != assets.len() {
        return Err(PollenError::LengthMismatch {
            expected: assets.len(),
            actual: weights.len(),
        });
    }
    if is_short.len() != assets.len() {
        return Err(PollenError::LengthMismatch {
            expected: assets.len(),
            actual: is_short.len(),
        });
    }
    let sum: u32 = weights.iter().map(|&w| w as u32).sum();
    if sum != WEIGHT_TOTAL {
        return Err(PollenError::InvalidWeights(format!(
            "weights sum to {}, expected {}",
            sum, WEIGHT_TOTAL
        )));
    }
    if is_short.get(CASH_ASSET).copied().unwrap_or(false) {
        return Err(PollenError::InvalidWeights(
            "the cash leg cannot be short".to_string(),
        ));
    }
    for (asset, (config, &weight)) in assets.iter().zip(weights).enumerate() {
        if !config.listed && weight > 0 {
            return Err(PollenError::AssetDelisted(asset));
        }
    }
    Ok(())
}

/// Per-asset amounts backing one allocation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Holdings {
    pub asset_amounts: Vec<u128>,
    pub is_short: Vec<bool>,
    /// Notional written on short legs at the last derivation.
    pub short_notional: u128,
}

impl Holdings {
    /// Derive holdings worth `value` at `prices` for the given weights.
    ///
    /// Assumes the allocation has already passed `validate_allocation`.
    pub fn derive(
        weights: &[u8],
        is_short: &[bool],
        value: u128,
        prices: &PriceSnapshot,
    ) -> Result<Self, PollenError> {
        let mut asset_amounts = Vec::with_capacity(weights.len());
        let mut short_notional = 0u128;

        for (asset, &weight) in weights.iter().enumerate() {
            let leg_value = checked_mul(weight as u128, value)?;
            let amount = if weight == 0 {
                0
            } else if asset == CASH_ASSET {
                leg_value / WEIGHT_TOTAL as u128
            } else {
                let price = prices.price(asset)?;
                mul_div(leg_value, SCALE, checked_mul(WEIGHT_TOTAL as u128, price)?)?
            };
            if is_short.get(asset).copied().unwrap_or(false) {
                short_notional = checked_add(short_notional, leg_value / WEIGHT_TOTAL as u128)?;
            }
            asset_amounts.push(amount);
        }

        Ok(Self {
            asset_amounts,
            is_short: is_short.to_vec(),
            short_notional,
        })
    }

    /// Mark-to-market value at `prices`.
    ///
    /// Legs with a zero amount are skipped, so a delisted asset with no
    /// exposure never needs a price.
    pub fn value(&self, prices: &PriceSnapshot) -> Result<u128, PollenError> {
        let mut long = 0u128;
        let mut short_current = 0u128;

        for (asset, &amount) in self.asset_amounts.iter().enumerate() {
            if amount == 0 {
                continue;
            }
            let leg = if asset == CASH_ASSET {
                amount
            } else {
                mul_div(amount, prices.price(asset)?, SCALE)?
            };
            if self.is_short.get(asset).copied().unwrap_or(false) {
                short_current = checked_add(short_current, leg)?;
            } else {
                long = checked_add(long, leg)?;
            }
        }

        let short_value = checked_mul(2, self.short_notional)?.saturating_sub(short_current);
        checked_add(long, short_value)
    }

    pub fn is_empty(&self) -> bool {
        self.asset_amounts.iter().all(|&a| a == 0)
    }
}
