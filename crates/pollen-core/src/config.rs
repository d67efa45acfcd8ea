// crates/pollen-core/src/config.rs
//
// Process-wide protocol configuration.
//
// Loaded from a TOML file or populated with defaults. The engine owns a copy;
// the limits section can be changed later through the admin-gated
// `update_limits` entrypoint. The issuance schedule and the benchmark portfolio
// are not part of this struct: they are one-time initializations performed
// through their own admin entrypoints.
//
// Token amounts in the file are whole PLN; the accessor methods convert to
// base units (1 PLN = 10^18).

use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::PollenError;
use crate::math::{checked_mul, BPS_DENOMINATOR, SCALE};

/// Seconds in a day.
pub const DAY: u64 = 86_400;

/// Seconds in a (365-day) year.
pub const YEAR: u64 = 365 * DAY;

/// A whitelisted asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Ticker used in logs and CLI output.
    pub symbol: String,
    /// Delisted assets keep their index but must carry zero weight.
    #[serde(default = "default_listed")]
    pub listed: bool,
}

/// Runtime configuration for the protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Shortest permitted lock, in seconds.
    #[serde(default = "default_min_lock_period")]
    pub min_lock_period: u64,

    /// Longest permitted lock, in seconds. Also the voting-power normalizer.
    #[serde(default = "default_max_lock_period")]
    pub max_lock_period: u64,

    /// Staking emission, in PLN base units per second.
    #[serde(default = "default_reward_rate")]
    pub reward_rate: u64,

    /// Maximum age of a price quote, in seconds.
    #[serde(default = "default_price_max_age")]
    pub price_max_age: u64,

    /// Smallest deposit that may open a portfolio (whole PLN).
    #[serde(default = "default_min_portfolio_deposit")]
    pub min_portfolio_deposit: u64,

    /// Ceiling on a portfolio's total deposited principal (whole PLN).
    #[serde(default = "default_max_portfolio_balance")]
    pub max_portfolio_balance: u64,

    /// Largest batch accepted by the multi-delegate and multi-withdraw calls.
    #[serde(default = "default_max_delegation_operations")]
    pub max_delegation_operations: usize,

    /// Voting-power share multiplier applied to the boost, in bps.
    #[serde(default = "default_boost_scale_bps")]
    pub boost_scale_bps: u32,

    /// Upper bound on the boost, in bps.
    #[serde(default = "default_boost_cap_bps")]
    pub boost_cap_bps: u32,

    /// Owner's performance fee on a third party's reward, in bps.
    #[serde(default = "default_owner_fee_bps")]
    pub owner_fee_bps: u32,

    /// Asset whitelist. Index 0 is the cash leg (PLN itself, price 1).
    #[serde(default = "default_assets")]
    pub assets: Vec<AssetConfig>,
}

fn default_listed() -> bool {
    true
}

fn default_min_lock_period() -> u64 {
    7 * DAY
}

fn default_max_lock_period() -> u64 {
    4 * YEAR
}

fn default_reward_rate() -> u64 {
    // 0.001 PLN per second
    1_000_000_000_000_000
}

fn default_price_max_age() -> u64 {
    3_600
}

fn default_min_portfolio_deposit() -> u64 {
    1
}

fn default_max_portfolio_balance() -> u64 {
    1_000_000
}

fn default_max_delegation_operations() -> usize {
    10
}

fn default_boost_scale_bps() -> u32 {
    10_000
}

fn default_boost_cap_bps() -> u32 {
    2_000
}

fn default_owner_fee_bps() -> u32 {
    2_000
}

fn default_assets() -> Vec<AssetConfig> {
    ["PLN", "WETH", "WBTC", "LINK"]
        .iter()
        .map(|symbol| AssetConfig {
            symbol: symbol.to_string(),
            listed: true,
        })
        .collect()
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            min_lock_period: default_min_lock_period(),
            max_lock_period: default_max_lock_period(),
            reward_rate: default_reward_rate(),
            price_max_age: default_price_max_age(),
            min_portfolio_deposit: default_min_portfolio_deposit(),
            max_portfolio_balance: default_max_portfolio_balance(),
            max_delegation_operations: default_max_delegation_operations(),
            boost_scale_bps: default_boost_scale_bps(),
            boost_cap_bps: default_boost_cap_bps(),
            owner_fee_bps: default_owner_fee_bps(),
            assets: default_assets(),
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, PollenError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| PollenError::Config(format!("cannot read {}: {}", path, e)))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, PollenError> {
        let config: ProtocolConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), PollenError> {
        if self.min_lock_period == 0 || self.min_lock_period > self.max_lock_period {
            return Err(PollenError::Config(format!(
                "lock period bounds [{}, {}] are invalid",
                self.min_lock_period, self.max_lock_period
            )));
        }
        if self.assets.is_empty() {
            return Err(PollenError::Config("asset whitelist is empty".to_string()));
        }
        if !self.assets[0].listed {
            return Err(PollenError::Config("the cash asset cannot be delisted".to_string()));
        }
        if self.min_portfolio_deposit > self.max_portfolio_balance {
            return Err(PollenError::Config(format!(
                "minimum deposit {} exceeds the portfolio ceiling {}",
                self.min_portfolio_deposit, self.max_portfolio_balance
            )));
        }
        if self.owner_fee_bps as u128 > BPS_DENOMINATOR {
            return Err(PollenError::Config(format!(
                "owner fee {} bps exceeds 100%",
                self.owner_fee_bps
            )));
        }
        if self.max_delegation_operations == 0 {
            return Err(PollenError::Config(
                "max_delegation_operations must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Staking emission in base units per second.
    pub fn reward_rate_units(&self) -> u128 {
        self.reward_rate as u128
    }

    /// Portfolio floor in base units.
    pub fn min_portfolio_deposit_units(&self) -> Result<u128, PollenError> {
        checked_mul(self.min_portfolio_deposit as u128, SCALE)
    }

    /// Portfolio ceiling in base units.
    pub fn max_portfolio_balance_units(&self) -> Result<u128, PollenError> {
        checked_mul(self.max_portfolio_balance as u128, SCALE)
    }
}
