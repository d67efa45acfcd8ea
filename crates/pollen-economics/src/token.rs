// crates/pollen-economics/src/token.rs
//
// PLN amount type and per-kind amount pairs.
//
// The smallest unit of PLN is the base unit; 1 PLN = 10^18 base units.
// vePLN uses the same denomination since it is minted 1:1 against locked PLN.
// All internal accounting uses integer base units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

use pollen_core::error::PollenError;
use pollen_core::identity::TokenKind;
use pollen_core::math::{checked_add, SCALE};

/// Number of base units in one PLN.
pub const BASE_UNITS_PER_PLN: u128 = SCALE;

/// A PLN (or vePLN) amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Pln {
    /// Amount in base units.
    pub units: u128,
}

impl Pln {
    /// Create an amount from whole PLN.
    ///
    /// # Example
    /// ```
    /// use pollen_economics::token::Pln;
    /// assert_eq!(Pln::whole(3).units, 3_000_000_000_000_000_000);
    /// ```
    pub const fn whole(amount: u64) -> Self {
        Self {
            units: amount as u128 * BASE_UNITS_PER_PLN,
        }
    }

    pub const fn from_units(units: u128) -> Self {
        Self { units }
    }

    pub const fn zero() -> Self {
        Self { units: 0 }
    }

    /// Convert to PLN as a float, for display only.
    pub fn to_pln(&self) -> f64 {
        self.units as f64 / BASE_UNITS_PER_PLN as f64
    }
}

impl Add for Pln {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            units: self.units.saturating_add(rhs.units),
        }
    }
}

impl Sub for Pln {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            units: self.units.saturating_sub(rhs.units),
        }
    }
}

impl fmt::Display for Pln {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.units / BASE_UNITS_PER_PLN;
        let frac = self.units % BASE_UNITS_PER_PLN;
        if frac == 0 {
            write!(f, "{} PLN", whole)
        } else {
            // Display up to 18 decimal places, trimming trailing zeros
            let frac_str = format!("{:018}", frac);
            let trimmed = frac_str.trim_end_matches('0');
            write!(f, "{}.{} PLN", whole, trimmed)
        }
    }
}

/// An amount per token kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindAmounts {
    pub pollen: u128,
    pub ve_pollen: u128,
}

impl KindAmounts {
    pub fn get(&self, kind: TokenKind) -> u128 {
        match kind {
            TokenKind::Pollen => self.pollen,
            TokenKind::VePollen => self.ve_pollen,
        }
    }

    pub fn get_mut(&mut self, kind: TokenKind) -> &mut u128 {
        match kind {
            TokenKind::Pollen => &mut self.pollen,
            TokenKind::VePollen => &mut self.ve_pollen,
        }
    }

    pub fn total(&self) -> Result<u128, PollenError> {
        checked_add(self.pollen, self.ve_pollen)
    }

    pub fn is_zero(&self) -> bool {
        self.pollen == 0 && self.ve_pollen == 0
    }
}
