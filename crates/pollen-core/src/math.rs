// crates/pollen-core/src/math.rs
//
// Scaled-integer fixed-point arithmetic.
//
// Token amounts are u128 base units (18 decimals). Prices, values, and returns
// use a 1e18 scale. Every operation is checked: overflow and division by zero
// surface as `PollenError::ArithmeticOverflow` instead of wrapping. Products
// go through a 256-bit intermediate so `amount * scaled / SCALE` does not
// overflow for realistic balances.

use std::fmt;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::PollenError;

/// Fixed-point scale: 1.0 == 10^18.
pub const SCALE: u128 = 1_000_000_000_000_000_000;

/// Denominator for basis-point fractions (10_000 bps == 100%).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Compute `a * b / denominator`, flooring, with a 256-bit intermediate.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, PollenError> {
    if denominator == 0 {
        return Err(PollenError::ArithmeticOverflow);
    }
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(PollenError::ArithmeticOverflow)?;
    let quotient = product / U256::from(denominator);
    if quotient > U256::from(u128::MAX) {
        return Err(PollenError::ArithmeticOverflow);
    }
    Ok(quotient.low_u128())
}

pub fn checked_add(a: u128, b: u128) -> Result<u128, PollenError> {
    a.checked_add(b).ok_or(PollenError::ArithmeticOverflow)
}

pub fn checked_sub(a: u128, b: u128) -> Result<u128, PollenError> {
    a.checked_sub(b).ok_or(PollenError::ArithmeticOverflow)
}

pub fn checked_mul(a: u128, b: u128) -> Result<u128, PollenError> {
    a.checked_mul(b).ok_or(PollenError::ArithmeticOverflow)
}

/// Apply a basis-point fraction to an amount, flooring.
pub fn apply_bps(amount: u128, bps: u32) -> Result<u128, PollenError> {
    mul_div(amount, bps as u128, BPS_DENOMINATOR)
}

fn to_signed(value: u128) -> Result<i128, PollenError> {
    i128::try_from(value).map_err(|_| PollenError::ArithmeticOverflow)
}

/// Signed 1e18 fixed-point number, used for returns and boosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fixed(i128);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(SCALE as i128);

    /// Wrap a raw scaled value.
    pub const fn from_raw(raw: i128) -> Self {
        Self(raw)
    }

    /// The raw scaled value.
    pub const fn raw(&self) -> i128 {
        self.0
    }

    /// `numerator / denominator` as a non-negative fixed-point value.
    pub fn from_ratio(numerator: u128, denominator: u128) -> Result<Self, PollenError> {
        Ok(Self(to_signed(mul_div(numerator, SCALE, denominator)?)?))
    }

    /// Convert an unsigned scaled value (price, value index) into `Fixed`.
    pub fn from_scaled(value: u128) -> Result<Self, PollenError> {
        Ok(Self(to_signed(value)?))
    }

    pub fn from_bps(bps: u32) -> Self {
        // bps <= u32::MAX keeps this well inside i128.
        Self(bps as i128 * (SCALE / BPS_DENOMINATOR) as i128)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Magnitude as an unsigned scaled value.
    pub fn abs_scaled(&self) -> u128 {
        self.0.unsigned_abs()
    }

    pub fn checked_add(self, rhs: Fixed) -> Result<Fixed, PollenError> {
        self.0
            .checked_add(rhs.0)
            .map(Fixed)
            .ok_or(PollenError::ArithmeticOverflow)
    }

    pub fn checked_sub(self, rhs: Fixed) -> Result<Fixed, PollenError> {
        self.0
            .checked_sub(rhs.0)
            .map(Fixed)
            .ok_or(PollenError::ArithmeticOverflow)
    }

    /// Fixed-point product, rounding the magnitude toward zero.
    pub fn checked_mul(self, rhs: Fixed) -> Result<Fixed, PollenError> {
        let negative = self.is_negative() != rhs.is_negative();
        let magnitude = to_signed(mul_div(self.abs_scaled(), rhs.abs_scaled(), SCALE)?)?;
        Ok(Fixed(if negative { -magnitude } else { magnitude }))
    }

    /// `|self| * amount`, flooring. The sign is the caller's concern.
    pub fn mul_amount(&self, amount: u128) -> Result<u128, PollenError> {
        mul_div(amount, self.abs_scaled(), SCALE)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let magnitude = self.abs_scaled();
        let whole = magnitude / SCALE;
        let frac = magnitude % SCALE;
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let frac_str = format!("{:018}", frac);
            write!(f, "{}{}.{}", sign, whole, frac_str.trim_end_matches('0'))
        }
    }
}
