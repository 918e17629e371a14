//! Fixed-point arithmetic for the ledger.
//!
//! Two scales are in play. `BASE` (9 decimals) is the scale of amounts,
//! prices, collateral ratios and fee fractions. `INDEX_ONE` (18 decimals)
//! is the scale of the borrow index and the per-second interest rate,
//! where `BASE` precision would round realistic rates down to nothing.

use thiserror::Error;

/// Scale of amounts, prices, collateral ratios and fee fractions.
pub const BASE: u128 = 1_000_000_000;

/// Decimal count behind `BASE`.
pub const DECIMALS: u8 = 9;

/// Scale of the borrow index and the per-second interest rate.
pub const INDEX_ONE: u128 = 1_000_000_000_000_000_000;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("division by zero")]
    DivideByZero,
}

/// `a * b / denominator`, rounding down.
pub fn mul_div_down(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivideByZero);
    }
    let product = a.checked_mul(b).ok_or(MathError::Overflow)?;
    Ok(product / denominator)
}

/// `a * b / denominator`, rounding up.
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivideByZero);
    }
    let product = a.checked_mul(b).ok_or(MathError::Overflow)?;
    let quotient = product / denominator;
    if product % denominator == 0 {
        Ok(quotient)
    } else {
        Ok(quotient + 1)
    }
}

/// `(base / INDEX_ONE)^exp` at `INDEX_ONE` scale, by squaring.
pub fn pow_index(mut base: u128, mut exp: u64) -> Result<u128, MathError> {
    let mut acc = INDEX_ONE;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_div_down(acc, base, INDEX_ONE)?;
        }
        exp >>= 1;
        if exp > 0 {
            base = mul_div_down(base, base, INDEX_ONE)?;
        }
    }
    Ok(acc)
}

/// Rescale `amount` from an asset's own `decimals` into `BASE` scale,
/// rounding down. Used when crediting value paid in a foreign-decimal
/// asset.
pub fn to_base_amount(amount: u128, decimals: u8) -> Result<u128, MathError> {
    let d = decimals as u32;
    let base = DECIMALS as u32;
    if d <= base {
        let factor = 10u128.pow(base - d);
        amount.checked_mul(factor).ok_or(MathError::Overflow)
    } else {
        let factor = 10u128
            .checked_pow(d - base)
            .ok_or(MathError::Overflow)?;
        Ok(amount / factor)
    }
}

/// Rescale a `BASE`-scale value into an asset's own `decimals`, rounding
/// up. Used when charging a payer, so the charge never undershoots.
pub fn from_base_amount_up(amount: u128, decimals: u8) -> Result<u128, MathError> {
    let d = decimals as u32;
    let base = DECIMALS as u32;
    if d >= base {
        let factor = 10u128
            .checked_pow(d - base)
            .ok_or(MathError::Overflow)?;
        amount.checked_mul(factor).ok_or(MathError::Overflow)
    } else {
        let factor = 10u128.pow(base - d);
        let quotient = amount / factor;
        if amount % factor == 0 {
            Ok(quotient)
        } else {
            Ok(quotient + 1)
        }
    }
}
