use serde::{Deserialize, Serialize};

use crate::math::{mul_div_down, mul_div_up, MathError, BASE, INDEX_ONE};

/// A single account's position: raw collateral units plus debt stored in
/// normalized form (principal divided by the borrow index at borrow
/// time). Created zero-valued on first deposit and never destroyed; it
/// can return to zero balances.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Vault {
    pub collateral_amount: u128,
    pub normalized_borrowed_amount: u128,
}

/// Derived at query time from balances, price and the assessed ratio.
/// Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    Empty,
    Open,
    UnderCollateralized,
}

impl Vault {
    /// Current debt in `BASE` units, rounded up: the index converts the
    /// stored normalized amount back into what is actually owed.
    pub fn denormalized_debt(&self, index: u128) -> Result<u128, MathError> {
        mul_div_up(self.normalized_borrowed_amount, index, INDEX_ONE)
    }

    pub fn is_empty(&self) -> bool {
        self.collateral_amount == 0 && self.normalized_borrowed_amount == 0
    }

    pub fn status(
        &self,
        index: u128,
        price: u128,
        assessed_ratio: u128,
    ) -> Result<VaultStatus, MathError> {
        if self.is_empty() {
            return Ok(VaultStatus::Empty);
        }
        let debt = self.denormalized_debt(index)?;
        if is_collateralized(self.collateral_amount, price, debt, assessed_ratio)? {
            Ok(VaultStatus::Open)
        } else {
            Ok(VaultStatus::UnderCollateralized)
        }
    }
}

/// Multiply-before-divide form of `collateral_value / debt >= ratio`,
/// so the comparison never loses precision to an early division.
pub fn is_collateralized(
    collateral: u128,
    price: u128,
    debt: u128,
    ratio: u128,
) -> Result<bool, MathError> {
    if debt == 0 {
        return Ok(true);
    }
    let collateral_value = mul_div_down(collateral, price, BASE)?;
    let lhs = collateral_value.checked_mul(BASE).ok_or(MathError::Overflow)?;
    let rhs = debt.checked_mul(ratio).ok_or(MathError::Overflow)?;
    Ok(lhs >= rhs)
}
