//! Liquidation arithmetic.
//!
//! Pure math over BASE-scale values; the execution layer owns transfers
//! and vault bookkeeping. Rounding favors the protocol throughout: the
//! repay value rounds up, collateral released to the liquidator rounds
//! down, the treasury cut rounds up.

use keel_types::math::{mul_div_down, mul_div_up, MathError, BASE};

/// Outcome of planning a liquidation at the current price and assessed
/// ratio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationPlan {
    /// Debt value the liquidator pays down, BASE scale.
    pub debt_repaid: u128,
    /// Collateral units leaving the vault.
    pub collateral_seized: u128,
    pub collateral_to_liquidator: u128,
    pub collateral_to_treasury: u128,
    /// Residual debt cleared against exhausted collateral.
    pub debt_written_off: u128,
    pub closes_vault: bool,
}

/// Solve for the repay value that lifts the vault back to the boundary
/// ratio when collateral is sold to the liquidator at the discounted
/// price, then split the seized collateral between liquidator and
/// treasury.
///
/// With collateral value `CV`, debt `D`, target ratio `r` and discount
/// `d` (all BASE scale), each unit of repaid debt removes
/// `1 / (1 - d)` of collateral value, so the boundary is restored at
///
/// ```text
/// x = (D*r - CV) / (r - 1/(1 - d))
/// ```
///
/// capped at the full debt. A non-positive denominator means the
/// discount is too deep for partial liquidation to ever close the gap,
/// and the whole debt is taken. When the vault's collateral cannot cover
/// `x` at the discounted price, everything is seized and the shortfall
/// is written off.
pub fn plan_liquidation(
    collateral: u128,
    debt: u128,
    price: u128,
    ratio: u128,
    discount: u128,
    fee: u128,
) -> Result<LiquidationPlan, MathError> {
    let collateral_value = mul_div_down(collateral, price, BASE)?;
    let discounted_price = mul_div_down(price, BASE - discount, BASE)?;
    if discounted_price == 0 {
        return Err(MathError::DivideByZero);
    }

    let target_debt_value = mul_div_up(debt, ratio, BASE)?;
    let shortfall = target_debt_value.saturating_sub(collateral_value);
    // Collateral value surrendered per unit of debt repaid.
    let unit_cost = mul_div_up(BASE, BASE, BASE - discount)?;

    let mut debt_repaid = if ratio <= unit_cost {
        debt
    } else {
        mul_div_up(shortfall, BASE, ratio - unit_cost)?.min(debt)
    };

    let mut collateral_seized = mul_div_down(debt_repaid, BASE, discounted_price)?;
    let mut debt_written_off = 0;
    if collateral_seized >= collateral {
        // The restoring repay outruns the vault: drain it and write off
        // whatever the discounted proceeds cannot reach.
        collateral_seized = collateral;
        debt_repaid = mul_div_down(collateral, discounted_price, BASE)?.min(debt);
        debt_written_off = debt - debt_repaid;
    }

    let closes_vault = debt_repaid + debt_written_off == debt;
    let collateral_to_treasury = mul_div_up(collateral_seized, fee, BASE)?;
    let collateral_to_liquidator = collateral_seized - collateral_to_treasury;

    Ok(LiquidationPlan {
        debt_repaid,
        collateral_seized,
        collateral_to_liquidator,
        collateral_to_treasury,
        debt_written_off,
        closes_vault,
    })
}
