use keel_types::math::mul_div_down;

use crate::AssessError;

/// Maps an attested score into a required collateral ratio inside
/// `[lower, upper]`. Implementations own the curve shape; the assessor
/// re-checks the bounds on whatever comes back.
pub trait ScoreMapper: Send + Sync {
    fn map(
        &self,
        score: u64,
        max_score: u64,
        lower: u128,
        upper: u128,
    ) -> Result<u128, AssessError>;
}

/// Straight-line interpolation: score 0 maps to `upper`, `max_score`
/// maps to `lower`. The discount rounds down, so the required ratio
/// rounds up against the borrower.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearMapper;

impl ScoreMapper for LinearMapper {
    fn map(
        &self,
        score: u64,
        max_score: u64,
        lower: u128,
        upper: u128,
    ) -> Result<u128, AssessError> {
        if max_score == 0 {
            return Err(AssessError::ZeroMaxScore);
        }
        let range = upper.checked_sub(lower).ok_or(AssessError::InvalidBounds)?;
        let discount = mul_div_down(score as u128, range, max_score as u128)?;
        upper.checked_sub(discount).ok_or(AssessError::OutOfBounds)
    }
}
