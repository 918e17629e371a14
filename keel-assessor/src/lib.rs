//! Credit-score risk assessment.
//!
//! The assessor turns Merkle-attested off-chain scores into the
//! collateral ratio a borrower must maintain. Scores are published as a
//! root by an external attestation service; callers hand in a proof and
//! the assessor verifies it before mapping.

pub mod mapper;

pub use mapper::{LinearMapper, ScoreMapper};

use keel_merkle::passport::PassportScoreTree;
use keel_types::math::MathError;
use keel_types::score::PassportScoreProof;
use keel_types::ZERO_ADDRESS;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssessError {
    #[error("bounds must satisfy 0 < lower < upper")]
    InvalidBounds,
    #[error("a score proof is required for this assessment")]
    ScoreRequired,
    #[error("score account is the null address")]
    NullAccount,
    #[error("a nonzero score needs a non-empty merkle proof")]
    MissingProof,
    #[error("score proof does not match the published root")]
    InvalidProof,
    #[error("max score is zero")]
    ZeroMaxScore,
    #[error("mapped ratio falls outside the configured bounds")]
    OutOfBounds,
    #[error("new value matches the current one")]
    Unchanged,
    #[error("null value rejected")]
    NullValue,
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Maps verified credit scores to required collateral ratios.
pub struct Assessor {
    mapper: Box<dyn ScoreMapper>,
    root: [u8; 32],
    max_score: u64,
}

impl Assessor {
    pub fn new(
        mapper: Box<dyn ScoreMapper>,
        root: [u8; 32],
        max_score: u64,
    ) -> Result<Self, AssessError> {
        if max_score == 0 {
            return Err(AssessError::ZeroMaxScore);
        }
        Ok(Self {
            mapper,
            root,
            max_score,
        })
    }

    pub fn root(&self) -> [u8; 32] {
        self.root
    }

    pub fn max_score(&self) -> u64 {
        self.max_score
    }

    /// Swap the mapping curve. Trait objects are not comparable, so
    /// there is no same-value rejection here; callers own that policy.
    pub fn set_mapper(&mut self, mapper: Box<dyn ScoreMapper>) {
        self.mapper = mapper;
    }

    pub fn set_root(&mut self, root: [u8; 32]) -> Result<(), AssessError> {
        if root == [0u8; 32] {
            return Err(AssessError::NullValue);
        }
        if root == self.root {
            return Err(AssessError::Unchanged);
        }
        self.root = root;
        Ok(())
    }

    pub fn set_max_score(&mut self, max_score: u64) -> Result<(), AssessError> {
        if max_score == 0 {
            return Err(AssessError::ZeroMaxScore);
        }
        if max_score == self.max_score {
            return Err(AssessError::Unchanged);
        }
        self.max_score = max_score;
        Ok(())
    }

    /// Check a supplied proof against the published root without
    /// assessing. A null account is rejected, and a nonzero score must
    /// carry a non-empty sibling list — an asserted score with no proof
    /// is never accepted.
    pub fn verify(&self, proof: &PassportScoreProof) -> Result<(), AssessError> {
        if proof.score.account == ZERO_ADDRESS {
            return Err(AssessError::NullAccount);
        }
        if proof.score.score > 0 && proof.merkle_proof.is_empty() {
            return Err(AssessError::MissingProof);
        }
        if !PassportScoreTree::verify(proof, &self.root) {
            return Err(AssessError::InvalidProof);
        }
        Ok(())
    }

    /// Assess the required collateral ratio for a borrower.
    ///
    /// With no proof (allowed only when the score is optional) the score
    /// is taken as zero, which maps to the most conservative ratio: an
    /// unattested borrower is never advantaged.
    pub fn assess(
        &self,
        lower: u128,
        upper: u128,
        proof: Option<&PassportScoreProof>,
        score_required: bool,
    ) -> Result<u128, AssessError> {
        if upper == 0 || lower >= upper {
            return Err(AssessError::InvalidBounds);
        }

        let score = match proof {
            None => {
                if score_required {
                    return Err(AssessError::ScoreRequired);
                }
                0
            }
            Some(p) => {
                self.verify(p)?;
                p.score.score
            }
        };

        let ratio = self.mapper.map(score, self.max_score, lower, upper)?;
        if ratio < lower || ratio > upper {
            return Err(AssessError::OutOfBounds);
        }
        debug!(score, ratio, "assessed collateral ratio");
        Ok(ratio)
    }
}
