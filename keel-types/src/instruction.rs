use serde::{Deserialize, Serialize};

use crate::asset::AssetMeta;
use crate::score::PassportScoreProof;
use crate::Address;

/// Every operation the vault ledger executes.
///
/// Score proofs are optional on user operations: a missing proof falls
/// back to the most conservative assessed ratio, a supplied proof must
/// verify. Admin variants are gated on the configured admin address.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum VaultInstruction {
    // ── Vault operations ──
    Deposit {
        amount: u128,
        score_proof: Option<PassportScoreProof>,
    },
    Borrow {
        amount: u128,
        score_proof: Option<PassportScoreProof>,
        limit_proof: Option<PassportScoreProof>,
    },
    Repay {
        amount: u128,
        asset: AssetMeta,
        score_proof: Option<PassportScoreProof>,
    },
    Withdraw {
        amount: u128,
        score_proof: Option<PassportScoreProof>,
    },
    Liquidate {
        account: Address,
        asset: AssetMeta,
        score_proof: Option<PassportScoreProof>,
    },

    // ── Admin operations ──
    SetFees {
        liquidator_discount: u128,
        liquidation_fee: u128,
    },
    SetInterestRate {
        rate_per_second: u128,
    },
    SetRatioBounds {
        low: u128,
        high: u128,
    },
    SetLimitRoot {
        root: [u8; 32],
    },
    AddRepayAsset {
        ticker: String,
        decimals: u8,
    },
    RemoveRepayAsset {
        ticker: String,
    },
    SetPaused {
        paused: bool,
    },
}
