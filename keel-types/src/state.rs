use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event::LedgerEvent;
use crate::math::{BASE, DECIMALS, INDEX_ONE};
use crate::vault::Vault;
use crate::{Address, ZERO_ADDRESS};

/// Protocol parameters. Mutated only through admin instructions; every
/// change is evented.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub admin: Address,
    /// Account holding deposited collateral.
    pub custody: Address,
    /// Account receiving the protocol's cut of seized collateral.
    pub fee_treasury: Address,
    pub collateral_ticker: String,
    pub synthetic_ticker: String,
    /// Protocol tag expected on risk-score attestations.
    pub score_protocol: String,
    /// Protocol tag expected on borrow-limit attestations.
    pub limit_protocol: String,
    /// Best assessed collateral ratio, granted at the score ceiling.
    pub collateral_ratio_low: u128,
    /// Worst assessed collateral ratio, applied to unattested borrowers.
    pub collateral_ratio_high: u128,
    /// Fraction of the spot price forgiven to the liquidator, < BASE.
    pub liquidator_discount: u128,
    /// Fraction of seized collateral routed to the fee treasury.
    pub liquidation_fee: u128,
    /// Per-second interest rate at INDEX_ONE scale.
    pub rate_per_second: u128,
    /// Whether ratio assessment demands an attested score.
    pub score_required: bool,
    /// Paused blocks new borrows and nothing else.
    pub paused: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            admin: ZERO_ADDRESS,
            custody: ZERO_ADDRESS,
            fee_treasury: ZERO_ADDRESS,
            collateral_ticker: "COLL".to_string(),
            synthetic_ticker: "kUSD".to_string(),
            score_protocol: "keel.credit".to_string(),
            limit_protocol: "keel.creditLimit".to_string(),
            collateral_ratio_low: BASE,
            collateral_ratio_high: 2 * BASE,
            liquidator_discount: BASE / 10,
            liquidation_fee: BASE / 20,
            rate_per_second: 0,
            score_required: false,
            paused: false,
        }
    }
}

/// Global interest accumulator shared by every vault. Monotonically
/// non-decreasing; converts normalized amounts into current debt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BorrowIndex {
    /// INDEX_ONE scale, starts at 1.0.
    pub value: u128,
    pub last_updated: u64,
}

impl BorrowIndex {
    pub fn new(at: u64) -> Self {
        Self {
            value: INDEX_ONE,
            last_updated: at,
        }
    }
}

impl Default for BorrowIndex {
    fn default() -> Self {
        Self::new(0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LedgerState {
    pub config: LedgerConfig,
    pub vaults: HashMap<Address, Vault>,
    pub borrow_index: BorrowIndex,
    pub total_normalized_debt: u128,
    /// Cumulative debt written off against exhausted collateral.
    pub bad_debt: u128,
    /// Root of the borrow-limit attestation tree; None disables limits.
    pub limit_root: Option<[u8; 32]>,
    /// Whitelisted repay assets: ticker -> pinned decimals.
    pub repay_assets: HashMap<String, u8>,
    pub events: Vec<LedgerEvent>,
}

impl LedgerState {
    pub fn new(config: LedgerConfig, genesis_time: u64) -> Self {
        let mut repay_assets = HashMap::new();
        repay_assets.insert(config.synthetic_ticker.clone(), DECIMALS);
        Self {
            config,
            vaults: HashMap::new(),
            borrow_index: BorrowIndex::new(genesis_time),
            total_normalized_debt: 0,
            bad_debt: 0,
            limit_root: None,
            repay_assets,
            events: Vec::new(),
        }
    }

    pub fn vault(&self, account: &Address) -> Vault {
        self.vaults.get(account).cloned().unwrap_or_default()
    }
}
