use serde::{Deserialize, Serialize};

use crate::Address;

/// One entry in the ordered event log. `seq` is dense and ascending so
/// an external indexer can detect gaps and replay idempotently.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LedgerEvent {
    pub seq: u64,
    pub timestamp: u64,
    pub kind: EventKind,
}

/// Every state mutation the ledger performs emits exactly one of these
/// (liquidation may additionally emit `DebtWrittenOff`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum EventKind {
    Deposited {
        account: Address,
        amount: u128,
        collateral_after: u128,
    },
    Borrowed {
        account: Address,
        amount: u128,
        normalized_after: u128,
    },
    Repaid {
        account: Address,
        ticker: String,
        amount_base: u128,
        normalized_after: u128,
    },
    Withdrawn {
        account: Address,
        amount: u128,
        collateral_after: u128,
    },
    Liquidated {
        account: Address,
        liquidator: Address,
        debt_repaid: u128,
        collateral_seized: u128,
        collateral_to_liquidator: u128,
        collateral_to_treasury: u128,
        closed: bool,
    },
    DebtWrittenOff {
        account: Address,
        amount: u128,
    },
    IndexAccrued {
        index: u128,
    },
    FeesUpdated {
        liquidator_discount: u128,
        liquidation_fee: u128,
    },
    InterestRateUpdated {
        rate_per_second: u128,
    },
    RatioBoundsUpdated {
        low: u128,
        high: u128,
    },
    LimitRootUpdated {
        root: [u8; 32],
    },
    RepayAssetAdded {
        ticker: String,
        decimals: u8,
    },
    RepayAssetRemoved {
        ticker: String,
    },
    PausedSet {
        paused: bool,
    },
}
