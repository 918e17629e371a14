use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Address;

/// Identity a token layer reports for an asset it hands the ledger.
/// The ledger never trusts `decimals` for value conversion — it is only
/// compared against the decimals pinned in the whitelist at registration
/// time, and a mismatch rejects the asset outright.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssetMeta {
    pub ticker: String,
    pub decimals: u8,
}

impl AssetMeta {
    pub fn new(ticker: &str, decimals: u8) -> Self {
        Self {
            ticker: ticker.to_string(),
            decimals,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("unknown asset {0}")]
    UnknownAsset(String),
    #[error("account 0x{account} holds {held} {ticker}, needs {needed}")]
    InsufficientBalance {
        ticker: String,
        account: String,
        held: u128,
        needed: u128,
    },
    #[error("balance overflow for {ticker}")]
    BalanceOverflow { ticker: String },
}

/// External asset-transfer collaborator. Calls either fully succeed or
/// leave no trace; the ledger sequences its own state changes after the
/// transfers it depends on.
pub trait AssetTransfer {
    fn transfer_from(
        &mut self,
        ticker: &str,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TransferError>;

    fn mint(&mut self, ticker: &str, to: &Address, amount: u128) -> Result<(), TransferError>;

    fn burn(&mut self, ticker: &str, from: &Address, amount: u128) -> Result<(), TransferError>;

    fn balance_of(&self, ticker: &str, account: &Address) -> u128;
}

/// In-memory token ledger backing tests and the simulation runner.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MemoryBank {
    balances: HashMap<String, HashMap<Address, u128>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with funds, creating the asset if needed.
    pub fn credit(&mut self, ticker: &str, account: &Address, amount: u128) {
        let entry = self
            .balances
            .entry(ticker.to_string())
            .or_default()
            .entry(*account)
            .or_default();
        *entry = entry.saturating_add(amount);
    }

    fn debit(&mut self, ticker: &str, account: &Address, amount: u128) -> Result<(), TransferError> {
        let asset = self
            .balances
            .get_mut(ticker)
            .ok_or_else(|| TransferError::UnknownAsset(ticker.to_string()))?;
        let held = asset.entry(*account).or_default();
        if *held < amount {
            return Err(TransferError::InsufficientBalance {
                ticker: ticker.to_string(),
                account: hex::encode(account),
                held: *held,
                needed: amount,
            });
        }
        *held -= amount;
        Ok(())
    }
}

impl AssetTransfer for MemoryBank {
    fn transfer_from(
        &mut self,
        ticker: &str,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TransferError> {
        self.debit(ticker, from, amount)?;
        self.credit(ticker, to, amount);
        Ok(())
    }

    fn mint(&mut self, ticker: &str, to: &Address, amount: u128) -> Result<(), TransferError> {
        let entry = self
            .balances
            .entry(ticker.to_string())
            .or_default()
            .entry(*to)
            .or_default();
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| TransferError::BalanceOverflow {
                ticker: ticker.to_string(),
            })?;
        Ok(())
    }

    fn burn(&mut self, ticker: &str, from: &Address, amount: u128) -> Result<(), TransferError> {
        self.debit(ticker, from, amount)
    }

    fn balance_of(&self, ticker: &str, account: &Address) -> u128 {
        self.balances
            .get(ticker)
            .and_then(|asset| asset.get(account))
            .copied()
            .unwrap_or(0)
    }
}
