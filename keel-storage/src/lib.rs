//! Ledger state persistence.
//!
//! The default backend is a plain bincode snapshot file: the whole
//! [`LedgerState`] serialized in one shot, loaded back on restart, a
//! missing file meaning a fresh ledger. A RocksDB-backed store lives
//! behind the `rocksdb` feature for deployments that want the event log
//! queryable by sequence number.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use keel_types::LedgerState;

#[cfg(feature = "rocksdb")]
pub mod db;

/// Serialize the full ledger state to `path`, replacing any previous
/// snapshot.
pub fn save_state(path: &Path, state: &LedgerState) -> Result<()> {
    let encoded =
        bincode::serialize(state).map_err(|e| anyhow!("snapshot serialization error: {e}"))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating snapshot directory {}", parent.display()))?;
        }
    }
    fs::write(path, encoded).with_context(|| format!("writing snapshot {}", path.display()))
}

/// Load a snapshot, or a fresh default ledger when none exists yet.
pub fn load_state(path: &Path) -> Result<LedgerState> {
    if !path.exists() {
        return Ok(LedgerState::default());
    }
    let bytes = fs::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;
    bincode::deserialize(&bytes).map_err(|e| anyhow!("snapshot deserialization error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::event::{EventKind, LedgerEvent};
    use keel_types::math::BASE;
    use keel_types::state::LedgerConfig;
    use keel_types::Vault;

    fn populated_state() -> LedgerState {
        let mut state = LedgerState::new(LedgerConfig::default(), 7);
        state.vaults.insert(
            [1u8; 32],
            Vault {
                collateral_amount: 10 * BASE,
                normalized_borrowed_amount: 5000 * BASE,
            },
        );
        state.total_normalized_debt = 5000 * BASE;
        state.limit_root = Some([9u8; 32]);
        state.events.push(LedgerEvent {
            seq: 0,
            timestamp: 7,
            kind: EventKind::Deposited {
                account: [1u8; 32],
                amount: 10 * BASE,
                collateral_after: 10 * BASE,
            },
        });
        state
    }

    #[test]
    fn snapshot_round_trips() {
        let path = std::env::temp_dir().join("keel-snapshot-round-trip.bin");
        let state = populated_state();
        save_state(&path, &state).unwrap();
        assert_eq!(load_state(&path).unwrap(), state);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_snapshot_loads_a_fresh_ledger() {
        let path = std::env::temp_dir().join("keel-snapshot-absent.bin");
        let _ = fs::remove_file(&path);
        assert_eq!(load_state(&path).unwrap(), LedgerState::default());
    }

    #[test]
    fn corrupt_snapshot_is_an_error_not_a_default() {
        let path = std::env::temp_dir().join("keel-snapshot-corrupt.bin");
        fs::write(&path, b"not a snapshot").unwrap();
        assert!(load_state(&path).is_err());
        fs::remove_file(&path).unwrap();
    }
}
