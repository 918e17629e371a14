//! RocksDB-backed store.
//!
//! The full state lives under one fixed key; events are additionally
//! indexed by sequence number so an external consumer can page through
//! the log without deserializing the whole state.

use anyhow::{anyhow, Result};
use keel_types::event::LedgerEvent;
use keel_types::LedgerState;
use rocksdb::{Options, DB};

const STATE_KEY: &[u8] = b"ledger_state";

pub struct Db {
    pub db: DB,
}

impl Db {
    pub fn open(path: &str) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(|e| anyhow!("failed to open db: {e}"))?;
        Ok(Self { db })
    }

    pub fn save_state(&self, state: &LedgerState) -> Result<()> {
        let encoded =
            bincode::serialize(state).map_err(|e| anyhow!("serialization error: {e}"))?;
        self.db
            .put(STATE_KEY, encoded)
            .map_err(|e| anyhow!("db write error: {e}"))?;
        Ok(())
    }

    pub fn load_state(&self) -> Result<LedgerState> {
        match self.db.get(STATE_KEY) {
            Ok(Some(value)) => {
                bincode::deserialize(&value).map_err(|e| anyhow!("deserialization error: {e}"))
            }
            Ok(None) => Ok(LedgerState::default()),
            Err(e) => Err(anyhow!("db read error: {e}")),
        }
    }

    pub fn save_event(&self, event: &LedgerEvent) -> Result<()> {
        let encoded =
            bincode::serialize(event).map_err(|e| anyhow!("serialization error: {e}"))?;
        self.db
            .put(event_key(event.seq).as_bytes(), encoded)
            .map_err(|e| anyhow!("db event-index error: {e}"))?;
        Ok(())
    }

    pub fn load_event(&self, seq: u64) -> Result<Option<LedgerEvent>> {
        match self.db.get(event_key(seq).as_bytes())? {
            Some(v) => Ok(Some(bincode::deserialize(&v)?)),
            None => Ok(None),
        }
    }
}

/// Zero-padded so lexicographic key order matches sequence order.
fn event_key(seq: u64) -> String {
    format!("event_{seq:020}")
}
