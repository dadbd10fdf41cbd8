// src/persistence/mod.rs
//! Stores written after a successful backend call: content snapshots and
//! the append-only knowledge ledger.

pub mod ledger;
pub mod snapshot;

pub use ledger::{HashChainLedger, Ledger, LedgerEntry, LedgerRecord};
pub use snapshot::{FileSnapshotStore, Snapshot, SnapshotStore};
