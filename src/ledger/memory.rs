//! In-memory ledger for tests and paper trading.

use std::sync::Mutex;

use super::entry::LedgerEntry;
use super::Ledger;
use crate::error::LedgerError;

/// Keeps entries in a vector.
#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries appended so far.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl Ledger for MemoryLedger {
    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.entries())
    }
}
