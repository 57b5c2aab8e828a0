//! Append-only exposure ledger.
//!
//! Every execution attempt that reaches a terminal state appends exactly one
//! entry, success or failure. The ledger is the audit trail that makes
//! residual exposure visible after crashes and failed unwinds.

pub mod entry;
pub mod jsonl;
pub mod memory;

use crate::error::LedgerError;

pub use entry::{open_exposure, LedgerEntry, LegRecord, Resolution, UnwindRecord};
pub use jsonl::{read_entries, JsonlLedger};
pub use memory::MemoryLedger;

/// Ledger sink. Appends must be durable before returning.
pub trait Ledger: Send + Sync {
    /// Append one entry.
    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError>;

    /// Replay every entry in append order.
    fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError>;
}
