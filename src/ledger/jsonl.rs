//! Line-delimited JSON ledger file.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::entry::LedgerEntry;
use super::Ledger;
use crate::error::LedgerError;

/// Append-only JSONL file, one entry per line, flushed per append.
pub struct JsonlLedger {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlLedger {
    /// Open the ledger file, creating it if missing. Existing entries are
    /// never touched.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Ledger for JsonlLedger {
    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let line = serde_json::to_string(entry)?;
        let mut writer = self.writer.lock().unwrap();
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        read_entries(&self.path)
    }
}

/// Read all entries from a ledger file. Blank lines are skipped; a malformed
/// line is an error, since the file is append-only and machine-written.
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<LedgerEntry>, LedgerError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::Side;
    use crate::ledger::entry::{LegRecord, Resolution};
    use crate::venue::OrderStatus;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample(resolution: Resolution) -> LedgerEntry {
        LedgerEntry {
            attempt_id: Uuid::new_v4(),
            market_id: "event-1".to_string(),
            basket_id: "event-1/a".to_string(),
            resolution,
            size: dec!(50),
            expected_profit: dec!(5),
            legs: vec![LegRecord {
                venue: "alpha".to_string(),
                instrument: "yes".to_string(),
                side: Side::Buy,
                order_id: Some("alpha-1".to_string()),
                requested_size: dec!(50),
                filled_size: dec!(50),
                avg_price: Some(dec!(0.40)),
                status: OrderStatus::Filled,
            }],
            unwinds: vec![],
            failure_reason: None,
            recorded_at_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn appends_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        {
            let ledger = JsonlLedger::open(&path).unwrap();
            ledger.append(&sample(Resolution::Settled)).unwrap();
            ledger.append(&sample(Resolution::AllFailed)).unwrap();
        }
        {
            let ledger = JsonlLedger::open(&path).unwrap();
            ledger.append(&sample(Resolution::Unwound)).unwrap();
        }

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].resolution, Resolution::Settled);
        assert_eq!(entries[1].resolution, Resolution::AllFailed);
        assert_eq!(entries[2].resolution, Resolution::Unwound);
    }

    #[test]
    fn replays_through_the_trait() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let ledger = JsonlLedger::open(&path).unwrap();
        ledger.append(&sample(Resolution::Settled)).unwrap();
        ledger.append(&sample(Resolution::Unwound)).unwrap();

        let entries = ledger.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].resolution, Resolution::Unwound);
    }

    #[test]
    fn entries_round_trip_field_for_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let entry = sample(Resolution::Settled);
        JsonlLedger::open(&path).unwrap().append(&entry).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries[0], entry);
    }
}
