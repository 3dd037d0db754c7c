//! Incremental merge of a fetched batch into the persisted history
//!
//! Dates are the key. A date already present in the history keeps its
//! existing row; the fetched value for it is dropped. Only dates the history
//! has never seen are appended.

use super::{Dataset, HistoryError, HistoryStore, TabularRecord};
use std::collections::HashSet;
use std::fmt;

/// Which path the merge took
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// No history on disk, or the file was empty
    ColdStart,
    /// History existed but could not be read; it was discarded
    Recovered { reason: String },
    /// New dates were appended to the existing history
    Appended { added: usize },
    /// Every fetched date was already known
    UpToDate,
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeOutcome::ColdStart => write!(f, "new history"),
            MergeOutcome::Recovered { reason } => write!(f, "history discarded ({})", reason),
            MergeOutcome::Appended { added } => write!(f, "{} new rows", added),
            MergeOutcome::UpToDate => write!(f, "up to date"),
        }
    }
}

/// Merged dataset plus how it was produced
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub dataset: Dataset,
    pub outcome: MergeOutcome,
    /// Rows loaded from history before merging
    pub existing_rows: usize,
}

/// Merge `incoming` into an optional existing dataset
pub fn merge(existing: Option<Dataset>, incoming: Vec<TabularRecord>) -> MergeResult {
    let Some(mut existing) = existing else {
        return MergeResult {
            dataset: Dataset::from_batch(incoming),
            outcome: MergeOutcome::ColdStart,
            existing_rows: 0,
        };
    };

    let existing_rows = existing.len();
    let existing_dates = existing.dates();
    let incoming_dates: HashSet<_> = incoming.iter().map(|r| r.date()).collect();
    let missing: HashSet<_> = incoming_dates.difference(&existing_dates).copied().collect();

    let outcome = if missing.is_empty() {
        MergeOutcome::UpToDate
    } else {
        let before = existing.len();
        // A batch may repeat a date; only its first row is taken.
        let mut taken = HashSet::new();
        for record in incoming {
            if missing.contains(&record.date()) && taken.insert(record.date()) {
                existing.push(record);
            }
        }
        MergeOutcome::Appended {
            added: existing.len() - before,
        }
    };

    existing.sort_descending();

    MergeResult {
        dataset: existing,
        outcome,
        existing_rows,
    }
}

/// Load `store` and merge `incoming` into it
///
/// An unreadable history never blocks the run: the error is logged and the
/// merge proceeds as a cold start with the fetched batch alone.
pub fn merge_with_history(store: &HistoryStore, incoming: Vec<TabularRecord>) -> MergeResult {
    match store.load() {
        Ok(existing) => merge(existing, incoming),
        Err(e) => recover(store, e, incoming),
    }
}

fn recover(store: &HistoryStore, error: HistoryError, incoming: Vec<TabularRecord>) -> MergeResult {
    tracing::warn!(
        path = ?store.path(),
        error = %error,
        "Could not read existing history, starting from fetched data"
    );

    MergeResult {
        dataset: Dataset::from_batch(incoming),
        outcome: MergeOutcome::Recovered {
            reason: error.to_string(),
        },
        existing_rows: 0,
    }
}
