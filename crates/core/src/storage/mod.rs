//! Persistence backends for the catalog.

/// Flat text files: members, books and the transaction log.
pub mod flat_file;

use anyhow::Result;

use crate::{
    catalog::{Catalog, CounterCorrection, DroppedLoan},
    error::LibraryError,
};

pub use flat_file::FlatFileStore;

/// Seam between the catalog and wherever its state lives.
pub trait Persistence: Send {
    /// Short human-readable description of the backend.
    fn describe(&self) -> String;

    /// Rebuild a catalog. Bad records are skipped and reported, never fatal.
    fn load(&self) -> Result<LoadReport>;

    /// Persist the full catalog state.
    fn save(&self, catalog: &Catalog) -> Result<()>;

    /// Whether `save` actually writes anywhere.
    fn is_durable(&self) -> bool {
        true
    }
}

/// Result of loading persisted state.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// The rebuilt catalog.
    pub catalog: Catalog,
    /// Lines skipped because they could not be decoded.
    pub malformed: Vec<LibraryError>,
    /// Loans discarded because they contradicted the book counters.
    pub dropped_loans: Vec<DroppedLoan>,
    /// Books whose lent-out count named copies no member holds.
    pub corrected_counters: Vec<CounterCorrection>,
}

impl LoadReport {
    /// True when nothing had to be skipped, dropped or corrected.
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty()
            && self.dropped_loans.is_empty()
            && self.corrected_counters.is_empty()
    }

    /// Operator-facing descriptions of everything that was skipped.
    pub fn issues(&self) -> Vec<String> {
        self.malformed
            .iter()
            .map(ToString::to_string)
            .chain(self.dropped_loans.iter().map(|loan| {
                format!(
                    "dropped loan of book {} by member {}: {}",
                    loan.book_id, loan.member_id, loan.reason
                )
            }))
            .chain(self.corrected_counters.iter().map(|fix| {
                format!(
                    "book {} available copies corrected from {} to {}: no member holds the rest",
                    fix.book_id, fix.recorded_available, fix.corrected_available
                )
            }))
            .collect()
    }
}

/// Keeps everything in memory; nothing survives the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStore;

impl Persistence for MemoryStore {
    fn describe(&self) -> String {
        "in-memory (not persisted)".to_string()
    }

    fn load(&self) -> Result<LoadReport> {
        Ok(LoadReport::default())
    }

    fn save(&self, _catalog: &Catalog) -> Result<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookId, MemberId};

    #[test]
    fn memory_store_starts_empty_and_discards_saves() -> Result<()> {
        let store = MemoryStore;
        let mut catalog = store.load()?.catalog;
        catalog.add_book("Dune", "Herbert", 1);
        store.save(&catalog)?;

        assert!(store.load()?.catalog.books().is_empty());
        assert!(!store.is_durable());
        Ok(())
    }

    #[test]
    fn report_lists_every_issue() {
        let report = LoadReport {
            catalog: Catalog::new(),
            malformed: vec![LibraryError::MalformedLine {
                file: "members.txt".into(),
                line_number: 2,
                content: "Asha,1".to_string(),
                reason: "expected 3 fields, found 2".to_string(),
            }],
            dropped_loans: vec![DroppedLoan {
                member_id: MemberId(1),
                book_id: BookId(9),
                reason: "book does not exist",
            }],
            corrected_counters: vec![CounterCorrection {
                book_id: BookId(3),
                recorded_available: 0,
                corrected_available: 1,
            }],
        };

        assert!(!report.is_clean());
        let issues = report.issues();
        assert_eq!(issues.len(), 3);
        assert!(issues[0].contains("line 2 in members.txt"));
        assert_eq!(
            issues[1],
            "dropped loan of book 9 by member 1: book does not exist"
        );
        assert_eq!(
            issues[2],
            "book 3 available copies corrected from 0 to 1: no member holds the rest"
        );
    }
}
