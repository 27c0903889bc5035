use std::sync::{Mutex, MutexGuard};

use crate::workflows::dashboard::{
    ApplicationQuery, ApplicationRow, BorrowerId, BorrowerRow, RecordStore, ScoreEventQuery,
    ScoreEventRow, StoreError,
};

/// In-memory record store backed by an exported snapshot.
///
/// Score events receive ingestion sequence numbers in insertion order, the
/// same guarantee the remote store gives.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    applications: Vec<ApplicationRow>,
    score_events: Vec<ScoreEventRow>,
    borrowers: Vec<BorrowerRow>,
    last_sequence: u64,
}

impl Tables {
    fn push_score_event(&mut self, mut row: ScoreEventRow) -> ScoreEventRow {
        self.last_sequence += 1;
        row.sequence = self.last_sequence;
        self.score_events.push(row.clone());
        row
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads rows as-is, without validation; score events are sequenced in
    /// the order given.
    pub fn from_rows(
        applications: Vec<ApplicationRow>,
        score_events: Vec<ScoreEventRow>,
        borrowers: Vec<BorrowerRow>,
    ) -> Self {
        let mut tables = Tables {
            applications,
            borrowers,
            ..Tables::default()
        };
        for row in score_events {
            tables.push_score_event(row);
        }

        Self {
            tables: Mutex::new(tables),
        }
    }

    pub fn counts(&self) -> Result<SnapshotCounts, StoreError> {
        let tables = self.lock()?;
        Ok(SnapshotCounts {
            applications: tables.applications.len(),
            score_events: tables.score_events.len(),
            borrowers: tables.borrowers.len(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("snapshot store lock poisoned".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotCounts {
    pub applications: usize,
    pub score_events: usize,
    pub borrowers: usize,
}

impl RecordStore for SnapshotStore {
    fn applications(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRow>, StoreError> {
        let tables = self.lock()?;
        Ok(query.apply(&tables.applications))
    }

    fn score_events(&self, query: &ScoreEventQuery) -> Result<Vec<ScoreEventRow>, StoreError> {
        let tables = self.lock()?;
        Ok(query.apply(&tables.score_events))
    }

    fn borrowers(&self, ids: &[BorrowerId]) -> Result<Vec<BorrowerRow>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .borrowers
            .iter()
            .filter(|row| ids.contains(&row.borrower_id))
            .cloned()
            .collect())
    }

    fn insert_application(
        &self,
        row: ApplicationRow,
        initial_score: Option<ScoreEventRow>,
    ) -> Result<(ApplicationRow, Option<ScoreEventRow>), StoreError> {
        let mut tables = self.lock()?;
        if tables.applications.iter().any(|existing| existing.id == row.id) {
            return Err(StoreError::Conflict);
        }
        tables.applications.push(row.clone());
        let score = initial_score.map(|score| tables.push_score_event(score));
        Ok((row, score))
    }

    fn insert_borrower(&self, row: BorrowerRow) -> Result<BorrowerRow, StoreError> {
        let mut tables = self.lock()?;
        if tables
            .borrowers
            .iter()
            .any(|existing| existing.borrower_id == row.borrower_id)
        {
            return Err(StoreError::Conflict);
        }
        tables.borrowers.push(row.clone());
        Ok(row)
    }

    fn insert_score_event(&self, row: ScoreEventRow) -> Result<ScoreEventRow, StoreError> {
        let mut tables = self.lock()?;
        Ok(tables.push_score_event(row))
    }
}
