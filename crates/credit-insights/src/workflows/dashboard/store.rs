use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, ApplicationStatus, BorrowerId, TimeWindow};

/// Application row as the record store returns it. Store-managed columns are
/// typed; user-entered columns are not trusted until validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRow {
    pub id: ApplicationId,
    #[serde(default)]
    pub borrower_id: Option<String>,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub loan_purpose: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub submitted_by: Option<String>,
}

/// Score event row. `sequence` is assigned by the store on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEventRow {
    #[serde(default)]
    pub application_id: Option<String>,
    #[serde(default)]
    pub credit_score: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<String>,
    pub scored_at: DateTime<Utc>,
    #[serde(default)]
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerRow {
    pub borrower_id: BorrowerId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Range-filtered read of applications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationQuery {
    pub ids: Option<BTreeSet<ApplicationId>>,
    pub created: Option<TimeWindow>,
    pub status: Option<ApplicationStatus>,
    /// Return only the newest `n` rows, newest first.
    pub newest_first_limit: Option<usize>,
}

impl ApplicationQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn created_within(window: TimeWindow) -> Self {
        Self {
            created: Some(window),
            ..Self::default()
        }
    }

    pub fn for_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ApplicationId>,
    {
        Self {
            ids: Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn newest(limit: usize) -> Self {
        Self {
            newest_first_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: ApplicationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, row: &ApplicationRow) -> bool {
        let in_set = self.ids.as_ref().map_or(true, |ids| ids.contains(&row.id));
        let in_window = self
            .created
            .map_or(true, |window| window.contains(row.created_at));
        let status_matches = self.status.map_or(true, |status| {
            row.status.as_deref().and_then(ApplicationStatus::parse) == Some(status)
        });
        in_set && in_window && status_matches
    }

    /// Reference evaluation of the query over an in-memory table.
    pub fn apply<'a, I>(&self, rows: I) -> Vec<ApplicationRow>
    where
        I: IntoIterator<Item = &'a ApplicationRow>,
    {
        let mut matched: Vec<ApplicationRow> = rows
            .into_iter()
            .filter(|row| self.matches(row))
            .cloned()
            .collect();

        if let Some(limit) = self.newest_first_limit {
            matched.sort_by(|left, right| {
                right
                    .created_at
                    .cmp(&left.created_at)
                    .then_with(|| right.id.cmp(&left.id))
            });
            matched.truncate(limit);
        }

        matched
    }
}

/// Read of score events by `scored_at` range and/or application id set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreEventQuery {
    pub scored: Option<TimeWindow>,
    pub application_ids: Option<BTreeSet<ApplicationId>>,
}

impl ScoreEventQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn scored_within(window: TimeWindow) -> Self {
        Self {
            scored: Some(window),
            application_ids: None,
        }
    }

    pub fn for_applications<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ApplicationId>,
    {
        Self {
            scored: None,
            application_ids: Some(ids.into_iter().collect()),
        }
    }

    pub fn matches(&self, row: &ScoreEventRow) -> bool {
        let in_window = self
            .scored
            .map_or(true, |window| window.contains(row.scored_at));
        let in_set = match (&self.application_ids, row.application_id.as_deref()) {
            (None, _) => true,
            (Some(ids), Some(id)) => ids.contains(&ApplicationId(id.to_string())),
            (Some(_), None) => false,
        };
        in_window && in_set
    }

    pub fn apply<'a, I>(&self, rows: I) -> Vec<ScoreEventRow>
    where
        I: IntoIterator<Item = &'a ScoreEventRow>,
    {
        rows.into_iter()
            .filter(|row| self.matches(row))
            .cloned()
            .collect()
    }
}

/// Query/insert contract of the remote record store.
///
/// Reads are independent snapshots; implementations may be slow or fail, and
/// the dashboard service bounds every call with a timeout.
pub trait RecordStore: Send + Sync {
    fn applications(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRow>, StoreError>;
    fn score_events(&self, query: &ScoreEventQuery) -> Result<Vec<ScoreEventRow>, StoreError>;
    fn borrowers(&self, ids: &[BorrowerId]) -> Result<Vec<BorrowerRow>, StoreError>;
    /// Writes the application together with its first score event, if any.
    /// Both rows land or neither does.
    fn insert_application(
        &self,
        row: ApplicationRow,
        initial_score: Option<ScoreEventRow>,
    ) -> Result<(ApplicationRow, Option<ScoreEventRow>), StoreError>;
    fn insert_borrower(&self, row: BorrowerRow) -> Result<BorrowerRow, StoreError>;
    /// The store overwrites `row.sequence` with its own ingestion counter.
    fn insert_score_event(&self, row: ScoreEventRow) -> Result<ScoreEventRow, StoreError>;
}

/// Error enumeration for record store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("record store read timed out after {0} ms")]
    TimedOut(u64),
    #[error("record store call was cancelled: {0}")]
    Cancelled(String),
    /// A write was abandoned before the store answered; it may still land.
    #[error("record store write outcome unknown: {0}")]
    OutcomeUnknown(String),
}

impl StoreError {
    /// Transport-level read failures; retrying the whole view may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::TimedOut(_) | StoreError::Cancelled(_)
        )
    }
}
