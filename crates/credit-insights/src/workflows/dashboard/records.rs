//! Boundary between loosely-typed store rows and the strict records the
//! aggregation pipeline works on. Malformed rows are quarantined here and
//! tallied, never passed on and never fatal.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::buckets::RiskBucket;
use super::domain::{
    Application, ApplicationId, ApplicationStatus, Borrower, BorrowerId, ScoreEvent,
};
use super::store::{ApplicationRow, BorrowerRow, ScoreEventRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Application,
    ScoreEvent,
    Borrower,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            RecordKind::Application => "application",
            RecordKind::ScoreEvent => "score event",
            RecordKind::Borrower => "borrower",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ScoreOutOfRange,
    NonIntegralScore,
    NonPositiveLoanAmount,
    UnknownStatus,
    MissingBorrowerReference,
    MissingApplicationReference,
    MissingBorrowerDetails,
}

impl SkipReason {
    pub const fn label(self) -> &'static str {
        match self {
            SkipReason::ScoreOutOfRange => "credit score outside 0-100",
            SkipReason::NonIntegralScore => "credit score is not a whole number",
            SkipReason::NonPositiveLoanAmount => "loan amount is not a positive number",
            SkipReason::UnknownStatus => "status is missing or unrecognised",
            SkipReason::MissingBorrowerReference => "borrower reference is missing",
            SkipReason::MissingApplicationReference => "application reference is missing",
            SkipReason::MissingBorrowerDetails => "borrower name or phone is missing",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A row excluded from aggregation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed {kind} record '{record}': {reason}")]
pub struct MalformedRecord {
    pub kind: RecordKind,
    pub record: String,
    pub reason: SkipReason,
}

impl MalformedRecord {
    fn new(kind: RecordKind, record: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            kind,
            record: record.into(),
            reason,
        }
    }
}

/// Per-reason tally of rows dropped while building a view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipLedger {
    pub total: usize,
    pub by_reason: BTreeMap<SkipReason, usize>,
}

impl SkipLedger {
    pub fn record(&mut self, malformed: &MalformedRecord) {
        self.total += 1;
        *self.by_reason.entry(malformed.reason).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: &SkipLedger) {
        self.total += other.total;
        for (reason, count) in &other.by_reason {
            *self.by_reason.entry(*reason).or_insert(0) += count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn count(&self, reason: SkipReason) -> usize {
        self.by_reason.get(&reason).copied().unwrap_or(0)
    }
}

/// Records that passed validation plus the tally of those that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    pub records: Vec<T>,
    pub skipped: SkipLedger,
}

fn validate_all<R, T>(
    rows: &[R],
    validate: impl Fn(&R) -> Result<T, MalformedRecord>,
) -> Validated<T> {
    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = SkipLedger::default();

    for row in rows {
        match validate(row) {
            Ok(record) => records.push(record),
            Err(malformed) => {
                tracing::debug!(%malformed, "skipping malformed record");
                skipped.record(&malformed);
            }
        }
    }

    Validated { records, skipped }
}

pub fn validate_applications(rows: &[ApplicationRow]) -> Validated<Application> {
    validate_all(rows, validate_application)
}

pub fn validate_score_events(rows: &[ScoreEventRow]) -> Validated<ScoreEvent> {
    validate_all(rows, validate_score_event)
}

pub fn validate_borrowers(rows: &[BorrowerRow]) -> Validated<Borrower> {
    validate_all(rows, validate_borrower)
}

pub fn validate_application(row: &ApplicationRow) -> Result<Application, MalformedRecord> {
    let reject = |reason| MalformedRecord::new(RecordKind::Application, row.id.0.clone(), reason);

    let borrower_id = non_blank(row.borrower_id.as_deref())
        .map(BorrowerId)
        .ok_or_else(|| reject(SkipReason::MissingBorrowerReference))?;

    let status = row
        .status
        .as_deref()
        .and_then(ApplicationStatus::parse)
        .ok_or_else(|| reject(SkipReason::UnknownStatus))?;

    let loan_amount = match row.loan_amount {
        None => None,
        Some(amount) if amount.is_finite() && amount > 0.0 => Some(amount),
        Some(_) => return Err(reject(SkipReason::NonPositiveLoanAmount)),
    };

    Ok(Application {
        id: row.id.clone(),
        borrower_id,
        loan_amount,
        status,
        created_at: row.created_at,
        loan_purpose: non_blank(row.loan_purpose.as_deref()),
        notes: non_blank(row.notes.as_deref()),
    })
}

/// A `null` score is valid here; only the resolver decides to ignore it.
pub fn validate_score_event(row: &ScoreEventRow) -> Result<ScoreEvent, MalformedRecord> {
    let reject = |reason| {
        MalformedRecord::new(
            RecordKind::ScoreEvent,
            format!("#{}", row.sequence),
            reason,
        )
    };

    let application_id = non_blank(row.application_id.as_deref())
        .map(ApplicationId)
        .ok_or_else(|| reject(SkipReason::MissingApplicationReference))?;

    let credit_score = row
        .credit_score
        .map(|score| score_in_range(score).map_err(reject))
        .transpose()?;

    Ok(ScoreEvent {
        application_id,
        credit_score,
        risk_level: row.risk_level.as_deref().and_then(RiskBucket::parse),
        scored_at: row.scored_at,
        sequence: row.sequence,
    })
}

pub fn validate_borrower(row: &BorrowerRow) -> Result<Borrower, MalformedRecord> {
    let reject =
        |reason| MalformedRecord::new(RecordKind::Borrower, row.borrower_id.0.clone(), reason);

    let (Some(first_name), Some(last_name), Some(phone)) = (
        non_blank(row.first_name.as_deref()),
        non_blank(row.last_name.as_deref()),
        non_blank(row.phone.as_deref()),
    ) else {
        return Err(reject(SkipReason::MissingBorrowerDetails));
    };

    Ok(Borrower {
        borrower_id: row.borrower_id.clone(),
        first_name,
        last_name,
        phone,
        national_id: non_blank(row.national_id.as_deref()),
        email: non_blank(row.email.as_deref()),
        location: non_blank(row.location.as_deref()),
        created_at: row.created_at,
    })
}

pub(crate) fn score_in_range(score: f64) -> Result<u8, SkipReason> {
    if !score.is_finite() || score.fract() != 0.0 {
        return Err(SkipReason::NonIntegralScore);
    }
    if !(0.0..=100.0).contains(&score) {
        return Err(SkipReason::ScoreOutOfRange);
    }
    Ok(score as u8)
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
