use std::fmt;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::buckets::RiskBucket;

/// Identifier wrapper for loan applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for borrowers.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BorrowerId(pub String);

impl fmt::Display for BorrowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Review state of a loan application. Mutated by the external review workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub const fn display_label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Validated application record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Application {
    pub id: ApplicationId,
    pub borrower_id: BorrowerId,
    /// `None` means the amount was left unspecified.
    pub loan_amount: Option<f64>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Application {
    pub fn is_approved(&self) -> bool {
        self.status == ApplicationStatus::Approved
    }
}

/// One classifier invocation. Score events are append-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreEvent {
    pub application_id: ApplicationId,
    pub credit_score: Option<u8>,
    /// Label stored alongside the score; may lag behind the bucket table.
    pub risk_level: Option<RiskBucket>,
    pub scored_at: DateTime<Utc>,
    /// Store-assigned ingestion order.
    pub sequence: u64,
}

/// Validated borrower record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Borrower {
    pub borrower_id: BorrowerId,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Borrower {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Time range over `created_at` or `scored_at`. The start is always inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub end_inclusive: bool,
}

impl TimeWindow {
    /// Open-ended window starting at `start`.
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: None,
            end_inclusive: false,
        }
    }

    /// `[start, end]`
    pub fn through(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
            end_inclusive: true,
        }
    }

    /// `[start, end)`
    pub fn until(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: Some(end),
            end_inclusive: false,
        }
    }

    /// The `days` leading up to and including `now`; `None` when the start
    /// falls outside the representable calendar.
    pub fn trailing_days(now: DateTime<Utc>, days: i64) -> Option<Self> {
        let start = Duration::try_days(days).and_then(|span| now.checked_sub_signed(span))?;
        Some(Self::through(start, now))
    }

    /// Midnight UTC of `now`'s day through `now`.
    pub fn day_of(now: DateTime<Utc>) -> Self {
        Self::through(start_of_day(now.date_naive()), now)
    }

    /// January 1st of `year` up to January 1st of the following year.
    pub fn calendar_year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?;
        Some(Self::until(start_of_day(start), start_of_day(end)))
    }

    /// Smallest window containing both `self` and `other`.
    pub fn covering(&self, other: &TimeWindow) -> Self {
        let start = self.start.min(other.start);
        match (self.end, other.end) {
            (Some(left), Some(right)) => Self::through(start, left.max(right)),
            _ => Self::since(start),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if at < self.start {
            return false;
        }
        match self.end {
            Some(end) if self.end_inclusive => at <= end,
            Some(end) => at < end,
            None => true,
        }
    }
}

/// Current and prior windows compared by the stats view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodWindows {
    pub current: TimeWindow,
    pub prior: TimeWindow,
}

impl PeriodWindows {
    /// Current = first of this month through `now`; prior = the whole previous month.
    pub fn month_over_month(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let month_start = today.with_day(1).unwrap_or(today);
        let prior_start = month_start
            .checked_sub_months(Months::new(1))
            .unwrap_or(month_start);

        Self {
            current: TimeWindow::through(start_of_day(month_start), now),
            prior: TimeWindow::until(start_of_day(prior_start), start_of_day(month_start)),
        }
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
