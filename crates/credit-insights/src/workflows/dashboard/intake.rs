use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::buckets::RiskBucket;
use super::domain::{ApplicationId, ApplicationStatus, BorrowerId};
use super::records::{non_blank, score_in_range};
use super::store::{ApplicationRow, BorrowerRow, ScoreEventRow};

/// Staff roles allowed to operate the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    LoanOfficer,
    CreditManager,
    Admin,
}

impl UserRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "loan_officer" => Some(Self::LoanOfficer),
            "credit_manager" => Some(Self::CreditManager),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::LoanOfficer => "Loan Officer",
            Self::CreditManager => "Credit Manager",
            Self::Admin => "Administrator",
        }
    }
}

/// Acting user for a write, passed explicitly into every intake operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, role: Option<UserRole>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BorrowerSubmission {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub borrower_id: BorrowerId,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub loan_purpose: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Defaults to `pending`.
    #[serde(default)]
    pub status: Option<String>,
    /// Classifier output captured at submission time, recorded as the first
    /// score event for the new application.
    #[serde(default)]
    pub credit_score: Option<f64>,
    #[serde(default)]
    pub risk_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub credit_score: f64,
    #[serde(default)]
    pub risk_level: Option<String>,
}

/// Reasons a write is refused before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeViolation {
    #[error("acting user is required")]
    MissingUser,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("loan amount must be a positive number")]
    InvalidLoanAmount,
    #[error("unknown application status '{0}'")]
    UnknownStatus(String),
    #[error("credit score must be a whole number between 0 and 100")]
    InvalidScore,
    #[error("unknown risk level '{0}'")]
    UnknownRiskLevel(String),
    #[error("email address '{0}' is not valid")]
    InvalidEmail(String),
}

/// Turns inbound submissions into store rows, rejecting anything the record
/// boundary would later quarantine.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntakeGuard;

impl IntakeGuard {
    pub fn borrower_row(
        &self,
        context: &RequestContext,
        borrower_id: BorrowerId,
        submission: BorrowerSubmission,
        now: DateTime<Utc>,
    ) -> Result<BorrowerRow, IntakeViolation> {
        let created_by = acting_user(context)?;
        let first_name = required(&submission.first_name, "first name")?;
        let last_name = required(&submission.last_name, "last name")?;
        let phone = required(&submission.phone, "phone")?;

        let email = non_blank(submission.email.as_deref());
        if let Some(email) = &email {
            if !looks_like_email(email) {
                return Err(IntakeViolation::InvalidEmail(email.clone()));
            }
        }

        Ok(BorrowerRow {
            borrower_id,
            first_name: Some(first_name),
            last_name: Some(last_name),
            phone: Some(phone),
            national_id: non_blank(submission.national_id.as_deref()),
            email,
            location: non_blank(submission.location.as_deref()),
            created_at: now,
            created_by: Some(created_by),
        })
    }

    /// Returns the application row plus the optional initial score event.
    pub fn application_rows(
        &self,
        context: &RequestContext,
        id: ApplicationId,
        submission: ApplicationSubmission,
        now: DateTime<Utc>,
    ) -> Result<(ApplicationRow, Option<ScoreEventRow>), IntakeViolation> {
        let submitted_by = acting_user(context)?;
        let borrower_id = required(&submission.borrower_id.0, "borrower")?;

        let loan_amount = match submission.loan_amount {
            None => None,
            Some(amount) if amount.is_finite() && amount > 0.0 => Some(amount),
            Some(_) => return Err(IntakeViolation::InvalidLoanAmount),
        };

        let status = match non_blank(submission.status.as_deref()) {
            None => ApplicationStatus::Pending,
            Some(raw) => {
                ApplicationStatus::parse(&raw).ok_or(IntakeViolation::UnknownStatus(raw))?
            }
        };

        let initial_score = submission
            .credit_score
            .map(|score| self.score_row(&id, score, submission.risk_level.as_deref(), now))
            .transpose()?;

        let application = ApplicationRow {
            id,
            borrower_id: Some(borrower_id),
            loan_amount,
            status: Some(status.label().to_string()),
            created_at: now,
            loan_purpose: non_blank(submission.loan_purpose.as_deref()),
            notes: non_blank(submission.notes.as_deref()),
            submitted_by: Some(submitted_by),
        };

        Ok((application, initial_score))
    }

    pub fn score_event_row(
        &self,
        context: &RequestContext,
        application_id: &ApplicationId,
        submission: ScoreSubmission,
        now: DateTime<Utc>,
    ) -> Result<ScoreEventRow, IntakeViolation> {
        acting_user(context)?;
        self.score_row(
            application_id,
            submission.credit_score,
            submission.risk_level.as_deref(),
            now,
        )
    }

    fn score_row(
        &self,
        application_id: &ApplicationId,
        credit_score: f64,
        risk_level: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ScoreEventRow, IntakeViolation> {
        let score = score_in_range(credit_score).map_err(|_| IntakeViolation::InvalidScore)?;

        let risk_level = match non_blank(risk_level) {
            None => None,
            Some(raw) => Some(
                RiskBucket::parse(&raw)
                    .ok_or(IntakeViolation::UnknownRiskLevel(raw))?
                    .label()
                    .to_string(),
            ),
        };

        Ok(ScoreEventRow {
            application_id: Some(application_id.0.clone()),
            credit_score: Some(f64::from(score)),
            risk_level,
            scored_at: now,
            sequence: 0,
        })
    }
}

fn acting_user(context: &RequestContext) -> Result<String, IntakeViolation> {
    non_blank(Some(&context.user_id)).ok_or(IntakeViolation::MissingUser)
}

fn required(value: &str, field: &'static str) -> Result<String, IntakeViolation> {
    non_blank(Some(value)).ok_or(IntakeViolation::MissingField(field))
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}
