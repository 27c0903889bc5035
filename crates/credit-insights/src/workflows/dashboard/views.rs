//! Serializable payloads returned by the dashboard service. Every view carries
//! the skip ledger of the records it had to leave out.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::buckets::{RiskBucket, RiskDistribution};
use super::comparison::{PeriodComparison, PeriodStats};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, Borrower, BorrowerId, PeriodWindows, ScoreEvent,
    TimeWindow,
};
use super::formatting::{format_money, format_rate, format_score};
use super::records::SkipLedger;
use super::resolver::{EffectiveScore, EffectiveScores};
use super::trend::MonthlyTrendPoint;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveScoresView {
    pub scores: EffectiveScores,
    pub skipped_records: SkipLedger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskDistributionView {
    pub as_of: DateTime<Utc>,
    pub window: TimeWindow,
    pub include_unknown: bool,
    #[serde(flatten)]
    pub distribution: RiskDistribution,
    pub skipped_records: SkipLedger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreTrendView {
    pub year: i32,
    pub points: Vec<MonthlyTrendPoint>,
    pub skipped_records: SkipLedger,
}

/// All-time counters shown above the comparison cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadlineCounts {
    pub total_applications: usize,
    pub approved_today: usize,
    pub pending_review: usize,
    pub total_loan_volume: f64,
    pub total_loan_volume_display: String,
}

impl HeadlineCounts {
    pub fn compute(now: DateTime<Utc>, applications: &[Application], currency: &str) -> Self {
        let today = TimeWindow::day_of(now);
        let approved_today = applications
            .iter()
            .filter(|application| {
                application.is_approved() && today.contains(application.created_at)
            })
            .count();
        let pending_review = applications
            .iter()
            .filter(|application| application.status == ApplicationStatus::Pending)
            .count();
        let total_loan_volume: f64 = applications
            .iter()
            .filter_map(|application| application.loan_amount)
            .sum();

        Self {
            total_applications: applications.len(),
            approved_today,
            pending_review,
            total_loan_volume,
            total_loan_volume_display: format_money(Some(total_loan_volume), currency),
        }
    }
}

/// Card text for the current period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatCards {
    pub average_score: String,
    pub approval_rate: String,
    pub approved_loan_volume: String,
}

impl StatCards {
    pub fn for_period(stats: &PeriodStats, currency: &str) -> Self {
        Self {
            average_score: format_score(stats.average_score),
            approval_rate: format_rate(stats.approvals, stats.applications),
            approved_loan_volume: format_money(Some(stats.approved_loan_volume), currency),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsView {
    pub as_of: DateTime<Utc>,
    pub periods: PeriodWindows,
    pub headline: HeadlineCounts,
    pub current: PeriodStats,
    pub prior: PeriodStats,
    pub comparison: PeriodComparison,
    pub cards: StatCards,
    pub skipped_records: SkipLedger,
}

/// One row of the recent applications table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentApplicationView {
    pub application_id: ApplicationId,
    pub borrower_id: BorrowerId,
    pub borrower_name: Option<String>,
    pub loan_amount: Option<f64>,
    pub loan_amount_display: String,
    pub loan_purpose: Option<String>,
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub created_at: DateTime<Utc>,
    pub credit_score: Option<u8>,
    /// Recomputed from the effective score.
    pub risk_bucket: RiskBucket,
    pub risk_badge: &'static str,
    /// Label stored with the effective score, kept for auditing.
    pub stored_risk_level: Option<RiskBucket>,
    pub stale_risk_label: bool,
}

impl RecentApplicationView {
    pub fn build(
        application: &Application,
        borrower: Option<&Borrower>,
        score: Option<&EffectiveScore>,
        currency: &str,
    ) -> Self {
        let risk_bucket = RiskBucket::classify(score.map(|score| score.credit_score));
        Self {
            application_id: application.id.clone(),
            borrower_id: application.borrower_id.clone(),
            borrower_name: borrower.map(Borrower::display_name),
            loan_amount: application.loan_amount,
            loan_amount_display: format_money(application.loan_amount, currency),
            loan_purpose: application.loan_purpose.clone(),
            status: application.status,
            status_label: application.status.display_label(),
            created_at: application.created_at,
            credit_score: score.map(|score| score.credit_score),
            risk_bucket,
            risk_badge: risk_bucket.badge_label(),
            stored_risk_level: score.and_then(|score| score.stored_risk_level),
            stale_risk_label: score.is_some_and(EffectiveScore::has_stale_label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentApplicationsView {
    pub limit: usize,
    pub applications: Vec<RecentApplicationView>,
    pub skipped_records: SkipLedger,
}

/// Every widget of the dashboard, computed from one set of reads per widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardOverview {
    pub as_of: DateTime<Utc>,
    pub stats: StatsView,
    pub risk_distribution: RiskDistributionView,
    pub score_trends: ScoreTrendView,
    pub recent_applications: RecentApplicationsView,
}

impl DashboardOverview {
    pub fn skipped_records(&self) -> SkipLedger {
        let mut total = SkipLedger::default();
        total.merge(&self.stats.skipped_records);
        total.merge(&self.risk_distribution.skipped_records);
        total.merge(&self.score_trends.skipped_records);
        total.merge(&self.recent_applications.skipped_records);
        total
    }
}

/// Result of an application submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedApplication {
    pub application: Application,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_score: Option<ScoreEvent>,
}
