//! Credit application dashboard: latest-score resolution, risk buckets,
//! monthly trends, and period-over-period statistics computed from the
//! record store on every request.

pub mod buckets;
pub mod comparison;
pub mod domain;
pub mod formatting;
pub mod intake;
pub(crate) mod numeric;
pub mod records;
pub mod resolver;
pub mod router;
pub mod service;
pub mod store;
pub mod trend;
pub mod views;

#[cfg(test)]
mod tests;

pub use buckets::{distribution, BucketShare, RiskBucket, RiskDistribution};
pub use comparison::{
    compare_periods, pct_change, MetricComparison, PeriodComparison, PeriodStats, TrendDirection,
};
pub use domain::{
    Application, ApplicationId, ApplicationStatus, Borrower, BorrowerId, PeriodWindows,
    ScoreEvent, TimeWindow,
};
pub use formatting::{format_money, format_rate, format_score};
pub use intake::{
    ApplicationSubmission, BorrowerSubmission, IntakeViolation, RequestContext, ScoreSubmission,
    UserRole,
};
pub use records::{MalformedRecord, SkipLedger, SkipReason};
pub use resolver::{resolve_latest, EffectiveScore, EffectiveScores, ResolutionScope};
pub use router::dashboard_router;
pub use service::{DashboardError, DashboardService, MAX_RECENT_LIMIT};
pub use store::{
    ApplicationQuery, ApplicationRow, BorrowerRow, RecordStore, ScoreEventQuery, ScoreEventRow,
    StoreError,
};
pub use trend::{monthly_trend, MonthlyTrendPoint};
pub use views::{
    DashboardOverview, EffectiveScoresView, HeadlineCounts, RecentApplicationView,
    RecentApplicationsView, RiskDistributionView, ScoreTrendView, StatCards, StatsView,
    SubmittedApplication,
};
