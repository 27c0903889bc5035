use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::buckets::distribution;
use super::comparison::{compare_periods, PeriodStats};
use super::domain::{ApplicationId, Borrower, BorrowerId, PeriodWindows, ScoreEvent, TimeWindow};
use super::intake::{
    ApplicationSubmission, BorrowerSubmission, IntakeGuard, IntakeViolation, RequestContext,
    ScoreSubmission,
};
use super::records::{
    validate_application, validate_applications, validate_borrower, validate_borrowers,
    validate_score_event, validate_score_events, MalformedRecord, SkipLedger,
};
use super::resolver::{resolve_latest, ResolutionScope};
use super::store::{ApplicationQuery, RecordStore, ScoreEventQuery, StoreError};
use super::trend::monthly_trend;
use super::views::{
    DashboardOverview, EffectiveScoresView, HeadlineCounts, RecentApplicationView,
    RecentApplicationsView, RiskDistributionView, ScoreTrendView, StatCards, StatsView,
    SubmittedApplication,
};
use crate::config::DashboardConfig;

/// Upper bound on rows a caller may request from the recent applications table.
pub const MAX_RECENT_LIMIT: usize = 50;

/// Stateless orchestrator behind every dashboard view.
///
/// Each view re-reads the store, fans independent reads out on the blocking
/// pool, and only aggregates once every read has returned. A failed, slow, or
/// cancelled read aborts the view.
pub struct DashboardService<S> {
    store: Arc<S>,
    config: DashboardConfig,
    guard: IntakeGuard,
}

impl<S> DashboardService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, config: DashboardConfig) -> Self {
        Self {
            store,
            config,
            guard: IntakeGuard,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Latest score per application for the events admitted by `scope`.
    pub async fn effective_scores(
        &self,
        scope: ResolutionScope,
    ) -> Result<EffectiveScoresView, DashboardError> {
        let query = ScoreEventQuery {
            scored: scope.window,
            application_ids: scope.applications.clone(),
        };
        let rows = self
            .call("score_events", move |store| store.score_events(&query))
            .await?;

        let events = validate_score_events(&rows);
        let scores = resolve_latest(&events.records, &scope);
        log_skips("effective_scores", &events.skipped);

        Ok(EffectiveScoresView {
            scores,
            skipped_records: events.skipped,
        })
    }

    /// Bucket shares over the trailing risk window ending at `now`.
    pub async fn risk_distribution(
        &self,
        now: DateTime<Utc>,
        include_unknown: bool,
    ) -> Result<RiskDistributionView, DashboardError> {
        let days = self.config.risk_window_days;
        let window =
            TimeWindow::trailing_days(now, days).ok_or(DashboardError::InvalidRiskWindow(days))?;

        let events_query = ScoreEventQuery::scored_within(window);
        let events = self.call("score_events", move |store| store.score_events(&events_query));

        let (event_rows, application_rows) = if include_unknown {
            let applications_query = ApplicationQuery::created_within(window);
            let applications = self.call("applications", move |store| {
                store.applications(&applications_query)
            });
            tokio::try_join!(events, applications)?
        } else {
            (events.await?, Vec::new())
        };

        let mut skipped = SkipLedger::default();
        let events = validate_score_events(&event_rows);
        skipped.merge(&events.skipped);
        let scores = resolve_latest(&events.records, &ResolutionScope::within(window));

        let mut inputs: Vec<Option<u8>> = scores.scores().map(Some).collect();
        if include_unknown {
            let applications = validate_applications(&application_rows);
            skipped.merge(&applications.skipped);
            inputs.extend(
                applications
                    .records
                    .iter()
                    .filter(|application| scores.get(&application.id).is_none())
                    .map(|_| None),
            );
        }

        let distribution = distribution(inputs, include_unknown);
        log_skips("risk_distribution", &skipped);
        debug!(
            total_classified = distribution.total_classified,
            include_unknown, "risk distribution computed"
        );

        Ok(RiskDistributionView {
            as_of: now,
            window,
            include_unknown,
            distribution,
            skipped_records: skipped,
        })
    }

    /// Monthly average effective score and volume for a calendar year.
    pub async fn score_trends(&self, year: i32) -> Result<ScoreTrendView, DashboardError> {
        let window = TimeWindow::calendar_year(year).ok_or(DashboardError::InvalidYear(year))?;
        let query = ScoreEventQuery::scored_within(window);
        let rows = self
            .call("score_events", move |store| store.score_events(&query))
            .await?;

        let events = validate_score_events(&rows);
        let scores = resolve_latest(&events.records, &ResolutionScope::within(window));
        let points = monthly_trend(&scores, year);
        log_skips("score_trends", &events.skipped);
        debug!(year, months = points.len(), "score trend computed");

        Ok(ScoreTrendView {
            year,
            points,
            skipped_records: events.skipped,
        })
    }

    /// Month-over-month statistics as of `now`.
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<StatsView, DashboardError> {
        self.stats_for(PeriodWindows::month_over_month(now), now).await
    }

    /// Statistics for caller-defined periods. Headline counters always cover
    /// every application on record.
    pub async fn stats_for(
        &self,
        periods: PeriodWindows,
        now: DateTime<Utc>,
    ) -> Result<StatsView, DashboardError> {
        let applications_query = ApplicationQuery::all();
        let events_query = ScoreEventQuery::scored_within(periods.current.covering(&periods.prior));

        let (application_rows, event_rows) = tokio::try_join!(
            self.call("applications", move |store| {
                store.applications(&applications_query)
            }),
            self.call("score_events", move |store| store.score_events(&events_query)),
        )?;

        let mut skipped = SkipLedger::default();
        let applications = validate_applications(&application_rows);
        skipped.merge(&applications.skipped);
        let events = validate_score_events(&event_rows);
        skipped.merge(&events.skipped);

        let current_scores =
            resolve_latest(&events.records, &ResolutionScope::within(periods.current));
        let prior_scores = resolve_latest(&events.records, &ResolutionScope::within(periods.prior));

        let current =
            PeriodStats::compute(&periods.current, &applications.records, &current_scores);
        let prior = PeriodStats::compute(&periods.prior, &applications.records, &prior_scores);
        let comparison = compare_periods(&current, &prior);
        let headline = HeadlineCounts::compute(now, &applications.records, &self.config.currency);
        let cards = StatCards::for_period(&current, &self.config.currency);

        log_skips("stats", &skipped);
        debug!(
            current_applications = current.applications,
            prior_applications = prior.applications,
            "period statistics computed"
        );

        Ok(StatsView {
            as_of: now,
            periods,
            headline,
            current,
            prior,
            comparison,
            cards,
            skipped_records: skipped,
        })
    }

    /// The newest applications with borrower names and their effective score.
    pub async fn recent_applications(
        &self,
        limit: Option<usize>,
    ) -> Result<RecentApplicationsView, DashboardError> {
        let limit = limit
            .unwrap_or(self.config.recent_limit)
            .min(MAX_RECENT_LIMIT);

        let query = ApplicationQuery::newest(limit);
        let rows = self
            .call("applications", move |store| store.applications(&query))
            .await?;

        let mut skipped = SkipLedger::default();
        let applications = validate_applications(&rows);
        skipped.merge(&applications.skipped);

        if applications.records.is_empty() {
            log_skips("recent_applications", &skipped);
            return Ok(RecentApplicationsView {
                limit,
                applications: Vec::new(),
                skipped_records: skipped,
            });
        }

        let application_ids: BTreeSet<ApplicationId> = applications
            .records
            .iter()
            .map(|application| application.id.clone())
            .collect();
        let borrower_ids: Vec<BorrowerId> = applications
            .records
            .iter()
            .map(|application| application.borrower_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let events_query = ScoreEventQuery::for_applications(application_ids.iter().cloned());
        let (borrower_rows, event_rows) = tokio::try_join!(
            self.call("borrowers", move |store| store.borrowers(&borrower_ids)),
            self.call("score_events", move |store| store.score_events(&events_query)),
        )?;

        let borrowers = validate_borrowers(&borrower_rows);
        skipped.merge(&borrowers.skipped);
        let events = validate_score_events(&event_rows);
        skipped.merge(&events.skipped);

        let scores = resolve_latest(
            &events.records,
            &ResolutionScope::for_applications(application_ids),
        );
        let borrowers: BTreeMap<BorrowerId, Borrower> = borrowers
            .records
            .into_iter()
            .map(|borrower| (borrower.borrower_id.clone(), borrower))
            .collect();

        let rows = applications
            .records
            .iter()
            .map(|application| {
                RecentApplicationView::build(
                    application,
                    borrowers.get(&application.borrower_id),
                    scores.get(&application.id),
                    &self.config.currency,
                )
            })
            .collect();

        log_skips("recent_applications", &skipped);
        Ok(RecentApplicationsView {
            limit,
            applications: rows,
            skipped_records: skipped,
        })
    }

    /// Every widget at once; any failed read fails the whole overview.
    pub async fn overview(&self, now: DateTime<Utc>) -> Result<DashboardOverview, DashboardError> {
        let (stats, risk_distribution, score_trends, recent_applications) = tokio::try_join!(
            self.stats(now),
            self.risk_distribution(now, false),
            self.score_trends(now.year()),
            self.recent_applications(None),
        )?;

        Ok(DashboardOverview {
            as_of: now,
            stats,
            risk_distribution,
            score_trends,
            recent_applications,
        })
    }

    pub async fn register_borrower(
        &self,
        context: &RequestContext,
        submission: BorrowerSubmission,
        now: DateTime<Utc>,
    ) -> Result<Borrower, DashboardError> {
        let borrower_id = BorrowerId(format!("bor-{}", Uuid::new_v4()));
        let row = self
            .guard
            .borrower_row(context, borrower_id, submission, now)?;

        let stored = self
            .write("insert_borrower", move |store| store.insert_borrower(row))
            .await?;
        let borrower = validate_borrower(&stored)?;

        info!(
            borrower_id = %borrower.borrower_id,
            user_id = %context.user_id,
            "borrower registered"
        );
        Ok(borrower)
    }

    /// Inserts the application and, when the submission carries a classifier
    /// score, its first score event.
    pub async fn submit_application(
        &self,
        context: &RequestContext,
        submission: ApplicationSubmission,
        now: DateTime<Utc>,
    ) -> Result<SubmittedApplication, DashboardError> {
        let borrower_id = BorrowerId(submission.borrower_id.0.trim().to_string());
        let application_id = ApplicationId(format!("app-{}", Uuid::new_v4()));
        let (application_row, score_row) =
            self.guard
                .application_rows(context, application_id, submission, now)?;

        let lookup = vec![borrower_id.clone()];
        let existing = self
            .call("borrowers", move |store| store.borrowers(&lookup))
            .await?;
        if existing.is_empty() {
            return Err(DashboardError::UnknownBorrower(borrower_id));
        }

        let (stored, stored_score) = self
            .write("insert_application", move |store| {
                store.insert_application(application_row, score_row)
            })
            .await?;
        let application = validate_application(&stored)?;
        let initial_score = stored_score
            .as_ref()
            .map(validate_score_event)
            .transpose()?;

        info!(
            application_id = %application.id,
            borrower_id = %application.borrower_id,
            user_id = %context.user_id,
            scored = initial_score.is_some(),
            "application submitted"
        );
        Ok(SubmittedApplication {
            application,
            initial_score,
        })
    }

    /// Appends a classifier result for an existing application.
    pub async fn record_score(
        &self,
        context: &RequestContext,
        application_id: ApplicationId,
        submission: ScoreSubmission,
        now: DateTime<Utc>,
    ) -> Result<ScoreEvent, DashboardError> {
        let row = self
            .guard
            .score_event_row(context, &application_id, submission, now)?;

        let query = ApplicationQuery::for_ids([application_id.clone()]);
        let existing = self
            .call("applications", move |store| store.applications(&query))
            .await?;
        if existing.is_empty() {
            return Err(DashboardError::UnknownApplication(application_id));
        }

        let stored = self
            .write("insert_score_event", move |store| store.insert_score_event(row))
            .await?;
        let event = validate_score_event(&stored)?;

        info!(
            application_id = %event.application_id,
            sequence = event.sequence,
            user_id = %context.user_id,
            "score recorded"
        );
        Ok(event)
    }

    /// Runs one store read on the blocking pool, bounded by the configured
    /// timeout.
    async fn call<T, F>(&self, operation: &'static str, work: F) -> Result<T, DashboardError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
    {
        self.run(operation, StoreAccess::Read, work).await
    }

    /// Like [`Self::call`], but an abandoned write is reported as having an
    /// unknown outcome: the blocking task keeps running after the timeout.
    async fn write<T, F>(&self, operation: &'static str, work: F) -> Result<T, DashboardError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
    {
        self.run(operation, StoreAccess::Write, work).await
    }

    async fn run<T, F>(
        &self,
        operation: &'static str,
        access: StoreAccess,
        work: F,
    ) -> Result<T, DashboardError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let limit = self.config.store_timeout;
        let task = tokio::task::spawn_blocking(move || work(store.as_ref()));
        let limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);

        let outcome = match (tokio::time::timeout(limit, task).await, access) {
            (Ok(Ok(result)), _) => result,
            (Ok(Err(join_error)), StoreAccess::Read) => {
                Err(StoreError::Cancelled(join_error.to_string()))
            }
            (Ok(Err(join_error)), StoreAccess::Write) => {
                Err(StoreError::OutcomeUnknown(join_error.to_string()))
            }
            (Err(_), StoreAccess::Read) => Err(StoreError::TimedOut(limit_ms)),
            (Err(_), StoreAccess::Write) => Err(StoreError::OutcomeUnknown(format!(
                "no answer within {limit_ms} ms"
            ))),
        };

        outcome.map_err(|error| {
            warn!(operation, %error, "record store call failed");
            DashboardError::from(error)
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum StoreAccess {
    Read,
    Write,
}

fn log_skips(view: &'static str, skipped: &SkipLedger) {
    if skipped.is_empty() {
        return;
    }
    warn!(
        view,
        skipped = skipped.total,
        reasons = ?skipped.by_reason,
        "excluded malformed records from view"
    );
}

/// Error raised by the dashboard service.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("record store unavailable, view aborted: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error(transparent)]
    Intake(#[from] IntakeViolation),
    #[error("borrower '{0}' does not exist")]
    UnknownBorrower(BorrowerId),
    #[error("application '{0}' does not exist")]
    UnknownApplication(ApplicationId),
    #[error("record already exists")]
    Conflict,
    #[error("year {0} is outside the supported calendar range")]
    InvalidYear(i32),
    #[error("risk window of {0} days reaches outside the supported calendar range")]
    InvalidRiskWindow(i64),
    #[error("record store returned an invalid record: {0}")]
    InvalidRecord(#[from] MalformedRecord),
    #[error("record store error: {0}")]
    Store(#[source] StoreError),
}

impl DashboardError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DashboardError::StoreUnavailable(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DashboardError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DashboardError::Intake(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::UnknownBorrower(_) | DashboardError::UnknownApplication(_) => {
                StatusCode::NOT_FOUND
            }
            DashboardError::Conflict => StatusCode::CONFLICT,
            DashboardError::InvalidYear(_) => StatusCode::BAD_REQUEST,
            DashboardError::InvalidRiskWindow(_)
            | DashboardError::InvalidRecord(_)
            | DashboardError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for DashboardError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict => DashboardError::Conflict,
            retryable if retryable.is_retryable() => DashboardError::StoreUnavailable(retryable),
            other => DashboardError::Store(other),
        }
    }
}
