use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::DashboardConfig;
use crate::workflows::dashboard::{
    dashboard_router, ApplicationId, ApplicationQuery, ApplicationRow, BorrowerId, BorrowerRow,
    DashboardService, RecordStore, RequestContext, ScoreEventQuery, ScoreEventRow, StoreError,
    UserRole,
};
use crate::workflows::snapshot::SnapshotStore;

pub(super) fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Reference instant for the seeded snapshot.
pub(super) fn now() -> DateTime<Utc> {
    at(3, 14, 9)
}

pub(super) fn officer() -> RequestContext {
    RequestContext::new("officer-7", Some(UserRole::LoanOfficer))
}

pub(super) fn application_row(
    id: &str,
    borrower: &str,
    amount: Option<f64>,
    status: &str,
    created_at: DateTime<Utc>,
) -> ApplicationRow {
    ApplicationRow {
        id: ApplicationId(id.to_string()),
        borrower_id: Some(borrower.to_string()),
        loan_amount: amount,
        status: Some(status.to_string()),
        created_at,
        loan_purpose: None,
        notes: None,
        submitted_by: Some("officer-1".to_string()),
    }
}

pub(super) fn score_row(
    application: &str,
    score: Option<f64>,
    risk_level: Option<&str>,
    scored_at: DateTime<Utc>,
) -> ScoreEventRow {
    ScoreEventRow {
        application_id: Some(application.to_string()),
        credit_score: score,
        risk_level: risk_level.map(str::to_string),
        scored_at,
        sequence: 0,
    }
}

pub(super) fn borrower_row(id: &str, first: &str, last: &str) -> BorrowerRow {
    BorrowerRow {
        borrower_id: BorrowerId(id.to_string()),
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        phone: Some("+254700000000".to_string()),
        national_id: None,
        email: None,
        location: None,
        created_at: at(1, 5, 9),
        created_by: Some("officer-1".to_string()),
    }
}

/// Two months of activity around `now()`, including one malformed
/// application and one out-of-range score.
pub(super) fn seeded_store() -> SnapshotStore {
    let applications = vec![
        application_row("app-1", "bor-1", Some(50_000.0), "approved", at(3, 2, 8)),
        application_row("app-2", "bor-2", Some(120_000.0), "pending", at(3, 10, 10)),
        application_row("app-3", "bor-3", Some(80_000.0), "approved", at(2, 10, 9)),
        application_row("app-4", "bor-1", None, "rejected", at(2, 20, 12)),
        application_row("app-5", "bor-2", Some(30_000.0), "approved", at(3, 14, 7)),
        application_row("bad-1", "bor-3", Some(-100.0), "pending", at(3, 5, 8)),
    ];
    let score_events = vec![
        score_row("app-1", Some(55.0), Some("high"), at(3, 2, 9)),
        score_row("app-1", Some(82.0), Some("low"), at(3, 5, 9)),
        score_row("app-2", Some(65.0), Some("high"), at(3, 10, 11)),
        score_row("app-3", Some(72.0), Some("moderate"), at(2, 11, 9)),
        score_row("app-4", Some(35.0), Some("very-high"), at(2, 21, 9)),
        score_row("app-5", None, None, at(3, 14, 7)),
        score_row("app-2", Some(140.0), None, at(3, 11, 9)),
    ];
    let borrowers = vec![
        borrower_row("bor-1", "Amina", "Otieno"),
        borrower_row("bor-2", "Brian", "Kamau"),
        borrower_row("bor-3", "Wanjiru", "Njoroge"),
    ];

    SnapshotStore::from_rows(applications, score_events, borrowers)
}

pub(super) fn build_service() -> (DashboardService<SnapshotStore>, Arc<SnapshotStore>) {
    let store = Arc::new(seeded_store());
    let service = DashboardService::new(store.clone(), DashboardConfig::default());
    (service, store)
}

pub(super) fn service_with<S: RecordStore + 'static>(
    store: S,
    store_timeout: Duration,
) -> DashboardService<S> {
    shared_service_with(Arc::new(store), store_timeout)
}

pub(super) fn shared_service_with<S: RecordStore + 'static>(
    store: Arc<S>,
    store_timeout: Duration,
) -> DashboardService<S> {
    let config = DashboardConfig {
        store_timeout,
        ..DashboardConfig::default()
    };
    DashboardService::new(store, config)
}

pub(super) fn router_with<S: RecordStore + 'static>(service: DashboardService<S>) -> axum::Router {
    dashboard_router(Arc::new(service))
}

pub(super) struct UnavailableStore;

impl RecordStore for UnavailableStore {
    fn applications(&self, _query: &ApplicationQuery) -> Result<Vec<ApplicationRow>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn score_events(&self, _query: &ScoreEventQuery) -> Result<Vec<ScoreEventRow>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn borrowers(&self, _ids: &[BorrowerId]) -> Result<Vec<BorrowerRow>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn insert_application(
        &self,
        _row: ApplicationRow,
        _initial_score: Option<ScoreEventRow>,
    ) -> Result<(ApplicationRow, Option<ScoreEventRow>), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn insert_borrower(&self, _row: BorrowerRow) -> Result<BorrowerRow, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn insert_score_event(&self, _row: ScoreEventRow) -> Result<ScoreEventRow, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Serves applications normally but fails every score event read.
pub(super) struct ScoresOfflineStore {
    pub(super) inner: SnapshotStore,
}

impl RecordStore for ScoresOfflineStore {
    fn applications(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRow>, StoreError> {
        self.inner.applications(query)
    }

    fn score_events(&self, _query: &ScoreEventQuery) -> Result<Vec<ScoreEventRow>, StoreError> {
        Err(StoreError::Unavailable("scores table offline".to_string()))
    }

    fn borrowers(&self, ids: &[BorrowerId]) -> Result<Vec<BorrowerRow>, StoreError> {
        self.inner.borrowers(ids)
    }

    fn insert_application(
        &self,
        row: ApplicationRow,
        initial_score: Option<ScoreEventRow>,
    ) -> Result<(ApplicationRow, Option<ScoreEventRow>), StoreError> {
        self.inner.insert_application(row, initial_score)
    }

    fn insert_borrower(&self, row: BorrowerRow) -> Result<BorrowerRow, StoreError> {
        self.inner.insert_borrower(row)
    }

    fn insert_score_event(&self, row: ScoreEventRow) -> Result<ScoreEventRow, StoreError> {
        self.inner.insert_score_event(row)
    }
}

/// Delegates to the seeded snapshot after blocking for `delay` on every call.
pub(super) struct SlowStore {
    pub(super) inner: SnapshotStore,
    pub(super) delay: Duration,
}

impl RecordStore for SlowStore {
    fn applications(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRow>, StoreError> {
        std::thread::sleep(self.delay);
        self.inner.applications(query)
    }

    fn score_events(&self, query: &ScoreEventQuery) -> Result<Vec<ScoreEventRow>, StoreError> {
        std::thread::sleep(self.delay);
        self.inner.score_events(query)
    }

    fn borrowers(&self, ids: &[BorrowerId]) -> Result<Vec<BorrowerRow>, StoreError> {
        std::thread::sleep(self.delay);
        self.inner.borrowers(ids)
    }

    fn insert_application(
        &self,
        row: ApplicationRow,
        initial_score: Option<ScoreEventRow>,
    ) -> Result<(ApplicationRow, Option<ScoreEventRow>), StoreError> {
        std::thread::sleep(self.delay);
        self.inner.insert_application(row, initial_score)
    }

    fn insert_borrower(&self, row: BorrowerRow) -> Result<BorrowerRow, StoreError> {
        std::thread::sleep(self.delay);
        self.inner.insert_borrower(row)
    }

    fn insert_score_event(&self, row: ScoreEventRow) -> Result<ScoreEventRow, StoreError> {
        std::thread::sleep(self.delay);
        self.inner.insert_score_event(row)
    }
}

/// Accepts reads and borrower writes but rejects every score event write,
/// including the first score bundled with an application.
pub(super) struct ScoreWritesOfflineStore {
    pub(super) inner: SnapshotStore,
}

impl RecordStore for ScoreWritesOfflineStore {
    fn applications(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationRow>, StoreError> {
        self.inner.applications(query)
    }

    fn score_events(&self, query: &ScoreEventQuery) -> Result<Vec<ScoreEventRow>, StoreError> {
        self.inner.score_events(query)
    }

    fn borrowers(&self, ids: &[BorrowerId]) -> Result<Vec<BorrowerRow>, StoreError> {
        self.inner.borrowers(ids)
    }

    fn insert_application(
        &self,
        row: ApplicationRow,
        initial_score: Option<ScoreEventRow>,
    ) -> Result<(ApplicationRow, Option<ScoreEventRow>), StoreError> {
        if initial_score.is_some() {
            return Err(StoreError::Unavailable("scores table offline".to_string()));
        }
        self.inner.insert_application(row, None)
    }

    fn insert_borrower(&self, row: BorrowerRow) -> Result<BorrowerRow, StoreError> {
        self.inner.insert_borrower(row)
    }

    fn insert_score_event(&self, _row: ScoreEventRow) -> Result<ScoreEventRow, StoreError> {
        Err(StoreError::Unavailable("scores table offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
