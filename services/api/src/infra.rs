use chrono::{DateTime, NaiveDate, Utc};
use credit_insights::error::AppError;
use credit_insights::workflows::dashboard::DashboardError;
use credit_insights::workflows::snapshot::{SnapshotImporter, SnapshotStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Loads a CSV export when a directory is given, otherwise starts from an
/// empty in-memory store.
pub(crate) fn load_store(snapshot_dir: Option<&Path>) -> Result<Arc<SnapshotStore>, AppError> {
    let store = match snapshot_dir {
        Some(dir) => {
            let store = SnapshotImporter::from_dir(dir)?;
            let counts = store.counts().map_err(DashboardError::from)?;
            info!(
                snapshot = %dir.display(),
                applications = counts.applications,
                score_events = counts.score_events,
                borrowers = counts.borrowers,
                "record snapshot loaded"
            );
            store
        }
        None => SnapshotStore::new(),
    };
    Ok(Arc::new(store))
}

/// Accepts RFC 3339 instants or a bare `YYYY-MM-DD` date (midnight UTC).
pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("failed to parse '{raw}' as RFC 3339 or YYYY-MM-DD"))
}
