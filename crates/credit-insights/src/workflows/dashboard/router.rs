use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;

use super::domain::ApplicationId;
use super::intake::{
    ApplicationSubmission, BorrowerSubmission, RequestContext, ScoreSubmission, UserRole,
};
use super::service::DashboardService;
use super::store::RecordStore;
use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Router builder exposing the dashboard views and the intake endpoints.
pub fn dashboard_router<S>(service: Arc<DashboardService<S>>) -> Router
where
    S: RecordStore + 'static,
{
    Router::new()
        .route("/api/v1/dashboard", get(overview_handler::<S>))
        .route(
            "/api/v1/dashboard/risk-distribution",
            get(risk_distribution_handler::<S>),
        )
        .route("/api/v1/dashboard/score-trends", get(score_trends_handler::<S>))
        .route("/api/v1/dashboard/stats", get(stats_handler::<S>))
        .route(
            "/api/v1/dashboard/recent-applications",
            get(recent_applications_handler::<S>),
        )
        .route("/api/v1/borrowers", post(register_borrower_handler::<S>))
        .route("/api/v1/applications", post(submit_application_handler::<S>))
        .route(
            "/api/v1/applications/:application_id/scores",
            post(record_score_handler::<S>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DistributionParams {
    #[serde(default)]
    include_unknown: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TrendParams {
    year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RecentParams {
    limit: Option<usize>,
}

pub(crate) async fn overview_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
) -> Result<Response, AppError>
where
    S: RecordStore + 'static,
{
    let overview = service.overview(Utc::now()).await?;
    Ok(Json(overview).into_response())
}

pub(crate) async fn risk_distribution_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
    Query(params): Query<DistributionParams>,
) -> Result<Response, AppError>
where
    S: RecordStore + 'static,
{
    let view = service
        .risk_distribution(Utc::now(), params.include_unknown)
        .await?;
    Ok(Json(view).into_response())
}

pub(crate) async fn score_trends_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
    Query(params): Query<TrendParams>,
) -> Result<Response, AppError>
where
    S: RecordStore + 'static,
{
    let year = params.year.unwrap_or_else(|| Utc::now().year());
    let view = service.score_trends(year).await?;
    Ok(Json(view).into_response())
}

pub(crate) async fn stats_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
) -> Result<Response, AppError>
where
    S: RecordStore + 'static,
{
    let view = service.stats(Utc::now()).await?;
    Ok(Json(view).into_response())
}

pub(crate) async fn recent_applications_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
    Query(params): Query<RecentParams>,
) -> Result<Response, AppError>
where
    S: RecordStore + 'static,
{
    let view = service.recent_applications(params.limit).await?;
    Ok(Json(view).into_response())
}

pub(crate) async fn register_borrower_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
    headers: HeaderMap,
    Json(submission): Json<BorrowerSubmission>,
) -> Result<Response, AppError>
where
    S: RecordStore + 'static,
{
    let context = request_context(&headers);
    let borrower = service
        .register_borrower(&context, submission, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(borrower)).into_response())
}

pub(crate) async fn submit_application_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
    headers: HeaderMap,
    Json(submission): Json<ApplicationSubmission>,
) -> Result<Response, AppError>
where
    S: RecordStore + 'static,
{
    let context = request_context(&headers);
    let submitted = service
        .submit_application(&context, submission, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(submitted)).into_response())
}

pub(crate) async fn record_score_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    Json(submission): Json<ScoreSubmission>,
) -> Result<Response, AppError>
where
    S: RecordStore + 'static,
{
    let context = request_context(&headers);
    let event = service
        .record_score(
            &context,
            ApplicationId(application_id),
            submission,
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(event)).into_response())
}

/// Missing identity headers produce an empty user id, which intake rejects.
fn request_context(headers: &HeaderMap) -> RequestContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };

    RequestContext::new(header(USER_ID_HEADER), UserRole::parse(&header(USER_ROLE_HEADER)))
}
