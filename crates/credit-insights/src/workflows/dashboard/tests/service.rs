use super::common::*;
use axum::http::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DashboardConfig;
use crate::workflows::dashboard::{
    ApplicationId, ApplicationSubmission, BorrowerId, BorrowerSubmission, DashboardError,
    DashboardService, IntakeViolation, RecordStore, ResolutionScope, RiskBucket,
    ScoreSubmission, SkipReason, StoreError, TrendDirection,
};

#[tokio::test]
async fn risk_distribution_uses_latest_score_in_trailing_window() {
    let (service, _) = build_service();

    let view = service
        .risk_distribution(now(), false)
        .await
        .expect("distribution computed");

    // app-1 (82), app-2 (65), app-4 (35); app-3 was scored before the window.
    assert_eq!(view.distribution.total_classified, 3);
    let percentages: Vec<(RiskBucket, u32)> = view
        .distribution
        .shares
        .iter()
        .map(|share| (share.bucket, share.percentage))
        .collect();
    assert_eq!(
        percentages,
        vec![
            (RiskBucket::Low, 33),
            (RiskBucket::Moderate, 33),
            (RiskBucket::High, 0),
            (RiskBucket::VeryHigh, 33),
        ]
    );
    assert_eq!(view.skipped_records.total, 1);
    assert_eq!(view.skipped_records.count(SkipReason::ScoreOutOfRange), 1);
}

#[tokio::test]
async fn risk_distribution_counts_unscored_applications_on_request() {
    let (service, _) = build_service();

    let view = service
        .risk_distribution(now(), true)
        .await
        .expect("distribution computed");

    assert_eq!(view.distribution.total_classified, 4);
    let unknown = view
        .distribution
        .share(RiskBucket::Unknown)
        .expect("unknown bucket present");
    assert_eq!(unknown.count, 1);
    assert_eq!(unknown.percentage, 25);
    assert_eq!(view.skipped_records.total, 2);
    assert_eq!(view.skipped_records.count(SkipReason::NonPositiveLoanAmount), 1);
}

#[tokio::test]
async fn score_trends_group_latest_scores_by_month() {
    let (service, _) = build_service();

    let view = service.score_trends(2025).await.expect("trend computed");

    let points: Vec<(&str, f64, usize)> = view
        .points
        .iter()
        .map(|point| (point.month_label, point.avg_score, point.applications))
        .collect();
    assert_eq!(points, vec![("Feb", 53.5, 2), ("Mar", 73.5, 2)]);
}

#[tokio::test]
async fn score_trends_for_empty_year_are_empty() {
    let (service, _) = build_service();
    let view = service.score_trends(2019).await.expect("trend computed");
    assert!(view.points.is_empty());
    assert!(view.skipped_records.is_empty());
}

#[tokio::test]
async fn stats_compare_current_month_with_previous() {
    let (service, _) = build_service();

    let view = service.stats(now()).await.expect("stats computed");

    assert_eq!(view.current.applications, 3);
    assert_eq!(view.current.approvals, 2);
    assert_eq!(view.current.approval_rate, 67);
    assert_eq!(view.current.average_score, 73.5);
    assert_eq!(view.current.approved_loan_volume, 80_000.0);

    assert_eq!(view.prior.applications, 2);
    assert_eq!(view.prior.approval_rate, 50);
    assert_eq!(view.prior.average_score, 53.5);

    assert_eq!(view.comparison.application_volume.percent_change, "+50%");
    assert_eq!(view.comparison.approval_count.percent_change, "+100%");
    assert_eq!(view.comparison.approval_rate.percent_change, "+34%");
    assert_eq!(view.comparison.average_score.percent_change, "+37%");
    assert_eq!(view.comparison.approved_loan_volume.percent_change, "0%");
    assert_eq!(
        view.comparison.approved_loan_volume.trend,
        TrendDirection::Flat
    );

    assert_eq!(view.headline.total_applications, 5);
    assert_eq!(view.headline.approved_today, 1);
    assert_eq!(view.headline.pending_review, 1);
    assert_eq!(view.headline.total_loan_volume_display, "KSh 280.0K");
    assert_eq!(view.cards.average_score, "73.5");
    assert_eq!(view.cards.approval_rate, "67%");

    // bad-1 and the out-of-range score, each counted once.
    assert_eq!(view.skipped_records.total, 2);
}

#[tokio::test]
async fn recent_applications_join_borrowers_and_flag_stale_labels() {
    let (service, _) = build_service();

    let view = service
        .recent_applications(None)
        .await
        .expect("recent applications computed");

    let ids: Vec<&str> = view
        .applications
        .iter()
        .map(|row| row.application_id.0.as_str())
        .collect();
    assert_eq!(ids, vec!["app-5", "app-2", "app-1", "app-4"]);

    let unscored = &view.applications[0];
    assert_eq!(unscored.borrower_name.as_deref(), Some("Brian Kamau"));
    assert_eq!(unscored.credit_score, None);
    assert_eq!(unscored.risk_badge, "Not Scored");

    let stale = &view.applications[1];
    assert_eq!(stale.credit_score, Some(65));
    assert_eq!(stale.risk_bucket, RiskBucket::Moderate);
    assert_eq!(stale.stored_risk_level, Some(RiskBucket::High));
    assert!(stale.stale_risk_label);
    assert_eq!(stale.loan_amount_display, "KSh 120.0K");

    let rescored = &view.applications[2];
    assert_eq!(rescored.credit_score, Some(82));
    assert_eq!(rescored.risk_badge, "Low Risk");
    assert!(!rescored.stale_risk_label);

    assert_eq!(view.skipped_records.total, 2);
}

#[tokio::test]
async fn recent_applications_respects_explicit_limit() {
    let (service, _) = build_service();
    let view = service
        .recent_applications(Some(2))
        .await
        .expect("recent applications computed");
    assert_eq!(view.limit, 2);
    assert_eq!(view.applications.len(), 2);
}

#[tokio::test]
async fn repeated_overviews_serialize_identically() {
    let (service, _) = build_service();

    let first = service.overview(now()).await.expect("overview computed");
    let second = service.overview(now()).await.expect("overview computed");

    let first = serde_json::to_vec(&first).expect("serialize");
    let second = serde_json::to_vec(&second).expect("serialize");
    assert_eq!(first, second);
}

#[tokio::test]
async fn older_events_never_displace_the_latest_score() {
    let (service, store) = build_service();
    let app = ApplicationId("app-1".to_string());

    service
        .record_score(
            &officer(),
            app.clone(),
            ScoreSubmission {
                credit_score: 10.0,
                risk_level: None,
            },
            at(3, 1, 9),
        )
        .await
        .expect("score recorded");

    let view = service
        .effective_scores(ResolutionScope::for_applications([app.clone()]))
        .await
        .expect("scores resolved");
    assert_eq!(view.scores.get(&app).map(|score| score.credit_score), Some(82));
    assert_eq!(store.counts().map(|counts| counts.score_events), Ok(8));
}

#[tokio::test]
async fn equal_timestamps_resolve_to_the_later_ingested_event() {
    let (service, _) = build_service();
    let app = ApplicationId("app-4".to_string());
    let scored_at = now();

    for score in [40.0, 30.0] {
        service
            .record_score(
                &officer(),
                app.clone(),
                ScoreSubmission {
                    credit_score: score,
                    risk_level: None,
                },
                scored_at,
            )
            .await
            .expect("score recorded");
    }

    let view = service
        .effective_scores(ResolutionScope::all())
        .await
        .expect("scores resolved");
    assert_eq!(view.scores.get(&app).map(|score| score.credit_score), Some(30));
}

#[tokio::test]
async fn submitting_with_a_score_records_the_initial_event() {
    let (service, store) = build_service();

    let submitted = service
        .submit_application(
            &officer(),
            ApplicationSubmission {
                borrower_id: BorrowerId("bor-1".to_string()),
                loan_amount: Some(65_000.0),
                loan_purpose: Some("School fees".to_string()),
                credit_score: Some(88.0),
                risk_level: Some("low".to_string()),
                ..ApplicationSubmission::default()
            },
            now(),
        )
        .await
        .expect("application submitted");

    assert!(submitted.application.id.0.starts_with("app-"));
    let initial = submitted.initial_score.expect("initial score stored");
    assert_eq!(initial.credit_score, Some(88));
    assert_eq!(initial.sequence, 8);

    let counts = store.counts().expect("counts");
    assert_eq!(counts.applications, 7);
    assert_eq!(counts.score_events, 8);
}

#[tokio::test]
async fn submitting_for_an_unknown_borrower_is_rejected() {
    let (service, store) = build_service();

    let error = service
        .submit_application(
            &officer(),
            ApplicationSubmission {
                borrower_id: BorrowerId("bor-404".to_string()),
                loan_amount: Some(10_000.0),
                ..ApplicationSubmission::default()
            },
            now(),
        )
        .await
        .expect_err("borrower must exist");

    assert!(matches!(error, DashboardError::UnknownBorrower(_)));
    assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(store.counts().map(|counts| counts.applications), Ok(6));
}

#[tokio::test]
async fn registering_a_borrower_stamps_the_acting_user() {
    let (service, store) = build_service();

    let borrower = service
        .register_borrower(
            &officer(),
            BorrowerSubmission {
                first_name: "Grace".to_string(),
                last_name: "Mwangi".to_string(),
                phone: "+254711000222".to_string(),
                national_id: Some("29384756".to_string()),
                email: None,
                location: Some("Nakuru".to_string()),
            },
            now(),
        )
        .await
        .expect("borrower registered");

    assert!(borrower.borrower_id.0.starts_with("bor-"));
    let stored = store
        .borrowers(&[borrower.borrower_id.clone()])
        .expect("read borrowers");
    assert_eq!(stored[0].created_by.as_deref(), Some("officer-7"));
    assert_eq!(borrower.location.as_deref(), Some("Nakuru"));
    assert_eq!(stored[0].location.as_deref(), Some("Nakuru"));
}

#[tokio::test]
async fn intake_violations_never_reach_the_store() {
    let (service, store) = build_service();

    let error = service
        .record_score(
            &officer(),
            ApplicationId("app-1".to_string()),
            ScoreSubmission {
                credit_score: 101.0,
                risk_level: None,
            },
            now(),
        )
        .await
        .expect_err("score rejected");

    assert!(matches!(
        error,
        DashboardError::Intake(IntakeViolation::InvalidScore)
    ));
    assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(store.counts().map(|counts| counts.score_events), Ok(7));
}

#[tokio::test]
async fn scoring_an_unknown_application_is_rejected() {
    let (service, _) = build_service();

    let error = service
        .record_score(
            &officer(),
            ApplicationId("app-404".to_string()),
            ScoreSubmission {
                credit_score: 50.0,
                risk_level: None,
            },
            now(),
        )
        .await
        .expect_err("application must exist");
    assert!(matches!(error, DashboardError::UnknownApplication(_)));
}

#[tokio::test]
async fn unavailable_store_aborts_with_retryable_error() {
    let service = service_with(UnavailableStore, Duration::from_secs(1));

    let error = service.stats(now()).await.expect_err("store offline");
    assert!(error.is_retryable());
    assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn one_failed_read_fails_the_whole_view() {
    let service = service_with(
        ScoresOfflineStore {
            inner: seeded_store(),
        },
        Duration::from_secs(1),
    );

    let error = service.stats(now()).await.expect_err("score read fails");
    assert!(matches!(
        error,
        DashboardError::StoreUnavailable(StoreError::Unavailable(_))
    ));
    assert!(service.overview(now()).await.is_err());
}

#[tokio::test]
async fn slow_reads_time_out_as_retryable_errors() {
    let service = service_with(
        SlowStore {
            inner: seeded_store(),
            delay: Duration::from_millis(250),
        },
        Duration::from_millis(25),
    );

    let error = service
        .score_trends(2025)
        .await
        .expect_err("read times out");
    assert!(matches!(
        error,
        DashboardError::StoreUnavailable(StoreError::TimedOut(25))
    ));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn failed_first_score_leaves_no_application_behind() {
    let store = Arc::new(ScoreWritesOfflineStore {
        inner: seeded_store(),
    });
    let service = shared_service_with(store.clone(), Duration::from_secs(1));
    let scored = || ApplicationSubmission {
        borrower_id: BorrowerId("bor-2".to_string()),
        loan_amount: Some(30_000.0),
        credit_score: Some(70.0),
        ..ApplicationSubmission::default()
    };

    for _ in 0..2 {
        let error = service
            .submit_application(&officer(), scored(), now())
            .await
            .expect_err("score write fails");
        assert!(matches!(
            error,
            DashboardError::StoreUnavailable(StoreError::Unavailable(_))
        ));
    }
    assert_eq!(store.inner.counts().map(|counts| counts.applications), Ok(6));

    let unscored = ApplicationSubmission {
        credit_score: None,
        ..scored()
    };
    service
        .submit_application(&officer(), unscored, now())
        .await
        .expect("application without a score is stored");
    assert_eq!(store.inner.counts().map(|counts| counts.applications), Ok(7));
}

#[tokio::test]
async fn timed_out_writes_are_not_retryable() {
    let store = Arc::new(SlowStore {
        inner: seeded_store(),
        delay: Duration::from_millis(250),
    });
    let service = shared_service_with(store.clone(), Duration::from_millis(25));

    let error = service
        .register_borrower(
            &officer(),
            BorrowerSubmission {
                first_name: "Peter".to_string(),
                last_name: "Ochieng".to_string(),
                phone: "+254722000333".to_string(),
                ..BorrowerSubmission::default()
            },
            now(),
        )
        .await
        .expect_err("write times out");

    assert!(matches!(
        error,
        DashboardError::Store(StoreError::OutcomeUnknown(_))
    ));
    assert!(!error.is_retryable());
    assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    // The abandoned write still completes on the blocking pool.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(store.inner.counts().map(|counts| counts.borrowers), Ok(4));
}

#[tokio::test]
async fn oversized_risk_window_is_an_error_not_a_panic() {
    let config = DashboardConfig {
        risk_window_days: 100_000_000,
        ..DashboardConfig::default()
    };
    let service = DashboardService::new(Arc::new(seeded_store()), config);

    let error = service
        .risk_distribution(now(), false)
        .await
        .expect_err("window start is not representable");
    assert!(matches!(
        error,
        DashboardError::InvalidRiskWindow(100_000_000)
    ));
    assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn conflicting_inserts_map_to_conflict() {
    let error = DashboardError::from(StoreError::Conflict);
    assert_eq!(error.status_code(), StatusCode::CONFLICT);
    assert!(!error.is_retryable());
}
