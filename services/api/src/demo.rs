use crate::infra::{load_store, parse_instant};
use chrono::{DateTime, Datelike, Duration, Utc};
use clap::Args;
use credit_insights::config::{AppConfig, DashboardConfig};
use credit_insights::error::AppError;
use credit_insights::workflows::dashboard::{
    format_money, ApplicationSubmission, BorrowerSubmission, DashboardError, DashboardOverview,
    DashboardService, MetricComparison, RecordStore, RequestContext, ScoreSubmission, SkipLedger,
    UserRole,
};
use credit_insights::workflows::snapshot::SnapshotStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// Directory holding applications.csv, score_events.csv and optionally borrowers.csv
    #[arg(long)]
    pub(crate) snapshot_dir: PathBuf,
    /// Reference instant (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
    /// Calendar year for the score trend. Defaults to the year of `--now`.
    #[arg(long)]
    pub(crate) year: Option<i32>,
    /// Count recent applications without an effective score in the risk chart
    #[arg(long)]
    pub(crate) include_unknown: bool,
    /// Print the views as JSON instead of the terminal report
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reference instant (RFC 3339 or YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
    /// Count recent applications without an effective score in the risk chart
    #[arg(long)]
    pub(crate) include_unknown: bool,
    /// Print the views as JSON instead of the terminal report
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        snapshot_dir,
        now,
        year,
        include_unknown,
        json,
    } = args;

    let config = AppConfig::load()?;
    let store = load_store(Some(&snapshot_dir))?;
    let service = DashboardService::new(store, config.dashboard);

    let now = now.unwrap_or_else(Utc::now);
    let overview =
        collect_views(&service, now, year.unwrap_or_else(|| now.year()), include_unknown).await?;

    println!("Snapshot: {}", snapshot_dir.display());
    emit(&overview, &service.config().currency, json)
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        now,
        include_unknown,
        json,
    } = args;

    let now = now.unwrap_or_else(Utc::now);
    let service = DashboardService::new(Arc::new(SnapshotStore::new()), DashboardConfig::default());
    let seeded = seed_demo_portfolio(&service, now).await?;

    println!(
        "Credit dashboard demo: seeded {} borrowers, {} applications, {} score events",
        seeded.borrowers, seeded.applications, seeded.score_events
    );
    let overview = collect_views(&service, now, now.year(), include_unknown).await?;
    emit(&overview, &service.config().currency, json)
}

/// Reads every view concurrently; any failed read fails the report.
pub(crate) async fn collect_views<S>(
    service: &DashboardService<S>,
    now: DateTime<Utc>,
    year: i32,
    include_unknown: bool,
) -> Result<DashboardOverview, DashboardError>
where
    S: RecordStore + 'static,
{
    let (stats, risk_distribution, score_trends, recent_applications) = tokio::try_join!(
        service.stats(now),
        service.risk_distribution(now, include_unknown),
        service.score_trends(year),
        service.recent_applications(None),
    )?;

    Ok(DashboardOverview {
        as_of: now,
        stats,
        risk_distribution,
        score_trends,
        recent_applications,
    })
}

fn emit(overview: &DashboardOverview, currency: &str, json: bool) -> Result<(), AppError> {
    if json {
        let payload = serde_json::to_string_pretty(overview).map_err(std::io::Error::from)?;
        println!("{payload}");
    } else {
        print!("{}", render_report(overview, currency));
    }
    Ok(())
}

pub(crate) fn render_report(overview: &DashboardOverview, currency: &str) -> String {
    let mut out = String::new();
    let stats = &overview.stats;

    out.push_str(&format!(
        "Credit dashboard as of {}\n",
        overview.as_of.format("%Y-%m-%d %H:%M UTC")
    ));

    out.push_str("\nHeadline\n");
    out.push_str(&format!(
        "- {} applications | {} approved today | {} pending review | {} total volume\n",
        stats.headline.total_applications,
        stats.headline.approved_today,
        stats.headline.pending_review,
        stats.headline.total_loan_volume_display
    ));

    out.push_str("\nThis month vs last month\n");
    let comparison = &stats.comparison;
    push_metric(&mut out, "Applications", &comparison.application_volume, |value| {
        format!("{value:.0}")
    });
    push_metric(&mut out, "Approvals", &comparison.approval_count, |value| {
        format!("{value:.0}")
    });
    push_metric(&mut out, "Approval rate", &comparison.approval_rate, |value| {
        format!("{value:.0}%")
    });
    push_metric(&mut out, "Average score", &comparison.average_score, |value| {
        format!("{value:.1}")
    });
    push_metric(
        &mut out,
        "Approved volume",
        &comparison.approved_loan_volume,
        |value| format_money(Some(value), currency),
    );

    let distribution = &overview.risk_distribution;
    out.push_str(&format!(
        "\nRisk distribution (last {} days, {} classified)\n",
        (distribution.as_of - distribution.window.start).num_days(),
        distribution.distribution.total_classified
    ));
    for share in &distribution.distribution.shares {
        out.push_str(&format!(
            "- {}: {}% ({})\n",
            share.bucket.chart_label(),
            share.percentage,
            share.count
        ));
    }

    let trends = &overview.score_trends;
    if trends.points.is_empty() {
        out.push_str(&format!("\nScore trend {}: no scored applications\n", trends.year));
    } else {
        out.push_str(&format!("\nScore trend {}\n", trends.year));
        for point in &trends.points {
            out.push_str(&format!(
                "- {}: {:.2} avg over {} applications\n",
                point.month_label, point.avg_score, point.applications
            ));
        }
    }

    let recent = &overview.recent_applications;
    if recent.applications.is_empty() {
        out.push_str("\nRecent applications: none\n");
    } else {
        out.push_str("\nRecent applications\n");
        for row in &recent.applications {
            let score = row
                .credit_score
                .map(|score| score.to_string())
                .unwrap_or_else(|| "-".to_string());
            let stale = if row.stale_risk_label {
                " (stored label outdated)"
            } else {
                ""
            };
            out.push_str(&format!(
                "- {} | {} | {} | {} | score {} | {}{}\n",
                row.created_at.format("%Y-%m-%d"),
                row.borrower_name.as_deref().unwrap_or("Unknown borrower"),
                row.loan_amount_display,
                row.status_label,
                score,
                row.risk_badge,
                stale
            ));
        }
    }

    push_skips(&mut out, &overview.skipped_records());
    out
}

fn push_metric<F>(out: &mut String, label: &str, metric: &MetricComparison, render: F)
where
    F: Fn(f64) -> String,
{
    out.push_str(&format!(
        "- {}: {} (prior {}) {} {:?}\n",
        label,
        render(metric.current),
        render(metric.prior),
        metric.percent_change,
        metric.trend
    ));
}

fn push_skips(out: &mut String, skipped: &SkipLedger) {
    if skipped.is_empty() {
        return;
    }
    out.push_str(&format!("\nSkipped records: {}\n", skipped.total));
    for (reason, count) in &skipped.by_reason {
        out.push_str(&format!("- {}: {}\n", reason.label(), count));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SeededPortfolio {
    pub(crate) borrowers: usize,
    pub(crate) applications: usize,
    pub(crate) score_events: usize,
}

struct DemoApplication {
    borrower: usize,
    days_ago: i64,
    amount: f64,
    purpose: &'static str,
    status: &'static str,
    score: Option<f64>,
}

const DEMO_BORROWERS: [(&str, &str, &str); 4] = [
    ("Amina", "Otieno", "+254712000101"),
    ("Brian", "Kamau", "+254712000202"),
    ("Wanjiru", "Njoroge", "+254712000303"),
    ("Hassan", "Ali", "+254712000404"),
];

const DEMO_APPLICATIONS: [DemoApplication; 8] = [
    DemoApplication {
        borrower: 0,
        days_ago: 48,
        amount: 75_000.0,
        purpose: "Inventory restock",
        status: "approved",
        score: Some(71.0),
    },
    DemoApplication {
        borrower: 1,
        days_ago: 41,
        amount: 20_000.0,
        purpose: "School fees",
        status: "rejected",
        score: Some(34.0),
    },
    DemoApplication {
        borrower: 2,
        days_ago: 33,
        amount: 150_000.0,
        purpose: "Dairy equipment",
        status: "approved",
        score: Some(83.0),
    },
    DemoApplication {
        borrower: 3,
        days_ago: 21,
        amount: 45_000.0,
        purpose: "Motorbike repair",
        status: "pending",
        score: Some(52.0),
    },
    DemoApplication {
        borrower: 0,
        days_ago: 12,
        amount: 90_000.0,
        purpose: "Shop expansion",
        status: "approved",
        score: Some(88.0),
    },
    DemoApplication {
        borrower: 1,
        days_ago: 6,
        amount: 30_000.0,
        purpose: "Seed and fertiliser",
        status: "pending",
        score: Some(64.0),
    },
    DemoApplication {
        borrower: 2,
        days_ago: 2,
        amount: 60_000.0,
        purpose: "Solar installation",
        status: "pending",
        score: None,
    },
    DemoApplication {
        borrower: 3,
        days_ago: 0,
        amount: 12_500.0,
        purpose: "Market stall rent",
        status: "approved",
        score: Some(58.0),
    },
];

/// Seeds a small portfolio through the intake flow, then rescores one pending
/// application with a classifier label that disagrees with its new score.
pub(crate) async fn seed_demo_portfolio<S>(
    service: &DashboardService<S>,
    now: DateTime<Utc>,
) -> Result<SeededPortfolio, DashboardError>
where
    S: RecordStore + 'static,
{
    let officer = RequestContext::new("demo-officer", Some(UserRole::LoanOfficer));
    let manager = RequestContext::new("demo-manager", Some(UserRole::CreditManager));
    let onboarded = now - Duration::days(60);

    let mut borrowers = Vec::with_capacity(DEMO_BORROWERS.len());
    for (first_name, last_name, phone) in DEMO_BORROWERS {
        let borrower = service
            .register_borrower(
                &officer,
                BorrowerSubmission {
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                    phone: phone.to_string(),
                    national_id: None,
                    email: None,
                    location: None,
                },
                onboarded,
            )
            .await?;
        borrowers.push(borrower.borrower_id);
    }

    let mut seeded = SeededPortfolio {
        borrowers: borrowers.len(),
        applications: 0,
        score_events: 0,
    };
    let mut rescore_target = None;

    for demo in &DEMO_APPLICATIONS {
        let submitted = service
            .submit_application(
                &officer,
                ApplicationSubmission {
                    borrower_id: borrowers[demo.borrower].clone(),
                    loan_amount: Some(demo.amount),
                    loan_purpose: Some(demo.purpose.to_string()),
                    notes: None,
                    status: Some(demo.status.to_string()),
                    credit_score: demo.score,
                    risk_level: None,
                },
                now - Duration::days(demo.days_ago),
            )
            .await?;

        seeded.applications += 1;
        if submitted.initial_score.is_some() {
            seeded.score_events += 1;
        }
        if demo.status == "pending" && demo.score.is_some() && rescore_target.is_none() {
            rescore_target = Some((submitted.application.id, demo.days_ago));
        }
    }

    if let Some((application_id, days_ago)) = rescore_target {
        let rescored_at = now - Duration::days(days_ago) + Duration::hours(20);
        service
            .record_score(
                &manager,
                application_id,
                ScoreSubmission {
                    credit_score: 81.0,
                    risk_level: Some("high".to_string()),
                },
                rescored_at.min(now),
            )
            .await?;
        seeded.score_events += 1;
    }

    Ok(seeded)
}
