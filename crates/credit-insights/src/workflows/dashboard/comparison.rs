use serde::Serialize;

use super::domain::{Application, TimeWindow};
use super::numeric::{percent_of, round_half_up, round_to_hundredths};
use super::resolver::EffectiveScores;

/// Signed percentage change between two readings of one metric.
///
/// Every delta shown on the dashboard goes through here so rounding and sign
/// conventions stay uniform. A zero prior reading never reaches the division.
pub fn pct_change(current: f64, prior: f64) -> String {
    if prior == 0.0 {
        return if current != 0.0 {
            "+100%".to_string()
        } else {
            "0%".to_string()
        };
    }

    let diff = current - prior;
    let pct = round_half_up(diff / prior.abs() * 100.0) as i64;
    match pct {
        0 => "0%".to_string(),
        positive if positive > 0 => format!("+{positive}%"),
        negative => format!("{negative}%"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn between(current: f64, prior: f64) -> Self {
        if current > prior {
            Self::Up
        } else if current < prior {
            Self::Down
        } else {
            Self::Flat
        }
    }
}

/// Current vs prior reading of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub current: f64,
    pub prior: f64,
    pub percent_change: String,
    pub trend: TrendDirection,
}

impl MetricComparison {
    pub fn between(current: f64, prior: f64) -> Self {
        Self {
            current,
            prior,
            percent_change: pct_change(current, prior),
            trend: TrendDirection::between(current, prior),
        }
    }
}

/// Aggregates for a single period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodStats {
    pub applications: usize,
    pub approvals: usize,
    /// Whole-number percentage; 0 for a period without applications.
    pub approval_rate: u32,
    pub scored_applications: usize,
    /// Mean effective score to two decimals; 0 when nothing was scored.
    pub average_score: f64,
    pub approved_loan_volume: f64,
}

impl PeriodStats {
    /// Only applications created, and scores resolved, inside `window` count.
    pub fn compute(
        window: &TimeWindow,
        applications: &[Application],
        scores: &EffectiveScores,
    ) -> Self {
        let in_period: Vec<&Application> = applications
            .iter()
            .filter(|application| window.contains(application.created_at))
            .collect();

        let approvals = in_period
            .iter()
            .filter(|application| application.is_approved())
            .count();

        let approved_loan_volume = in_period
            .iter()
            .filter(|application| application.is_approved())
            .filter_map(|application| application.loan_amount)
            .sum();

        let period_scores: Vec<u8> = scores
            .iter()
            .filter(|score| window.contains(score.scored_at))
            .map(|score| score.credit_score)
            .collect();
        let average_score = if period_scores.is_empty() {
            0.0
        } else {
            let total: u64 = period_scores.iter().map(|score| u64::from(*score)).sum();
            round_to_hundredths(total as f64 / period_scores.len() as f64)
        };

        Self {
            applications: in_period.len(),
            approvals,
            approval_rate: percent_of(approvals, in_period.len()),
            scored_applications: period_scores.len(),
            average_score,
            approved_loan_volume,
        }
    }
}

/// Period-over-period view of every headline metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub application_volume: MetricComparison,
    pub approval_count: MetricComparison,
    pub approval_rate: MetricComparison,
    pub average_score: MetricComparison,
    pub approved_loan_volume: MetricComparison,
}

pub fn compare_periods(current: &PeriodStats, prior: &PeriodStats) -> PeriodComparison {
    PeriodComparison {
        application_volume: MetricComparison::between(
            current.applications as f64,
            prior.applications as f64,
        ),
        approval_count: MetricComparison::between(
            current.approvals as f64,
            prior.approvals as f64,
        ),
        approval_rate: MetricComparison::between(
            f64::from(current.approval_rate),
            f64::from(prior.approval_rate),
        ),
        average_score: MetricComparison::between(current.average_score, prior.average_score),
        approved_loan_volume: MetricComparison::between(
            current.approved_loan_volume,
            prior.approved_loan_volume,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::dashboard::domain::{
        ApplicationId, ApplicationStatus, BorrowerId, ScoreEvent,
    };
    use crate::workflows::dashboard::resolver::{resolve_latest, ResolutionScope};
    use chrono::{DateTime, TimeZone, Utc};

    #[test]
    fn pct_change_handles_zero_prior() {
        assert_eq!(pct_change(0.0, 0.0), "0%");
        assert_eq!(pct_change(5.0, 0.0), "+100%");
    }

    #[test]
    fn pct_change_only_reports_growth_for_nonzero_current() {
        assert_eq!(pct_change(0.0, 5.0), "-100%");
    }

    #[test]
    fn pct_change_signs_and_rounds() {
        assert_eq!(pct_change(50.0, 100.0), "-50%");
        assert_eq!(pct_change(150.0, 100.0), "+50%");
        assert_eq!(pct_change(100.2, 100.0), "0%");
        assert_eq!(pct_change(1.0, 3.0), "-67%");
        assert_eq!(pct_change(-5.0, -10.0), "+50%");
    }

    #[test]
    fn trend_direction_reports_flat_for_equal_readings() {
        assert_eq!(TrendDirection::between(3.0, 3.0), TrendDirection::Flat);
        assert_eq!(TrendDirection::between(4.0, 3.0), TrendDirection::Up);
        assert_eq!(TrendDirection::between(2.0, 3.0), TrendDirection::Down);
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, day, 10, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn application(
        id: &str,
        status: ApplicationStatus,
        amount: Option<f64>,
        day: u32,
    ) -> Application {
        Application {
            id: ApplicationId(id.to_string()),
            borrower_id: BorrowerId("b-1".to_string()),
            loan_amount: amount,
            status,
            created_at: at(day),
            loan_purpose: None,
            notes: None,
        }
    }

    #[test]
    fn period_stats_cover_only_the_window() {
        let window = TimeWindow::until(at(1), at(15));
        let applications = vec![
            application("a", ApplicationStatus::Approved, Some(50_000.0), 2),
            application("b", ApplicationStatus::Approved, None, 3),
            application("c", ApplicationStatus::Pending, Some(10_000.0), 4),
            application("d", ApplicationStatus::Approved, Some(99_000.0), 20),
        ];
        let events = vec![
            ScoreEvent {
                application_id: ApplicationId("a".to_string()),
                credit_score: Some(72),
                risk_level: None,
                scored_at: at(2),
                sequence: 1,
            },
            ScoreEvent {
                application_id: ApplicationId("c".to_string()),
                credit_score: Some(45),
                risk_level: None,
                scored_at: at(5),
                sequence: 2,
            },
            ScoreEvent {
                application_id: ApplicationId("d".to_string()),
                credit_score: Some(99),
                risk_level: None,
                scored_at: at(21),
                sequence: 3,
            },
        ];
        let scores = resolve_latest(&events, &ResolutionScope::all());

        let stats = PeriodStats::compute(&window, &applications, &scores);
        assert_eq!(stats.applications, 3);
        assert_eq!(stats.approvals, 2);
        assert_eq!(stats.approval_rate, 67);
        assert_eq!(stats.scored_applications, 2);
        assert_eq!(stats.average_score, 58.5);
        assert_eq!(stats.approved_loan_volume, 50_000.0);
    }

    #[test]
    fn empty_periods_degrade_to_zero() {
        let window = TimeWindow::until(at(1), at(2));
        let stats = PeriodStats::compute(&window, &[], &EffectiveScores::default());
        assert_eq!(stats, PeriodStats::default());

        let comparison = compare_periods(&stats, &stats);
        assert_eq!(comparison.application_volume.percent_change, "0%");
        assert_eq!(comparison.average_score.trend, TrendDirection::Flat);
    }

    #[test]
    fn comparison_uses_pct_change_for_every_metric() {
        let current = PeriodStats {
            applications: 12,
            approvals: 6,
            approval_rate: 50,
            scored_applications: 10,
            average_score: 66.0,
            approved_loan_volume: 300_000.0,
        };
        let prior = PeriodStats {
            applications: 8,
            approvals: 6,
            approval_rate: 75,
            scored_applications: 8,
            average_score: 60.0,
            approved_loan_volume: 0.0,
        };

        let comparison = compare_periods(&current, &prior);
        assert_eq!(comparison.application_volume.percent_change, "+50%");
        assert_eq!(comparison.approval_count.percent_change, "0%");
        assert_eq!(comparison.approval_count.trend, TrendDirection::Flat);
        assert_eq!(comparison.approval_rate.percent_change, "-33%");
        assert_eq!(comparison.average_score.percent_change, "+10%");
        assert_eq!(comparison.approved_loan_volume.percent_change, "+100%");
        assert_eq!(comparison.approved_loan_volume.trend, TrendDirection::Up);
    }
}
