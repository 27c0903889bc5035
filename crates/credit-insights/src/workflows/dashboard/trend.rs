use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use super::numeric::round_to_hundredths;
use super::resolver::EffectiveScores;

pub const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Average effective score and volume for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrendPoint {
    /// Zero-based calendar month (0 = January).
    pub month: u32,
    pub month_label: &'static str,
    pub avg_score: f64,
    pub applications: usize,
}

/// Groups effective scores from `year` by the UTC month of `scored_at`.
///
/// Months without scores are left out entirely; the rest come back in
/// calendar order.
pub fn monthly_trend(scores: &EffectiveScores, year: i32) -> Vec<MonthlyTrendPoint> {
    let mut months: BTreeMap<u32, (u64, usize)> = BTreeMap::new();

    for score in scores {
        if score.scored_at.year() != year {
            continue;
        }
        let entry = months.entry(score.scored_at.month0()).or_insert((0, 0));
        entry.0 += u64::from(score.credit_score);
        entry.1 += 1;
    }

    months
        .into_iter()
        .map(|(month, (sum, count))| MonthlyTrendPoint {
            month,
            month_label: MONTH_LABELS[month as usize],
            avg_score: round_to_hundredths(sum as f64 / count as f64),
            applications: count,
        })
        .collect()
}
