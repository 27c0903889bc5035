use serde::{Deserialize, Serialize};

use super::numeric::percent_of;

/// Risk category derived from an effective score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskBucket {
    Low,
    Moderate,
    High,
    VeryHigh,
    Unknown,
}

impl RiskBucket {
    /// Buckets for scored applications, in chart order.
    pub const fn scored() -> [Self; 4] {
        [Self::Low, Self::Moderate, Self::High, Self::VeryHigh]
    }

    /// Thresholds are checked from the top band down; scores above 100 are
    /// rejected at the record boundary and never reach this point.
    pub fn classify(score: Option<u8>) -> Self {
        match score {
            None => Self::Unknown,
            Some(score) if score >= 80 => Self::Low,
            Some(score) if score >= 60 => Self::Moderate,
            Some(score) if score >= 40 => Self::High,
            Some(_) => Self::VeryHigh,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::VeryHigh => "very-high",
            Self::Unknown => "unknown",
        }
    }

    pub const fn badge_label(self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::Moderate => "Moderate Risk",
            Self::High => "High Risk",
            Self::VeryHigh => "Very High Risk",
            Self::Unknown => "Not Scored",
        }
    }

    pub const fn chart_label(self) -> &'static str {
        match self {
            Self::Low => "Low Risk (80-100)",
            Self::Moderate => "Moderate Risk (60-79)",
            Self::High => "High Risk (40-59)",
            Self::VeryHigh => "Very High Risk (<40)",
            Self::Unknown => "Not Scored",
        }
    }

    /// Parses a stored `risk_level` label. Unrecognised labels yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace([' ', '_'], "-").as_str() {
            "low" | "low-risk" => Some(Self::Low),
            "moderate" | "moderate-risk" => Some(Self::Moderate),
            "high" | "high-risk" => Some(Self::High),
            "very-high" | "very-high-risk" => Some(Self::VeryHigh),
            "unknown" | "not-scored" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// One slice of the distribution chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketShare {
    pub bucket: RiskBucket,
    pub label: &'static str,
    pub count: usize,
    pub percentage: u32,
}

/// Percentages are rounded per bucket, so their sum can drift from 100 by up
/// to one less than the number of buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskDistribution {
    pub shares: Vec<BucketShare>,
    pub total_classified: usize,
}

impl RiskDistribution {
    pub fn share(&self, bucket: RiskBucket) -> Option<&BucketShare> {
        self.shares.iter().find(|share| share.bucket == bucket)
    }

    pub fn percentage_sum(&self) -> u32 {
        self.shares.iter().map(|share| share.percentage).sum()
    }
}

/// Buckets every score. Absent scores only count, in an extra `Unknown` slice,
/// when `include_unknown` is set; otherwise they are left out of the denominator.
pub fn distribution<I>(scores: I, include_unknown: bool) -> RiskDistribution
where
    I: IntoIterator<Item = Option<u8>>,
{
    let mut counts = [0usize; 5];
    for score in scores {
        let bucket = RiskBucket::classify(score);
        if bucket == RiskBucket::Unknown && !include_unknown {
            continue;
        }
        counts[slot(bucket)] += 1;
    }

    let mut buckets = RiskBucket::scored().to_vec();
    if include_unknown {
        buckets.push(RiskBucket::Unknown);
    }

    let total_classified: usize = buckets.iter().map(|bucket| counts[slot(*bucket)]).sum();
    let shares = buckets
        .into_iter()
        .map(|bucket| {
            let count = counts[slot(bucket)];
            BucketShare {
                bucket,
                label: bucket.chart_label(),
                count,
                percentage: percent_of(count, total_classified),
            }
        })
        .collect();

    RiskDistribution {
        shares,
        total_classified,
    }
}

const fn slot(bucket: RiskBucket) -> usize {
    match bucket {
        RiskBucket::Low => 0,
        RiskBucket::Moderate => 1,
        RiskBucket::High => 2,
        RiskBucket::VeryHigh => 3,
        RiskBucket::Unknown => 4,
    }
}
