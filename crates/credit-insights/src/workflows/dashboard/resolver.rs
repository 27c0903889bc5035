use std::collections::btree_map::{self, Entry};
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::buckets::RiskBucket;
use super::domain::{ApplicationId, ScoreEvent, TimeWindow};

/// The score treated as authoritative for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveScore {
    pub application_id: ApplicationId,
    pub credit_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_risk_level: Option<RiskBucket>,
    pub scored_at: DateTime<Utc>,
    pub sequence: u64,
}

impl EffectiveScore {
    pub fn bucket(&self) -> RiskBucket {
        RiskBucket::classify(Some(self.credit_score))
    }

    /// True when the label stored with the score disagrees with the bucket table.
    pub fn has_stale_label(&self) -> bool {
        self.stored_risk_level
            .is_some_and(|stored| stored != self.bucket())
    }

    fn from_event(event: &ScoreEvent, credit_score: u8) -> Self {
        Self {
            application_id: event.application_id.clone(),
            credit_score,
            stored_risk_level: event.risk_level,
            scored_at: event.scored_at,
            sequence: event.sequence,
        }
    }

    fn ordering_key(&self) -> (DateTime<Utc>, u64, u8) {
        (self.scored_at, self.sequence, self.credit_score)
    }
}

/// `application_id -> EffectiveScore`. Applications without a usable event are
/// absent, which callers must read as "unscored" rather than a score of zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EffectiveScores(BTreeMap<ApplicationId, EffectiveScore>);

impl EffectiveScores {
    pub fn get(&self, id: &ApplicationId) -> Option<&EffectiveScore> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, ApplicationId, EffectiveScore> {
        self.0.values()
    }

    pub fn scores(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.values().map(|score| score.credit_score)
    }
}

impl<'a> IntoIterator for &'a EffectiveScores {
    type Item = &'a EffectiveScore;
    type IntoIter = btree_map::Values<'a, ApplicationId, EffectiveScore>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.values()
    }
}

/// Which events take part in a resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionScope {
    pub window: Option<TimeWindow>,
    pub applications: Option<BTreeSet<ApplicationId>>,
}

impl ResolutionScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn within(window: TimeWindow) -> Self {
        Self {
            window: Some(window),
            applications: None,
        }
    }

    pub fn for_applications<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ApplicationId>,
    {
        Self {
            window: None,
            applications: Some(ids.into_iter().collect()),
        }
    }

    fn admits(&self, event: &ScoreEvent) -> bool {
        let in_window = self
            .window
            .map_or(true, |window| window.contains(event.scored_at));
        let in_set = self
            .applications
            .as_ref()
            .map_or(true, |ids| ids.contains(&event.application_id));
        in_window && in_set
    }
}

/// Collapses score events into the latest score per application.
///
/// Events are ordered by `scored_at`; equal timestamps fall back to the
/// store's ingestion `sequence` (later ingested wins) and then to the higher
/// score, so the outcome never depends on input order. Events without a
/// score are ignored.
pub fn resolve_latest<'a, I>(events: I, scope: &ResolutionScope) -> EffectiveScores
where
    I: IntoIterator<Item = &'a ScoreEvent>,
{
    let mut latest: BTreeMap<ApplicationId, EffectiveScore> = BTreeMap::new();

    for event in events {
        let Some(score) = event.credit_score else {
            continue;
        };
        if !scope.admits(event) {
            continue;
        }

        let candidate = EffectiveScore::from_event(event, score);
        match latest.entry(event.application_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                if candidate.ordering_key() > slot.get().ordering_key() {
                    slot.insert(candidate);
                }
            }
        }
    }

    EffectiveScores(latest)
}
