use std::fmt;

use rama::error::{ErrorContext as _, OpaqueError};
use rand::distr::weighted::WeightedIndex;

use crate::{client::Endpoint, random::RandomSource};

/// A single thing a virtual user can do on its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// POST one sample to `/metrics`.
    SendMetric,
    /// POST a batch of samples to `/metrics/batch`.
    SendBatch,
    /// GET `/analyze`.
    Analyze,
    /// GET `/health`.
    HealthCheck,
    /// Fire-and-forget POST of a cheap sample to `/metrics`.
    RapidMetric,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::SendMetric => "send_metric",
            Action::SendBatch => "send_batch",
            Action::Analyze => "get_analysis",
            Action::HealthCheck => "health_check",
            Action::RapidMetric => "rapid_metrics",
        }
    }

    pub fn endpoint(self) -> Endpoint {
        match self {
            Action::SendMetric | Action::RapidMetric => Endpoint::Metrics,
            Action::SendBatch => Endpoint::MetricsBatch,
            Action::Analyze => Endpoint::Analyze,
            Action::HealthCheck => Endpoint::Health,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

/// Relative selection weights of the actions of a profile.
///
/// At least one action must have a positive weight.
/// Actions with weight zero are kept but never selected.
#[derive(Debug, Clone)]
pub struct WeightTable {
    actions: Vec<(Action, u32)>,
    dist: WeightedIndex<u32>,
}

impl WeightTable {
    pub fn try_new(entries: impl IntoIterator<Item = (Action, u32)>) -> Result<Self, OpaqueError> {
        let actions: Vec<_> = entries.into_iter().collect();
        let dist = WeightedIndex::new(actions.iter().map(|(_, w)| *w))
            .context("create weighted action index (at least one positive weight required)")?;
        Ok(Self { actions, dist })
    }

    /// Pick an action proportional to its weight.
    pub fn pick<R: RandomSource>(&self, rng: &mut R) -> Action {
        self.actions[rng.weighted(&self.dist)].0
    }

    #[cfg(test)]
    fn weight(&self, action: Action) -> u32 {
        self.actions
            .iter()
            .filter(|(a, _)| *a == action)
            .map(|(_, w)| *w)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Action, u32)> + '_ {
        self.actions.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::random::RngSource;

    #[test]
    fn rejects_tables_without_positive_weight() {
        assert!(WeightTable::try_new([]).is_err());
        assert!(WeightTable::try_new([(Action::Analyze, 0), (Action::HealthCheck, 0)]).is_err());
    }

    #[test]
    fn zero_weight_actions_are_never_picked() {
        let table =
            WeightTable::try_new([(Action::Analyze, 0), (Action::HealthCheck, 3)]).expect("table");
        let mut rng = RngSource::seeded(11);
        for _ in 0..1_000 {
            assert_eq!(table.pick(&mut rng), Action::HealthCheck);
        }
        assert_eq!(table.weight(Action::Analyze), 0);
        assert_eq!(table.weight(Action::HealthCheck), 3);
    }

    #[test]
    fn picks_follow_weights() {
        let table = WeightTable::try_new([(Action::SendMetric, 3), (Action::SendBatch, 1)])
            .expect("table");
        let mut rng = RngSource::seeded(12);

        let mut counts: HashMap<Action, usize> = HashMap::new();
        for _ in 0..20_000 {
            *counts.entry(table.pick(&mut rng)).or_default() += 1;
        }

        let ratio = counts[&Action::SendMetric] as f64 / counts[&Action::SendBatch] as f64;
        assert!((ratio - 3.0).abs() < 0.3, "ratio = {ratio}");
    }

    #[test]
    fn actions_map_to_endpoints() {
        assert_eq!(Action::SendMetric.endpoint(), Endpoint::Metrics);
        assert_eq!(Action::RapidMetric.endpoint(), Endpoint::Metrics);
        assert_eq!(Action::SendBatch.endpoint(), Endpoint::MetricsBatch);
        assert_eq!(Action::Analyze.endpoint(), Endpoint::Analyze);
        assert_eq!(Action::HealthCheck.endpoint(), Endpoint::Health);
    }
}
