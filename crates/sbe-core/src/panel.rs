// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::error::SbeError;
use crate::series::{Observation, PanelKey, Series};
use std::collections::BTreeMap;

const DEFAULT_MIN_OBSERVATIONS: usize = 5;

/// Eligibility configuration for panel construction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    /// Minimum rows a (unit, category) group needs to become a series.
    pub min_observations: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            min_observations: DEFAULT_MIN_OBSERVATIONS,
        }
    }
}

impl PanelConfig {
    pub fn validate(&self) -> Result<(), SbeError> {
        if self.min_observations < 2 {
            return Err(SbeError::invalid_input(format!(
                "PanelConfig.min_observations must be >= 2; got {}",
                self.min_observations
            )));
        }
        Ok(())
    }
}

/// Eligible panel series keyed by (unit, category), in deterministic order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Panel {
    series: BTreeMap<PanelKey, Series>,
    n_excluded_short: usize,
}

impl Panel {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Groups dropped for having fewer than `min_observations` rows.
    pub fn n_excluded_short(&self) -> usize {
        self.n_excluded_short
    }

    pub fn get(&self, key: &PanelKey) -> Option<&Series> {
        self.series.get(key)
    }

    /// Series in key order; the batch pipeline relies on this determinism.
    pub fn iter(&self) -> impl Iterator<Item = (&PanelKey, &Series)> {
        self.series.iter()
    }

    /// Series belonging to `category_id`, excluding `skip_unit`.
    pub fn category_series_excluding<'a>(
        &'a self,
        category_id: &'a str,
        skip_unit: &'a str,
    ) -> impl Iterator<Item = &'a Series> {
        self.series.values().filter(move |series| {
            series.key.category_id == category_id && series.key.unit_id != skip_unit
        })
    }
}

/// Groups raw observations into eligible series.
///
/// Groups shorter than `min_observations` are silently omitted and counted;
/// that is an eligibility rule, not an error. Duplicate periods within one
/// group are rejected because downstream split indices assume a strictly
/// increasing period axis.
pub fn build_panel(
    observations: &[Observation],
    config: &PanelConfig,
) -> Result<Panel, SbeError> {
    config.validate()?;

    let mut grouped: BTreeMap<PanelKey, Vec<(i64, f64)>> = BTreeMap::new();
    for observation in observations {
        grouped
            .entry(observation.key())
            .or_default()
            .push((observation.period, observation.value));
    }

    let mut panel = Panel::default();
    for (key, mut rows) in grouped {
        rows.sort_by_key(|(period, _)| *period);

        if let Some(window) = rows.windows(2).find(|window| window[0].0 == window[1].0) {
            return Err(SbeError::invalid_input(format!(
                "duplicate period {} for series {key}",
                window[0].0
            )));
        }

        if rows.len() < config.min_observations {
            panel.n_excluded_short += 1;
            continue;
        }

        let (periods, values) = rows.into_iter().unzip();
        panel.series.insert(
            key.clone(),
            Series {
                key,
                periods,
                values,
            },
        );
    }

    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::{Panel, PanelConfig, build_panel};
    use crate::series::{Observation, PanelKey};

    fn obs(unit: &str, category: &str, period: i64, value: f64) -> Observation {
        Observation {
            unit_id: unit.to_string(),
            category_id: category.to_string(),
            period,
            value,
        }
    }

    fn long_group(unit: &str, category: &str, len: i64) -> Vec<Observation> {
        (0..len).map(|p| obs(unit, category, p, p as f64)).collect()
    }

    #[test]
    fn config_default_and_validation() {
        let config = PanelConfig::default();
        assert_eq!(config.min_observations, 5);
        config.validate().expect("default config should be valid");

        let err = PanelConfig { min_observations: 1 }
            .validate()
            .expect_err("min_observations=1 must fail");
        assert!(err.to_string().contains("min_observations"));
    }

    #[test]
    fn groups_are_sorted_by_period_and_keyed_deterministically() {
        let mut observations = long_group("USA", "Aquatics", 6);
        observations.reverse();
        observations.extend(long_group("AUS", "Aquatics", 6));

        let panel = build_panel(&observations, &PanelConfig::default())
            .expect("panel should build");
        assert_eq!(panel.len(), 2);

        let keys: Vec<_> = panel.iter().map(|(key, _)| key.clone()).collect();
        assert_eq!(keys[0], PanelKey::new("AUS", "Aquatics"));
        assert_eq!(keys[1], PanelKey::new("USA", "Aquatics"));

        let usa = panel
            .get(&PanelKey::new("USA", "Aquatics"))
            .expect("USA series should exist");
        assert_eq!(usa.periods, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(usa.values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn short_groups_are_counted_not_errored() {
        let mut observations = long_group("USA", "Aquatics", 6);
        observations.extend(long_group("FRA", "Aquatics", 4));
        observations.extend(long_group("GER", "Combat", 2));

        let panel = build_panel(&observations, &PanelConfig::default())
            .expect("panel should build");
        assert_eq!(panel.len(), 1);
        assert_eq!(panel.n_excluded_short(), 2);
        assert!(panel.get(&PanelKey::new("FRA", "Aquatics")).is_none());
    }

    #[test]
    fn duplicate_periods_are_rejected() {
        let mut observations = long_group("USA", "Aquatics", 6);
        observations.push(obs("USA", "Aquatics", 3, 99.0));

        let err = build_panel(&observations, &PanelConfig::default())
            .expect_err("duplicate period must fail");
        assert!(err.to_string().contains("duplicate period 3"));
        assert!(err.to_string().contains("USA/Aquatics"));
    }

    #[test]
    fn category_filter_excludes_treated_unit_and_other_categories() {
        let mut observations = long_group("USA", "Aquatics", 6);
        observations.extend(long_group("AUS", "Aquatics", 6));
        observations.extend(long_group("FRA", "Combat", 6));

        let panel = build_panel(&observations, &PanelConfig::default())
            .expect("panel should build");
        let donors: Vec<_> = panel
            .category_series_excluding("Aquatics", "USA")
            .map(|series| series.key.unit_id.clone())
            .collect();
        assert_eq!(donors, vec!["AUS".to_string()]);
    }

    #[test]
    fn empty_input_builds_empty_panel() {
        let panel = build_panel(&[], &PanelConfig::default()).expect("empty panel should build");
        assert!(panel.is_empty());
        assert_eq!(panel.n_excluded_short(), 0);
        assert_eq!(Panel::default(), panel);
    }
}
