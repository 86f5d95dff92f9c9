// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::estimate::EffectEstimate;
use sbe_core::{mean, sample_std};
use std::collections::{BTreeMap, BTreeSet};

/// Ranked summary of the estimated effects within one category.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryAggregate {
    pub category_id: String,
    pub mean_effect: f64,
    /// Sample standard deviation (ddof = 1) of the effects.
    pub std_effect: f64,
    pub n_effects: usize,
    /// Distinct treated units behind the effects.
    pub n_units: usize,
    /// `mean_effect / (std_effect + 1)`: magnitude discounted by spread.
    pub score: f64,
}

/// Groups estimates by category and ranks categories by score, descending.
///
/// Categories backed by fewer than two effects are dropped as
/// insufficiently evidenced. Score ties break on category id so reruns
/// produce the same ordering.
pub fn aggregate_by_category(estimates: &[EffectEstimate]) -> Vec<CategoryAggregate> {
    let mut grouped: BTreeMap<&str, Vec<&EffectEstimate>> = BTreeMap::new();
    for estimate in estimates {
        grouped
            .entry(estimate.key.category_id.as_str())
            .or_default()
            .push(estimate);
    }

    let mut aggregates: Vec<CategoryAggregate> = grouped
        .into_iter()
        .filter(|(_, group)| group.len() >= 2)
        .map(|(category_id, group)| {
            let effects: Vec<f64> = group.iter().map(|e| e.estimate()).collect();
            let units: BTreeSet<&str> =
                group.iter().map(|e| e.key.unit_id.as_str()).collect();
            let mean_effect = mean(&effects);
            let std_effect = sample_std(&effects);
            CategoryAggregate {
                category_id: category_id.to_string(),
                mean_effect,
                std_effect,
                n_effects: effects.len(),
                n_units: units.len(),
                score: mean_effect / (std_effect + 1.0),
            }
        })
        .collect();

    aggregates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.category_id.cmp(&b.category_id))
    });
    aggregates
}
