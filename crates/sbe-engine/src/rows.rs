// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use sbe_detect::DetectionResult;
use sbe_effect::{CategoryAggregate, EffectEstimate, EffectOutcome};

/// One detection-table row, flat for tabular output.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRow {
    pub unit_id: String,
    pub category_id: String,
    pub breakpoint_period: i64,
    pub f_statistic: f64,
    pub raw_p_value: f64,
    pub corrected_p_value: f64,
    pub significant: bool,
    pub effect_size: f64,
    pub pre_mean: f64,
    pub post_mean: f64,
}

impl From<&DetectionResult> for DetectionRow {
    fn from(result: &DetectionResult) -> Self {
        Self {
            unit_id: result.candidate.key.unit_id.clone(),
            category_id: result.candidate.key.category_id.clone(),
            breakpoint_period: result.candidate.breakpoint_period,
            f_statistic: result.candidate.f_statistic,
            raw_p_value: result.candidate.raw_p_value,
            corrected_p_value: result
                .corrected_p_value
                .unwrap_or(result.candidate.raw_p_value),
            significant: result.significant,
            effect_size: result.effect_size,
            pre_mean: result.pre_mean,
            post_mean: result.post_mean,
        }
    }
}

/// One effect-table row. The uncertainty columns are only present on the
/// difference-in-differences path.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct EffectRow {
    pub unit_id: String,
    pub category_id: String,
    pub method: String,
    pub effect_estimate: f64,
    pub standard_error: Option<f64>,
    pub t_statistic: Option<f64>,
    pub p_value: Option<f64>,
}

impl From<&EffectEstimate> for EffectRow {
    fn from(estimate: &EffectEstimate) -> Self {
        let (standard_error, t_statistic, p_value) = match &estimate.outcome {
            EffectOutcome::SyntheticControl(_) => (None, None, None),
            EffectOutcome::Did(outcome) => (
                Some(outcome.standard_error),
                Some(outcome.t_statistic),
                Some(outcome.p_value),
            ),
        };
        Self {
            unit_id: estimate.key.unit_id.clone(),
            category_id: estimate.key.category_id.clone(),
            method: estimate.method_name().to_string(),
            effect_estimate: estimate.estimate(),
            standard_error,
            t_statistic,
            p_value,
        }
    }
}

/// One category-ranking row.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct CategoryRow {
    pub category_id: String,
    pub mean_effect: f64,
    pub std_effect: f64,
    pub n_effects: usize,
    pub score: f64,
}

impl From<&CategoryAggregate> for CategoryRow {
    fn from(aggregate: &CategoryAggregate) -> Self {
        Self {
            category_id: aggregate.category_id.clone(),
            mean_effect: aggregate.mean_effect,
            std_effect: aggregate.std_effect,
            n_effects: aggregate.n_effects,
            score: aggregate.score,
        }
    }
}
