// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use sbe_core::{CancelToken, ExecutionContext, Observation, ProgressSink};
use sbe_engine::{EngineConfig, run_batch};
use std::sync::Mutex;

fn group(unit: &str, category: &str, values: &[f64]) -> Vec<Observation> {
    values
        .iter()
        .enumerate()
        .map(|(p, &value)| Observation {
            unit_id: unit.to_string(),
            category_id: category.to_string(),
            period: 2000 + p as i64,
            value,
        })
        .collect()
}

const STEP: [f64; 8] = [2.0, 2.0, 2.0, 2.0, 8.0, 8.0, 8.0, 8.0];

#[test]
fn step_series_with_donors_flows_through_synthetic_control() {
    let mut observations = group("USA", "Aquatics", &STEP);
    observations.extend(group("AUS", "Aquatics", &[2.0; 8]));
    observations.extend(group("FRA", "Aquatics", &[3.0; 8]));

    let result = run_batch(
        &observations,
        &EngineConfig::default(),
        &ExecutionContext::new(),
    )
    .expect("batch should complete");

    // Flat donors fit a line exactly, so only the treated unit produces
    // a candidate and the correction is effectively a single test.
    assert_eq!(result.detections.len(), 1);
    let detection = &result.detections[0];
    assert_eq!(detection.unit_id, "USA");
    assert_eq!(detection.breakpoint_period, 2004);
    assert!(detection.significant);
    assert!(detection.corrected_p_value <= 0.05);
    assert!((detection.effect_size - 6.0).abs() < 1e-9);
    assert_eq!(detection.pre_mean, 2.0);
    assert_eq!(detection.post_mean, 8.0);

    assert_eq!(result.effects.len(), 1);
    let effect = &result.effects[0];
    assert_eq!(effect.method, "SyntheticControl");
    assert!((effect.effect_estimate - 6.0).abs() < 1e-6);
    assert!(effect.standard_error.is_none());

    // One effect only: the category is insufficiently evidenced to rank.
    assert!(result.ranking.is_empty());
    assert!(result.failures.is_empty());

    assert_eq!(result.diagnostics.n_series, 3);
    assert_eq!(result.diagnostics.n_candidates, 1);
    assert_eq!(result.diagnostics.n_significant, 1);
    assert_eq!(result.diagnostics.n_estimated, 1);
    assert_eq!(result.diagnostics.n_failed, 0);
}

#[test]
fn step_series_without_donors_falls_back_to_did() {
    let observations = group("USA", "Aquatics", &STEP);

    let result = run_batch(
        &observations,
        &EngineConfig::default(),
        &ExecutionContext::new(),
    )
    .expect("batch should complete");

    assert_eq!(result.effects.len(), 1);
    let effect = &result.effects[0];
    assert_eq!(effect.method, "DiD");
    assert!(effect.effect_estimate.is_finite());
    assert!(effect.standard_error.is_some());
    assert!(effect.p_value.is_some());
}

#[test]
fn weak_candidates_appear_unsignificant_and_unestimated() {
    let observations = group(
        "USA",
        "Aquatics",
        &[5.0, 5.2, 4.9, 5.1, 5.0, 4.8, 5.2, 5.0, 4.9, 5.1],
    );

    let result = run_batch(
        &observations,
        &EngineConfig::default(),
        &ExecutionContext::new(),
    )
    .expect("batch should complete");

    assert_eq!(result.detections.len(), 1);
    assert!(!result.detections[0].significant);
    assert!(result.effects.is_empty());
    assert_eq!(result.diagnostics.n_candidates, 1);
    assert_eq!(result.diagnostics.n_significant, 0);
}

#[test]
fn two_breaking_units_in_one_category_are_ranked() {
    let mut observations = group("USA", "Combat", &STEP);
    observations.extend(group(
        "AUS",
        "Combat",
        &[3.0, 3.0, 3.0, 3.0, 9.0, 9.0, 9.0, 9.0],
    ));
    observations.extend(group("FRA", "Combat", &[2.0; 8]));
    observations.extend(group("GER", "Combat", &[3.0; 8]));

    let result = run_batch(
        &observations,
        &EngineConfig::default(),
        &ExecutionContext::new(),
    )
    .expect("batch should complete");

    assert_eq!(result.diagnostics.n_significant, 2);
    assert_eq!(result.effects.len(), 2);

    assert_eq!(result.ranking.len(), 1);
    let combat = &result.ranking[0];
    assert_eq!(combat.category_id, "Combat");
    assert_eq!(combat.n_effects, 2);
    assert!((combat.mean_effect - 6.0).abs() < 0.1);
    assert!(combat.score > 0.0);
}

#[test]
fn short_groups_are_counted_not_failed() {
    let mut observations = group("USA", "Aquatics", &STEP);
    observations.extend(group("FRA", "Aquatics", &[4.0, 4.0, 4.0]));

    let result = run_batch(
        &observations,
        &EngineConfig::default(),
        &ExecutionContext::new(),
    )
    .expect("batch should complete");

    assert_eq!(result.diagnostics.n_series, 1);
    assert_eq!(result.diagnostics.n_excluded_short, 1);
    assert!(result.failures.is_empty());
}

#[test]
fn cancellation_aborts_between_series() {
    let observations = group("USA", "Aquatics", &STEP);
    let cancel = CancelToken::new();
    cancel.cancel();
    let ctx = ExecutionContext::new().with_cancel(&cancel);

    let err = run_batch(&observations, &EngineConfig::default(), &ctx)
        .expect_err("cancelled run must abort");
    assert_eq!(err.to_string(), "cancelled");
}

#[derive(Default)]
struct RecordingProgress {
    values: Mutex<Vec<f32>>,
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&self, fraction: f32) {
        self.values
            .lock()
            .expect("progress mutex should lock")
            .push(fraction);
    }
}

#[test]
fn progress_is_monotone_and_reaches_one() {
    let mut observations = group("USA", "Aquatics", &STEP);
    observations.extend(group("AUS", "Aquatics", &[2.0; 8]));

    let progress = RecordingProgress::default();
    let ctx = ExecutionContext::new().with_progress_sink(&progress);
    run_batch(&observations, &EngineConfig::default(), &ctx).expect("batch should complete");

    let values = progress
        .values
        .lock()
        .expect("progress values should lock")
        .clone();
    assert!(!values.is_empty());
    assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(*values.last().expect("at least one report"), 1.0);
}

#[test]
fn duplicate_periods_are_a_fatal_input_error() {
    let mut observations = group("USA", "Aquatics", &STEP);
    observations.push(Observation {
        unit_id: "USA".to_string(),
        category_id: "Aquatics".to_string(),
        period: 2003,
        value: 1.0,
    });

    let err = run_batch(
        &observations,
        &EngineConfig::default(),
        &ExecutionContext::new(),
    )
    .expect_err("duplicate periods must fail fast");
    assert!(err.to_string().contains("duplicate period"));
}

#[cfg(feature = "serde")]
#[test]
fn batch_result_serializes() {
    let observations = group("USA", "Aquatics", &STEP);
    let result = run_batch(
        &observations,
        &EngineConfig::default(),
        &ExecutionContext::new(),
    )
    .expect("batch should complete");
    let encoded = serde_json::to_string(&result).expect("batch result should serialize");
    assert!(encoded.contains("\"DiD\""));
}
