// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::EngineConfig;
use crate::rows::{CategoryRow, DetectionRow, EffectRow};
use sbe_core::{ExecutionContext, Observation, PanelKey, RunDiagnostics, SbeError, build_panel};
use sbe_detect::{DetectionResult, correct, detect_break, requires_estimation};
use sbe_effect::{EffectEstimate, aggregate_by_category, assemble_donor_pool, estimate_effect};
use std::time::Instant;

/// Pipeline stage at which a series dropped out.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureStage {
    Detection,
    Estimation,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Detection => f.write_str("detection"),
            FailureStage::Estimation => f.write_str("estimation"),
        }
    }
}

/// A series that produced no result, with the error that removed it.
/// These never abort the batch; they are surfaced here instead.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesFailure {
    pub key: PanelKey,
    pub stage: FailureStage,
    pub message: String,
}

/// Everything one batch run produces.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct BatchResult {
    pub detections: Vec<DetectionRow>,
    pub effects: Vec<EffectRow>,
    pub ranking: Vec<CategoryRow>,
    pub diagnostics: RunDiagnostics,
    pub failures: Vec<SeriesFailure>,
}

/// Runs the full pipeline over raw observations.
///
/// Two-phase by construction: every series is detected before any
/// candidate's significance is decided, because the FDR correction pools
/// p-values across the whole batch. Per-series failures are collected,
/// never propagated; cancellation is the only error that aborts, and it
/// is polled between series.
pub fn run_batch(
    observations: &[Observation],
    config: &EngineConfig,
    ctx: &ExecutionContext<'_>,
) -> Result<BatchResult, SbeError> {
    config.validate()?;
    let started = Instant::now();

    let panel = build_panel(observations, &config.panel)?;
    let mut diagnostics = RunDiagnostics {
        n_series: panel.len(),
        n_excluded_short: panel.n_excluded_short(),
        ..RunDiagnostics::default()
    };
    let mut failures = Vec::new();

    // Phase 1: one candidate per series, in key order.
    let mut results: Vec<DetectionResult> = Vec::new();
    let n_series = panel.len().max(1);
    for (i, (key, series)) in panel.iter().enumerate() {
        ctx.check_cancelled()?;
        match detect_break(series, &config.chow) {
            Ok(Some(result)) => results.push(result),
            Ok(None) => {}
            Err(SbeError::Cancelled) => return Err(SbeError::cancelled()),
            Err(err) => failures.push(SeriesFailure {
                key: key.clone(),
                stage: FailureStage::Detection,
                message: err.to_string(),
            }),
        }
        ctx.report_progress(0.5 * (i + 1) as f32 / n_series as f32);
    }
    diagnostics.n_candidates = results.len();

    // Phase 2: batch barrier. Significance is global, not per series.
    correct(&mut results, &config.fdr)?;
    let forwarded: Vec<&DetectionResult> = results
        .iter()
        .filter(|result| requires_estimation(result, &config.fdr))
        .collect();
    diagnostics.n_significant = forwarded.len();

    // Phase 3: estimation for gate survivors only.
    let mut estimates: Vec<EffectEstimate> = Vec::new();
    let n_forwarded = forwarded.len().max(1);
    for (i, result) in forwarded.iter().enumerate() {
        ctx.check_cancelled()?;
        let key = result.key();
        let Some(series) = panel.get(key) else {
            // Candidates come from the panel, so this indicates corruption
            // rather than a data problem; still recorded, not propagated.
            failures.push(SeriesFailure {
                key: key.clone(),
                stage: FailureStage::Estimation,
                message: format!("series {key} vanished from the panel"),
            });
            continue;
        };
        let pool = assemble_donor_pool(series, &panel);
        match estimate_effect(
            series,
            result.candidate.breakpoint_index,
            &pool,
            &config.synth,
        ) {
            Ok(estimate) => estimates.push(estimate),
            Err(SbeError::Cancelled) => return Err(SbeError::cancelled()),
            Err(err) => failures.push(SeriesFailure {
                key: key.clone(),
                stage: FailureStage::Estimation,
                message: err.to_string(),
            }),
        }
        ctx.report_progress(0.5 + 0.5 * (i + 1) as f32 / n_forwarded as f32);
    }
    diagnostics.n_estimated = estimates.len();
    diagnostics.n_failed = failures.len();

    let ranking = aggregate_by_category(&estimates);

    diagnostics
        .notes
        .push(format!("alpha={}", config.fdr.alpha));
    diagnostics.notes.push(format!(
        "min_abs_effect={}",
        config.fdr.min_abs_effect
    ));
    if !failures.is_empty() {
        diagnostics
            .warnings
            .push(format!("{} series failed and were skipped", failures.len()));
    }
    diagnostics.runtime_ms = Some(started.elapsed().as_millis() as u64);

    ctx.record_scalar("series_total", diagnostics.n_series as f64);
    ctx.record_scalar("candidates", diagnostics.n_candidates as f64);
    ctx.record_scalar("significant", diagnostics.n_significant as f64);
    ctx.record_scalar("estimated", diagnostics.n_estimated as f64);
    ctx.report_progress(1.0);

    Ok(BatchResult {
        detections: results.iter().map(DetectionRow::from).collect(),
        effects: estimates.iter().map(EffectRow::from).collect(),
        ranking: ranking.iter().map(CategoryRow::from).collect(),
        diagnostics,
        failures,
    })
}
