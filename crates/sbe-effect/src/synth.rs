// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::donor::DonorPool;
use sbe_core::{PanelKey, SbeError, Series, mean};

const DEFAULT_MAX_ITER: usize = 500;
const DEFAULT_TOL: f64 = 1e-10;
const MAX_BACKTRACKS: usize = 60;
const ARMIJO_SIGMA: f64 = 1e-4;

/// Solver configuration for the constrained weight fit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthConfig {
    pub max_iter: usize,
    /// Relative objective-decrease threshold for convergence.
    pub tol: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            max_iter: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOL,
        }
    }
}

impl SynthConfig {
    pub fn validate(&self) -> Result<(), SbeError> {
        if self.max_iter == 0 {
            return Err(SbeError::invalid_input(
                "SynthConfig.max_iter must be positive",
            ));
        }
        if !(self.tol > 0.0 && self.tol.is_finite()) {
            return Err(SbeError::invalid_input(format!(
                "SynthConfig.tol must be finite and positive; got {}",
                self.tol
            )));
        }
        Ok(())
    }
}

/// A successful synthetic-control fit and the estimate derived from it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct SynthOutcome {
    pub donor_keys: Vec<PanelKey>,
    /// Simplex weights: non-negative, summing to one.
    pub weights: Vec<f64>,
    pub estimate: f64,
    pub pre_actual_mean: f64,
    pub post_actual_mean: f64,
    pub pre_synth_mean: f64,
    pub post_synth_mean: f64,
    /// Root-mean-square pre-break tracking error of the fitted counterfactual.
    pub pre_rmse: f64,
    pub iterations: usize,
}

/// Euclidean projection onto the probability simplex
/// `{ w : Σw = 1, w >= 0 }`.
pub fn project_onto_simplex(point: &[f64]) -> Vec<f64> {
    let d = point.len();
    if d == 0 {
        return vec![];
    }

    let mut sorted = point.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut threshold = 0.0;
    for (j, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let candidate = (cumulative - 1.0) / (j + 1) as f64;
        if u - candidate > 0.0 {
            threshold = candidate;
        }
    }

    point
        .iter()
        .map(|&value| (value - threshold).max(0.0))
        .collect()
}

fn objective(treated_pre: &[f64], donor_pre: &[&[f64]], weights: &[f64]) -> f64 {
    treated_pre
        .iter()
        .enumerate()
        .map(|(t, &actual)| {
            let predicted: f64 = donor_pre
                .iter()
                .zip(weights)
                .map(|(column, &w)| column[t] * w)
                .sum();
            let residual = actual - predicted;
            residual * residual
        })
        .sum()
}

fn gradient(treated_pre: &[f64], donor_pre: &[&[f64]], weights: &[f64]) -> Vec<f64> {
    let mut grad = vec![0.0; weights.len()];
    for (t, &actual) in treated_pre.iter().enumerate() {
        let predicted: f64 = donor_pre
            .iter()
            .zip(weights)
            .map(|(column, &w)| column[t] * w)
            .sum();
        let residual = actual - predicted;
        for (g, column) in grad.iter_mut().zip(donor_pre) {
            *g -= 2.0 * column[t] * residual;
        }
    }
    grad
}

/// Fits simplex-constrained weights minimizing the pre-break squared
/// tracking error, by projected gradient descent with backtracking.
///
/// Returns the weights and the iteration count, or `NumericalIssue` when
/// the objective turns non-finite or the loop exhausts `max_iter` without
/// the decrease dropping below tolerance.
pub fn fit_weights(
    treated_pre: &[f64],
    donor_pre: &[&[f64]],
    config: &SynthConfig,
) -> Result<(Vec<f64>, usize), SbeError> {
    config.validate()?;
    let d = donor_pre.len();
    if d == 0 {
        return Err(SbeError::infeasible("donor pool is empty"));
    }

    let mut weights = vec![1.0 / d as f64; d];
    let mut value = objective(treated_pre, donor_pre, &weights);
    if !value.is_finite() {
        return Err(SbeError::numerical_issue(
            "synthetic-control objective is non-finite at the uniform start",
        ));
    }

    for iteration in 1..=config.max_iter {
        let grad = gradient(treated_pre, donor_pre, &weights);

        let mut step = 1.0;
        let mut accepted: Option<(Vec<f64>, f64)> = None;
        for _ in 0..MAX_BACKTRACKS {
            let trial: Vec<f64> = weights
                .iter()
                .zip(&grad)
                .map(|(&w, &g)| w - step * g)
                .collect();
            let candidate = project_onto_simplex(&trial);
            let candidate_value = objective(treated_pre, donor_pre, &candidate);
            // Armijo test: decrease must be proportional to the squared
            // move, or a long step can land on an equal-cost vertex and
            // stall there.
            let moved: f64 = candidate
                .iter()
                .zip(&weights)
                .map(|(&c, &w)| {
                    let diff = c - w;
                    diff * diff
                })
                .sum();
            if candidate_value.is_finite()
                && candidate_value <= value - (ARMIJO_SIGMA / step) * moved
            {
                accepted = Some((candidate, candidate_value));
                break;
            }
            step *= 0.5;
        }

        // No acceptable step of any length: the iterate is a constrained
        // stationary point.
        let Some((candidate, candidate_value)) = accepted else {
            return Ok((weights, iteration));
        };

        let decrease = value - candidate_value;
        weights = candidate;
        value = candidate_value;
        if decrease <= config.tol * (1.0 + value) {
            return Ok((weights, iteration));
        }
    }

    Err(SbeError::numerical_issue(format!(
        "synthetic-control solver did not converge within {} iterations",
        config.max_iter
    )))
}

/// Fits donor weights on the pre-break window and applies them to the full
/// donor matrix to form the counterfactual estimate.
pub fn synthetic_control_estimate(
    treated: &Series,
    breakpoint: usize,
    pool: &DonorPool,
    config: &SynthConfig,
) -> Result<SynthOutcome, SbeError> {
    if pool.is_empty() {
        return Err(SbeError::infeasible(format!(
            "no donors available for {}",
            treated.key
        )));
    }
    if pool.treated_len != treated.len() {
        return Err(SbeError::invalid_input(format!(
            "donor pool was built for length {}, treated series {} has length {}",
            pool.treated_len,
            treated.key,
            treated.len()
        )));
    }
    if breakpoint == 0 || breakpoint >= treated.len() {
        return Err(SbeError::invalid_input(format!(
            "breakpoint {} leaves an empty segment in a series of length {}",
            breakpoint,
            treated.len()
        )));
    }

    let donor_pre = pool.pre_columns(breakpoint);
    let (weights, iterations) = fit_weights(&treated.values[..breakpoint], &donor_pre, config)?;

    let synthetic: Vec<f64> = (0..treated.len())
        .map(|t| {
            pool.columns
                .iter()
                .zip(&weights)
                .map(|(column, &w)| column[t] * w)
                .sum()
        })
        .collect();

    let pre_actual_mean = mean(&treated.values[..breakpoint]);
    let post_actual_mean = mean(&treated.values[breakpoint..]);
    let pre_synth_mean = mean(&synthetic[..breakpoint]);
    let post_synth_mean = mean(&synthetic[breakpoint..]);

    let pre_sse: f64 = treated.values[..breakpoint]
        .iter()
        .zip(&synthetic)
        .map(|(&actual, &fitted)| {
            let residual = actual - fitted;
            residual * residual
        })
        .sum();

    Ok(SynthOutcome {
        donor_keys: pool.donor_keys.clone(),
        weights,
        estimate: (post_actual_mean - pre_actual_mean) - (post_synth_mean - pre_synth_mean),
        pre_actual_mean,
        post_actual_mean,
        pre_synth_mean,
        post_synth_mean,
        pre_rmse: (pre_sse / breakpoint as f64).sqrt(),
        iterations,
    })
}
