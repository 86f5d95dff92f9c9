// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::donor::DonorPool;
use sbe_core::{SbeError, Series, mean, population_variance};
use statrs::distribution::{ContinuousCDF, Normal};

/// A difference-in-differences estimate against the pooled donor group.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DidOutcome {
    pub estimate: f64,
    pub treated_pre_mean: f64,
    pub treated_post_mean: f64,
    pub control_pre_mean: f64,
    pub control_post_mean: f64,
    /// Independent-sample variance-sum standard error over the four cells.
    pub standard_error: f64,
    /// Zero when the standard error is zero.
    pub t_statistic: f64,
    /// Two-sided normal-approximation p-value.
    pub p_value: f64,
}

struct Cell {
    mean: f64,
    variance_over_n: f64,
}

fn cell(values: &[f64]) -> Cell {
    if values.is_empty() {
        // Empty control cells contribute a zero mean and no variance,
        // matching the zero-padding convention for absent donors.
        return Cell {
            mean: 0.0,
            variance_over_n: 0.0,
        };
    }
    Cell {
        mean: mean(values),
        variance_over_n: population_variance(values) / values.len() as f64,
    }
}

/// Pools every donor observation into one control group split at the
/// breakpoint and estimates the treated unit's excess pre/post change.
pub fn did_estimate(
    treated: &Series,
    breakpoint: usize,
    pool: &DonorPool,
) -> Result<DidOutcome, SbeError> {
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

    let mut control_pre = Vec::with_capacity(pool.n_donors() * breakpoint);
    let mut control_post = Vec::with_capacity(pool.n_donors() * (treated.len() - breakpoint));
    for column in &pool.columns {
        control_pre.extend_from_slice(&column[..breakpoint]);
        control_post.extend_from_slice(&column[breakpoint..]);
    }

    let cells = [
        cell(&treated.values[..breakpoint]),
        cell(&treated.values[breakpoint..]),
        cell(&control_pre),
        cell(&control_post),
    ];
    let [treated_pre, treated_post, ctrl_pre, ctrl_post] = &cells;

    let estimate =
        (treated_post.mean - treated_pre.mean) - (ctrl_post.mean - ctrl_pre.mean);
    let standard_error = cells
        .iter()
        .map(|c| c.variance_over_n)
        .sum::<f64>()
        .sqrt();
    let t_statistic = if standard_error == 0.0 {
        0.0
    } else {
        estimate / standard_error
    };

    let normal = Normal::new(0.0, 1.0)
        .map_err(|err| SbeError::numerical_issue(format!("standard normal: {err}")))?;
    let p_value = (2.0 * (1.0 - normal.cdf(t_statistic.abs()))).clamp(0.0, 1.0);

    Ok(DidOutcome {
        estimate,
        treated_pre_mean: treated_pre.mean,
        treated_post_mean: treated_post.mean,
        control_pre_mean: ctrl_pre.mean,
        control_post_mean: ctrl_post.mean,
        standard_error,
        t_statistic,
        p_value,
    })
}
