// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use sbe_core::{PanelKey, SbeError, Series};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

const DEFAULT_MIN_SEGMENT: usize = 3;

/// Parameters per segment-specific linear model (slope + intercept).
pub const CHOW_PARAMS: usize = 2;

/// Configuration for the exhaustive Chow-style break search.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChowConfig {
    /// Minimum observations on each side of a candidate split.
    pub min_segment: usize,
}

impl Default for ChowConfig {
    fn default() -> Self {
        Self {
            min_segment: DEFAULT_MIN_SEGMENT,
        }
    }
}

impl ChowConfig {
    pub fn validate(&self) -> Result<(), SbeError> {
        if self.min_segment < 2 {
            return Err(SbeError::invalid_input(format!(
                "ChowConfig.min_segment must be >= 2 (a degree-1 fit needs two points); got {}",
                self.min_segment
            )));
        }
        Ok(())
    }
}

/// The single best split found for one series, before any correction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct BreakCandidate {
    pub key: PanelKey,
    pub breakpoint_index: usize,
    pub breakpoint_period: i64,
    pub f_statistic: f64,
    pub raw_p_value: f64,
}

/// A candidate enriched with segment statistics and, after correction,
/// the batch-level significance decision.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub candidate: BreakCandidate,
    /// Post-mean minus pre-mean.
    pub effect_size: f64,
    pub pre_mean: f64,
    pub post_mean: f64,
    pub pre_std: f64,
    pub post_std: f64,
    pub n_observations: usize,
    /// Filled once by the FDR corrector; `None` until then.
    pub corrected_p_value: Option<f64>,
    pub significant: bool,
}

impl DetectionResult {
    pub fn key(&self) -> &PanelKey {
        &self.candidate.key
    }
}

/// Residual sum of squares of a degree-1 least-squares fit with
/// x = 0, 1, ..., m-1 (the local index axis, matching the pooled and
/// per-segment fits of the Chow construction).
fn linear_fit_rss(values: &[f64]) -> Option<f64> {
    let m = values.len();
    if m < 2 {
        return None;
    }

    let m_f = m as f64;
    let mut sum_x = 0.0;
    let mut sum_x_sq = 0.0;
    let mut sum_y = 0.0;
    let mut sum_x_y = 0.0;
    for (i, value) in values.iter().copied().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_x_sq += x * x;
        sum_y += value;
        sum_x_y += x * value;
    }

    // x values are distinct, so the denominator is positive for m >= 2.
    let denom = m_f * sum_x_sq - sum_x * sum_x;
    let slope = (m_f * sum_x_y - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / m_f;

    let rss = values
        .iter()
        .copied()
        .enumerate()
        .map(|(i, value)| {
            let residual = value - (intercept + slope * i as f64);
            residual * residual
        })
        .sum::<f64>();

    rss.is_finite().then_some(rss.max(0.0))
}

fn chow_f_statistic(rss_pooled: f64, rss_split: f64, n: usize) -> Option<f64> {
    let gain = rss_pooled - rss_split;
    if !gain.is_finite() {
        return None;
    }
    if rss_split == 0.0 {
        // Perfect per-segment fits: infinite evidence unless the pooled fit
        // is perfect too, in which case the split explains nothing.
        return (gain > 0.0).then_some(f64::INFINITY);
    }

    let dof = (n - 2 * CHOW_PARAMS) as f64;
    let f = (gain / CHOW_PARAMS as f64) / (rss_split / dof);
    f.is_finite().then_some(f.max(0.0))
}

fn f_survival(f_statistic: f64, n: usize) -> Result<f64, SbeError> {
    if f_statistic.is_infinite() {
        return Ok(0.0);
    }
    let dof = (n - 2 * CHOW_PARAMS) as f64;
    let dist = FisherSnedecor::new(CHOW_PARAMS as f64, dof).map_err(|err| {
        SbeError::numerical_issue(format!(
            "F distribution with ({CHOW_PARAMS}, {dof}) degrees of freedom: {err}"
        ))
    })?;
    Ok((1.0 - dist.cdf(f_statistic)).clamp(0.0, 1.0))
}

/// Exhaustively scores every interior split of `series` and returns the
/// arg-max Chow candidate, or `None` when no split can be scored.
///
/// The candidate is always returned, however weak: the significance
/// decision belongs to the batch-level FDR corrector, not to this scan.
/// Candidates whose fits are numerically degenerate are skipped
/// individually without discarding the series. Ties keep the earliest
/// split so a batch rerun reports the same breakpoint.
pub fn detect_break(
    series: &Series,
    config: &ChowConfig,
) -> Result<Option<DetectionResult>, SbeError> {
    config.validate()?;

    let n = series.len();
    // F denominator needs n - 2k > 0.
    if n <= 2 * CHOW_PARAMS {
        return Ok(None);
    }
    if n < 2 * config.min_segment {
        return Ok(None);
    }

    let rss_pooled = match linear_fit_rss(&series.values) {
        Some(rss) => rss,
        None => return Ok(None),
    };

    let mut best: Option<(usize, f64)> = None;
    for split in config.min_segment..n - config.min_segment {
        let Some(rss_pre) = linear_fit_rss(&series.values[..split]) else {
            continue;
        };
        let Some(rss_post) = linear_fit_rss(&series.values[split..]) else {
            continue;
        };
        let Some(f) = chow_f_statistic(rss_pooled, rss_pre + rss_post, n) else {
            continue;
        };

        // Strict comparison keeps the first maximum.
        if best.map_or(true, |(_, best_f)| f > best_f) {
            best = Some((split, f));
        }
    }

    let Some((breakpoint_index, f_statistic)) = best else {
        return Ok(None);
    };
    let raw_p_value = f_survival(f_statistic, n)?;

    Ok(Some(DetectionResult {
        candidate: BreakCandidate {
            key: series.key.clone(),
            breakpoint_index,
            breakpoint_period: series.periods[breakpoint_index],
            f_statistic,
            raw_p_value,
        },
        effect_size: series.segment_mean(breakpoint_index, n)
            - series.segment_mean(0, breakpoint_index),
        pre_mean: series.segment_mean(0, breakpoint_index),
        post_mean: series.segment_mean(breakpoint_index, n),
        pre_std: series.segment_std(0, breakpoint_index),
        post_std: series.segment_std(breakpoint_index, n),
        n_observations: n,
        corrected_p_value: None,
        significant: false,
    }))
}
