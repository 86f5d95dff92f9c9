// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::chow::DetectionResult;
use sbe_core::SbeError;

const DEFAULT_ALPHA: f64 = 0.05;
const DEFAULT_MIN_ABS_EFFECT: f64 = 1.0;

/// Batch-level significance policy: Benjamini-Hochberg FDR control plus a
/// minimum absolute effect magnitude.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FdrConfig {
    /// Target false discovery rate.
    pub alpha: f64,
    /// A break must also move the level by at least this much, in the
    /// series' own units, before it is worth estimating.
    pub min_abs_effect: f64,
}

impl Default for FdrConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            min_abs_effect: DEFAULT_MIN_ABS_EFFECT,
        }
    }
}

impl FdrConfig {
    pub fn validate(&self) -> Result<(), SbeError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(SbeError::invalid_input(format!(
                "FdrConfig.alpha must lie in (0, 1); got {}",
                self.alpha
            )));
        }
        if !(self.min_abs_effect >= 0.0 && self.min_abs_effect.is_finite()) {
            return Err(SbeError::invalid_input(format!(
                "FdrConfig.min_abs_effect must be finite and non-negative; got {}",
                self.min_abs_effect
            )));
        }
        Ok(())
    }
}

/// Benjamini-Hochberg step-up adjustment.
///
/// Returns adjusted p-values in the input order:
/// `adj_(i) = min_(j >= i) p_(j) * m / (j + 1)`, clamped to 1, where the
/// subscripts range over p-values sorted ascending.
pub fn benjamini_hochberg(p_values: &[f64]) -> Result<Vec<f64>, SbeError> {
    let m = p_values.len();
    if m == 0 {
        return Ok(vec![]);
    }
    for (i, p) in p_values.iter().copied().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(SbeError::invalid_input(format!(
                "p-value at index {i} is {p}, outside [0, 1]"
            )));
        }
    }

    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));

    // Walk from the largest p-value down, carrying the running minimum.
    let mut adjusted = vec![0.0; m];
    let mut running_min = 1.0_f64;
    for (rank, &original) in order.iter().enumerate().rev() {
        let scaled = p_values[original] * m as f64 / (rank + 1) as f64;
        running_min = running_min.min(scaled.min(1.0));
        adjusted[original] = running_min;
    }
    Ok(adjusted)
}

/// Applies Benjamini-Hochberg across the whole batch, in place. Every
/// result gets a corrected p-value; `significant` records the FDR gate
/// alone, so weak-but-significant breaks stay visible in the output.
pub fn correct(results: &mut [DetectionResult], config: &FdrConfig) -> Result<(), SbeError> {
    config.validate()?;

    let raw: Vec<f64> = results
        .iter()
        .map(|result| result.candidate.raw_p_value)
        .collect();
    let adjusted = benjamini_hochberg(&raw)?;

    for (result, adj) in results.iter_mut().zip(adjusted) {
        result.corrected_p_value = Some(adj);
        result.significant = adj <= config.alpha;
    }
    Ok(())
}

/// The two-gate forwarding policy: a break is only worth estimating when
/// it is statistically significant and practically large.
pub fn requires_estimation(result: &DetectionResult, config: &FdrConfig) -> bool {
    result.significant && result.effect_size.abs() > config.min_abs_effect
}

#[cfg(test)]
mod tests {
    use super::{FdrConfig, benjamini_hochberg, correct, requires_estimation};
    use crate::chow::{BreakCandidate, DetectionResult};
    use sbe_core::PanelKey;

    fn detection(unit: &str, raw_p: f64, effect: f64) -> DetectionResult {
        DetectionResult {
            candidate: BreakCandidate {
                key: PanelKey::new(unit, "Aquatics"),
                breakpoint_index: 5,
                breakpoint_period: 2005,
                f_statistic: 10.0,
                raw_p_value: raw_p,
            },
            effect_size: effect,
            pre_mean: 2.0,
            post_mean: 2.0 + effect,
            pre_std: 0.4,
            post_std: 0.5,
            n_observations: 12,
            corrected_p_value: None,
            significant: false,
        }
    }

    #[test]
    fn config_validation_rejects_bad_alpha_and_effect() {
        FdrConfig::default()
            .validate()
            .expect("default config should be valid");
        for alpha in [0.0, 1.0, -0.1, f64::NAN] {
            let err = FdrConfig {
                alpha,
                ..FdrConfig::default()
            }
            .validate()
            .expect_err("alpha outside (0, 1) must fail");
            assert!(err.to_string().contains("alpha"));
        }
        let err = FdrConfig {
            min_abs_effect: -1.0,
            ..FdrConfig::default()
        }
        .validate()
        .expect_err("negative magnitude gate must fail");
        assert!(err.to_string().contains("min_abs_effect"));
    }

    #[test]
    fn benjamini_hochberg_matches_hand_computed_values() {
        // Sorted: 0.01, 0.02, 0.03, 0.04, 0.2 with m = 5.
        // Scaled: 0.05, 0.05, 0.05, 0.05, 0.2; the step-up min leaves them.
        let raw = [0.02, 0.2, 0.01, 0.04, 0.03];
        let adjusted = benjamini_hochberg(&raw).expect("valid p-values should adjust");
        let expected = [0.05, 0.2, 0.05, 0.05, 0.05];
        for (got, want) in adjusted.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "got {got}, want {want}");
        }
    }

    #[test]
    fn benjamini_hochberg_is_monotone_and_clamped() {
        let raw = [0.9, 0.5, 0.95, 0.8];
        let adjusted = benjamini_hochberg(&raw).expect("valid p-values should adjust");
        for (got, &p) in adjusted.iter().zip(&raw) {
            assert!(*got >= p, "adjusted {got} must not fall below raw {p}");
            assert!(*got <= 1.0);
        }
    }

    #[test]
    fn benjamini_hochberg_handles_empty_and_single_inputs() {
        assert!(
            benjamini_hochberg(&[])
                .expect("empty input is valid")
                .is_empty()
        );
        let single = benjamini_hochberg(&[0.03]).expect("single input is valid");
        assert_eq!(single, vec![0.03]);
    }

    #[test]
    fn benjamini_hochberg_rejects_out_of_range_p_values() {
        let err = benjamini_hochberg(&[0.2, 1.5]).expect_err("p > 1 must fail");
        assert!(err.to_string().contains("index 1"));
        benjamini_hochberg(&[0.2, f64::NAN]).expect_err("NaN p must fail");
    }

    #[test]
    fn correct_flags_fdr_significance_only() {
        let mut results = vec![
            detection("USA", 0.001, 6.0),  // passes both gates
            detection("FRA", 0.001, 0.5),  // significant but too small
            detection("GER", 0.9, 8.0),    // large but not significant
            detection("ITA", 0.002, -4.0), // negative effects count by magnitude
        ];
        let config = FdrConfig::default();
        correct(&mut results, &config).expect("correction should succeed");

        for result in &results {
            assert!(
                result.corrected_p_value.is_some(),
                "every candidate gets a corrected p-value"
            );
        }
        assert!(results[0].significant);
        assert!(results[1].significant, "the FDR flag ignores magnitude");
        assert!(!results[2].significant);
        assert!(results[3].significant);

        let forwarded: Vec<&str> = results
            .iter()
            .filter(|result| requires_estimation(result, &config))
            .map(|result| result.key().unit_id.as_str())
            .collect();
        assert_eq!(forwarded, vec!["USA", "ITA"]);
    }

    #[test]
    fn significant_set_shrinks_as_alpha_decreases() {
        let mut loose = vec![
            detection("USA", 0.001, 6.0),
            detection("FRA", 0.02, 3.0),
            detection("GER", 0.4, 2.0),
        ];
        let mut strict = loose.clone();

        correct(&mut loose, &FdrConfig::default()).expect("correction should succeed");
        correct(
            &mut strict,
            &FdrConfig {
                alpha: 0.01,
                ..FdrConfig::default()
            },
        )
        .expect("correction should succeed");

        for (l, s) in loose.iter().zip(&strict) {
            assert!(
                !s.significant || l.significant,
                "shrinking alpha must never add significance for {}",
                s.key()
            );
        }
        let n_loose = loose.iter().filter(|r| r.significant).count();
        let n_strict = strict.iter().filter(|r| r.significant).count();
        assert!(n_strict <= n_loose);
        assert!(n_strict < 3);
    }

    #[test]
    fn correct_on_empty_batch_is_a_noop() {
        let mut results: Vec<DetectionResult> = vec![];
        correct(&mut results, &FdrConfig::default()).expect("empty batch should succeed");
        assert!(results.is_empty());
    }
}
