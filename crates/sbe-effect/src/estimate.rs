// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::did::{DidOutcome, did_estimate};
use crate::donor::DonorPool;
use crate::synth::{SynthConfig, SynthOutcome, synthetic_control_estimate};
use sbe_core::{PanelKey, SbeError, Series};

/// The estimator actually used for one break, with its full output.
/// Callers pattern-match on the variant instead of probing optional fields.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub enum EffectOutcome {
    SyntheticControl(SynthOutcome),
    Did(DidOutcome),
}

/// One causal estimate for one significant break.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct EffectEstimate {
    pub key: PanelKey,
    pub breakpoint_index: usize,
    pub breakpoint_period: i64,
    pub outcome: EffectOutcome,
}

impl EffectEstimate {
    pub fn estimate(&self) -> f64 {
        match &self.outcome {
            EffectOutcome::SyntheticControl(outcome) => outcome.estimate,
            EffectOutcome::Did(outcome) => outcome.estimate,
        }
    }

    pub fn method_name(&self) -> &'static str {
        match &self.outcome {
            EffectOutcome::SyntheticControl(_) => "SyntheticControl",
            EffectOutcome::Did(_) => "DiD",
        }
    }
}

/// Estimates the causal effect of a break: synthetic control against the
/// donor pool, falling back to difference-in-differences when the pool is
/// empty or the solver fails numerically.
///
/// The solver is never invoked on an empty pool. Input errors (mismatched
/// pool, degenerate breakpoint) propagate; they indicate a caller bug, not
/// an estimation failure.
pub fn estimate_effect(
    treated: &Series,
    breakpoint: usize,
    pool: &DonorPool,
    config: &SynthConfig,
) -> Result<EffectEstimate, SbeError> {
    let outcome = if pool.is_empty() {
        EffectOutcome::Did(did_estimate(treated, breakpoint, pool)?)
    } else {
        match synthetic_control_estimate(treated, breakpoint, pool, config) {
            Ok(outcome) => EffectOutcome::SyntheticControl(outcome),
            Err(SbeError::NumericalIssue(_)) => {
                EffectOutcome::Did(did_estimate(treated, breakpoint, pool)?)
            }
            Err(err) => return Err(err),
        }
    };

    Ok(EffectEstimate {
        key: treated.key.clone(),
        breakpoint_index: breakpoint,
        breakpoint_period: treated.periods[breakpoint],
        outcome,
    })
}
