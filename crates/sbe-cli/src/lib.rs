// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use sbe_core::{ExecutionContext, Observation, SbeError};
use sbe_engine::{BatchResult, EngineConfig, run_batch};

/// Runs the full pipeline over in-memory observations with a bare context.
pub fn run_observations(
    observations: &[Observation],
    config: &EngineConfig,
) -> Result<BatchResult, SbeError> {
    run_batch(observations, config, &ExecutionContext::new())
}
