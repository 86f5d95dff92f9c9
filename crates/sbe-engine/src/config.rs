// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use sbe_core::{PanelConfig, SbeError};
use sbe_detect::{ChowConfig, FdrConfig};
use sbe_effect::SynthConfig;

/// Combined configuration for one batch run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EngineConfig {
    pub panel: PanelConfig,
    pub chow: ChowConfig,
    pub fdr: FdrConfig,
    pub synth: SynthConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), SbeError> {
        self.panel.validate()?;
        self.chow.validate()?;
        self.fdr.validate()?;
        self.synth.validate()?;
        // min_observations below 2 * min_segment is allowed: series in
        // between simply never produce a candidate.
        Ok(())
    }
}
