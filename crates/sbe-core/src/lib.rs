// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Core shared types for the structural-break engine: panel construction,
//! the error taxonomy, execution context, and run diagnostics.

pub mod diagnostics;
pub mod error;
pub mod execution_context;
pub mod panel;
pub mod series;

pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, RunDiagnostics};
pub use error::SbeError;
pub use execution_context::{CancelToken, ExecutionContext, ProgressSink, TelemetrySink};
pub use panel::{Panel, PanelConfig, build_panel};
pub use series::{
    Observation, PanelKey, Series, mean, population_std, population_variance, sample_std,
};
