// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Batch orchestration: panel construction, per-series break detection,
//! batch-level FDR correction, effect estimation, and category ranking,
//! with per-series failures collected instead of aborting the run.

pub mod batch;
pub mod config;
pub mod rows;

pub use batch::{BatchResult, FailureStage, SeriesFailure, run_batch};
pub use config::EngineConfig;
pub use rows::{CategoryRow, DetectionRow, EffectRow};
