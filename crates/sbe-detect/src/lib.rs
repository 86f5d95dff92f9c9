// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Breakpoint detection for panel series: an exhaustive Chow-style F-test
//! scan per series, followed by batch-level Benjamini-Hochberg correction.

pub mod chow;
pub mod fdr;

pub use chow::{BreakCandidate, ChowConfig, DetectionResult, detect_break};
pub use fdr::{FdrConfig, benjamini_hochberg, correct, requires_estimation};
