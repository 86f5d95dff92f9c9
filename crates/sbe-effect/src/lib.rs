// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Causal-effect estimation for detected structural breaks: donor-pool
//! assembly, simplex-constrained synthetic control with a
//! difference-in-differences fallback, and category-level ranking.

pub mod aggregate;
pub mod did;
pub mod donor;
pub mod estimate;
pub mod synth;

pub use aggregate::{CategoryAggregate, aggregate_by_category};
pub use did::{DidOutcome, did_estimate};
pub use donor::{DonorPool, assemble_donor_pool};
pub use estimate::{EffectEstimate, EffectOutcome, estimate_effect};
pub use synth::{SynthConfig, SynthOutcome, fit_weights, project_onto_simplex, synthetic_control_estimate};
