// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

/// Error taxonomy shared by every stage of the engine.
///
/// Ineligible input (short series, no valid split) is deliberately *not* an
/// error: those series are excluded and counted. `NumericalIssue` covers
/// singular fits and non-convergent optimizations and is caught per series
/// by the batch pipeline; `Infeasible` marks an empty donor pool and is
/// consumed internally by the fallback dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SbeError {
    InvalidInput(String),
    NumericalIssue(String),
    Infeasible(String),
    Cancelled,
}

impl SbeError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn numerical_issue(message: impl Into<String>) -> Self {
        Self::NumericalIssue(message.into())
    }

    pub fn infeasible(message: impl Into<String>) -> Self {
        Self::Infeasible(message.into())
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }
}

impl fmt::Display for SbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::NumericalIssue(message) => write!(f, "numerical issue: {message}"),
            Self::Infeasible(message) => write!(f, "infeasible: {message}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for SbeError {}
