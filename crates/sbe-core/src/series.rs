// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Identity of one panel series: a unit observed within a category.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PanelKey {
    pub unit_id: String,
    pub category_id: String,
}

impl PanelKey {
    pub fn new(unit_id: impl Into<String>, category_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            category_id: category_id.into(),
        }
    }
}

impl std::fmt::Display for PanelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.unit_id, self.category_id)
    }
}

/// One raw tabular row before grouping.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub unit_id: String,
    pub category_id: String,
    pub period: i64,
    pub value: f64,
}

impl Observation {
    pub fn key(&self) -> PanelKey {
        PanelKey::new(self.unit_id.clone(), self.category_id.clone())
    }
}

/// An ordered series of (period, value) pairs for one panel key.
///
/// Periods are strictly increasing after panel construction. Irregular
/// spacing is allowed; all downstream algorithms treat observations by
/// index position, not calendar distance.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    pub key: PanelKey,
    pub periods: Vec<i64>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean of `values[range]`; 0.0 for an empty range.
    pub fn segment_mean(&self, start: usize, end: usize) -> f64 {
        mean(&self.values[start..end])
    }

    /// Population standard deviation (ddof = 0) of `values[range]`.
    pub fn segment_std(&self, start: usize, end: usize) -> f64 {
        population_std(&self.values[start..end])
    }
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (ddof = 0); 0.0 for an empty slice.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values
        .iter()
        .map(|value| {
            let centered = value - m;
            centered * centered
        })
        .sum::<f64>()
        / values.len() as f64
}

/// Population standard deviation (ddof = 0); 0.0 for an empty slice.
pub fn population_std(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Sample standard deviation (ddof = 1); 0.0 when fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq = values
        .iter()
        .map(|value| {
            let centered = value - m;
            centered * centered
        })
        .sum::<f64>();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}
