// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use sbe_core::{Panel, PanelKey, Series};

/// Comparison series for one treated unit, aligned to the treated length.
///
/// Donors longer than the treated series are excluded rather than
/// truncated; shorter donors are right-padded with zeros. The asymmetry
/// is deliberate: padding keeps donors comparable without discarding any
/// treated-unit tail periods.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DonorPool {
    pub donor_keys: Vec<PanelKey>,
    /// One column per donor, each of length `treated_len`.
    pub columns: Vec<Vec<f64>>,
    pub treated_len: usize,
    /// Donors rejected for being longer than the treated series.
    pub n_excluded_long: usize,
}

impl DonorPool {
    pub fn n_donors(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Donor columns restricted to the pre-break window `[0, breakpoint)`.
    pub fn pre_columns(&self, breakpoint: usize) -> Vec<&[f64]> {
        self.columns
            .iter()
            .map(|column| &column[..breakpoint])
            .collect()
    }
}

/// Collects every other unit's series in the treated unit's category and
/// aligns each to the treated length.
pub fn assemble_donor_pool(treated: &Series, panel: &Panel) -> DonorPool {
    let treated_len = treated.len();
    let mut pool = DonorPool {
        treated_len,
        ..DonorPool::default()
    };

    for donor in panel.category_series_excluding(&treated.key.category_id, &treated.key.unit_id) {
        if donor.len() > treated_len {
            pool.n_excluded_long += 1;
            continue;
        }
        let mut column = donor.values.clone();
        column.resize(treated_len, 0.0);
        pool.donor_keys.push(donor.key.clone());
        pool.columns.push(column);
    }

    pool
}
