// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use libfuzzer_sys::fuzz_target;
use sbe_core::{PanelKey, Series};
use sbe_detect::{ChowConfig, detect_break};
use sbe_effect::{DonorPool, SynthConfig, estimate_effect};

fn decode_f64_chunks(data: &[u8], max_values: usize) -> Vec<f64> {
    data.chunks_exact(8)
        .take(max_values)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect()
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let min_segment = usize::from(data[0] % 8).max(2);
    let n_donors = usize::from(data[1] % 4);
    let split = 2 + usize::from(data[2]) % data.len().max(1);

    let values = decode_f64_chunks(&data[split.min(data.len())..], 128);
    if values.is_empty() {
        return;
    }

    let series = Series {
        key: PanelKey::new("fuzz", "fuzz"),
        periods: (0..values.len() as i64).collect(),
        values,
    };
    let config = ChowConfig { min_segment };

    // Arbitrary bytes include NaN and infinities; detection may decline
    // or fail, but it must never panic.
    let Ok(Some(result)) = detect_break(&series, &config) else {
        return;
    };

    let columns: Vec<Vec<f64>> = (0..n_donors)
        .map(|d| {
            series
                .values
                .iter()
                .map(|v| if v.is_finite() { v * 0.5 + d as f64 } else { 0.0 })
                .collect()
        })
        .collect();
    let pool = DonorPool {
        donor_keys: (0..n_donors)
            .map(|d| PanelKey::new(format!("donor-{d}"), "fuzz"))
            .collect(),
        columns,
        treated_len: series.len(),
        n_excluded_long: 0,
    };

    let breakpoint = result.candidate.breakpoint_index;
    if breakpoint == 0 || breakpoint >= series.len() {
        return;
    }
    let config = SynthConfig {
        max_iter: 64,
        tol: 1e-8,
    };
    let _ = estimate_effect(&series, breakpoint, &pool, &config);
});
