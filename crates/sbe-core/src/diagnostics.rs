// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Diagnostics schema version for batch-run metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Structured diagnostics captured from one batch run.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunDiagnostics {
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub runtime_ms: Option<u64>,
    /// Eligible series after panel construction.
    pub n_series: usize,
    /// Groups dropped for falling below the minimum observation count.
    pub n_excluded_short: usize,
    /// Series that produced a breakpoint candidate.
    pub n_candidates: usize,
    /// Candidates surviving both the FDR and magnitude gates.
    pub n_significant: usize,
    /// Effect estimates actually produced.
    pub n_estimated: usize,
    /// Series whose detection or estimation failed numerically.
    pub n_failed: usize,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for RunDiagnostics {
    fn default() -> Self {
        Self {
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            runtime_ms: None,
            n_series: 0,
            n_excluded_short: 0,
            n_candidates: 0,
            n_significant: 0,
            n_estimated: 0,
            n_failed: 0,
            notes: vec![],
            warnings: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DIAGNOSTICS_SCHEMA_VERSION, RunDiagnostics};

    #[test]
    fn default_sets_schema_and_engine_version() {
        let diagnostics = RunDiagnostics::default();
        assert_eq!(diagnostics.schema_version, DIAGNOSTICS_SCHEMA_VERSION);
        assert_eq!(
            diagnostics.engine_version,
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
        assert_eq!(diagnostics.n_series, 0);
        assert!(diagnostics.runtime_ms.is_none());
        assert!(diagnostics.notes.is_empty());
        assert!(diagnostics.warnings.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn diagnostics_serde_roundtrip() {
        let diagnostics = RunDiagnostics {
            runtime_ms: Some(7),
            n_series: 40,
            n_excluded_short: 3,
            n_candidates: 18,
            n_significant: 4,
            n_estimated: 4,
            n_failed: 1,
            notes: vec!["alpha=0.05".to_string()],
            warnings: vec!["1 series failed estimation".to_string()],
            ..RunDiagnostics::default()
        };
        let encoded = serde_json::to_string(&diagnostics).expect("diagnostics should serialize");
        let decoded: RunDiagnostics =
            serde_json::from_str(&encoded).expect("diagnostics should deserialize");
        assert_eq!(decoded, diagnostics);
    }
}
