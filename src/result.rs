//! Per-source results and the assembled ANOVA table.

use crate::cells::CellSummary;
use crate::design::Factor;
use crate::effects::EffectMatrix;
use crate::significance::{Degeneracy, ErrorMatrices, Significance};
use crate::source::{Source, SourceKind};

/// Statistics for one main effect or interaction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceResult {
    /// Factor names joined with `×`.
    pub label: String,
    /// The source.
    pub source: Source,
    /// Between, within or mixed.
    pub kind: SourceKind,
    /// Sum of squares (a determinant difference for D-variable sources).
    pub ss: f64,
    /// Error sum of squares.
    pub error_ss: f64,
    /// Numerator degrees of freedom.
    pub df_num: f64,
    /// Denominator degrees of freedom.
    pub df_den: f64,
    /// Mean square.
    pub ms: f64,
    /// Error mean square.
    pub ms_error: f64,
    /// F statistic (0 when degenerate).
    pub f: f64,
    /// Right-tail probability (1 when degenerate).
    pub p: f64,
    /// Wilks' Lambda, for mixed sources.
    pub wilks_lambda: Option<f64>,
    /// Bartlett's chi-square, for mixed sources under that test.
    pub chi_square: Option<f64>,
    /// Why F and p were replaced by 0 and 1, if they were.
    pub degeneracy: Option<Degeneracy>,
    /// EF and ER, for sources analysed on D-variables.
    pub error_matrices: Option<ErrorMatrices>,
    /// The memoized pure effect.
    pub effect: EffectMatrix,
    /// Cell means, standard errors and Ns (empty when disabled).
    pub cells: Vec<CellSummary>,
}

impl SourceResult {
    pub(crate) fn new(
        label: String,
        kind: SourceKind,
        sig: Significance,
        error_matrices: Option<ErrorMatrices>,
        effect: EffectMatrix,
        cells: Vec<CellSummary>,
    ) -> Self {
        Self {
            label,
            source: effect.source(),
            kind,
            ss: sig.ss,
            error_ss: sig.error_ss,
            df_num: sig.df_num,
            df_den: sig.df_den,
            ms: sig.ms,
            ms_error: sig.ms_error,
            f: sig.f,
            p: sig.p,
            wilks_lambda: sig.wilks_lambda,
            chi_square: sig.chi_square,
            degeneracy: sig.degeneracy,
            error_matrices,
            effect,
            cells,
        }
    }

    /// Whether `p` falls below `alpha`.
    #[must_use]
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p < alpha
    }
}

/// The complete decomposition, one result per source in source order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnovaTable {
    factors: Vec<Factor>,
    subjects: usize,
    results: Vec<SourceResult>,
}

impl AnovaTable {
    pub(crate) fn new(factors: Vec<Factor>, subjects: usize, results: Vec<SourceResult>) -> Self {
        Self {
            factors,
            subjects,
            results,
        }
    }

    /// The analysed factors with their levels and kinds.
    #[must_use]
    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Number of subjects.
    #[must_use]
    pub fn subject_count(&self) -> usize {
        self.subjects
    }

    /// All results, ordered by source.
    #[must_use]
    pub fn results(&self) -> &[SourceResult] {
        &self.results
    }

    /// Look a result up by label, e.g. `"A×B"`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&SourceResult> {
        self.results.iter().find(|r| r.label == label)
    }

    /// Look a result up by source.
    #[must_use]
    pub fn by_source(&self, source: Source) -> Option<&SourceResult> {
        self.results
            .binary_search_by_key(&source, |r| r.source)
            .ok()
            .map(|i| &self.results[i])
    }

    /// Iterate over the results.
    pub fn iter(&self) -> std::slice::Iter<'_, SourceResult> {
        self.results.iter()
    }

    /// Number of sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether there are no sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Take ownership of the results.
    #[must_use]
    pub fn into_results(self) -> Vec<SourceResult> {
        self.results
    }
}

impl<'a> IntoIterator for &'a AnovaTable {
    type Item = &'a SourceResult;
    type IntoIter = std::slice::Iter<'a, SourceResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
