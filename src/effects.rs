//! Pure effects and full/restricted model errors per source.
//!
//! A source's pure effect is its cell means minus the grand mean and the
//! pure effects of its lower-order sub-sources. Each effect is computed once
//! and kept in an [`EffectMemo`] so higher-order sources can subtract it.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayD, Axis, IxDyn};
use tracing::trace;

use crate::cells::CellStatistics;
use crate::contrast::DVariables;
use crate::design::Design;
use crate::linalg::cross_product;
use crate::significance::ErrorMatrices;
use crate::source::{Source, SourceKind};
use crate::utils::{harmonic_mean_keepdims, mean_keepdims};

/// The pure effect of one source.
///
/// `values` has one axis per between-subjects factor (length 1 on axes the
/// source does not span) plus a trailing variable axis, so effects of
/// sub-sources broadcast against it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EffectMatrix {
    source: Source,
    values: ArrayD<f64>,
}

impl EffectMatrix {
    /// Wrap an effect array.
    #[must_use]
    pub fn new(source: Source, values: ArrayD<f64>) -> Self {
        Self { source, values }
    }

    /// The source this effect belongs to.
    #[must_use]
    pub fn source(&self) -> Source {
        self.source
    }

    /// Effect values, shape `[between levels or 1..., variables]`.
    #[must_use]
    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }
}

/// Write-once store of computed pure effects.
#[derive(Debug, Clone, Default)]
pub struct EffectMemo {
    effects: BTreeMap<Source, EffectMatrix>,
}

impl EffectMemo {
    /// Create an empty memo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an effect.
    ///
    /// # Panics
    ///
    /// Panics if the source already has an effect.
    pub fn insert(&mut self, effect: EffectMatrix) {
        let source = effect.source();
        let previous = self.effects.insert(source, effect);
        assert!(previous.is_none(), "effect for source {source} computed twice");
    }

    /// The effect of `source`, if computed.
    #[must_use]
    pub fn get(&self, source: Source) -> Option<&EffectMatrix> {
        self.effects.get(&source)
    }

    /// The effect of `source`.
    ///
    /// # Panics
    ///
    /// Panics if it has not been computed yet, which means a source was
    /// evaluated before one of its sub-sources.
    #[must_use]
    pub fn require(&self, source: Source) -> &EffectMatrix {
        self.effects
            .get(&source)
            .unwrap_or_else(|| panic!("effect for source {source} requested before it was computed"))
    }

    /// Whether `source` has an effect.
    #[must_use]
    pub fn contains(&self, source: Source) -> bool {
        self.effects.contains_key(&source)
    }

    /// Number of stored effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Sums of squares of one source before significance testing.
#[derive(Debug, Clone, PartialEq)]
pub enum SumOfSquares {
    /// Between-subjects source on subject means.
    Scalar {
        /// Effect sum of squares.
        ss: f64,
        /// Full-model (within-cells) error sum of squares.
        error_ss: f64,
    },
    /// D-variable source.
    Matrix(ErrorMatrices),
}

/// Everything computed for one source, ready for the F engine.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    /// The source.
    pub source: Source,
    /// Its kind.
    pub kind: SourceKind,
    /// Its pure effect, to be memoized.
    pub effect: EffectMatrix,
    /// Its sums of squares.
    pub sums: SumOfSquares,
    /// D-variable count (1 for between-subjects sources).
    pub variables: usize,
}

/// Result of restricting a source's between-subjects part.
struct BetweenRestriction {
    effect: ArrayD<f64>,
    /// `Σ_cells effect_i · effect_j · ñ · w`
    hypothesis: Array2<f64>,
}

/// Cell means over the source's between axes minus the grand mean and
/// `sub_effects`, with the hypothesis SSCP it implies.
///
/// `grand` selects the harmonic mean of every cell count as the weight,
/// used when the source spans the whole design.
fn restrict_between<'a, I>(
    cells: &CellStatistics,
    source_axes: &[usize],
    grand: bool,
    sub_effects: I,
) -> BetweenRestriction
where
    I: IntoIterator<Item = &'a EffectMatrix>,
{
    let between = cells.between_axes();
    let non_source: Vec<usize> = (0..between).filter(|a| !source_axes.contains(a)).collect();

    let source_means = mean_keepdims(cells.means(), &non_source);
    let mut source_n = harmonic_mean_keepdims(cells.counts(), &non_source);
    let weight: f64 = non_source
        .iter()
        .map(|&a| cells.counts().len_of(Axis(a)) as f64)
        .product();

    // Grand mean per variable, weighted by the source-cell harmonic Ns
    let total_n = source_n.sum();
    let weighted = &source_means * &source_n.clone().insert_axis(Axis(between));
    let mut grand_mean = weighted;
    for axis in (0..between).rev() {
        grand_mean = grand_mean.sum_axis(Axis(axis)).insert_axis(Axis(axis));
    }
    if total_n > 0.0 {
        grand_mean /= total_n;
    }

    if grand {
        source_n.fill(cells.harmonic_n());
    }

    let mut effect = source_means - &grand_mean;
    for sub in sub_effects {
        effect -= sub.values();
    }

    let variables = cells.variables();
    let mut hypothesis = Array2::zeros((variables, variables));
    for (lane, &n) in effect.lanes(Axis(between)).into_iter().zip(source_n.iter()) {
        let scale = n * weight;
        for i in 0..variables {
            for j in 0..variables {
                hypothesis[[i, j]] += lane[i] * lane[j] * scale;
            }
        }
    }

    BetweenRestriction { effect, hypothesis }
}

/// Memoized sub-effects a source's effect is measured against: proper
/// subsets with the same within-subjects factors and at least one
/// between-subjects factor.
fn sub_effects<'m>(
    design: &Design,
    source: Source,
    memo: &'m EffectMemo,
) -> impl Iterator<Item = &'m EffectMatrix> {
    let within = design.within_mask();
    let own_within = source.intersection(within);
    source
        .proper_subsets()
        .filter(move |sub| {
            sub.intersection(within) == own_within && !sub.difference(within).is_empty()
        })
        .map(move |sub| memo.require(sub))
}

/// A purely between-subjects source, analysed on subject means.
///
/// # Panics
///
/// Panics if a sub-source's effect is missing from `memo`.
#[must_use]
pub fn between_source(
    design: &Design,
    subject_means: &Array2<f64>,
    cells: &CellStatistics,
    source: Source,
    memo: &EffectMemo,
) -> SourceOutcome {
    let grand = source == design.full_source();
    let restriction = restrict_between(
        cells,
        &design.between_axes(source),
        grand,
        sub_effects(design, source, memo),
    );

    let residuals = cells.residuals(subject_means.view(), design.subject_cells());
    let error_ss = residuals.iter().map(|r| r * r).sum::<f64>();
    let ss = restriction.hypothesis[[0, 0]];
    trace!(source = source.bits(), ss, error_ss, "between-subjects source");

    SourceOutcome {
        source,
        kind: SourceKind::Between,
        effect: EffectMatrix::new(source, restriction.effect),
        sums: SumOfSquares::Scalar { ss, error_ss },
        variables: 1,
    }
}

/// Full-model error: SSCP of the D-variables minus their cell means.
fn full_model_error(design: &Design, d: &DVariables) -> (Array2<f64>, Array2<f64>) {
    let residuals = d.cells().residuals(d.columns().view(), design.subject_cells());
    let ef = cross_product(&residuals.view());
    (residuals, ef)
}

/// A within-subjects-only source: the restricted model adds each
/// D-variable's grand mean back to the residuals.
#[must_use]
pub fn within_source(design: &Design, d: &DVariables, source: Source) -> SourceOutcome {
    let (residuals, ef) = full_model_error(design, d);
    let grand = d.cells().grand_means();
    let restricted = &residuals + &grand;
    let er = cross_product(&restricted.view());

    let mut dims = vec![1; design.between_factors().len()];
    dims.push(d.len());
    let effect = ArrayD::from_shape_fn(IxDyn(&dims), |idx| grand[idx[dims.len() - 1]]);
    trace!(source = source.bits(), variables = d.len(), "within-subjects source");

    SourceOutcome {
        source,
        kind: SourceKind::Within,
        effect: EffectMatrix::new(source, effect),
        sums: SumOfSquares::Matrix(ErrorMatrices {
            full: ef,
            restricted: er,
        }),
        variables: d.len(),
    }
}

/// A source mixing both factor kinds: ER = EF + H, where H is built from
/// the between-subjects effect on the D-variable cell means.
///
/// # Panics
///
/// Panics if a sub-source's effect is missing from `memo`.
#[must_use]
pub fn mixed_source(
    design: &Design,
    d: &DVariables,
    source: Source,
    memo: &EffectMemo,
) -> SourceOutcome {
    let (_, ef) = full_model_error(design, d);
    let grand = source == design.full_source();
    let restriction = restrict_between(
        d.cells(),
        &design.between_axes(source),
        grand,
        sub_effects(design, source, memo),
    );
    let er = &ef + &restriction.hypothesis;
    trace!(source = source.bits(), variables = d.len(), "mixed source");

    SourceOutcome {
        source,
        kind: SourceKind::Mixed,
        effect: EffectMatrix::new(source, restriction.effect),
        sums: SumOfSquares::Matrix(ErrorMatrices {
            full: ef,
            restricted: er,
        }),
        variables: d.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::subject_means;
    use crate::config::AnovaConfig;
    use crate::contrast::build_d_variables;
    use crate::design::{Observation, ObservationTable};

    fn mixed_design() -> Design {
        let data = [
            (1, "g1", 3.0, 5.0),
            (2, "g1", 4.0, 8.0),
            (3, "g2", 6.0, 7.0),
            (4, "g2", 8.0, 12.0),
        ];
        let mut table = ObservationTable::new();
        for (s, g, pre, post) in data {
            table.push(Observation::new(s, [g, "pre"], pre)).unwrap();
            table.push(Observation::new(s, [g, "post"], post)).unwrap();
        }
        Design::from_table(&table, &AnovaConfig::default()).unwrap()
    }

    #[test]
    fn test_memo_is_write_once() {
        let mut memo = EffectMemo::new();
        let a = Source::from_factors([0]);
        memo.insert(EffectMatrix::new(a, ArrayD::zeros(IxDyn(&[2, 1]))));
        assert!(memo.contains(a));
        assert_eq!(memo.len(), 1);
        assert!(memo.get(Source::from_factors([1])).is_none());
    }

    #[test]
    #[should_panic(expected = "computed twice")]
    fn test_memo_rejects_second_write() {
        let mut memo = EffectMemo::new();
        let a = Source::from_factors([0]);
        memo.insert(EffectMatrix::new(a, ArrayD::zeros(IxDyn(&[1]))));
        memo.insert(EffectMatrix::new(a, ArrayD::zeros(IxDyn(&[1]))));
    }

    #[test]
    #[should_panic(expected = "before it was computed")]
    fn test_memo_require_missing() {
        let _ = EffectMemo::new().require(Source::from_factors([0]));
    }

    #[test]
    fn test_between_source_on_subject_means() {
        let design = mixed_design();
        let means = subject_means(design.scores());
        let cells =
            CellStatistics::compute(means.view(), design.subject_cells(), &design.between_shape());
        let memo = EffectMemo::new();

        let outcome = between_source(&design, &means, &cells, Source::from_factors([0]), &memo);
        // Subject means 4, 6 | 6.5, 10: group means 5 and 8.25
        match outcome.sums {
            SumOfSquares::Scalar { ss, error_ss } => {
                assert!((ss - 10.5625).abs() < 1e-12);
                assert!((error_ss - 8.125).abs() < 1e-12);
            }
            SumOfSquares::Matrix(_) => panic!("expected a scalar SS"),
        }
        let effect = outcome.effect.values();
        assert_eq!(effect.shape(), &[2, 1]);
        assert!((effect[IxDyn(&[0, 0])] + 1.625).abs() < 1e-12);
        assert!((effect[IxDyn(&[1, 0])] - 1.625).abs() < 1e-12);
    }

    #[test]
    fn test_within_and_mixed_sources() {
        let design = mixed_design();
        let means = subject_means(design.scores());
        let cells =
            CellStatistics::compute(means.view(), design.subject_cells(), &design.between_shape());
        let mut memo = EffectMemo::new();

        let a = between_source(&design, &means, &cells, Source::from_factors([0]), &memo);
        memo.insert(a.effect);

        let time = Source::from_factors([1]);
        let d = build_d_variables(&design, time).unwrap();

        let within = within_source(&design, &d, time);
        let SumOfSquares::Matrix(m) = &within.sums else {
            panic!("expected matrices")
        };
        // Classic SS: B = 15.125, B×S/A = 3.25
        assert!((m.full[[0, 0]] - 3.25).abs() < 1e-12);
        assert!((m.restricted[[0, 0]] - m.full[[0, 0]] - 15.125).abs() < 1e-12);
        memo.insert(within.effect);

        let mixed = mixed_source(&design, &d, Source::from_factors([0, 1]), &memo);
        let SumOfSquares::Matrix(m) = &mixed.sums else {
            panic!("expected matrices")
        };
        // A×B = 0.125
        assert!((m.restricted[[0, 0]] - m.full[[0, 0]] - 0.125).abs() < 1e-12);
        assert_eq!(mixed.kind, SourceKind::Mixed);
    }
}
