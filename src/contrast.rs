//! Orthogonal-polynomial contrasts and D-variables.
//!
//! A within-subjects source is analysed on D-variables: per-subject
//! contrast scores, one column per combination of polynomial contrasts
//! across the source's within-subjects factors. Within-subjects factors not
//! in the source are averaged out first.

use ndarray::{Array2, ArrayD, Axis, IxDyn};
use tracing::debug;

use crate::cells::CellStatistics;
use crate::design::Design;
use crate::error::{Error, Result};
use crate::source::Source;
use crate::utils::{cell_count, mean_over, multi_indices, unflatten};

/// Largest level count a within-subjects factor may have.
pub const MAX_WITHIN_LEVELS: usize = 10;

/// Orthogonal polynomial coefficients, indexed by `[levels - 1][contrast]`.
///
/// Row `c` of the entry for `l` levels is the degree-`c + 1` polynomial over
/// `l` equally spaced points. Every row sums to zero and rows of one entry
/// are mutually orthogonal.
static COEFFICIENTS: [&[&[i32]]; MAX_WITHIN_LEVELS] = [
    &[&[1]],
    &[&[-1, 1]],
    &[&[-1, 0, 1], &[1, -2, 1]],
    &[&[-3, -1, 1, 3], &[1, -1, -1, 1], &[-1, 3, -3, 1]],
    &[
        &[-2, -1, 0, 1, 2],
        &[2, -1, -2, -1, 2],
        &[-1, 2, 0, -2, 1],
        &[1, -4, 6, -4, 1],
    ],
    &[
        &[-5, -3, -1, 1, 3, 5],
        &[5, -1, -4, -4, -1, 5],
        &[-5, 7, 4, -4, -7, 5],
        &[1, -3, 2, 2, -3, 1],
        &[-1, 5, -10, 10, -5, 1],
    ],
    &[
        &[-3, -2, -1, 0, 1, 2, 3],
        &[5, 0, -3, -4, -3, 0, 5],
        &[-1, 1, 1, 0, -1, -1, 1],
        &[3, -7, 1, 6, 1, -7, 3],
        &[-1, 4, -5, 0, 5, -4, 1],
        &[1, -6, 15, -20, 15, -6, 1],
    ],
    &[
        &[-7, -5, -3, -1, 1, 3, 5, 7],
        &[7, 1, -3, -5, -5, -3, 1, 7],
        &[-7, 5, 7, 3, -3, -7, -5, 7],
        &[7, -13, -3, 9, 9, -3, -13, 7],
        &[-7, 23, -17, -15, 15, 17, -23, 7],
        &[1, -5, 9, -5, -5, 9, -5, 1],
        &[-1, 7, -21, 35, -35, 21, -7, 1],
    ],
    &[
        &[-4, -3, -2, -1, 0, 1, 2, 3, 4],
        &[28, 7, -8, -17, -20, -17, -8, 7, 28],
        &[-14, 7, 13, 9, 0, -9, -13, -7, 14],
        &[14, -21, -11, 9, 18, 9, -11, -21, 14],
        &[-4, 11, -4, -9, 0, 9, 4, -11, 4],
        &[4, -17, 22, 1, -20, 1, 22, -17, 4],
        &[-1, 6, -14, 14, 0, -14, 14, -6, 1],
        &[1, -8, 28, -56, 70, -56, 28, -8, 1],
    ],
    &[
        &[-9, -7, -5, -3, -1, 1, 3, 5, 7, 9],
        &[6, 2, -1, -3, -4, -4, -3, -1, 2, 6],
        &[-42, 14, 35, 31, 12, -12, -31, -35, -14, 42],
        &[18, -22, -17, 3, 18, 18, 3, -17, -22, 18],
        &[-6, 14, -1, -11, -6, 6, 11, 1, -14, 6],
        &[3, -11, 10, 6, -8, -8, 6, 10, -11, 3],
        &[9, -47, 86, -42, -56, 56, 42, -86, 47, -9],
        &[1, -7, 20, -28, 14, 14, -28, 20, -7, 1],
        &[-1, 9, -36, 84, -126, 126, -84, 36, -9, 1],
    ],
];

/// Integer coefficients of contrast `contrast` for a factor with `levels` levels.
///
/// Returns `None` outside the table (`levels` not in `1..=10`, or
/// `contrast >= max(levels - 1, 1)`).
///
/// # Examples
///
/// ```
/// use mixed_anova::contrast::coefficients;
///
/// assert_eq!(coefficients(3, 1), Some(&[1, -2, 1][..]));
/// assert_eq!(coefficients(11, 0), None);
/// ```
#[must_use]
pub fn coefficients(levels: usize, contrast: usize) -> Option<&'static [i32]> {
    let rows = COEFFICIENTS.get(levels.checked_sub(1)?)?;
    rows.get(contrast).copied()
}

/// Contrast scores for one combination of within-subjects factors.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DVariables {
    source: Source,
    columns: Array2<f64>,
    cells: CellStatistics,
}

impl DVariables {
    /// The within-subjects-only source these scores belong to.
    #[must_use]
    pub fn source(&self) -> Source {
        self.source
    }

    /// Scores, shape `[subjects, contrasts]`.
    #[must_use]
    pub fn columns(&self) -> &Array2<f64> {
        &self.columns
    }

    /// Number of contrast columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.ncols()
    }

    /// Whether there are no contrast columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.ncols() == 0
    }

    /// Between-subjects cell statistics of the scores.
    #[must_use]
    pub fn cells(&self) -> &CellStatistics {
        &self.cells
    }
}

/// Build the D-variables for a within-subjects-only source.
///
/// Each column weights the subject's cell means (averaged over the
/// within-subjects factors outside `source`) by the product of one
/// polynomial row per source factor, then divides by the Euclidean norm of
/// those weights. Columns follow the contrast combinations in row-major
/// order.
///
/// # Errors
///
/// Returns [`Error::TooManyWithinLevels`] if a factor of `source` has more
/// than [`MAX_WITHIN_LEVELS`] levels.
///
/// # Panics
///
/// Panics if `source` contains a between-subjects factor.
pub fn build_d_variables(design: &Design, source: Source) -> Result<DVariables> {
    assert!(
        source.is_subset_of(design.within_mask()),
        "D-variables need a within-subjects-only source"
    );

    for f in source.factors() {
        let factor = &design.factors()[f];
        if factor.level_count() > MAX_WITHIN_LEVELS {
            return Err(Error::TooManyWithinLevels {
                factor: factor.name.clone(),
                levels: factor.level_count(),
                max: MAX_WITHIN_LEVELS,
            });
        }
    }

    let reduced = average_outside(
        design.scores(),
        &design.within_axes(source),
        design.within_factors().len(),
    );
    let levels: Vec<usize> = reduced.shape()[1..].to_vec();
    let subjects = reduced.len_of(Axis(0));

    let weights = contrast_weights(&levels);
    let cells = cell_count(&levels);
    let flat = Array2::from_shape_fn((subjects, cells), |(s, cell)| {
        let mut index = Vec::with_capacity(levels.len() + 1);
        index.push(s);
        index.extend(unflatten(cell, &levels));
        reduced[IxDyn(&index)]
    });

    // Integer weights keep a constant row's contrast at exactly zero
    let mut columns = flat.dot(&weights.integer);
    for (mut column, &norm) in columns.axis_iter_mut(Axis(1)).zip(&weights.norms) {
        column /= norm;
    }

    debug!(
        source = source.bits(),
        levels = ?levels,
        columns = columns.ncols(),
        "built D-variables"
    );

    let cells = CellStatistics::compute(
        columns.view(),
        design.subject_cells(),
        &design.between_shape(),
    );
    Ok(DVariables {
        source,
        columns,
        cells,
    })
}

/// Average `scores` (axis 0 = subjects, axis `j + 1` = within factor `j`)
/// over every within axis not in `keep`, highest axis first.
fn average_outside(scores: &ArrayD<f64>, keep: &[usize], within: usize) -> ArrayD<f64> {
    let mut reduced = scores.clone();
    for axis in (0..within).rev().filter(|a| !keep.contains(a)) {
        reduced = mean_over(&reduced, axis + 1);
    }
    reduced
}

struct ContrastWeights {
    /// `[cells, contrasts]` integer weights stored as floats.
    integer: Array2<f64>,
    norms: Vec<f64>,
}

fn contrast_weights(levels: &[usize]) -> ContrastWeights {
    let contrast_shape: Vec<usize> = levels.iter().map(|&l| l.saturating_sub(1)).collect();
    let cells = cell_count(levels);
    let contrasts = cell_count(&contrast_shape);

    let mut integer = Array2::zeros((cells, contrasts));
    let mut norms = Vec::with_capacity(contrasts);
    for (c, combo) in multi_indices(&contrast_shape).enumerate() {
        let mut squared = 0_i64;
        for (cell, index) in multi_indices(levels).enumerate() {
            let weight: i64 = combo
                .iter()
                .zip(&index)
                .zip(levels)
                .map(|((&contrast, &level), &count)| {
                    coefficients(count, contrast).map_or(0, |row| i64::from(row[level]))
                })
                .product();
            integer[[cell, c]] = weight as f64;
            squared += weight * weight;
        }
        norms.push((squared as f64).sqrt());
    }

    ContrastWeights { integer, norms }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnovaConfig;
    use crate::design::{Observation, ObservationTable};

    #[test]
    fn test_table_rows_are_orthogonal_contrasts() {
        for levels in 2..=MAX_WITHIN_LEVELS {
            let rows = COEFFICIENTS[levels - 1];
            assert_eq!(rows.len(), levels - 1);
            for (i, a) in rows.iter().enumerate() {
                assert_eq!(a.len(), levels);
                assert_eq!(a.iter().sum::<i32>(), 0, "levels {levels} row {i}");
                for b in &rows[..i] {
                    let dot: i32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                    assert_eq!(dot, 0, "levels {levels} row {i}");
                }
            }
        }
    }

    #[test]
    fn test_coefficients_lookup() {
        assert_eq!(coefficients(2, 0), Some(&[-1, 1][..]));
        assert_eq!(coefficients(4, 2), Some(&[-1, 3, -3, 1][..]));
        assert_eq!(coefficients(4, 3), None);
        assert_eq!(coefficients(0, 0), None);
    }

    #[test]
    fn test_interaction_weights_are_products() {
        let weights = contrast_weights(&[2, 3]);
        assert_eq!(weights.integer.dim(), (6, 2));
        // Linear×linear: [-1, 1] ⊗ [-1, 0, 1]
        let column: Vec<f64> = weights.integer.column(0).to_vec();
        assert_eq!(column, vec![1.0, 0.0, -1.0, -1.0, 0.0, 1.0]);
        assert!((weights.norms[0] - 2.0).abs() < 1e-12);
        // Linear×quadratic: [-1, 1] ⊗ [1, -2, 1]
        assert!((weights.norms[1] - 12.0_f64.sqrt()).abs() < 1e-12);
    }

    fn two_within_factors() -> Design {
        let mut table = ObservationTable::new();
        for s in 0..4_i32 {
            for a in 0..2_i32 {
                for b in 0..3_i32 {
                    let value = f64::from(s + 2 * a + b * b);
                    table.push(Observation::new(s, [a, b], value)).unwrap();
                }
            }
        }
        Design::from_table(&table, &AnovaConfig::default()).unwrap()
    }

    #[test]
    fn test_main_effect_d_variables() {
        let design = two_within_factors();
        assert_eq!(design.within_factors(), &[0, 1]);

        // A: every subject's mean rises by 2 from a=0 to a=1
        let d = build_d_variables(&design, Source::from_factors([0])).unwrap();
        assert_eq!(d.len(), 1);
        for &v in d.columns() {
            assert!((v - 2.0 / 2.0_f64.sqrt()).abs() < 1e-12);
        }

        // B: means over a are s + 1 + b², so linear = 4/√2, quadratic = 2/√6
        let d = build_d_variables(&design, Source::from_factors([1])).unwrap();
        assert_eq!(d.len(), 2);
        for row in d.columns().rows() {
            assert!((row[0] - 4.0 / 2.0_f64.sqrt()).abs() < 1e-12);
            assert!((row[1] - 2.0 / 6.0_f64.sqrt()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_additive_data_has_zero_interaction() {
        let design = two_within_factors();
        let d = build_d_variables(&design, Source::from_factors([0, 1])).unwrap();
        assert_eq!(d.len(), 2);
        assert!(d.columns().iter().all(|&v| v == 0.0));
        assert_eq!(d.cells().variables(), 2);
    }
}
