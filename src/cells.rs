//! Between-subjects cell statistics and per-source cell summaries.
//!
//! Every source is analysed on a (subjects × variables) score matrix: the
//! subject means for purely between-subjects sources, or a D-variable
//! matrix otherwise. [`CellStatistics`] groups those rows by the subject's
//! between-subjects cell.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, Axis, Dimension, IxDyn};

use crate::design::{Design, Level};
use crate::source::Source;
use crate::stats::harmonic_mean;
use crate::utils::{cell_count, flat_index};

/// Means and counts of a score matrix per between-subjects cell.
///
/// `means` has one axis per between-subjects factor plus a trailing
/// variable axis; `counts` has only the between-subjects axes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellStatistics {
    means: ArrayD<f64>,
    flat_means: Array2<f64>,
    counts: ArrayD<f64>,
    harmonic_n: f64,
    grand_means: Array1<f64>,
}

impl CellStatistics {
    /// Group the rows of `values` by `subject_cells` (flat indices into
    /// `between_shape`).
    ///
    /// # Panics
    ///
    /// Panics if `subject_cells` does not have one entry per row.
    #[must_use]
    pub fn compute(
        values: ArrayView2<'_, f64>,
        subject_cells: &[usize],
        between_shape: &[usize],
    ) -> Self {
        assert_eq!(values.nrows(), subject_cells.len(), "one cell per subject");
        let cells = cell_count(between_shape);
        let variables = values.ncols();

        let mut sums = Array2::<f64>::zeros((cells, variables));
        let mut ns = vec![0.0_f64; cells];
        for (row, &cell) in values.outer_iter().zip(subject_cells) {
            sums.row_mut(cell).scaled_add(1.0, &row);
            ns[cell] += 1.0;
        }

        let flat_means = Array2::from_shape_fn((cells, variables), |(cell, var)| {
            if ns[cell] > 0.0 {
                sums[[cell, var]] / ns[cell]
            } else {
                0.0
            }
        });

        let mut dims = between_shape.to_vec();
        dims.push(variables);
        let means = ArrayD::from_shape_fn(IxDyn(&dims), |idx| {
            let idx = idx.slice();
            let (var, cell) = idx.split_last().map_or((0, &[][..]), |(v, c)| (*v, c));
            flat_means[[flat_index(cell, between_shape), var]]
        });
        let counts =
            ArrayD::from_shape_fn(IxDyn(between_shape), |idx| ns[flat_index(idx.slice(), between_shape)]);

        let n = values.nrows().max(1) as f64;
        let grand_means = values.sum_axis(Axis(0)) / n;

        Self {
            means,
            flat_means,
            counts,
            harmonic_n: harmonic_mean(ns.iter().copied()),
            grand_means,
        }
    }

    /// Cell means, shape `[between levels..., variables]`.
    #[must_use]
    pub fn means(&self) -> &ArrayD<f64> {
        &self.means
    }

    /// Cell means with the between-subjects axes flattened row-major,
    /// shape `[cells, variables]`.
    #[must_use]
    pub fn flat_means(&self) -> &Array2<f64> {
        &self.flat_means
    }

    /// Subjects per cell, shape `[between levels...]`.
    #[must_use]
    pub fn counts(&self) -> &ArrayD<f64> {
        &self.counts
    }

    /// Harmonic mean of every cell count.
    #[must_use]
    pub fn harmonic_n(&self) -> f64 {
        self.harmonic_n
    }

    /// Per-variable mean over all subjects.
    #[must_use]
    pub fn grand_means(&self) -> ArrayView1<'_, f64> {
        self.grand_means.view()
    }

    /// Number of variables (columns of the score matrix).
    #[must_use]
    pub fn variables(&self) -> usize {
        self.grand_means.len()
    }

    /// Number of between-subjects axes.
    #[must_use]
    pub fn between_axes(&self) -> usize {
        self.counts.ndim()
    }

    /// Full-model residuals: each row minus its cell mean.
    #[must_use]
    pub fn residuals(&self, values: ArrayView2<'_, f64>, subject_cells: &[usize]) -> Array2<f64> {
        let mut residuals = values.to_owned();
        for (mut row, &cell) in residuals.outer_iter_mut().zip(subject_cells) {
            row -= &self.flat_means.row(cell);
        }
        residuals
    }
}

/// Each subject's mean over every within-subjects cell, as a one-column matrix.
#[must_use]
pub fn subject_means(scores: &ArrayD<f64>) -> Array2<f64> {
    let subjects = scores.len_of(Axis(0));
    Array2::from_shape_fn((subjects, 1), |(s, _)| {
        let lane = scores.index_axis(Axis(0), s);
        lane.sum() / lane.len() as f64
    })
}

/// Descriptive statistics for one cell of a source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellSummary {
    /// Level of each of the source's factors, in factor order.
    pub levels: Vec<Level>,
    /// Mean of the observations in the cell.
    pub mean: f64,
    /// Standard error of the mean (sample SD over √N; 0 for a single observation).
    pub std_err: f64,
    /// Number of observations.
    pub n: usize,
}

/// Cell means, standard errors and Ns for the cells formed by `source`'s factors.
///
/// Uses the deduplicated observations, so a subject contributes once per
/// full level combination. Cells come back in level order.
#[must_use]
pub fn summarize_source(design: &Design, source: Source) -> Vec<CellSummary> {
    let factors: Vec<usize> = source.factors().collect();
    let mut groups: BTreeMap<Vec<usize>, Vec<f64>> = BTreeMap::new();
    for obs in design.observations() {
        let key = factors.iter().map(|&f| obs.levels[f]).collect();
        groups.entry(key).or_default().push(obs.value);
    }

    groups
        .into_iter()
        .map(|(key, values)| {
            let n = values.len();
            let mean = values.iter().sum::<f64>() / n as f64;
            let std_err = if n > 1 {
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
                (var / n as f64).sqrt()
            } else {
                0.0
            };
            CellSummary {
                levels: key
                    .iter()
                    .zip(&factors)
                    .map(|(&level, &f)| design.factors()[f].levels[level].clone())
                    .collect(),
                mean,
                std_err,
                n,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnovaConfig;
    use crate::design::{Observation, ObservationTable};
    use ndarray::array;

    #[test]
    fn test_cell_means_and_counts() {
        let values = array![[1.0, 10.0], [3.0, 20.0], [5.0, 30.0]];
        let stats = CellStatistics::compute(values.view(), &[0, 0, 1], &[2]);

        assert_eq!(stats.means().shape(), &[2, 2]);
        assert!((stats.means()[IxDyn(&[0, 0])] - 2.0).abs() < 1e-12);
        assert!((stats.means()[IxDyn(&[0, 1])] - 15.0).abs() < 1e-12);
        assert!((stats.means()[IxDyn(&[1, 0])] - 5.0).abs() < 1e-12);
        assert_eq!(stats.counts()[IxDyn(&[0])], 2.0);
        assert_eq!(stats.counts()[IxDyn(&[1])], 1.0);

        // 2 / (1/2 + 1/1)
        assert!((stats.harmonic_n() - 4.0 / 3.0).abs() < 1e-12);
        assert!((stats.grand_means()[0] - 3.0).abs() < 1e-12);
        assert!((stats.grand_means()[1] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_between_factors() {
        let values = array![[1.0], [2.0], [6.0]];
        let stats = CellStatistics::compute(values.view(), &[0, 0, 0], &[]);
        assert_eq!(stats.means().shape(), &[1]);
        assert_eq!(stats.between_axes(), 0);
        assert!((stats.means()[IxDyn(&[0])] - 3.0).abs() < 1e-12);
        assert!((stats.harmonic_n() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_residuals() {
        let values = array![[1.0], [3.0], [5.0], [9.0]];
        let cells = [0, 0, 1, 1];
        let stats = CellStatistics::compute(values.view(), &cells, &[2]);
        let residuals = stats.residuals(values.view(), &cells);
        assert_eq!(residuals, array![[-1.0], [1.0], [-2.0], [2.0]]);
    }

    #[test]
    fn test_subject_means() {
        let scores = array![[1.0, 3.0], [4.0, 8.0]].into_dyn();
        assert_eq!(subject_means(&scores), array![[2.0], [6.0]]);
    }

    #[test]
    fn test_summarize_source() {
        let mut table = ObservationTable::new();
        for (s, g, pre, post) in [(1, "g1", 3.0, 5.0), (2, "g1", 4.0, 8.0), (3, "g2", 6.0, 7.0)] {
            table.push(Observation::new(s, [g, "pre"], pre)).unwrap();
            table.push(Observation::new(s, [g, "post"], post)).unwrap();
        }
        let design = Design::from_table(&table, &AnovaConfig::default()).unwrap();

        let groups = summarize_source(&design, Source::from_factors([0]));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].levels, vec![Level::from("g1")]);
        assert_eq!(groups[0].n, 4);
        assert!((groups[0].mean - 5.0).abs() < 1e-12);
        // values 3, 5, 4, 8: sd² = 14/3
        let expected = (14.0_f64 / 3.0 / 4.0).sqrt();
        assert!((groups[0].std_err - expected).abs() < 1e-12);

        let cells = summarize_source(&design, Source::from_factors([0, 1]));
        assert_eq!(cells.len(), 4);
        assert_eq!(cells[3].levels, vec![Level::from("g2"), Level::from("pre")]);
        assert_eq!(cells[3].n, 1);
        assert_eq!(cells[3].std_err, 0.0);
    }
}
