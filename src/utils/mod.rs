//! Indexing and reduction helpers shared by the cell and contrast engines.
//!
//! Cells of a factorial design are addressed two ways: as a multi-index
//! (one level index per factor) and as a row-major flat index. The helpers
//! here convert between the two and reduce `ndarray` arrays over an axis
//! while keeping that axis with length 1, so lower-order tables broadcast
//! against higher-order ones.

use ndarray::{ArrayD, Axis};

use crate::stats::harmonic_mean;

/// Number of cells spanned by `shape` (1 for the empty shape).
///
/// # Examples
///
/// ```
/// use mixed_anova::utils::cell_count;
///
/// assert_eq!(cell_count(&[2, 3, 4]), 24);
/// assert_eq!(cell_count(&[]), 1);
/// ```
#[must_use]
pub fn cell_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major flat index of a multi-index (last axis varies fastest).
///
/// # Examples
///
/// ```
/// use mixed_anova::utils::flat_index;
///
/// assert_eq!(flat_index(&[1, 2], &[2, 3]), 5);
/// assert_eq!(flat_index(&[], &[]), 0);
/// ```
#[must_use]
pub fn flat_index(index: &[usize], shape: &[usize]) -> usize {
    index
        .iter()
        .zip(shape)
        .fold(0, |flat, (&i, &len)| flat * len + i)
}

/// Inverse of [`flat_index`].
#[must_use]
pub fn unflatten(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (slot, &len) in index.iter_mut().zip(shape).rev() {
        *slot = flat % len;
        flat /= len;
    }
    index
}

/// Iterate over every multi-index of `shape` in row-major order.
///
/// The empty shape yields a single empty index; a shape containing a zero
/// extent yields nothing.
///
/// # Examples
///
/// ```
/// use mixed_anova::utils::multi_indices;
///
/// let cells: Vec<Vec<usize>> = multi_indices(&[2, 2]).collect();
/// assert_eq!(cells, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
/// ```
pub fn multi_indices(shape: &[usize]) -> impl Iterator<Item = Vec<usize>> {
    MultiIndexIterator::new(shape.to_vec())
}

/// Odometer over the cells of a shape.
struct MultiIndexIterator {
    shape: Vec<usize>,
    current: Vec<usize>,
    finished: bool,
}

impl MultiIndexIterator {
    fn new(shape: Vec<usize>) -> Self {
        let finished = shape.iter().any(|&len| len == 0);
        Self {
            current: vec![0; shape.len()],
            shape,
            finished,
        }
    }
}

impl Iterator for MultiIndexIterator {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = self.current.clone();

        // Advance the rightmost digit that has room, zeroing the ones after it
        let mut axis = self.shape.len();
        loop {
            if axis == 0 {
                self.finished = true;
                break;
            }
            axis -= 1;
            if self.current[axis] + 1 < self.shape[axis] {
                self.current[axis] += 1;
                for slot in &mut self.current[axis + 1..] {
                    *slot = 0;
                }
                break;
            }
        }

        Some(result)
    }
}

/// Arithmetic mean over each of `axes`, keeping every reduced axis with length 1.
///
/// Axes are reduced from the highest down so earlier axis numbers stay valid.
#[must_use]
pub fn mean_keepdims(array: &ArrayD<f64>, axes: &[usize]) -> ArrayD<f64> {
    reduce_keepdims(array, axes, |lane| {
        lane.iter().sum::<f64>() / lane.len() as f64
    })
}

/// Harmonic mean over each of `axes`, keeping every reduced axis with length 1.
#[must_use]
pub fn harmonic_mean_keepdims(array: &ArrayD<f64>, axes: &[usize]) -> ArrayD<f64> {
    reduce_keepdims(array, axes, |lane| harmonic_mean(lane.iter().copied()))
}

fn reduce_keepdims<F>(array: &ArrayD<f64>, axes: &[usize], reduce: F) -> ArrayD<f64>
where
    F: Fn(ndarray::ArrayView1<'_, f64>) -> f64,
{
    let mut sorted = axes.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let mut out = array.clone();
    for axis in sorted {
        out = out.map_axis(Axis(axis), &reduce).insert_axis(Axis(axis));
    }
    out
}

/// Mean over one axis, dropping it.
#[must_use]
pub fn mean_over(array: &ArrayD<f64>, axis: usize) -> ArrayD<f64> {
    let len = array.len_of(Axis(axis)) as f64;
    array.sum_axis(Axis(axis)) / len
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, IxDyn};

    #[test]
    fn test_flat_index_roundtrip_positions() {
        let shape = [2, 3, 4];
        assert_eq!(flat_index(&[0, 0, 0], &shape), 0);
        assert_eq!(flat_index(&[0, 0, 3], &shape), 3);
        assert_eq!(flat_index(&[0, 1, 0], &shape), 4);
        assert_eq!(flat_index(&[1, 2, 3], &shape), 23);
        assert_eq!(unflatten(23, &shape), vec![1, 2, 3]);
        assert_eq!(unflatten(4, &shape), vec![0, 1, 0]);
    }

    #[test]
    fn test_multi_indices_order_matches_flat_index() {
        let shape = [3, 2, 2];
        for (flat, index) in multi_indices(&shape).enumerate() {
            assert_eq!(flat_index(&index, &shape), flat);
        }
        assert_eq!(multi_indices(&shape).count(), 12);
    }

    #[test]
    fn test_multi_indices_edge_shapes() {
        let empty: Vec<Vec<usize>> = multi_indices(&[]).collect();
        assert_eq!(empty, vec![Vec::<usize>::new()]);

        assert_eq!(multi_indices(&[3, 0]).count(), 0);
    }

    #[test]
    fn test_mean_keepdims() {
        let a = array![[1.0, 2.0, 3.0], [5.0, 6.0, 7.0]].into_dyn();

        let rows = mean_keepdims(&a, &[1]);
        assert_eq!(rows.shape(), &[2, 1]);
        assert!((rows[IxDyn(&[0, 0])] - 2.0).abs() < 1e-12);
        assert!((rows[IxDyn(&[1, 0])] - 6.0).abs() < 1e-12);

        let all = mean_keepdims(&a, &[0, 1]);
        assert_eq!(all.shape(), &[1, 1]);
        assert!((all[IxDyn(&[0, 0])] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_harmonic_mean_keepdims() {
        let counts = array![[2.0, 4.0], [4.0, 4.0]].into_dyn();
        let h = harmonic_mean_keepdims(&counts, &[1]);
        assert_eq!(h.shape(), &[2, 1]);
        // 2 / (1/2 + 1/4) = 8/3
        assert!((h[IxDyn(&[0, 0])] - 8.0 / 3.0).abs() < 1e-12);
        assert!((h[IxDyn(&[1, 0])] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_over_drops_axis() {
        let a = array![[1.0, 3.0], [5.0, 7.0]].into_dyn();
        let m = mean_over(&a, 0);
        assert_eq!(m.shape(), &[2]);
        assert!((m[IxDyn(&[0])] - 3.0).abs() < 1e-12);
        assert!((m[IxDyn(&[1])] - 5.0).abs() < 1e-12);
    }
}
