//! Matrix collaborators: determinant, inverse, cross products.
//!
//! Storage stays in `ndarray`; decompositions go through `nalgebra`. This
//! module is the single conversion point between the two.

use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2};

/// Relative size below which a positive semi-definite determinant is zero.
///
/// Measured against the product of the diagonal (Hadamard's bound), so the
/// test is independent of the data's scale.
pub const SINGULARITY_TOLERANCE: f64 = 1e-12;

/// Convert an ndarray matrix to a nalgebra `DMatrix`.
#[inline]
#[must_use]
pub fn to_dmatrix(a: &ArrayView2<'_, f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Convert a nalgebra `DMatrix` back to an ndarray matrix.
#[inline]
#[must_use]
pub fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    let (nrows, ncols) = m.shape();
    Array2::from_shape_fn((nrows, ncols), |(i, j)| m[(i, j)])
}

/// Determinant of a square matrix (LU decomposition).
///
/// The empty 0×0 matrix has determinant 1.
///
/// # Panics
///
/// Panics if `a` is not square.
#[must_use]
pub fn determinant(a: &Array2<f64>) -> f64 {
    assert_eq!(a.nrows(), a.ncols(), "determinant of a non-square matrix");
    match a.nrows() {
        0 => 1.0,
        1 => a[[0, 0]],
        _ => to_dmatrix(&a.view()).determinant(),
    }
}

/// Determinant of a sums-of-squares-and-cross-products matrix.
///
/// Such matrices are positive semi-definite, so a determinant that is
/// negative or vanishingly small relative to the product of the diagonal is
/// rounding noise around a singular matrix and is returned as exactly 0.
#[must_use]
pub fn sscp_determinant(a: &Array2<f64>) -> f64 {
    let det = determinant(a);
    let bound: f64 = a.diag().iter().product();
    if det <= 0.0 || bound <= 0.0 || det <= bound * SINGULARITY_TOLERANCE {
        0.0
    } else {
        det
    }
}

/// Inverse of a square matrix, `None` when it is singular.
#[must_use]
pub fn inverse(a: &Array2<f64>) -> Option<Array2<f64>> {
    if a.nrows() != a.ncols() {
        return None;
    }
    to_dmatrix(&a.view())
        .try_inverse()
        .map(|inv| to_array2(&inv))
}

/// Cross-product matrix `XᵀX` of a (rows × variables) matrix.
///
/// Applied to model residuals this is the SSCP error matrix.
#[must_use]
pub fn cross_product(x: &ArrayView2<'_, f64>) -> Array2<f64> {
    x.t().dot(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_determinant_known_values() {
        assert!((determinant(&array![[4.0]]) - 4.0).abs() < 1e-12);
        assert!((determinant(&array![[2.0, 1.0], [1.0, 3.0]]) - 5.0).abs() < 1e-12);

        let m = array![[6.0, 1.0, 1.0], [4.0, -2.0, 5.0], [2.0, 8.0, 7.0]];
        assert!((determinant(&m) - (-306.0)).abs() < 1e-9);

        assert_eq!(determinant(&Array2::zeros((0, 0))), 1.0);
    }

    #[test]
    fn test_sscp_determinant_zeroes_singular_matrices() {
        // Rank one: [1 2]ᵀ[1 2]
        let m = array![[1.0, 2.0], [2.0, 4.0]];
        assert_eq!(sscp_determinant(&m), 0.0);

        assert_eq!(sscp_determinant(&array![[0.0]]), 0.0);

        let m = array![[2.0, 1.0], [1.0, 3.0]];
        assert!((sscp_determinant(&m) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse() {
        let m = array![[4.0, 7.0], [2.0, 6.0]];
        let inv = inverse(&m).unwrap();
        let identity = m.dot(&inv);
        assert!((identity[[0, 0]] - 1.0).abs() < 1e-12);
        assert!(identity[[0, 1]].abs() < 1e-12);
        assert!(identity[[1, 0]].abs() < 1e-12);
        assert!((identity[[1, 1]] - 1.0).abs() < 1e-12);

        assert!(inverse(&array![[1.0, 2.0], [2.0, 4.0]]).is_none());
        assert!(inverse(&array![[1.0, 2.0]]).is_none());
    }

    #[test]
    fn test_cross_product() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let xtx = cross_product(&x.view());
        assert_eq!(xtx, array![[35.0, 44.0], [44.0, 56.0]]);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(to_array2(&to_dmatrix(&a.view())), a);
    }
}
