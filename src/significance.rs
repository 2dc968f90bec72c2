//! Degrees of freedom, F statistics and p-values.
//!
//! Univariate sources use the model-comparison F. Sources mixing within-
//! and between-subjects factors are tested with Wilks' Lambda, converted to
//! F by Rao's approximation (or to chi-square by Bartlett's).
//!
//! Degenerate statistics never fail: they produce F = 0, p = 1 and a
//! [`Degeneracy`] tag on the result.

use std::fmt;

use ndarray::Array2;
use tracing::debug;

use crate::config::MultivariateTest;
use crate::linalg::{inverse, sscp_determinant};
use crate::stats::{chi_square_upper_tail, f_distribution_upper_tail};

/// Why a statistic was replaced by F = 0, p = 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Degeneracy {
    /// The full model has no error: MS error or det(EF) is zero.
    ZeroErrorVariance,
    /// det(ER) is zero, so Wilks' Lambda is undefined.
    SingularRestrictedModel,
    /// The source has no numerator degrees of freedom.
    ZeroNumeratorDf,
    /// Too few subjects for a positive denominator df.
    NonPositiveDenominatorDf,
}

impl fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ZeroErrorVariance => "zero error variance",
            Self::SingularRestrictedModel => "singular restricted model",
            Self::ZeroNumeratorDf => "zero numerator df",
            Self::NonPositiveDenominatorDf => "non-positive denominator df",
        };
        f.write_str(text)
    }
}

/// Full- and restricted-model SSCP error matrices of a D-variable source.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorMatrices {
    /// EF: residual SSCP of the cell-means model.
    pub full: Array2<f64>,
    /// ER: SSCP with the tested effect restricted to zero.
    pub restricted: Array2<f64>,
}

impl ErrorMatrices {
    /// Number of D-variables.
    #[must_use]
    pub fn variables(&self) -> usize {
        self.full.nrows()
    }

    /// Hypothesis matrix H = ER − EF.
    #[must_use]
    pub fn hypothesis(&self) -> Array2<f64> {
        &self.restricted - &self.full
    }

    /// det(EF), with rounding noise around singularity clamped to 0.
    #[must_use]
    pub fn full_determinant(&self) -> f64 {
        sscp_determinant(&self.full)
    }

    /// det(ER), with rounding noise around singularity clamped to 0.
    #[must_use]
    pub fn restricted_determinant(&self) -> f64 {
        sscp_determinant(&self.restricted)
    }

    /// Wilks' Lambda, det(EF) / det(ER); `None` when ER is singular.
    #[must_use]
    pub fn wilks_lambda(&self) -> Option<f64> {
        let er = self.restricted_determinant();
        (er > 0.0).then(|| self.full_determinant() / er)
    }

    /// Pillai's trace, tr(H · ER⁻¹); `None` when ER is singular.
    #[must_use]
    pub fn pillai_trace(&self) -> Option<f64> {
        let er_inv = inverse(&self.restricted)?;
        Some(self.hypothesis().dot(&er_inv).diag().sum())
    }

    /// Hotelling-Lawley trace, tr(H · EF⁻¹); `None` when EF is singular.
    #[must_use]
    pub fn hotelling_lawley_trace(&self) -> Option<f64> {
        let ef_inv = inverse(&self.full)?;
        Some(self.hypothesis().dot(&ef_inv).diag().sum())
    }
}

/// Test statistics for one source.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Significance {
    /// Sum of squares (a determinant difference for D-variable sources).
    pub ss: f64,
    /// Error sum of squares (det(EF) for D-variable sources).
    pub error_ss: f64,
    /// Numerator degrees of freedom.
    pub df_num: f64,
    /// Denominator degrees of freedom (fractional under Rao's approximation).
    pub df_den: f64,
    /// `ss / df_num`.
    pub ms: f64,
    /// `error_ss / df_den`.
    pub ms_error: f64,
    /// F statistic.
    pub f: f64,
    /// Right-tail probability.
    pub p: f64,
    /// Wilks' Lambda, for mixed sources.
    pub wilks_lambda: Option<f64>,
    /// Bartlett's chi-square, when that test was requested.
    pub chi_square: Option<f64>,
    /// Set when the statistic was degenerate.
    pub degeneracy: Option<Degeneracy>,
}

impl Significance {
    fn degenerate(mut self, reason: Degeneracy) -> Self {
        debug!(%reason, ss = self.ss, error_ss = self.error_ss, "degenerate statistic");
        self.f = 0.0;
        self.p = 1.0;
        self.degeneracy = Some(reason);
        self
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Model-comparison F test for a scalar sum of squares.
///
/// # Examples
///
/// ```
/// use mixed_anova::significance::univariate;
///
/// let sig = univariate(40.0, 20.0, 2.0, 12.0);
/// assert!((sig.f - 12.0).abs() < 1e-12);
/// assert!(sig.degeneracy.is_none());
/// ```
#[must_use]
pub fn univariate(ss: f64, error_ss: f64, df_num: f64, df_den: f64) -> Significance {
    let ms = ratio(ss, df_num);
    let ms_error = ratio(error_ss, df_den);
    let sig = Significance {
        ss,
        error_ss,
        df_num,
        df_den,
        ms,
        ms_error,
        f: 0.0,
        p: 1.0,
        wilks_lambda: None,
        chi_square: None,
        degeneracy: None,
    };

    if df_num <= 0.0 {
        return sig.degenerate(Degeneracy::ZeroNumeratorDf);
    }
    if df_den <= 0.0 {
        return sig.degenerate(Degeneracy::NonPositiveDenominatorDf);
    }
    if ms_error <= 0.0 {
        return sig.degenerate(Degeneracy::ZeroErrorVariance);
    }

    let f = (ms / ms_error).max(0.0);
    Significance {
        f,
        p: f_distribution_upper_tail(df_num, df_den, f),
        ..sig
    }
}

/// Univariate test of a within-subjects-only source on its error matrices.
///
/// SS is det(ER) − det(EF) and the error SS is det(EF); with several
/// D-variables this is the exact Hotelling F.
#[must_use]
pub fn within_subjects(matrices: &ErrorMatrices, df_num: f64, df_den: f64) -> Significance {
    let ef = matrices.full_determinant();
    let er = matrices.restricted_determinant();
    univariate(er - ef, ef, df_num, df_den)
}

/// Rao's `s` for `p` D-variables and `k` between-subjects cells.
///
/// Falls back to 1 when the denominator vanishes or the ratio is not a
/// positive number.
#[must_use]
pub fn rao_s(p: usize, k: usize) -> f64 {
    let p = p as f64;
    let h = k as f64 - 1.0;
    let den = p * p + h * h - 5.0;
    if den == 0.0 {
        return 1.0;
    }
    let s = (((p * h).powi(2) - 4.0) / den).sqrt();
    if s.is_finite() && s > 0.0 {
        s
    } else {
        1.0
    }
}

/// Rao's denominator df: `m·s − df_num/2 + 1` with `m = N − 1 − (p + k)/2`.
#[must_use]
pub fn rao_denominator_df(p: usize, k: usize, subjects: usize, df_num: f64) -> f64 {
    let m = subjects as f64 - 1.0 - (p + k) as f64 / 2.0;
    m * rao_s(p, k) - df_num / 2.0 + 1.0
}

/// Rao's F for Wilks' Lambda: `((1 − Λ^(1/s)) / Λ^(1/s)) · df_den / df_num`.
///
/// # Examples
///
/// ```
/// use mixed_anova::significance::wilks_lambda_f;
///
/// // With s = 1 this is the univariate F
/// let f = wilks_lambda_f(0.5, 1.0, 1.0, 10.0);
/// assert!((f - 10.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn wilks_lambda_f(lambda: f64, s: f64, df_num: f64, df_den: f64) -> f64 {
    let w = lambda.powf(1.0 / s);
    ((1.0 - w) / w) * (df_den / df_num)
}

/// Determinant-based F: `((|ER| − |EF|) / df_num) / (|EF| / df_den)`.
#[must_use]
pub fn f_value_multivariate(er: &Array2<f64>, ef: &Array2<f64>, df_num: f64, df_den: f64) -> f64 {
    let det_er = sscp_determinant(er);
    let det_ef = sscp_determinant(ef);
    ((det_er - det_ef) / df_num) / (det_ef / df_den)
}

/// Bartlett's chi-square for Wilks' Lambda: `−(N − 1 − (p + k)/2) · ln Λ`.
#[must_use]
pub fn bartlett_chi_square(lambda: f64, p: usize, k: usize, subjects: usize) -> f64 {
    let m = subjects as f64 - 1.0 - (p + k) as f64 / 2.0;
    -m * lambda.ln()
}

/// Wilks' Lambda test of a mixed source.
///
/// `between_cells` is the number of between-subjects cells (`k`), and
/// `subjects` the subject count (`N`).
#[must_use]
pub fn multivariate(
    matrices: &ErrorMatrices,
    between_cells: usize,
    subjects: usize,
    df_num: f64,
    test: MultivariateTest,
) -> Significance {
    let p = matrices.variables();
    let det_ef = matrices.full_determinant();
    let det_er = matrices.restricted_determinant();
    let df_den = rao_denominator_df(p, between_cells, subjects, df_num);

    let sig = Significance {
        ss: det_er - det_ef,
        error_ss: det_ef,
        df_num,
        df_den,
        ms: ratio(det_er - det_ef, df_num),
        ms_error: ratio(det_ef, df_den),
        f: 0.0,
        p: 1.0,
        wilks_lambda: None,
        chi_square: None,
        degeneracy: None,
    };

    if df_num <= 0.0 {
        return sig.degenerate(Degeneracy::ZeroNumeratorDf);
    }
    if det_er <= 0.0 {
        return sig.degenerate(Degeneracy::SingularRestrictedModel);
    }
    if det_ef <= 0.0 {
        return sig.degenerate(Degeneracy::ZeroErrorVariance);
    }
    if df_den <= 0.0 {
        return sig.degenerate(Degeneracy::NonPositiveDenominatorDf);
    }

    let lambda = (det_ef / det_er).min(1.0);
    let f = wilks_lambda_f(lambda, rao_s(p, between_cells), df_num, df_den).max(0.0);
    let (p_value, chi_square) = match test {
        MultivariateTest::Rao => (f_distribution_upper_tail(df_num, df_den, f), None),
        MultivariateTest::Bartlett => {
            let chi = bartlett_chi_square(lambda, p, between_cells, subjects).max(0.0);
            (chi_square_upper_tail(chi, df_num), Some(chi))
        }
    };

    Significance {
        f,
        p: p_value,
        wilks_lambda: Some(lambda),
        chi_square,
        ..sig
    }
}

/// Numerator df: product of (levels − 1) over `levels`.
#[must_use]
pub fn numerator_df<I>(levels: I) -> f64
where
    I: IntoIterator<Item = usize>,
{
    levels
        .into_iter()
        .map(|l| l.saturating_sub(1) as f64)
        .product()
}

/// Denominator df of a between-subjects source: `N − k`.
#[must_use]
pub fn between_denominator_df(subjects: usize, between_cells: usize) -> f64 {
    subjects as f64 - between_cells as f64
}

/// Denominator df of a within-subjects-only source: `N − k − df_num + 1`.
#[must_use]
pub fn within_denominator_df(subjects: usize, between_cells: usize, df_num: f64) -> f64 {
    subjects as f64 - between_cells as f64 - df_num + 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_univariate_matches_f_table() {
        // F(1, 2) = 2.6 has p = 1 - sqrt(2.6 / 4.6)
        let sig = univariate(10.5625, 8.125, 1.0, 2.0);
        assert!((sig.f - 2.6).abs() < 1e-12);
        assert!((sig.p - 0.248_190_588).abs() < 1e-6);
        assert!((sig.ms_error - 4.0625).abs() < 1e-12);
    }

    #[test]
    fn test_univariate_degenerate() {
        let sig = univariate(0.0, 0.0, 1.0, 4.0);
        assert_eq!(sig.f, 0.0);
        assert_eq!(sig.p, 1.0);
        assert_eq!(sig.degeneracy, Some(Degeneracy::ZeroErrorVariance));

        let sig = univariate(3.0, 1.0, 0.0, 4.0);
        assert_eq!(sig.degeneracy, Some(Degeneracy::ZeroNumeratorDf));

        let sig = univariate(3.0, 1.0, 1.0, 0.0);
        assert_eq!(sig.degeneracy, Some(Degeneracy::NonPositiveDenominatorDf));
        assert_eq!(sig.p, 1.0);
    }

    #[test]
    fn test_rao_s() {
        assert_eq!(rao_s(1, 2), 1.0);
        // Vanishing denominator
        assert_eq!(rao_s(2, 2), 1.0);
        // ((2·2)² − 4) / (4 + 4 − 5) = 4
        assert!((rao_s(2, 3) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rao_denominator_df() {
        // N = 4, p = 1, k = 2: m = 1.5, s = 1
        assert!((rao_denominator_df(1, 2, 4, 1.0) - 2.0).abs() < 1e-12);
        // N = 20, p = 2, k = 3: m = 16.5, s = 2
        assert!((rao_denominator_df(2, 3, 20, 4.0) - 32.0).abs() < 1e-12);
    }

    #[test]
    fn test_multivariate_single_variable() {
        // EF = 3.25, H = 0.125: Λ = 26/27, F = (1/26)·2
        let matrices = ErrorMatrices {
            full: array![[3.25]],
            restricted: array![[3.375]],
        };
        let sig = multivariate(&matrices, 2, 4, 1.0, MultivariateTest::Rao);
        assert!((sig.f - 1.0 / 13.0).abs() < 1e-12);
        assert!((sig.df_den - 2.0).abs() < 1e-12);
        assert!((sig.wilks_lambda.unwrap() - 26.0 / 27.0).abs() < 1e-12);
        assert!((sig.p - 0.807_549_910).abs() < 1e-6);
        assert!(sig.chi_square.is_none());
    }

    #[test]
    fn test_multivariate_bartlett() {
        let matrices = ErrorMatrices {
            full: array![[2.0, 0.5], [0.5, 1.0]],
            restricted: array![[4.0, 1.0], [1.0, 3.0]],
        };
        let sig = multivariate(&matrices, 3, 20, 4.0, MultivariateTest::Bartlett);
        let lambda: f64 = 1.75 / 11.0;
        let chi = -(20.0 - 1.0 - 2.5) * lambda.ln();
        assert!((sig.wilks_lambda.unwrap() - lambda).abs() < 1e-12);
        assert!((sig.chi_square.unwrap() - chi).abs() < 1e-9);
        assert!((sig.p - chi_square_upper_tail(chi, 4.0)).abs() < 1e-12);
        assert!(sig.f > 0.0);
    }

    #[test]
    fn test_multivariate_singular_restricted() {
        let matrices = ErrorMatrices {
            full: array![[0.0]],
            restricted: array![[0.0]],
        };
        let sig = multivariate(&matrices, 2, 6, 1.0, MultivariateTest::Rao);
        assert_eq!(sig.degeneracy, Some(Degeneracy::SingularRestrictedModel));
        assert_eq!(sig.f, 0.0);
        assert_eq!(sig.p, 1.0);
    }

    #[test]
    fn test_error_matrix_traces() {
        let matrices = ErrorMatrices {
            full: array![[2.0, 0.0], [0.0, 4.0]],
            restricted: array![[4.0, 0.0], [0.0, 5.0]],
        };
        assert!((matrices.wilks_lambda().unwrap() - 0.4).abs() < 1e-12);
        // H = diag(2, 1): tr(H ER⁻¹) = 2/4 + 1/5
        assert!((matrices.pillai_trace().unwrap() - 0.7).abs() < 1e-12);
        // tr(H EF⁻¹) = 2/2 + 1/4
        assert!((matrices.hotelling_lawley_trace().unwrap() - 1.25).abs() < 1e-12);

        let singular = ErrorMatrices {
            full: array![[1.0, 1.0], [1.0, 1.0]],
            restricted: array![[2.0, 1.0], [1.0, 2.0]],
        };
        assert!(singular.hotelling_lawley_trace().is_none());
        assert!(singular.pillai_trace().is_some());
    }

    #[test]
    fn test_f_value_multivariate() {
        let er = array![[3.375]];
        let ef = array![[3.25]];
        let f = f_value_multivariate(&er, &ef, 1.0, 2.0);
        assert!((f - 1.0 / 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_degrees_of_freedom() {
        assert_eq!(numerator_df([2, 3]), 2.0);
        assert_eq!(numerator_df([4]), 3.0);
        assert_eq!(numerator_df(std::iter::empty()), 1.0);
        assert_eq!(between_denominator_df(12, 3), 9.0);
        assert_eq!(within_denominator_df(12, 1, 9.0), 3.0);
    }
}
