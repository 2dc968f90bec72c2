//! Scalar statistical collaborators.
//!
//! Provides the distribution functions the ANOVA engine consumes:
//! - Log gamma function (Lanczos approximation)
//! - Regularized incomplete beta and gamma functions
//! - F- and chi-square right-tail probabilities
//! - Harmonic mean
//! - A classical one-way ANOVA used as an independent cross-check

use std::f64::consts::PI;

/// Log gamma function using Lanczos approximation.
///
/// More accurate than Stirling's formula for small values.
///
/// # Arguments
/// * `x` - Input value (must be positive)
///
/// # Returns
/// * ln(Gamma(x))
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::INFINITY;
    }

    // Lanczos approximation coefficients (g=7)
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection keeps the series in its accurate range
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, &c) in COEFFICIENTS.iter().enumerate().skip(1) {
        sum += c / (x + i as f64);
    }

    let t = x + G + 0.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}

/// Regularized incomplete beta function I_x(a, b).
///
/// Uses continued fraction expansion (modified Lentz) for numerical stability.
///
/// # Arguments
/// * `x` - Integration bound (0 <= x <= 1)
/// * `a` - First shape parameter (> 0)
/// * `b` - Second shape parameter (> 0)
///
/// # Returns
/// * I_x(a, b) = integral from 0 to x of t^(a-1) * (1-t)^(b-1) dt / B(a,b)
#[must_use]
pub fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // Use symmetry relation for better convergence
    if x > (a + 1.0) / (a + b + 2.0) {
        return 1.0 - regularized_incomplete_beta(1.0 - x, b, a);
    }

    let ln_beta = ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b);
    let front = (x.ln() * a + (1.0 - x).ln() * b - ln_beta).exp() / a;

    // Continued fraction expansion (Lentz's algorithm)
    let mut f = 1.0;
    let mut c = 1.0;
    let mut d = 0.0;
    const EPSILON: f64 = 1e-30;
    const TOLERANCE: f64 = 1e-14;
    const MAX_ITERATIONS: usize = 300;

    for m in 0..MAX_ITERATIONS {
        let m_f = m as f64;

        // Even step: a_{2m}
        let numerator = if m == 0 {
            1.0
        } else {
            (m_f * (b - m_f) * x) / ((a + 2.0 * m_f - 1.0) * (a + 2.0 * m_f))
        };

        d = 1.0 + numerator * d;
        if d.abs() < EPSILON {
            d = EPSILON;
        }
        d = 1.0 / d;

        c = 1.0 + numerator / c;
        if c.abs() < EPSILON {
            c = EPSILON;
        }

        f *= d * c;

        // Odd step: a_{2m+1}
        let numerator =
            -((a + m_f) * (a + b + m_f) * x) / ((a + 2.0 * m_f) * (a + 2.0 * m_f + 1.0));

        d = 1.0 + numerator * d;
        if d.abs() < EPSILON {
            d = EPSILON;
        }
        d = 1.0 / d;

        c = 1.0 + numerator / c;
        if c.abs() < EPSILON {
            c = EPSILON;
        }

        let delta = d * c;
        f *= delta;

        if (delta - 1.0).abs() < TOLERANCE {
            break;
        }
    }

    // The leading "1 +" of the fraction is folded into f
    front * (f - 1.0)
}

/// Regularized upper incomplete gamma function Q(a, x) = Γ(a, x) / Γ(a).
///
/// Series expansion below `x = a + 1`, continued fraction above it.
#[must_use]
pub fn regularized_gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 || a <= 0.0 {
        return 1.0;
    }

    const EPSILON: f64 = 1e-300;
    const TOLERANCE: f64 = 1e-15;
    const MAX_ITERATIONS: usize = 500;

    let ln_prefix = -x + a * x.ln() - ln_gamma(a);

    if x < a + 1.0 {
        // P(a, x) by series, Q = 1 - P
        let mut term = 1.0 / a;
        let mut sum = term;
        let mut ap = a;
        for _ in 0..MAX_ITERATIONS {
            ap += 1.0;
            term *= x / ap;
            sum += term;
            if term.abs() < sum.abs() * TOLERANCE {
                break;
            }
        }
        return (1.0 - sum * ln_prefix.exp()).clamp(0.0, 1.0);
    }

    // Q(a, x) by Lentz's continued fraction
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / EPSILON;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..MAX_ITERATIONS {
        let i_f = i as f64;
        let an = -i_f * (i_f - a);
        b += 2.0;

        d = an * d + b;
        if d.abs() < EPSILON {
            d = EPSILON;
        }
        c = b + an / c;
        if c.abs() < EPSILON {
            c = EPSILON;
        }
        d = 1.0 / d;

        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < TOLERANCE {
            break;
        }
    }

    (ln_prefix.exp() * h).clamp(0.0, 1.0)
}

/// Right-tail probability of the F-distribution, P(F > f).
///
/// Degrees of freedom are real-valued because Rao's approximation yields
/// fractional denominator df.
///
/// # Returns
/// * 1.0 when `f <= 0` or either df is not positive
#[must_use]
pub fn f_distribution_upper_tail(df_num: f64, df_den: f64, f: f64) -> f64 {
    if f.is_nan() || f <= 0.0 || df_num <= 0.0 || df_den <= 0.0 {
        return 1.0;
    }
    if f.is_infinite() {
        return 0.0;
    }

    // P(F > f) = I_x(df2/2, df1/2) where x = df2/(df2 + df1*f)
    let x = df_den / (df_den + df_num * f);
    regularized_incomplete_beta(x, df_den / 2.0, df_num / 2.0)
}

/// Right-tail probability of the chi-square distribution, P(X > x).
#[must_use]
pub fn chi_square_upper_tail(x: f64, df: f64) -> f64 {
    if x <= 0.0 || df <= 0.0 || x.is_nan() {
        return 1.0;
    }
    regularized_gamma_q(df / 2.0, x / 2.0)
}

/// Harmonic mean, `n / Σ(1/xᵢ)`.
///
/// Returns 0.0 for an empty input or when any value is zero, which the
/// engine treats as a degenerate (saturated) denominator.
///
/// # Examples
///
/// ```
/// use mixed_anova::stats::harmonic_mean;
///
/// assert!((harmonic_mean([2.0, 4.0, 4.0]) - 3.0).abs() < 1e-12);
/// assert_eq!(harmonic_mean([3.0, 0.0]), 0.0);
/// ```
pub fn harmonic_mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut n = 0usize;
    let mut reciprocal_sum = 0.0;
    for v in values {
        if v == 0.0 {
            return 0.0;
        }
        n += 1;
        reciprocal_sum += 1.0 / v;
    }
    if n == 0 || reciprocal_sum == 0.0 {
        0.0
    } else {
        n as f64 / reciprocal_sum
    }
}

/// Result of a classical one-way ANOVA.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OneWay {
    /// F statistic (0.0 when the within-groups mean square is zero).
    pub f: f64,
    /// Right-tail probability of `f`.
    pub p: f64,
    /// Between-groups degrees of freedom.
    pub df_between: usize,
    /// Within-groups degrees of freedom.
    pub df_within: usize,
}

/// One-way ANOVA over two or more groups of scores (Heiman, pp. 394-7).
///
/// Returns `None` when fewer than two groups are given or the groups hold
/// no more scores than there are groups.
#[must_use]
pub fn f_oneway(groups: &[&[f64]]) -> Option<OneWay> {
    let k = groups.len();
    let n: usize = groups.iter().map(|g| g.len()).sum();
    if k < 2 || n <= k || groups.iter().any(|g| g.is_empty()) {
        return None;
    }

    let total: f64 = groups.iter().flat_map(|g| g.iter()).sum();
    let correction = total * total / n as f64;
    let ss_total = groups
        .iter()
        .flat_map(|g| g.iter())
        .map(|v| v * v)
        .sum::<f64>()
        - correction;
    let ss_between = groups
        .iter()
        .map(|g| {
            let s: f64 = g.iter().sum();
            s * s / g.len() as f64
        })
        .sum::<f64>()
        - correction;
    let ss_within = ss_total - ss_between;

    let df_between = k - 1;
    let df_within = n - k;
    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;
    let f = if ms_within > 0.0 {
        ms_between / ms_within
    } else {
        0.0
    };

    Some(OneWay {
        f,
        p: f_distribution_upper_tail(df_between as f64, df_within as f64, f),
        df_between,
        df_within,
    })
}

/// Model-comparison F from restricted and full error sums of squares.
///
/// `F = ((ER − EF) / (dfR − dfF)) / (EF / dfF)`.
#[must_use]
pub fn f_value(er: f64, ef: f64, df_r: f64, df_f: f64) -> f64 {
    ((er - ef) / (df_r - df_f)) / (ef / df_f)
}
