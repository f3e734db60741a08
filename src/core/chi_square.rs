//! Chi-square goodness-of-fit test
//!
//! p-value is the chi-square survival function, computed as the regularized
//! upper incomplete gamma Q(dof/2, statistic/2).

use crate::types::ChiSquareResult;

const MAX_ITERATIONS: usize = 500;
const EPSILON: f64 = 1e-14;
const FP_MIN: f64 = 1e-300;

/// Goodness-of-fit of `observed` against `expected` (same label order).
///
/// - categories where both counts are zero are dropped
/// - expected counts are rescaled to the observed total
/// - an empty expected category with observed mass gives an infinite statistic
/// - fewer than two categories left: statistic 0, p = 1
pub fn chi_square_test(observed: &[f64], expected: &[f64]) -> ChiSquareResult {
    let pairs: Vec<(f64, f64)> = observed
        .iter()
        .zip(expected)
        .map(|(o, e)| (*o, *e))
        .filter(|(o, e)| *o > 0.0 || *e > 0.0)
        .collect();

    if pairs.len() < 2 {
        return ChiSquareResult {
            statistic: 0.0,
            p_value: 1.0,
            degrees_of_freedom: 0,
        };
    }
    let dof = pairs.len() - 1;

    let observed_total: f64 = pairs.iter().map(|(o, _)| o).sum();
    let expected_total: f64 = pairs.iter().map(|(_, e)| e).sum();
    let scale = if expected_total > 0.0 {
        observed_total / expected_total
    } else {
        0.0
    };

    let mut statistic = 0.0;
    for (o, e) in pairs {
        let e = e * scale;
        if e <= 0.0 {
            if o > 0.0 {
                return ChiSquareResult {
                    statistic: f64::INFINITY,
                    p_value: 0.0,
                    degrees_of_freedom: dof,
                };
            }
            continue;
        }
        statistic += (o - e).powi(2) / e;
    }

    ChiSquareResult {
        statistic,
        p_value: chi_square_sf(statistic, dof),
        degrees_of_freedom: dof,
    }
}

/// P(X >= x) for X ~ chi-square(dof)
pub fn chi_square_sf(x: f64, dof: usize) -> f64 {
    if dof == 0 || x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    regularized_gamma_q(dof as f64 / 2.0, x / 2.0).clamp(0.0, 1.0)
}

fn regularized_gamma_q(a: f64, x: f64) -> f64 {
    if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_continued_fraction(a, x)
    }
}

/// Lower regularized gamma by series expansion (x < a + 1)
fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    for _ in 0..MAX_ITERATIONS {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * EPSILON {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Upper regularized gamma by modified Lentz continued fraction (x >= a + 1)
fn gamma_q_continued_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FP_MIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=MAX_ITERATIONS {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FP_MIN {
            d = FP_MIN;
        }
        c = b + an / c;
        if c.abs() < FP_MIN {
            c = FP_MIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPSILON {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// ln Γ(x) for x > 0 (Lanczos approximation)
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.001_208_650_973_866_179,
        -0.000_005_395_239_384_953,
    ];
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut y = x;
    let mut series = 1.000_000_000_190_015;
    for c in COEFFS {
        y += 1.0;
        series += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * series / x).ln()
}

// =============================================================================
// TESTS
// =============================================================================
