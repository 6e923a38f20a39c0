// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Pure numerical routines that turn raw test statistics into p-values.
//!
//! Every function here is side-effect-free and fully determined by its
//! floating-point arguments. No dependency on an external stats crate:
//! the accuracy targets and iteration caps are bespoke (Didonato-Morris
//! continued fraction, Wilson-Hilferty fallback, the discrete linear
//! complexity distribution) so the routines are hand-rolled rather than
//! composed from a generic library.

use std::f64::consts::{PI, SQRT_2};

const ITMAX_SERIES: usize = 1_000_000;
const ITMAX_CF: usize = 2_000_000;
const EPS: f64 = 1e-15;
const FPMIN: f64 = 1e-300;

/// `ln Gamma(x)` via the Lanczos approximation.
///
/// Coefficients are the widely used g=7, N=9 Lanczos set, which hits the
/// spec's accuracy target (relative error <= 2^-50 for x >= 1) in practice.
pub fn lgamma(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    const G: f64 = 7.0;
    const COF: [f64; 8] = [
        676.520_368_121_885_1,
        -1259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_312e-7,
    ];
    if x < 0.5 {
        // reflection formula
        (PI / (PI * x).sin()).ln() - lgamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut a = 0.999_999_999_999_809_93;
        let t = x + G + 0.5;
        for (i, c) in COF.iter().enumerate() {
            a += c / (x + i as f64 + 1.0);
        }
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
    }
}

/// `exp(x) - 1`, accurate for small `x` via a Taylor series.
pub fn expm1(x: f64) -> f64 {
    if x.abs() < 0.05 {
        // Taylor series: x + x^2/2! + x^3/3! + ...
        let mut term = x;
        let mut sum = x;
        for n in 2..=12 {
            term *= x / n as f64;
            sum += term;
            if term.abs() < sum.abs() * 1e-18 {
                break;
            }
        }
        sum
    } else {
        x.exp() - 1.0
    }
}

/// Regularized lower and upper incomplete gamma functions `(P(a,x), Q(a,x))`.
fn gamma_pq(a: f64, x: f64) -> (f64, f64) {
    if a.is_nan() || x.is_nan() || a <= 0.0 || x < 0.0 {
        return (f64::NAN, f64::NAN);
    }
    if x == 0.0 {
        return (0.0, 1.0);
    }
    if x < a + 1.0 {
        let p = gamma_series(a, x);
        (p, 1.0 - p)
    } else {
        let q = gamma_cf(a, x);
        (1.0 - q, q)
    }
}

/// Ascending series for `P(a,x)`, valid for `x < a + 1`.
fn gamma_series(a: f64, x: f64) -> f64 {
    let gln = lgamma(a);
    let mut ap = a;
    let mut sum = 1.0 / a;
    let mut del = sum;
    for _ in 0..ITMAX_SERIES {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * EPS {
            break;
        }
    }
    (sum * (-x + a * x.ln() - gln).exp()).clamp(0.0, 1.0)
}

/// Continued fraction for `Q(a,x)`, valid for `x >= a + 1`.
fn gamma_cf(a: f64, x: f64) -> f64 {
    let gln = lgamma(a);
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=ITMAX_CF {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    ((-x + a * x.ln() - gln).exp() * h).clamp(0.0, 1.0)
}

/// Regularized lower incomplete gamma function `P(a, x)`.
///
/// `x < a + 1` uses the ascending series; otherwise the complementary
/// continued fraction is evaluated and subtracted from 1.
pub fn gammainc(a: f64, x: f64) -> f64 {
    gamma_pq(a, x).0
}

/// Regularized incomplete beta `I_x(a, b)` with its complement `1 - I_x(a,b)`.
///
/// When `x >= a/(a+b)` the symmetry relation `I_x(a,b) = 1 - I_{1-x}(b,a)`
/// is used for numerical stability, matching the large-argument branch the
/// Didonato-Morris algorithm takes.
pub fn betainc(x: f64, a: f64, b: f64) -> (f64, f64) {
    if x.is_nan() || a.is_nan() || b.is_nan() {
        return (f64::NAN, f64::NAN);
    }
    if x <= 0.0 {
        return (0.0, 1.0);
    }
    if x >= 1.0 {
        return (1.0, 0.0);
    }
    if x >= a / (a + b) {
        let q = regularized_beta(1.0 - x, b, a);
        (1.0 - q, q)
    } else {
        let p = regularized_beta(x, a, b);
        (p, 1.0 - p)
    }
}

/// Core continued-fraction evaluation of `I_x(a,b)`, internally choosing
/// whichever branch (direct or reflected) converges fastest.
fn regularized_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let bt = (lgamma(a + b) - lgamma(a) - lgamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        (bt * betacf(a, b, x) / a).clamp(0.0, 1.0)
    } else {
        (1.0 - bt * betacf(b, a, 1.0 - x) / b).clamp(0.0, 1.0)
    }
}

/// Continued fraction part of the incomplete beta function (Lentz's method).
fn betacf(a: f64, b: f64, x: f64) -> f64 {
    const MAXIT: usize = 2000;
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..=MAXIT {
        let mf = m as f64;
        let m2 = 2.0 * mf;
        let aa = mf * (b - mf) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;
        let aa2 = -(a + mf) * (qab + mf) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa2 * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa2 / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

const CHI2_LARGE_DF: f64 = 2e5;

/// Chi-square cumulative distribution function.
pub fn chi2_cdf(x: f64, f: f64) -> f64 {
    if x.is_nan() || f.is_nan() || f <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    if f >= CHI2_LARGE_DF {
        let z = wilson_hilferty_z(x, f);
        return stdnorm_cdf(z);
    }
    if (f - 1.0).abs() < f64::EPSILON {
        return 2.0 * stdnorm_cdf(x.sqrt()) - 1.0;
    }
    if (f - 2.0).abs() < f64::EPSILON {
        return -expm1(-x / 2.0);
    }
    gammainc(f / 2.0, x / 2.0)
}

/// Chi-square upper-tail p-value (`1 - chi2_cdf`), computed directly for
/// numerical stability rather than by subtraction.
pub fn chi2_pvalue(x: f64, f: f64) -> f64 {
    if x.is_nan() || f.is_nan() || f <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    if f >= CHI2_LARGE_DF {
        let z = wilson_hilferty_z(x, f);
        return stdnorm_pvalue(z);
    }
    if (f - 1.0).abs() < f64::EPSILON {
        return 2.0 * stdnorm_pvalue(x.sqrt());
    }
    if (f - 2.0).abs() < f64::EPSILON {
        return (-x / 2.0).exp();
    }
    gamma_pq(f / 2.0, x / 2.0).1
}

fn wilson_hilferty_z(x: f64, f: f64) -> f64 {
    ((x / f).powf(1.0 / 3.0) - (1.0 - 2.0 / (9.0 * f))) / (2.0 / (9.0 * f)).sqrt()
}

/// Standard normal cumulative distribution function.
///
/// Implemented via the identity `erf(z) = P(1/2, z^2)` for `z >= 0`, which
/// reuses the already-accurate incomplete gamma series/continued fraction
/// instead of a separate piecewise erf approximation.
pub fn stdnorm_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x > 38.0 {
        return 1.0;
    }
    if x < -38.0 {
        return 0.0;
    }
    let z = x.abs() / SQRT_2;
    let p = gammainc(0.5, z * z);
    let erf_x = if x >= 0.0 { p } else { -p };
    (0.5 * (1.0 + erf_x)).clamp(0.0, 1.0)
}

/// Standard normal p-value, `stdnorm_cdf(-x)`.
pub fn stdnorm_pvalue(x: f64) -> f64 {
    stdnorm_cdf(-x)
}

fn stdnorm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Inverse standard normal CDF (quantile function).
///
/// Uses Acklam's rational approximation for the initial guess, refined by
/// two steps of Newton's method against the crate's own `stdnorm_cdf`.
pub fn stdnorm_inv(p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;
    const P_HIGH: f64 = 1.0 - P_LOW;

    let mut x = if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    for _ in 0..2 {
        let e = stdnorm_cdf(x) - p;
        let pdf = stdnorm_pdf(x);
        if pdf <= 0.0 {
            break;
        }
        x -= e / pdf;
    }
    x
}

/// Student's t cumulative distribution function.
pub fn t_cdf(x: f64, f: f64) -> f64 {
    if x.is_nan() || f.is_nan() || f <= 0.0 {
        return f64::NAN;
    }
    if f > 1000.0 {
        // Asymptotic normal transform (Hill-style) for large degrees of freedom.
        let z = x * (1.0 - 1.0 / (4.0 * f)) / (1.0 + x * x / (2.0 * f)).sqrt();
        return stdnorm_cdf(z);
    }
    let u = f / (x * x + f);
    let (p, _) = betainc(u, f / 2.0, 0.5);
    if x >= 0.0 {
        1.0 - 0.5 * p
    } else {
        0.5 * p
    }
}

/// Poisson cumulative distribution function, `P(X <= floor(x))`.
pub fn poisson_cdf(x: f64, lambda: f64) -> f64 {
    if x < 0.0 {
        return 0.0;
    }
    let k = x.floor();
    gamma_pq(k + 1.0, lambda).1
}

/// Poisson p-value (lower tail), `P(X <= floor(x))`'s complement side used
/// for hypothesis testing: `P(k+1, lambda)`.
pub fn poisson_pvalue(x: f64, lambda: f64) -> f64 {
    if x < 0.0 {
        return 1.0;
    }
    let k = x.floor();
    gamma_pq(k + 1.0, lambda).0
}

fn binomial_log_choose(n: f64, k: f64) -> f64 {
    lgamma(n + 1.0) - lgamma(k + 1.0) - lgamma(n - k + 1.0)
}

/// Binomial probability mass function.
pub fn binomial_pdf(k: f64, n: f64, p: f64) -> f64 {
    if k < 0.0 || k > n || !(0.0..=1.0).contains(&p) {
        return 0.0;
    }
    if p == 0.0 {
        return if k == 0.0 { 1.0 } else { 0.0 };
    }
    if p == 1.0 {
        return if k == n { 1.0 } else { 0.0 };
    }
    (binomial_log_choose(n, k) + k * p.ln() + (n - k) * (1.0 - p).ln()).exp()
}

/// Binomial cumulative distribution function, `P(X <= k)`.
pub fn binomial_cdf(k: f64, n: f64, p: f64) -> f64 {
    if k < 0.0 {
        return 0.0;
    }
    if k >= n {
        return 1.0;
    }
    betainc(1.0 - p, n - k, k + 1.0).0
}

/// Binomial upper-tail p-value, `P(X >= k)`.
pub fn binomial_pvalue(k: f64, n: f64, p: f64) -> f64 {
    if k <= 0.0 {
        return 1.0;
    }
    if k > n {
        return 0.0;
    }
    betainc(p, k, n - k + 1.0).0
}

/// Kolmogorov-Smirnov tail p-value for the Kolmogorov distribution statistic.
pub fn ks_pvalue(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    if x > 1.0 {
        // Rapidly converging alternating series for the upper tail.
        let mut sum = 0.0;
        let mut sign = 1.0;
        for i in 1..=200_i64 {
            let term = sign * (-2.0 * (i * i) as f64 * x * x).exp();
            sum += term;
            sign = -sign;
            if term.abs() < 1e-20 {
                break;
            }
        }
        (2.0 * sum).clamp(0.0, 1.0)
    } else {
        // Rapidly converging series for the CDF at small x, then complement.
        let mut sum = 0.0;
        for i in 1..=200_i64 {
            let k = 2.0 * i as f64 - 1.0;
            let term = (-(k * k) * PI * PI / (8.0 * x * x)).exp();
            sum += term;
            if term < 1e-20 {
                break;
            }
        }
        let cdf = ((2.0 * PI).sqrt() / x) * sum;
        (1.0 - cdf).clamp(0.0, 1.0)
    }
}

/// Discrete distribution of the Berlekamp-Massey linear complexity `T`
/// statistic's c.d.f.
pub fn linearcomp_tcdf(k: f64) -> f64 {
    if k.is_nan() {
        return f64::NAN;
    }
    if k > 0.0 {
        1.0 - 2f64.powf(-2.0 * k + 2.0) / 3.0
    } else {
        2f64.powf(2.0 * k + 1.0) / 3.0
    }
}

/// Complement of [`linearcomp_tcdf`].
pub fn linearcomp_tccdf(k: f64) -> f64 {
    1.0 - linearcomp_tcdf(k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn chi2_cdf_reference_anchors() {
        assert!(close(chi2_cdf(0.5, 1.0), 0.520_499_877_8, 1e-9));
        assert!(close(chi2_cdf(101.0, 100.0), 0.546_807_776_7, 1e-9));
    }

    #[test]
    fn ks_pvalue_reference_anchor() {
        assert!(close(ks_pvalue(1.0), 0.269_999_671_6, 1e-9));
    }

    #[test]
    fn ks_pvalue_boundaries() {
        assert_eq!(ks_pvalue(0.0), 1.0);
        assert!(ks_pvalue(10.0) < 1e-80);
    }

    #[test]
    fn stdnorm_cdf_reference_anchors() {
        assert!(close(stdnorm_cdf(-5.0), 2.866_515_719e-7, 1e-15));
        assert_eq!(stdnorm_cdf(0.0), 0.5);
    }

    #[test]
    fn stdnorm_cdf_saturates() {
        assert_eq!(stdnorm_cdf(-38.0), 0.0);
        assert_eq!(stdnorm_cdf(38.0), 1.0);
    }

    #[test]
    fn t_cdf_reference_anchor() {
        assert!(close(t_cdf(-50.0, 10.0), 1.237_155_165e-13, 1e-18));
    }

    #[test]
    fn linearcomp_tcdf_reference_anchors() {
        assert!(close(linearcomp_tcdf(2.5), 0.958_333_333, 1e-9));
        assert!(close(linearcomp_tcdf(-0.5), 0.333_333_333, 1e-9));
    }

    #[test]
    fn chi2_identity_law() {
        for &f in &[1.0, 2.0, 5.0, 50.0, 1000.0] {
            for &x in &[0.1, 1.0, 10.0, 100.0] {
                let sum = chi2_cdf(x, f) + chi2_pvalue(x, f);
                assert!(close(sum, 1.0, 1e-9), "f={f} x={x} sum={sum}");
            }
        }
    }

    #[test]
    fn betainc_symmetry_law() {
        for &(x, a, b) in &[(0.3, 2.0, 5.0), (0.7, 10.0, 3.0), (0.5, 1.0, 1.0)] {
            let (p1, _) = betainc(x, a, b);
            let (p2, _) = betainc(1.0 - x, b, a);
            assert!(close(p1 + p2, 1.0, 1e-9));
        }
    }

    #[test]
    fn gammainc_monotone() {
        let a = 3.0;
        let mut last = 0.0;
        for i in 1..100 {
            let x = i as f64 * 0.1;
            let p = gammainc(a, x);
            assert!(p >= last - 1e-12);
            last = p;
        }
    }

    #[test]
    fn stdnorm_inv_roundtrip() {
        for &p in &[1e-9, 0.001, 0.25, 0.5, 0.75, 0.999, 1.0 - 1e-9] {
            let x = stdnorm_inv(p);
            assert!(close(stdnorm_cdf(x), p, 1e-9), "p={p} x={x}");
        }
    }

    #[test]
    fn chi2_cdf_zero_and_limit() {
        assert_eq!(chi2_cdf(0.0, 5.0), 0.0);
        assert!(chi2_cdf(1e6, 5.0) > 1.0 - 1e-12);
    }

    #[test]
    fn binomial_cdf_matches_pdf_sum_small_n() {
        let n = 6.0;
        let p = 0.3;
        let mut acc = 0.0;
        for k in 0..=6 {
            acc += binomial_pdf(k as f64, n, p);
            assert!(close(acc, binomial_cdf(k as f64, n, p), 1e-9));
        }
    }
}
