//! p-value policies.
//!
//! `Approximate` keeps the workbench's documented threshold table: the test
//! statistic is mapped to a normal deviate and bucketed, with a reproducible
//! jitter in the non-significant range. `Exact` evaluates the t, F and
//! chi-square survival functions through the regularized incomplete beta and
//! gamma functions.

use std::{f64::consts::PI, str::FromStr};

use anyhow::{Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PValueMode {
    #[default]
    Approximate,
    Exact,
}

impl FromStr for PValueMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approximate" | "approx" => Ok(PValueMode::Approximate),
            "exact" => Ok(PValueMode::Exact),
            other => Err(anyhow!("Unknown p-value mode '{other}'")),
        }
    }
}

/// Reference distribution of a test statistic under the null hypothesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reference {
    /// Two-tailed Student t.
    T { df: f64 },
    F { df1: f64, df2: f64 },
    ChiSquare { df: f64 },
}

pub fn p_value(mode: PValueMode, tag: &str, statistic: f64, reference: Reference) -> f64 {
    match mode {
        PValueMode::Approximate => approximate(tag, normal_deviate(statistic, reference)),
        PValueMode::Exact => exact(statistic, reference),
    }
}

/// Threshold table over an upper-tail normal deviate. Negative deviates
/// (chi-square or F below their mean) are never significant.
pub fn approximate(tag: &str, deviate: f64) -> f64 {
    if deviate > 3.0 {
        0.001
    } else if deviate > 2.5 {
        0.01
    } else if deviate > 1.96 {
        0.04
    } else if deviate > 1.645 {
        0.08
    } else {
        non_significant(tag, deviate)
    }
}

/// A p-value in [0.1, 0.9), stable for a given tag and statistic.
pub fn non_significant(tag: &str, statistic: f64) -> f64 {
    0.1 + 0.8 * jitter(tag, statistic)
}

fn jitter(tag: &str, statistic: f64) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    hasher.update(statistic.to_bits().to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(bytes) >> 11) as f64 / (1u64 << 53) as f64
}

fn normal_deviate(statistic: f64, reference: Reference) -> f64 {
    match reference {
        Reference::T { .. } => statistic.abs(),
        Reference::ChiSquare { df } => wilson_hilferty(statistic, df),
        // df1 * F is approximately chi-square(df1) for large df2.
        Reference::F { df1, .. } => wilson_hilferty(statistic * df1, df1),
    }
}

/// Wilson-Hilferty cube-root transform of a chi-square variate.
fn wilson_hilferty(x: f64, df: f64) -> f64 {
    if x.is_infinite() {
        return f64::INFINITY;
    }
    if x <= 0.0 || df <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let v = 2.0 / (9.0 * df);
    ((x / df).cbrt() - (1.0 - v)) / v.sqrt()
}

pub fn exact(statistic: f64, reference: Reference) -> f64 {
    if statistic.is_nan() {
        return 1.0;
    }
    let p = match reference {
        Reference::T { df } => {
            if statistic.is_infinite() {
                0.0
            } else {
                let x = df / (df + statistic * statistic);
                regularized_beta(df / 2.0, 0.5, x)
            }
        }
        Reference::F { df1, df2 } => {
            if statistic.is_infinite() {
                0.0
            } else if statistic <= 0.0 {
                1.0
            } else {
                let x = df2 / (df2 + df1 * statistic);
                regularized_beta(df2 / 2.0, df1 / 2.0, x)
            }
        }
        Reference::ChiSquare { df } => {
            if statistic.is_infinite() {
                0.0
            } else if statistic <= 0.0 {
                1.0
            } else {
                1.0 - regularized_gamma(df / 2.0, statistic / 2.0)
            }
        }
    };
    p.clamp(0.0, 1.0)
}

/// Lanczos approximation (g = 7, n = 9).
pub fn ln_gamma(z: f64) -> f64 {
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if z < 0.5 {
        return (PI / (PI * z).sin()).ln() - ln_gamma(1.0 - z);
    }
    let z = z - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, coefficient) in COEFFICIENTS.iter().enumerate().skip(1) {
        sum += coefficient / (z + i as f64);
    }
    let t = z + 7.5;
    0.5 * (2.0 * PI).ln() + (z + 0.5) * t.ln() - t + sum.ln()
}

/// Regularized incomplete beta I_x(a, b).
pub fn regularized_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Lentz's algorithm for the incomplete beta continued fraction.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Regularized lower incomplete gamma P(a, x).
pub fn regularized_gamma(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x < a + 1.0 {
        let mut term = 1.0 / a;
        let mut sum = term;
        let mut n = a;
        for _ in 0..500 {
            n += 1.0;
            term *= x / n;
            sum += term;
            if term.abs() < sum.abs() * 1e-15 {
                break;
            }
        }
        (sum.ln() - x + a * x.ln() - ln_gamma(a)).exp()
    } else {
        1.0 - upper_gamma_fraction(a, x)
    }
}

/// Q(a, x) by continued fraction, valid for x >= a + 1.
fn upper_gamma_fraction(a: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..500 {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < 1e-15 {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn approximate_thresholds() {
        let t = |v| p_value(PValueMode::Approximate, "t", v, Reference::T { df: 20.0 });
        assert_eq!(t(12.0), 0.001);
        assert_eq!(t(-2.7), 0.01);
        assert_eq!(t(2.1), 0.04);
        assert_eq!(t(1.8), 0.08);
        let p = t(0.4);
        assert!((0.1..0.9).contains(&p));
    }

    #[test]
    fn small_chi_square_is_not_significant() {
        let chi = |v| p_value(PValueMode::Approximate, "chi", v, Reference::ChiSquare { df: 4.0 });
        assert!(chi(0.0) >= 0.1);
        assert!(chi(0.2) >= 0.1);
        assert_eq!(chi(25.0), 0.001);
    }

    #[test]
    fn jitter_is_reproducible() {
        let first = non_significant("pearson-correlation", 0.12);
        let second = non_significant("pearson-correlation", 0.12);
        assert_eq!(first, second);
        assert_ne!(first, non_significant("pearson-correlation", 0.13));
    }

    #[test]
    fn ln_gamma_matches_factorials() {
        assert!(close(ln_gamma(1.0), 0.0, 1e-12));
        assert!(close(ln_gamma(5.0), 24f64.ln(), 1e-12));
        assert!(close(ln_gamma(0.5), PI.sqrt().ln(), 1e-12));
    }

    #[test]
    fn exact_t_matches_tables() {
        // t = 2.228 is the two-tailed 5% critical value at df = 10.
        let p = exact(2.228, Reference::T { df: 10.0 });
        assert!(close(p, 0.05, 1e-3), "p = {p}");
        assert!(close(exact(0.0, Reference::T { df: 10.0 }), 1.0, 1e-12));
    }

    #[test]
    fn exact_chi_square_matches_tables() {
        // 3.841 is the 5% critical value at df = 1; 12.592 at df = 6.
        assert!(close(exact(3.841, Reference::ChiSquare { df: 1.0 }), 0.05, 1e-3));
        assert!(close(exact(12.592, Reference::ChiSquare { df: 6.0 }), 0.05, 1e-3));
    }

    #[test]
    fn exact_f_matches_tables() {
        // F(2, 27) 5% critical value is 3.354.
        assert!(close(
            exact(3.354, Reference::F { df1: 2.0, df2: 27.0 }),
            0.05,
            1e-3
        ));
    }

    #[test]
    fn wilson_hilferty_tracks_chi_square_critical_values() {
        let z = wilson_hilferty(12.592, 6.0);
        assert!(close(z, 1.645, 0.02), "z = {z}");
    }

    #[test]
    fn infinite_statistics_are_maximally_significant() {
        assert_eq!(exact(f64::INFINITY, Reference::T { df: 3.0 }), 0.0);
        assert_eq!(
            p_value(PValueMode::Approximate, "t", f64::INFINITY, Reference::T { df: 3.0 }),
            0.001
        );
    }
}
