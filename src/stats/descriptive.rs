//! Moment-based descriptive statistics shared by the test procedures.

use serde::Serialize;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (n - 1 denominator).
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let squares = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    Some(squares / (values.len() - 1) as f64)
}

pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Skewness and excess kurtosis from population moments. Constant data has
/// no shape and reports `(0, 0)`.
pub fn shape(values: &[f64]) -> (f64, f64) {
    let Some(mean) = mean(values) else {
        return (0.0, 0.0);
    };
    let n = values.len() as f64;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for value in values {
        let d = value - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    m2 /= n;
    m3 /= n;
    m4 /= n;
    if m2 <= f64::EPSILON {
        return (0.0, 0.0);
    }
    (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistributionShape {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub skewness: f64,
    pub excess_kurtosis: f64,
    pub normal: bool,
}

pub const SKEWNESS_LIMIT: f64 = 2.0;
pub const KURTOSIS_LIMIT: f64 = 2.0;

impl DistributionShape {
    pub fn of(values: &[f64]) -> Option<Self> {
        let mean = mean(values)?;
        let (skewness, excess_kurtosis) = shape(values);
        Some(Self {
            n: values.len(),
            mean,
            std_dev: std_dev(values).unwrap_or(0.0),
            skewness,
            excess_kurtosis,
            normal: skewness.abs() < SKEWNESS_LIMIT && excess_kurtosis.abs() < KURTOSIS_LIMIT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_uses_sample_denominator() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        let var = variance(&values).unwrap();
        assert!((var - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(variance(&[1.0]), None);
    }

    #[test]
    fn symmetric_data_has_zero_skew() {
        let (skew, _) = shape(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(skew.abs() < 1e-12);
    }

    #[test]
    fn long_right_tail_is_flagged() {
        let mut values = vec![1.0; 30];
        values.push(100.0);
        let shape = DistributionShape::of(&values).unwrap();
        assert!(shape.skewness > SKEWNESS_LIMIT);
        assert!(!shape.normal);
    }

    #[test]
    fn constant_data_has_no_shape() {
        assert_eq!(shape(&[3.0, 3.0, 3.0]), (0.0, 0.0));
    }
}
