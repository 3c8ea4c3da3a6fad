use crate::analysis::types::Threshold;

/// Arithmetic mean; `NaN` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`); `NaN` for an empty slice
pub fn std_dev(values: &[f64]) -> f64 {
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Two-pass batch threshold over the full series
pub fn threshold(scores: &[f64], deviation_multiplier: f64) -> Threshold {
    let mean = mean(scores);
    let std_dev = std_dev(scores);
    Threshold {
        mean,
        std_dev,
        deviation_multiplier,
        value: mean + deviation_multiplier * std_dev,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert_eq!(std_dev(&values), 2.0);
    }

    #[test]
    fn test_threshold_combines_mean_and_deviation() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let t = threshold(&values, 1.5);
        assert_eq!(t.value, 8.0);
        assert_eq!(t.deviation_multiplier, 1.5);
    }

    #[test]
    fn test_constant_series_threshold_is_the_constant() {
        let t = threshold(&[3.0; 10], 2.0);
        assert_eq!(t.std_dev, 0.0);
        assert_eq!(t.value, 3.0);
    }

    #[test]
    fn test_empty_series_is_nan() {
        assert!(threshold(&[], 1.0).value.is_nan());
    }
}
