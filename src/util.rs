pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let data_mean = mean(data)?;
    let variance = data
        .iter()
        .map(|value| {
            let diff = data_mean - *value;

            diff * diff
        })
        .sum::<f64>()
        / data.len() as f64;

    Some(variance.sqrt())
}

/// Largest value, ignoring NaNs
pub fn max(data: &[f64]) -> Option<f64> {
    data.iter().copied().filter(|v| !v.is_nan()).reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[0.25, 0.5, 0.75]), Some(0.5));
        assert_eq!(mean(&[4.0, 8.0]), Some(6.0));
    }

    #[test]
    fn test_mean_empty_slice() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), Some(2.0));
    }

    #[test]
    fn test_std_dev_single_value() {
        assert_eq!(std_dev(&[0.3]), Some(0.0));
    }

    #[test]
    fn test_std_dev_empty_slice() {
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn test_max() {
        assert_eq!(max(&[0.1, 0.7, 0.3]), Some(0.7));
        assert_eq!(max(&[f64::NAN, 0.2]), Some(0.2));
        assert_eq!(max(&[]), None);
    }
}
