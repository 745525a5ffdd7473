//! Statistics over ordered series of optional values.
//!
//! `None` marks an undefined observation. Windowed functions return `None` for any window
//! that is incomplete or contains an undefined observation.

/// Relative change from `previous` to `current` as a fraction (`0.05` = +5%).
///
/// Undefined when either side is undefined or `previous` is zero.
pub fn pct_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    match (previous, current) {
        (Some(previous), Some(current)) if previous != 0.0 => Some(current / previous - 1.0),
        _ => None,
    }
}

/// Period-over-period [`pct_change`] for a whole series. The first element is always `None`.
pub fn pct_change_series(values: &[Option<f64>]) -> Vec<Option<f64>> {
    std::iter::once(None)
        .chain(values.windows(2).map(|pair| pct_change(pair[0], pair[1])))
        .take(values.len())
        .collect()
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator), `None` with fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|&value| {
            let diff = value - mean;
            diff * diff
        })
        .sum::<f64>()
        / (values.len() - 1) as f64;

    Some(variance.sqrt())
}

fn rolling(
    values: &[Option<f64>],
    window: usize,
    reduce: impl Fn(&[f64]) -> Option<f64>,
) -> Vec<Option<f64>> {
    let mut output = vec![None; values.len()];
    if window == 0 {
        return output;
    }

    let mut buffer = Vec::with_capacity(window);
    for (index, chunk) in values.windows(window).enumerate() {
        buffer.clear();
        buffer.extend(chunk.iter().flatten());
        if buffer.len() == window {
            output[index + window - 1] = reduce(&buffer);
        }
    }
    output
}

/// Trailing rolling mean over `window` observations.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, mean)
}

/// Trailing rolling sample standard deviation over `window` observations.
pub fn rolling_std_dev(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, sample_std_dev)
}

/// Quantile `q` in `[0, 1]` using linear interpolation between closest ranks.
///
/// Undefined values are ignored. `None` if no defined value remains.
pub fn quantile(values: &[Option<f64>], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_change() {
        struct TestCase {
            input: (Option<f64>, Option<f64>),
            expected: Option<f64>,
        }

        let tests = vec![
            // TC0: growth
            TestCase {
                input: (Some(100.0), Some(110.0)),
                expected: Some(0.1),
            },
            // TC1: decline to zero
            TestCase {
                input: (Some(50.0), Some(0.0)),
                expected: Some(-1.0),
            },
            // TC2: zero predecessor
            TestCase {
                input: (Some(0.0), Some(10.0)),
                expected: None,
            },
            // TC3: undefined predecessor
            TestCase {
                input: (None, Some(10.0)),
                expected: None,
            },
            // TC4: undefined current
            TestCase {
                input: (Some(10.0), None),
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = pct_change(test.input.0, test.input.1);
            match (actual, test.expected) {
                (Some(actual), Some(expected)) => {
                    assert!((actual - expected).abs() < 1e-12, "TC{} failed", index)
                }
                (actual, expected) => assert_eq!(actual, expected, "TC{} failed", index),
            }
        }
    }

    #[test]
    fn test_pct_change_series_first_is_none() {
        assert!(pct_change_series(&[]).is_empty());
        assert_eq!(pct_change_series(&[Some(5.0)]), vec![None]);

        let series = pct_change_series(&[Some(2.0), Some(3.0), Some(0.0), Some(1.0)]);
        assert_eq!(series.len(), 4);
        assert_eq!(series[0], None);
        assert_eq!(series[1], Some(0.5));
        assert_eq!(series[2], Some(-1.0));
        assert_eq!(series[3], None);
    }

    #[test]
    fn test_sample_std_dev() {
        let std = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.138089935).abs() < 1e-6);
        assert_eq!(sample_std_dev(&[1.0]), None);
        assert_eq!(sample_std_dev(&[3.0, 3.0, 3.0]), Some(0.0));
    }

    #[test]
    fn test_rolling_std_dev_requires_full_window() {
        let values: Vec<Option<f64>> = (1..=6).map(|v| Some(v as f64)).collect();
        let rolled = rolling_std_dev(&values, 5);

        assert!(rolled[..4].iter().all(Option::is_none));
        assert!((rolled[4].unwrap() - 1.5811388300841898).abs() < 1e-12);
        assert!((rolled[5].unwrap() - 1.5811388300841898).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_skips_windows_with_gaps() {
        let values = vec![Some(1.0), None, Some(3.0), Some(5.0), Some(7.0)];
        let rolled = rolling_mean(&values, 3);
        assert_eq!(rolled, vec![None, None, None, None, Some(5.0)]);

        assert_eq!(rolling_mean(&values[..2], 3), vec![None, None]);
        assert_eq!(rolling_mean(&values, 0), vec![None; 5]);
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        let values = vec![Some(4.0), None, Some(1.0), Some(3.0), Some(2.0)];
        assert_eq!(quantile(&values, 0.75), Some(3.25));
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 1.0), Some(4.0));
        assert_eq!(quantile(&[None, None], 0.5), None);
        assert_eq!(quantile(&values, 1.5), None);
    }
}
