//! Per-topic views of the full-history series, replaced wholesale on every run.

use crate::{feature::FeatureEngine, feature::FeatureRow, stats::quantile};
use chrono::{DateTime, Utc};
use itertools::izip;
use serde::{Deserialize, Serialize};

/// Quantile of `price_volatility` above which a bucket is flagged as high volatility.
pub const HIGH_VOLATILITY_QUANTILE: f64 = 0.75;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GrowthRow {
    pub event_time: DateTime<Utc>,
    pub revenue_growth_pct: Option<f64>,
    pub volume_growth_pct: Option<f64>,
    /// Growth momentum, see [`FeatureEngine::momentum`].
    pub revenue_growth_pct_ma: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskRow {
    pub event_time: DateTime<Utc>,
    pub price_volatility: Option<f64>,
    pub order_imbalance: i64,
    pub high_volatility_flag: bool,
}

pub fn growth_metrics(engine: &FeatureEngine, rows: &[FeatureRow]) -> Vec<GrowthRow> {
    izip!(rows, engine.momentum(rows))
        .map(|(row, revenue_growth_pct_ma)| GrowthRow {
            event_time: row.event_time(),
            revenue_growth_pct: row.revenue_growth_pct,
            volume_growth_pct: row.volume_growth_pct,
            revenue_growth_pct_ma,
        })
        .collect()
}

/// Flags rows whose volatility strictly exceeds the series' upper quartile. Undefined
/// volatility is never flagged.
pub fn risk_metrics(rows: &[FeatureRow]) -> Vec<RiskRow> {
    let volatility: Vec<Option<f64>> = rows.iter().map(|row| row.price_volatility).collect();
    let threshold = quantile(&volatility, HIGH_VOLATILITY_QUANTILE);

    rows.iter()
        .map(|row| RiskRow {
            event_time: row.event_time(),
            price_volatility: row.price_volatility,
            order_imbalance: row.order_imbalance,
            high_volatility_flag: row
                .price_volatility
                .zip(threshold)
                .is_some_and(|(volatility, threshold)| volatility > threshold),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatedBucket;
    use chrono::{TimeDelta, TimeZone};

    fn feature_row(minute: i64, volatility: Option<f64>) -> FeatureRow {
        FeatureRow {
            bucket: AggregatedBucket::empty(
                Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + TimeDelta::minutes(minute),
            ),
            revenue_growth_pct: Some(minute as f64),
            volume_growth_pct: None,
            price_volatility: volatility,
            order_imbalance: minute,
        }
    }

    #[test]
    fn test_risk_flag_above_upper_quartile() {
        struct TestCase {
            input: Vec<Option<f64>>,
            expected: Vec<bool>,
        }

        let tests = vec![
            TestCase {
                // TC0: q75 of [1, 2, 3, 4, 5] is 4, only 5 exceeds it
                input: vec![None, Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
                expected: vec![false, false, false, false, false, true],
            },
            TestCase {
                // TC1: constant volatility never strictly exceeds its own quantile
                input: vec![Some(2.0), Some(2.0), Some(2.0)],
                expected: vec![false, false, false],
            },
            TestCase {
                // TC2: no defined volatility
                input: vec![None, None],
                expected: vec![false, false],
            },
            TestCase {
                // TC3: empty series
                input: vec![],
                expected: vec![],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let rows: Vec<FeatureRow> = test
                .input
                .iter()
                .enumerate()
                .map(|(i, volatility)| feature_row(i as i64, *volatility))
                .collect();

            let actual: Vec<bool> = risk_metrics(&rows)
                .iter()
                .map(|row| row.high_volatility_flag)
                .collect();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_growth_metrics_carry_momentum() {
        let rows: Vec<FeatureRow> = (0..4).map(|i| feature_row(i, None)).collect();
        let growth = growth_metrics(&FeatureEngine::default(), &rows);

        assert_eq!(growth.len(), 4);
        assert_eq!(growth[1].revenue_growth_pct_ma, None);
        assert!((growth[2].revenue_growth_pct_ma.unwrap() - 1.0).abs() < 1e-9);
        assert!((growth[3].revenue_growth_pct_ma.unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(growth[3].event_time, rows[3].event_time());
    }
}
