use crate::{error::PulseError, feature::FeatureRow, stats::mean};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Single-row executive reduction of a [`FeatureRow`] series.
///
/// `avg_hourly_revenue` and `max_hourly_revenue` are per-bucket figures, named after the
/// hourly buckets the dashboards were first built on.
#[derive(Debug, Copy, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct KpiSnapshot {
    pub total_revenue: f64,
    pub avg_hourly_revenue: f64,
    pub max_hourly_revenue: f64,
    /// Mean of the defined bucket `avg_price` values.
    pub avg_price: f64,
    pub total_volume: f64,
    pub total_trades: u64,
}

/// Reduces the full feature series into a [`KpiSnapshot`].
#[derive(Debug, Copy, Clone, Default)]
pub struct MetricsSummarizer;

impl MetricsSummarizer {
    /// Summarise `rows`, failing with [`PulseError::EmptySeries`] when there are none.
    pub fn summarize(&self, rows: &[FeatureRow]) -> Result<KpiSnapshot, PulseError> {
        if rows.is_empty() {
            return Err(PulseError::EmptySeries("core_kpis".to_string()));
        }

        let revenue: Vec<f64> = rows.iter().map(|row| row.bucket.total_revenue).collect();
        let prices: Vec<f64> = rows.iter().filter_map(|row| row.bucket.avg_price).collect();

        Ok(KpiSnapshot {
            total_revenue: revenue.iter().sum(),
            avg_hourly_revenue: mean(&revenue).unwrap_or_default(),
            max_hourly_revenue: revenue.iter().copied().fold(f64::MIN, f64::max),
            avg_price: mean(&prices).unwrap_or_default(),
            total_volume: rows.iter().map(|row| row.bucket.trade_volume).sum(),
            total_trades: rows.iter().map(|row| row.bucket.trade_count).sum(),
        })
    }

    /// [`MetricsSummarizer::summarize`], substituting the all-zero snapshot for an empty series.
    pub fn summarize_or_default(&self, rows: &[FeatureRow]) -> KpiSnapshot {
        self.summarize(rows).unwrap_or_else(|error| {
            warn!(%error, "no feature rows to summarise, using zero-valued KPI snapshot");
            KpiSnapshot::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{aggregator::AggregatedBucket, feature::FeatureEngine};
    use chrono::{TimeDelta, TimeZone, Utc};

    fn rows(buckets: &[(f64, f64, Option<f64>, u64)]) -> Vec<FeatureRow> {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let buckets: Vec<AggregatedBucket> = buckets
            .iter()
            .enumerate()
            .map(|(i, &(revenue, volume, price, count))| AggregatedBucket {
                total_revenue: revenue,
                trade_volume: volume,
                avg_price: price,
                trade_count: count,
                ..AggregatedBucket::empty(start + TimeDelta::minutes(i as i64))
            })
            .collect();
        FeatureEngine::default().derive(&buckets)
    }

    #[test]
    fn test_summarize() {
        let snapshot = MetricsSummarizer
            .summarize(&rows(&[
                (404.0, 4.0, Some(100.0), 3),
                (0.0, 0.0, None, 0),
                (200.0, 2.0, Some(110.0), 1),
            ]))
            .unwrap();

        assert!((snapshot.total_revenue - 604.0).abs() < 1e-9);
        assert!((snapshot.avg_hourly_revenue - 604.0 / 3.0).abs() < 1e-9);
        assert!((snapshot.max_hourly_revenue - 404.0).abs() < 1e-9);
        // empty bucket excluded from the price mean
        assert!((snapshot.avg_price - 105.0).abs() < 1e-9);
        assert!((snapshot.total_volume - 6.0).abs() < 1e-9);
        assert_eq!(snapshot.total_trades, 4);
    }

    #[test]
    fn test_summarize_empty_series() {
        let result = MetricsSummarizer.summarize(&[]);
        assert!(matches!(result, Err(PulseError::EmptySeries(_))));
        assert!(!result.unwrap_err().is_fatal());

        assert_eq!(MetricsSummarizer.summarize_or_default(&[]), KpiSnapshot::default());
        assert_eq!(KpiSnapshot::default().total_trades, 0);
    }
}
