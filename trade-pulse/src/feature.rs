//! Growth, volatility and imbalance features over an ordered bucket series.

use crate::{
    aggregator::AggregatedBucket,
    config::{DEFAULT_MOMENTUM_WINDOW, DEFAULT_VOLATILITY_WINDOW},
    error::PulseError,
    stats::{pct_change_series, rolling_mean, rolling_std_dev},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// [`AggregatedBucket`] extended with derived features.
///
/// Windowed features are `None` until enough history exists. That is expected, not an error.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeatureRow {
    #[serde(flatten)]
    pub bucket: AggregatedBucket,
    /// `(revenue[i] / revenue[i-1] - 1) * 100`.
    pub revenue_growth_pct: Option<f64>,
    /// `(volume[i] / volume[i-1] - 1) * 100`.
    pub volume_growth_pct: Option<f64>,
    /// Sample standard deviation of `avg_price` over the trailing window.
    pub price_volatility: Option<f64>,
    /// `buy_pressure - sell_pressure`.
    pub order_imbalance: i64,
}

impl FeatureRow {
    pub fn event_time(&self) -> DateTime<Utc> {
        self.bucket.event_time
    }
}

/// Derives [`FeatureRow`]s from aggregated buckets. Purely functional.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FeatureEngine {
    volatility_window: usize,
    momentum_window: usize,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self {
            volatility_window: DEFAULT_VOLATILITY_WINDOW,
            momentum_window: DEFAULT_MOMENTUM_WINDOW,
        }
    }
}

impl FeatureEngine {
    pub fn new(volatility_window: usize, momentum_window: usize) -> Result<Self, PulseError> {
        if volatility_window < 2 || momentum_window < 1 {
            return Err(PulseError::InvalidConfig(format!(
                "feature windows too small: volatility={volatility_window}, momentum={momentum_window}"
            )));
        }
        Ok(Self {
            volatility_window,
            momentum_window,
        })
    }

    /// Derive features for an ascending bucket series. Row `i` is compared with row `i - 1`.
    pub fn derive(&self, buckets: &[AggregatedBucket]) -> Vec<FeatureRow> {
        let revenue: Vec<Option<f64>> = buckets.iter().map(|b| Some(b.total_revenue)).collect();
        let volume: Vec<Option<f64>> = buckets.iter().map(|b| Some(b.trade_volume)).collect();
        let prices: Vec<Option<f64>> = buckets.iter().map(|b| b.avg_price).collect();

        let revenue_growth = pct_change_series(&revenue);
        let volume_growth = pct_change_series(&volume);
        let volatility = rolling_std_dev(&prices, self.volatility_window);

        buckets
            .iter()
            .zip(revenue_growth)
            .zip(volume_growth)
            .zip(volatility)
            .map(|(((bucket, revenue_growth), volume_growth), price_volatility)| FeatureRow {
                bucket: bucket.clone(),
                revenue_growth_pct: revenue_growth.map(|change| change * 100.0),
                volume_growth_pct: volume_growth.map(|change| change * 100.0),
                price_volatility,
                order_imbalance: bucket.buy_pressure as i64 - bucket.sell_pressure as i64,
            })
            .collect()
    }

    /// Growth momentum: rolling mean of `revenue_growth_pct` over the momentum window.
    pub fn momentum(&self, rows: &[FeatureRow]) -> Vec<Option<f64>> {
        let growth: Vec<Option<f64>> = rows.iter().map(|row| row.revenue_growth_pct).collect();
        rolling_mean(&growth, self.momentum_window)
    }
}
