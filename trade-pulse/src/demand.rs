//! Demand alignment: asof join of the revenue series with the external demand signal.

use crate::{event::DemandPoint, feature::FeatureRow, stats::pct_change_series};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// [`FeatureRow`] paired with the demand observation in effect at its timestamp.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JoinedRow {
    #[serde(flatten)]
    pub features: FeatureRow,
    /// `None` when no demand point precedes the row (or the nearest one is stale).
    pub search_interest: Option<f64>,
}

impl JoinedRow {
    pub fn event_time(&self) -> DateTime<Utc> {
        self.features.event_time()
    }
}

/// Revenue versus demand movement for one bucket.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlignmentRow {
    pub event_time: DateTime<Utc>,
    pub total_revenue: f64,
    pub search_interest: Option<f64>,
    /// Period-over-period fractional change of `total_revenue`.
    pub revenue_trend: Option<f64>,
    /// Period-over-period fractional change of `search_interest`.
    pub demand_trend: Option<f64>,
    /// `demand_trend - revenue_trend`, defined when both are.
    pub demand_revenue_gap: Option<f64>,
}

/// Pairs each row with the most recent demand point at or before it.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DemandAligner {
    staleness: Option<TimeDelta>,
}

impl DemandAligner {
    /// `staleness` bounds how old a demand point may be, `None` fills backwards indefinitely.
    pub fn new(staleness: Option<TimeDelta>) -> Self {
        Self { staleness }
    }

    /// Backward asof join. Both inputs are sorted ascending (stable) before a single merge
    /// pass. With duplicate demand timestamps the last point wins.
    pub fn join(&self, rows: &[FeatureRow], demand: &[DemandPoint]) -> Vec<JoinedRow> {
        let mut rows = rows.to_vec();
        rows.sort_by_key(FeatureRow::event_time);

        let mut demand = demand.to_vec();
        demand.sort_by_key(|point| point.event_time);

        let mut cursor = 0;
        let mut unmatched = 0usize;
        let joined: Vec<JoinedRow> = rows
            .into_iter()
            .map(|features| {
                let time = features.event_time();
                while cursor < demand.len() && demand[cursor].event_time <= time {
                    cursor += 1;
                }

                let search_interest = cursor
                    .checked_sub(1)
                    .map(|index| demand[index])
                    .filter(|point| match self.staleness {
                        Some(horizon) => time - point.event_time <= horizon,
                        None => true,
                    })
                    .map(|point| point.search_interest);

                if search_interest.is_none() {
                    unmatched += 1;
                }
                JoinedRow {
                    features,
                    search_interest,
                }
            })
            .collect();

        debug!(rows = joined.len(), demand = demand.len(), unmatched, "asof joined demand");
        joined
    }

    /// Derive trend and gap features from a joined series (assumed ascending).
    pub fn align(&self, joined: &[JoinedRow]) -> Vec<AlignmentRow> {
        let revenue: Vec<Option<f64>> = joined
            .iter()
            .map(|row| Some(row.features.bucket.total_revenue))
            .collect();
        let interest: Vec<Option<f64>> = joined.iter().map(|row| row.search_interest).collect();

        joined
            .iter()
            .zip(pct_change_series(&revenue))
            .zip(pct_change_series(&interest))
            .map(|((row, revenue_trend), demand_trend)| AlignmentRow {
                event_time: row.event_time(),
                total_revenue: row.features.bucket.total_revenue,
                search_interest: row.search_interest,
                revenue_trend,
                demand_trend,
                demand_revenue_gap: demand_trend.zip(revenue_trend).map(|(d, r)| d - r),
            })
            .collect()
    }

    /// [`DemandAligner::join`] followed by [`DemandAligner::align`].
    pub fn run(&self, rows: &[FeatureRow], demand: &[DemandPoint]) -> Vec<AlignmentRow> {
        self.align(&self.join(rows, demand))
    }
}
