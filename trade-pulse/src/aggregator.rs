//! Fixed-width time bucket aggregation of cleaned trade events.
//!
//! Buckets are left-closed `[start, start + width)` intervals aligned to the Unix epoch grid,
//! never to the first event. Every bucket between the first and the last event is emitted,
//! including buckets that received no events (see [`AggregatedBucket::empty`]).

use crate::{error::PulseError, event::RawEvent};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Summary of all events falling into one time bucket.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AggregatedBucket {
    /// Bucket start (inclusive).
    pub event_time: DateTime<Utc>,
    pub total_revenue: f64,
    pub trade_volume: f64,
    /// Mean trade price, `None` for a bucket without events.
    pub avg_price: Option<f64>,
    pub trade_count: u64,
    /// Number of taker-buy trades.
    pub buy_pressure: u64,
    /// Number of taker-sell trades.
    pub sell_pressure: u64,
}

impl AggregatedBucket {
    /// Row emitted for a bucket that received no events: zero sums and counts, undefined mean.
    pub fn empty(event_time: DateTime<Utc>) -> Self {
        Self {
            event_time,
            total_revenue: 0.0,
            trade_volume: 0.0,
            avg_price: None,
            trade_count: 0,
            buy_pressure: 0,
            sell_pressure: 0,
        }
    }
}

#[derive(Debug, Default)]
struct BucketAccumulator {
    revenue: f64,
    volume: f64,
    price_sum: f64,
    count: u64,
    buys: u64,
    sells: u64,
}

impl BucketAccumulator {
    fn add(&mut self, event: &RawEvent) {
        self.revenue += event.revenue;
        self.volume += event.quantity;
        self.price_sum += event.price;
        self.count += 1;
        if event.side.is_buy() {
            self.buys += 1;
        } else {
            self.sells += 1;
        }
    }

    fn finish(&self, event_time: DateTime<Utc>) -> AggregatedBucket {
        AggregatedBucket {
            event_time,
            total_revenue: self.revenue,
            trade_volume: self.volume,
            avg_price: (self.count > 0).then(|| self.price_sum / self.count as f64),
            trade_count: self.count,
            buy_pressure: self.buys,
            sell_pressure: self.sells,
        }
    }
}

/// Buckets cleaned events into fixed-width windows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Aggregator {
    width_ms: i64,
}

impl Aggregator {
    pub fn new(width: TimeDelta) -> Result<Self, PulseError> {
        let width_ms = width.num_milliseconds();
        if width_ms <= 0 {
            return Err(PulseError::InvalidBucketWidth);
        }
        Ok(Self { width_ms })
    }

    pub fn width(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.width_ms)
    }

    /// Align an epoch-millisecond timestamp to the start of its bucket.
    #[inline]
    fn align_to_bucket(&self, ts_ms: i64) -> i64 {
        ts_ms.div_euclid(self.width_ms) * self.width_ms
    }

    /// Aggregate events into ascending, unique buckets. Input order does not matter.
    pub fn aggregate(&self, events: &[RawEvent]) -> Vec<AggregatedBucket> {
        let mut buckets: BTreeMap<i64, BucketAccumulator> = BTreeMap::new();
        for event in events {
            let start = self.align_to_bucket(event.event_time.timestamp_millis());
            buckets.entry(start).or_default().add(event);
        }

        let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back())
        else {
            return Vec::new();
        };

        let mut output = Vec::with_capacity(((last - first) / self.width_ms + 1) as usize);
        let mut start = first;
        while start <= last {
            // Millisecond grid points within chrono's range never fail to convert
            let Some(event_time) = DateTime::from_timestamp_millis(start) else {
                start += self.width_ms;
                continue;
            };
            output.push(match buckets.get(&start) {
                Some(accumulator) => accumulator.finish(event_time),
                None => AggregatedBucket::empty(event_time),
            });
            start += self.width_ms;
        }

        debug!(
            events = events.len(),
            buckets = output.len(),
            filled = buckets.len(),
            "aggregated trades into buckets"
        );
        output
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            width_ms: crate::config::DEFAULT_BUCKET_SECS * 1000,
        }
    }
}
