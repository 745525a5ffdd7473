//! Trade Pulse - Business Metrics From Market Trades
//!
//! Turns raw market-trade snapshots and a lower-frequency demand signal into persisted,
//! time-bucketed business metrics:
//! - cleaning and type coercion of raw trade and demand records
//! - epoch-aligned fixed-width bucket aggregation
//! - growth, volatility and order-imbalance features
//! - backward asof join with the demand signal and alignment trends
//! - idempotent merge into named, timestamp-keyed series
//! - executive KPI snapshot, per-topic projections and narrative insights

pub mod aggregator;
pub mod cleaner;
pub mod config;
pub mod demand;
pub mod error;
pub mod event;
pub mod feature;
pub mod insight;
pub mod pipeline;
pub mod projection;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod summary;

// Re-export commonly used types for convenience
pub use aggregator::{AggregatedBucket, Aggregator};
pub use cleaner::{Cleaned, EventCleaner, RowRejection};
pub use config::{PipelineConfig, StoreFormat};
pub use demand::{AlignmentRow, DemandAligner, JoinedRow};
pub use error::PulseError;
pub use event::{
    AggressorSide, DemandPoint, RawBatch, RawDemandRecord, RawEvent, RawTradeRecord,
};
pub use feature::{FeatureEngine, FeatureRow};
pub use insight::InsightReport;
pub use pipeline::{Pipeline, PipelineOutput};
pub use projection::{GrowthRow, RiskRow};
pub use snapshot::{DirectorySnapshotSource, ExplicitSnapshotSource, SnapshotSource};
pub use store::{CsvSeriesStore, JsonlSeriesStore, MemorySeriesStore, SeriesName, SeriesStore};
pub use summary::{KpiSnapshot, MetricsSummarizer};
