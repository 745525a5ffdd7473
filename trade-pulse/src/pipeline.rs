use crate::{
    aggregator::Aggregator,
    cleaner::EventCleaner,
    config::PipelineConfig,
    demand::{AlignmentRow, DemandAligner, JoinedRow},
    error::PulseError,
    event::{DemandPoint, RawDemandRecord, RawEvent, RawTradeRecord},
    feature::{FeatureEngine, FeatureRow},
    projection::{GrowthRow, RiskRow, growth_metrics, risk_metrics},
    snapshot::SnapshotSource,
    store::{
        BUSINESS_METRICS_WITH_DEMAND, CORE_KPIS, DEMAND_ALIGNMENT, GROWTH_METRICS, RISK_METRICS,
        SeriesStore, TRADES_METRICS,
    },
    summary::{KpiSnapshot, MetricsSummarizer},
};
use tracing::{info, warn};

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// Features derived from this run's batch only.
    pub batch: Vec<FeatureRow>,
    /// Persisted `trades_metrics` after the merge.
    pub trades_metrics: Vec<FeatureRow>,
    /// Persisted `business_metrics_with_demand` after the merge.
    pub business_metrics: Vec<JoinedRow>,
    pub growth: Vec<GrowthRow>,
    pub risk: Vec<RiskRow>,
    pub alignment: Vec<AlignmentRow>,
    pub kpis: KpiSnapshot,
}

/// Sequential clean, aggregate, derive, join and merge run over one snapshot batch.
///
/// Each stage consumes the complete output of the previous one. A failing stage aborts the run
/// and leaves already persisted series as they were before that stage.
#[derive(Debug)]
pub struct Pipeline<Store> {
    store: Store,
    cleaner: EventCleaner,
    aggregator: Aggregator,
    engine: FeatureEngine,
    aligner: DemandAligner,
    summarizer: MetricsSummarizer,
}

impl<Store> Pipeline<Store>
where
    Store: SeriesStore,
{
    pub fn new(config: &PipelineConfig, store: Store) -> Result<Self, PulseError> {
        config.validate()?;
        Ok(Self {
            store,
            cleaner: EventCleaner::new(config.demand_column.clone()),
            aggregator: Aggregator::new(config.bucket_width())?,
            engine: FeatureEngine::new(config.volatility_window, config.momentum_window)?,
            aligner: DemandAligner::new(config.demand_staleness()),
            summarizer: MetricsSummarizer,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run over records read from `source`.
    pub fn run_source<Source>(&self, source: &Source) -> Result<PipelineOutput, PulseError>
    where
        Source: SnapshotSource + ?Sized,
    {
        let trades = source.trades()?;
        let demand = source.demand()?;
        self.process(
            self.cleaner.clean_trade_batch(&trades).rows,
            self.cleaner.clean_demand_batch(&demand).rows,
        )
    }

    /// Run over in-memory raw records.
    pub fn run(
        &self,
        trades: &[RawTradeRecord],
        demand: &[RawDemandRecord],
    ) -> Result<PipelineOutput, PulseError> {
        self.process(
            self.cleaner.clean_trades(trades).rows,
            self.cleaner.clean_demand(demand).rows,
        )
    }

    /// Topic projections and KPIs are recomputed over the merged full history, not just the
    /// batch. An empty cleaned batch merges nothing and derives outputs from what is already
    /// persisted.
    fn process(
        &self,
        events: Vec<RawEvent>,
        demand: Vec<DemandPoint>,
    ) -> Result<PipelineOutput, PulseError> {
        let buckets = self.aggregator.aggregate(&events);
        let batch = self.engine.derive(&buckets);

        let (trades_metrics, business_metrics) = if batch.is_empty() {
            warn!("no valid trades in batch, deriving outputs from persisted history");
            (
                self.store.load::<FeatureRow>(&TRADES_METRICS)?,
                self.store.load::<JoinedRow>(&BUSINESS_METRICS_WITH_DEMAND)?,
            )
        } else {
            let joined = self.aligner.join(&batch, &demand);
            (
                self.store.merge(&TRADES_METRICS, batch.clone())?,
                self.store.merge(&BUSINESS_METRICS_WITH_DEMAND, joined)?,
            )
        };

        let output = PipelineOutput {
            growth: growth_metrics(&self.engine, &trades_metrics),
            risk: risk_metrics(&trades_metrics),
            alignment: self.aligner.align(&business_metrics),
            kpis: self.summarizer.summarize_or_default(&trades_metrics),
            batch,
            trades_metrics,
            business_metrics,
        };

        info!(
            batch = output.batch.len(),
            history = output.trades_metrics.len(),
            total_revenue = output.kpis.total_revenue,
            "pipeline run complete"
        );
        Ok(output)
    }

    /// Replace the derived topic series with the views in `output`.
    pub fn publish(&self, output: &PipelineOutput) -> Result<(), PulseError> {
        self.store.replace(&GROWTH_METRICS, &output.growth)?;
        self.store.replace(&RISK_METRICS, &output.risk)?;
        self.store.replace(&DEMAND_ALIGNMENT, &output.alignment)?;
        self.store.replace(&CORE_KPIS, &[output.kpis])?;

        info!(
            growth = output.growth.len(),
            risk = output.risk.len(),
            alignment = output.alignment.len(),
            "published derived series"
        );
        Ok(())
    }
}
