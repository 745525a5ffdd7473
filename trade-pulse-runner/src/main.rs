use std::{fs, path::Path, process::ExitCode};
use trade_pulse::{
    CsvSeriesStore, ExplicitSnapshotSource, InsightReport, JsonlSeriesStore, Pipeline,
    PipelineConfig, PulseError, SeriesStore, StoreFormat,
};
use tracing::{error, info};

const INSIGHTS_FILE: &str = "auto_insights.txt";

fn main() -> ExitCode {
    // Initialize logging
    init_logging();

    info!("Starting trade-pulse pipeline run");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) if error.is_fatal() => {
            error!(%error, "pipeline run failed, persisted series left untouched");
            ExitCode::FAILURE
        }
        Err(error) => {
            info!(%error, "pipeline run finished with recoverable condition");
            ExitCode::SUCCESS
        }
    }
}

fn run() -> Result<(), PulseError> {
    let config = PipelineConfig::from_env()?;
    info!(
        raw_dir = %config.raw_dir.display(),
        processed_dir = %config.processed_dir.display(),
        store_format = %config.store_format,
        bucket_secs = config.bucket_secs,
        "loaded configuration"
    );

    match config.store_format {
        StoreFormat::Csv => execute(&config, CsvSeriesStore::new(&config.processed_dir)),
        StoreFormat::JsonLines => execute(&config, JsonlSeriesStore::new(&config.processed_dir)),
    }
}

fn execute<Store>(config: &PipelineConfig, store: Store) -> Result<(), PulseError>
where
    Store: SeriesStore,
{
    let source = ExplicitSnapshotSource::from_config(config)?;
    let pipeline = Pipeline::new(config, store)?;

    let output = pipeline.run_source(&source)?;
    pipeline.publish(&output)?;

    let report = InsightReport::generate(
        output.kpis,
        &output.growth,
        &output.risk,
        &output.alignment,
    );
    write_insights(&config.processed_dir, &report)?;

    info!(
        history = output.trades_metrics.len(),
        growth = %report.growth,
        risk = %report.risk,
        demand = %report.demand,
        "trade-pulse run complete"
    );
    Ok(())
}

fn write_insights(dir: &Path, report: &InsightReport) -> Result<(), PulseError> {
    fs::create_dir_all(dir)?;

    let path = dir.join(INSIGHTS_FILE);
    let temp_path = path.with_extension("txt.tmp");
    fs::write(&temp_path, report.to_string())?;
    fs::rename(&temp_path, &path)?;

    info!(path = %path.display(), "wrote insights");
    Ok(())
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
