
pub mod pipeline;

use {
    pipeline::{
        killfeed_scheduler_task, DedupTracker, KillfeedIngestor, LocalDirSource, LogSource,
        PipelineConfig, SftpSource, SqliteStatsDb,
    },
    std::sync::Arc,
};

/// Build the log source backend for the configured mode.
///
/// The backend is chosen once here; everything downstream only sees
/// `dyn LogSource`.
pub fn build_log_source(config: &PipelineConfig) -> Arc<dyn LogSource> {
    if config.dev_mode {
        Arc::new(LocalDirSource::new(config.fixture_dir.clone()))
    } else {
        Arc::new(SftpSource::new())
    }
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::from_env();

    log::info!("🚀 Starting Deadfeed...");
    log::info!("📊 Configuration:");
    log::info!("   DB path: {}", config.db_path);
    log::info!("   Dev mode: {}", config.dev_mode);
    log::info!("   Killfeed interval: {}s", config.killfeed_interval_secs);

    let db = Arc::new(SqliteStatsDb::open(&config.db_path)?);
    let source = build_log_source(&config);
    log::info!("   Log source backend: {}", source.backend_type());

    let dedup = Arc::new(DedupTracker::new());
    let ingestor = Arc::new(KillfeedIngestor::new(source, db, dedup));

    tokio::select! {
        _ = killfeed_scheduler_task(ingestor, config.killfeed_interval_secs) => {
            log::warn!("⚠️  Killfeed scheduler exited");
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutting down");
        }
    }

    Ok(())
}
