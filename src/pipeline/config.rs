//! Pipeline configuration from environment variables

use std::env;

/// Configuration for the ingestion runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to the SQLite stats database file
    pub db_path: String,

    /// Read deathlogs from the local fixture directory instead of SFTP
    pub dev_mode: bool,

    /// Fixture directory used when `dev_mode` is set
    pub fixture_dir: String,

    /// Incremental killfeed pass interval in seconds
    pub killfeed_interval_secs: u64,

    /// Minimum seconds between historical progress reports
    pub progress_interval_secs: u64,

    /// Delay before the automatic refresh after server registration
    pub auto_refresh_delay_secs: u64,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `DEADFEED_DB_PATH` (default: /var/lib/deadfeed/deadfeed.db)
    /// - `DEADFEED_DEV_MODE` (default: false)
    /// - `DEADFEED_FIXTURE_DIR` (default: ./dev_data/csv)
    /// - `KILLFEED_INTERVAL_SECS` (default: 300)
    /// - `PROGRESS_INTERVAL_SECS` (default: 30)
    /// - `AUTO_REFRESH_DELAY_SECS` (default: 30)
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("DEADFEED_DB_PATH")
                .unwrap_or_else(|_| "/var/lib/deadfeed/deadfeed.db".to_string()),

            dev_mode: env::var("DEADFEED_DEV_MODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),

            fixture_dir: env::var("DEADFEED_FIXTURE_DIR")
                .unwrap_or_else(|_| "./dev_data/csv".to_string()),

            killfeed_interval_secs: env::var("KILLFEED_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),

            progress_interval_secs: env::var("PROGRESS_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            auto_refresh_delay_secs: env::var("AUTO_REFRESH_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}
