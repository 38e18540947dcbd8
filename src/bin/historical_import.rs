//! Administrative one-shot historical import
//!
//! Triggers a full historical refresh for a single registered server and
//! streams progress to the log. Intended for operators; the chat front end
//! drives the same `HistoricalRefresher` for the `/server refresh` command.
//!
//! Usage:
//!   DEADFEED_GUILD_ID=<id> DEADFEED_SERVER_ID=<id> historical_import

use deadfeed::pipeline::{
    HistoricalRefresher, PipelineConfig, ProgressEvent, SqliteStatsDb, StatsDbWriter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::from_env();

    let guild_id: i64 = std::env::var("DEADFEED_GUILD_ID")
        .map_err(|_| "DEADFEED_GUILD_ID must be set")?
        .parse()?;
    let server_id = std::env::var("DEADFEED_SERVER_ID")
        .map_err(|_| "DEADFEED_SERVER_ID must be set")?;

    let db = Arc::new(SqliteStatsDb::open(&config.db_path)?);

    let registered = db.list_registered_servers().await?;
    let Some((_, server)) = registered
        .into_iter()
        .find(|(g, s)| *g == guild_id && s.server_id == server_id)
    else {
        log::error!(
            "❌ Server {} is not registered for guild {}",
            server_id,
            guild_id
        );
        std::process::exit(1);
    };

    let source = deadfeed::build_log_source(&config);
    let refresher = HistoricalRefresher::new(
        source,
        db,
        Duration::from_secs(config.progress_interval_secs),
    );

    let (tx, mut rx) = mpsc::channel(64);
    let progress_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::Started { server_id } => {
                    log::info!("🚀 Refresh started for server {}", server_id);
                }
                ProgressEvent::Update {
                    current,
                    total,
                    server_id,
                } => {
                    log::info!("📊 Server {}: {} / {} lines", server_id, current, total);
                }
                ProgressEvent::Completed {
                    processed,
                    elapsed_secs,
                    server_id,
                } => {
                    log::info!(
                        "✅ Server {}: {} events in {:.1}s",
                        server_id,
                        processed,
                        elapsed_secs
                    );
                }
            }
        }
    });

    let result = refresher.refresh_server(guild_id, &server, Some(tx)).await;
    progress_task.await?;

    match result {
        Ok(summary) => {
            log::info!(
                "Import finished: {} of {} lines applied",
                summary.processed,
                summary.total_lines
            );
            // Machine-readable summary on stdout for operator scripting
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(e) => {
            log::error!("❌ Import failed: {}", e);
            std::process::exit(1);
        }
    }
}
