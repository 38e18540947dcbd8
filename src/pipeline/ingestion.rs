//! Incremental killfeed ingestion
//!
//! Drives one live ingestion pass per server: fetch the latest deathlog
//! file, skip blank and already-seen lines, parse, aggregate, then mark the
//! line seen. A parse failure skips that line only; a transport failure
//! empties that server's batch only. Runs unattended for every registered
//! server on a fixed period.

use super::aggregator::StatsAggregator;
use super::db::StatsDbWriter;
use super::dedup::DedupTracker;
use super::parser::parse_line;
use super::source::LogSource;
use super::types::ServerConfig;
use std::sync::Arc;
use tokio::time::{interval, Duration};

pub struct KillfeedIngestor {
    source: Arc<dyn LogSource>,
    db: Arc<dyn StatsDbWriter>,
    aggregator: StatsAggregator,
    dedup: Arc<DedupTracker>,
}

impl KillfeedIngestor {
    pub fn new(
        source: Arc<dyn LogSource>,
        db: Arc<dyn StatsDbWriter>,
        dedup: Arc<DedupTracker>,
    ) -> Self {
        let aggregator = StatsAggregator::new(db.clone());
        Self {
            source,
            db,
            aggregator,
            dedup,
        }
    }

    /// One incremental pass for one server. Returns the number of newly
    /// applied events. Never fails the caller: every error is logged and
    /// degraded at its own level.
    pub async fn run_server(&self, guild_id: i64, server: &ServerConfig) -> usize {
        log::info!(
            "Parsing killfeed for server {} in guild {}",
            server.server_id,
            guild_id
        );

        let lines = match self.source.fetch_latest(server).await {
            Ok(lines) => lines,
            Err(e) => {
                log::error!(
                    "❌ Failed to fetch killfeed for server {}: {}",
                    server.server_id,
                    e
                );
                Vec::new()
            }
        };

        if lines.is_empty() {
            log::warn!("No killfeed data found for server {}", server.server_id);
            return 0;
        }

        let mut new_events = 0;

        for line in &lines {
            let line = line.trim();
            if line.is_empty() || self.dedup.already_seen(guild_id, &server.server_id, line) {
                continue;
            }

            let event = match parse_line(line) {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("⚠️  Skipping unparseable line '{}': {}", line, e);
                    continue;
                }
            };

            match self
                .aggregator
                .apply_event(guild_id, &server.server_id, &event)
                .await
            {
                Ok(()) => {
                    self.dedup.mark_seen(guild_id, &server.server_id, line);
                    new_events += 1;
                }
                Err(e) => {
                    // Not marked seen, so the next pass retries this line
                    log::error!("❌ Failed to apply kill event: {}", e);
                }
            }
        }

        log::info!(
            "Processed {} new kill events for server {}",
            new_events,
            server.server_id
        );
        new_events
    }

    /// One incremental pass over every registered server across every
    /// guild, sequential, with per-server failure isolation.
    pub async fn run_all(&self) {
        let servers = match self.db.list_registered_servers().await {
            Ok(servers) => servers,
            Err(e) => {
                log::error!("❌ Failed to list registered servers: {}", e);
                return;
            }
        };

        for (guild_id, server) in servers {
            self.run_server(guild_id, &server).await;
        }
    }
}

/// Killfeed scheduler task - periodic incremental ingestion
///
/// Runs a full `run_all` pass on a fixed interval (the reference cadence is
/// 300 seconds). Runs indefinitely until the task is dropped.
pub async fn killfeed_scheduler_task(ingestor: Arc<KillfeedIngestor>, interval_secs: u64) {
    log::info!(
        "⏰ Killfeed parser scheduled (every {} seconds)",
        interval_secs
    );

    let mut timer = interval(Duration::from_secs(interval_secs));

    loop {
        timer.tick().await;
        log::info!("Running killfeed parser...");
        ingestor.run_all().await;
        log::info!("Killfeed parser completed");
    }
}
