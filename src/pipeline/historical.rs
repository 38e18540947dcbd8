//! Historical deathlog refresh
//!
//! Destructive full re-import for one server: fetch every deathlog file,
//! clear the server's existing stats and event log, rebuild from zero, and
//! report progress on a wall-clock cadence. Guarded per (guild, server) so
//! two refreshes can never interleave; a second request is rejected, not
//! queued.
//!
//! Unlike the reference sequence, the fetch happens before the clear: an
//! empty or failed fetch returns `NoData` with the server's existing stats
//! untouched.

use super::aggregator::StatsAggregator;
use super::db::{DbError, StatsDbWriter};
use super::parser::parse_line;
use super::source::LogSource;
use super::types::{ServerConfig, ServerKey};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};

/// Immutable progress snapshots emitted during a refresh.
///
/// Sent over an mpsc channel; the receiving side (chat embed updater, log
/// writer) owns all presentation.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started {
        server_id: String,
    },
    Update {
        current: usize,
        total: usize,
        server_id: String,
    },
    Completed {
        processed: usize,
        elapsed_secs: f64,
        server_id: String,
    },
}

#[derive(Debug)]
pub enum RefreshError {
    /// A refresh is already running for this (guild, server).
    AlreadyRunning,
    /// The fetch produced zero lines; nothing was cleared or imported.
    NoData,
    Db(DbError),
}

impl From<DbError> for RefreshError {
    fn from(err: DbError) -> Self {
        RefreshError::Db(err)
    }
}

impl std::fmt::Display for RefreshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::AlreadyRunning => write!(f, "refresh already running for this server"),
            RefreshError::NoData => write!(f, "no historical data found"),
            RefreshError::Db(e) => write!(f, "database error: {}", e),
        }
    }
}

impl std::error::Error for RefreshError {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshSummary {
    pub processed: usize,
    pub total_lines: usize,
    pub elapsed_secs: f64,
}

/// Re-entrancy guard: at most one running refresh per (guild, server).
///
/// Acquisition returns an RAII permit; dropping the permit releases the key
/// on every exit path, including errors.
#[derive(Default)]
pub struct RefreshGuard {
    active: Mutex<HashSet<ServerKey>>,
}

impl RefreshGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(guard: &Arc<RefreshGuard>, key: ServerKey) -> Option<RefreshPermit> {
        let mut active = guard.active.lock().unwrap();
        if !active.insert(key.clone()) {
            return None;
        }
        Some(RefreshPermit {
            guard: guard.clone(),
            key,
        })
    }

    pub fn is_running(&self, guild_id: i64, server_id: &str) -> bool {
        let active = self.active.lock().unwrap();
        active.contains(&ServerKey::new(guild_id, server_id))
    }

    fn release(&self, key: &ServerKey) {
        let mut active = self.active.lock().unwrap();
        active.remove(key);
    }
}

pub struct RefreshPermit {
    guard: Arc<RefreshGuard>,
    key: ServerKey,
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        self.guard.release(&self.key);
    }
}

pub struct HistoricalRefresher {
    source: Arc<dyn LogSource>,
    db: Arc<dyn StatsDbWriter>,
    aggregator: StatsAggregator,
    guard: Arc<RefreshGuard>,
    progress_interval: Duration,
}

impl HistoricalRefresher {
    pub fn new(
        source: Arc<dyn LogSource>,
        db: Arc<dyn StatsDbWriter>,
        progress_interval: Duration,
    ) -> Self {
        let aggregator = StatsAggregator::new(db.clone());
        Self {
            source,
            db,
            aggregator,
            guard: Arc::new(RefreshGuard::new()),
            progress_interval,
        }
    }

    /// The shared guard, for status checks and external coordination.
    pub fn guard(&self) -> &Arc<RefreshGuard> {
        &self.guard
    }

    /// Run one full historical refresh for one server.
    ///
    /// Progress snapshots go to `progress` (when given): `Started` on entry,
    /// `Update` at least once per `progress_interval` of elapsed wall clock,
    /// and a terminal `Completed`.
    pub async fn refresh_server(
        &self,
        guild_id: i64,
        server: &ServerConfig,
        progress: Option<mpsc::Sender<ProgressEvent>>,
    ) -> Result<RefreshSummary, RefreshError> {
        let key = ServerKey::new(guild_id, &server.server_id);
        let Some(_permit) = RefreshGuard::try_acquire(&self.guard, key) else {
            log::warn!(
                "Refresh already running for server {}, rejecting",
                server.server_id
            );
            return Err(RefreshError::AlreadyRunning);
        };

        log::info!(
            "🚀 Starting historical refresh for server {} in guild {}",
            server.server_id,
            guild_id
        );
        let start = Instant::now();
        let mut progress = progress;

        send_progress(
            &mut progress,
            ProgressEvent::Started {
                server_id: server.server_id.clone(),
            },
        )
        .await;

        // Fetch before clearing: a transport failure must not wipe stats
        let lines = match self.source.fetch_all(server).await {
            Ok(lines) => lines,
            Err(e) => {
                log::error!(
                    "❌ Failed to fetch historical data for server {}: {}",
                    server.server_id,
                    e
                );
                Vec::new()
            }
        };

        if lines.is_empty() {
            log::warn!("No historical data found for server {}", server.server_id);
            return Err(RefreshError::NoData);
        }

        self.db.clear_server_data(guild_id, &server.server_id).await?;

        let total_lines = lines.len();
        let mut processed = 0;
        let mut last_report = Instant::now();

        for (i, line) in lines.iter().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // Historical mode bypasses the dedup tracker entirely
            if let Ok(event) = parse_line(line) {
                match self
                    .aggregator
                    .apply_event(guild_id, &server.server_id, &event)
                    .await
                {
                    Ok(()) => processed += 1,
                    Err(e) => log::error!("❌ Failed to apply historical event: {}", e),
                }
            }

            if last_report.elapsed() >= self.progress_interval {
                send_progress(
                    &mut progress,
                    ProgressEvent::Update {
                        current: i + 1,
                        total: total_lines,
                        server_id: server.server_id.clone(),
                    },
                )
                .await;
                last_report = Instant::now();
            }
        }

        let elapsed_secs = start.elapsed().as_secs_f64();

        send_progress(
            &mut progress,
            ProgressEvent::Completed {
                processed,
                elapsed_secs,
                server_id: server.server_id.clone(),
            },
        )
        .await;

        log::info!(
            "✅ Historical refresh completed for server {}: {} events in {:.1}s",
            server.server_id,
            processed,
            elapsed_secs
        );

        Ok(RefreshSummary {
            processed,
            total_lines,
            elapsed_secs,
        })
    }
}

/// Send one snapshot; a closed receiver disables further reporting instead
/// of failing the refresh.
async fn send_progress(sink: &mut Option<mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = sink.take() {
        if tx.send(event).await.is_ok() {
            *sink = Some(tx);
        } else {
            log::debug!("Progress receiver dropped, disabling progress reporting");
        }
    }
}

/// Handle to a pending delayed refresh. Aborting cancels the refresh if it
/// has not started yet; shutdown paths should cancel every pending handle.
pub struct ScheduledRefresh {
    handle: JoinHandle<()>,
}

impl ScheduledRefresh {
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Schedule a refresh to fire once after `delay`, without blocking the
/// caller (the registration response path must return immediately).
pub fn schedule_auto_refresh(
    refresher: Arc<HistoricalRefresher>,
    guild_id: i64,
    server: ServerConfig,
    delay: Duration,
) -> ScheduledRefresh {
    let handle = tokio::spawn(async move {
        sleep(delay).await;
        match refresher.refresh_server(guild_id, &server, None).await {
            Ok(summary) => log::info!(
                "Auto-refresh for server {} imported {} events",
                server.server_id,
                summary.processed
            ),
            Err(e) => log::error!("❌ Auto-refresh failed for server {}: {}", server.server_id, e),
        }
    });

    ScheduledRefresh { handle }
}
