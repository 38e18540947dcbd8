//! Database writer for player stats and kill events
//!
//! SQLite-backed store behind the `StatsDbWriter` trait. Three tables:
//! - `player_stats` - UPSERT per player (running counters, derived KDR)
//! - `kill_events` - INSERT (append-only event log for analytics)
//! - `server_registry` - registered game servers per guild
//!
//! Counter updates are single-statement upserts: KDR and streak transitions
//! are recomputed inside the same `ON CONFLICT ... DO UPDATE`, so a reader
//! can never observe a kill increment without its KDR recompute. Killer and
//! victim rows are two separate atomic operations, not one joint
//! transaction.

use super::types::{KillEvent, PlayerStats, ServerConfig, EXCLUDED_WEAPONS};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum DbError {
    Io(std::io::Error),
    Database(String),
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Io(err)
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::Database(err.to_string())
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::Io(e) => write!(f, "IO error: {}", e),
            DbError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for DbError {}

/// Trait for the mutations and lookups the ingestion pipeline needs.
///
/// Kept narrow so the orchestrators depend on the seam, not on SQLite; read
/// queries for the chat front end live on `SqliteStatsDb` directly.
#[async_trait]
pub trait StatsDbWriter: Send + Sync {
    /// Credit a PvP kill to `player`: kills + 1, KDR recompute, streak
    /// extension, distance accumulation.
    async fn record_kill(
        &self,
        guild_id: i64,
        server_id: &str,
        player: &str,
        distance: f64,
    ) -> Result<(), DbError>;

    /// Charge a PvP death to `player`: deaths + 1, KDR recompute, current
    /// streak reset.
    async fn record_death(&self, guild_id: i64, server_id: &str, player: &str)
        -> Result<(), DbError>;

    /// Charge a suicide to `player`: suicides + 1, current streak reset.
    /// Kills, deaths, and KDR are untouched.
    async fn record_suicide(
        &self,
        guild_id: i64,
        server_id: &str,
        player: &str,
    ) -> Result<(), DbError>;

    /// Append one event to the per-server kill-event log.
    async fn append_kill_event(
        &self,
        guild_id: i64,
        server_id: &str,
        event: &KillEvent,
    ) -> Result<(), DbError>;

    /// Delete every stat record and kill event for one server. Used by
    /// historical refresh before rebuilding from scratch.
    async fn clear_server_data(&self, guild_id: i64, server_id: &str) -> Result<(), DbError>;

    /// Every registered server across every guild, registration order.
    async fn list_registered_servers(&self) -> Result<Vec<(i64, ServerConfig)>, DbError>;
}

/// Leaderboard orderings exposed to the chat front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardStat {
    Kills,
    Deaths,
    Kdr,
    LongestStreak,
    Suicides,
}

impl LeaderboardStat {
    fn column(&self) -> &'static str {
        match self {
            LeaderboardStat::Kills => "kills",
            LeaderboardStat::Deaths => "deaths",
            LeaderboardStat::Kdr => "kdr",
            LeaderboardStat::LongestStreak => "longest_streak",
            LeaderboardStat::Suicides => "suicides",
        }
    }
}

/// SQLite implementation of `StatsDbWriter`.
pub struct SqliteStatsDb {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStatsDb {
    /// Open (or create) the database and ensure the schema exists.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, DbError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS player_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                server_id TEXT NOT NULL,
                player_name TEXT NOT NULL,
                kills INTEGER NOT NULL DEFAULT 0,
                deaths INTEGER NOT NULL DEFAULT 0,
                suicides INTEGER NOT NULL DEFAULT 0,
                kdr REAL NOT NULL DEFAULT 0.0,
                longest_streak INTEGER NOT NULL DEFAULT 0,
                current_streak INTEGER NOT NULL DEFAULT 0,
                total_distance REAL NOT NULL DEFAULT 0.0,
                last_updated INTEGER NOT NULL,
                UNIQUE(guild_id, server_id, player_name)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kill_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                server_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                killer TEXT NOT NULL,
                victim TEXT NOT NULL,
                weapon TEXT NOT NULL,
                distance REAL NOT NULL,
                is_suicide INTEGER NOT NULL,
                raw_line TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS server_registry (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guild_id INTEGER NOT NULL,
                server_id TEXT NOT NULL,
                sftp_host TEXT,
                sftp_port INTEGER NOT NULL DEFAULT 22,
                sftp_username TEXT,
                sftp_password TEXT,
                registered_at INTEGER NOT NULL,
                UNIQUE(guild_id, server_id)
            )",
            [],
        )?;

        // Indexes for leaderboard and analytics queries
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stats_kills
             ON player_stats(guild_id, server_id, kills DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_stats_kdr
             ON player_stats(guild_id, server_id, kdr DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_timestamp
             ON kill_events(guild_id, server_id, timestamp DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_killer
             ON kill_events(guild_id, server_id, killer)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_victim
             ON kill_events(guild_id, server_id, victim)",
            [],
        )?;

        log::info!("✅ Stats database initialized with WAL mode");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Register a game server for a guild. Re-registering the same
    /// (guild, server) replaces its connection settings.
    pub fn register_server(&self, guild_id: i64, server: &ServerConfig) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO server_registry (
                guild_id, server_id, sftp_host, sftp_port,
                sftp_username, sftp_password, registered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(guild_id, server_id) DO UPDATE SET
                sftp_host = excluded.sftp_host,
                sftp_port = excluded.sftp_port,
                sftp_username = excluded.sftp_username,
                sftp_password = excluded.sftp_password",
            params![
                guild_id,
                server.server_id,
                server.sftp_host,
                server.sftp_port,
                server.sftp_username,
                server.sftp_password,
                Utc::now().timestamp(),
            ],
        )?;

        log::info!(
            "Registered server {} for guild {}",
            server.server_id,
            guild_id
        );
        Ok(())
    }

    pub fn get_player_stats(
        &self,
        guild_id: i64,
        server_id: &str,
        player: &str,
    ) -> Result<Option<PlayerStats>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guild_id, server_id, player_name, kills, deaths, suicides,
                    kdr, longest_streak, current_streak, total_distance, last_updated
             FROM player_stats
             WHERE guild_id = ?1 AND server_id = ?2 AND player_name = ?3",
        )?;

        let mut rows = stmt.query_map(params![guild_id, server_id, player], stats_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Leaderboard for one server, ordered by the chosen stat descending.
    pub fn top_players(
        &self,
        guild_id: i64,
        server_id: &str,
        stat: LeaderboardStat,
        limit: usize,
    ) -> Result<Vec<PlayerStats>, DbError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT guild_id, server_id, player_name, kills, deaths, suicides,
                    kdr, longest_streak, current_streak, total_distance, last_updated
             FROM player_stats
             WHERE guild_id = ?1 AND server_id = ?2
             ORDER BY {} DESC
             LIMIT ?3",
            stat.column()
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(params![guild_id, server_id, limit as i64], stats_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// PvP kill counts per weapon for one killer, descending. Suicide and
    /// fall-death markers are excluded even if mis-flagged rows exist.
    pub fn weapon_totals(
        &self,
        guild_id: i64,
        server_id: &str,
        player: &str,
    ) -> Result<Vec<(String, i64)>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT weapon, COUNT(*) AS uses
             FROM kill_events
             WHERE guild_id = ?1 AND server_id = ?2 AND killer = ?3
               AND is_suicide = 0
               AND weapon NOT IN (?4, ?5, ?6)
             GROUP BY weapon
             ORDER BY uses DESC",
        )?;

        let rows = stmt.query_map(
            params![
                guild_id,
                server_id,
                player,
                EXCLUDED_WEAPONS[0],
                EXCLUDED_WEAPONS[1],
                EXCLUDED_WEAPONS[2],
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Rival (victim this player killed most) and nemesis (killer this
    /// player died to most), with counts. Suicides never count either way.
    pub fn rival_and_nemesis(
        &self,
        guild_id: i64,
        server_id: &str,
        player: &str,
    ) -> Result<(Option<(String, i64)>, Option<(String, i64)>), DbError> {
        let conn = self.conn.lock().unwrap();

        let rival = conn
            .query_row(
                "SELECT victim, COUNT(*) AS n
                 FROM kill_events
                 WHERE guild_id = ?1 AND server_id = ?2 AND killer = ?3 AND is_suicide = 0
                 GROUP BY victim
                 ORDER BY n DESC
                 LIMIT 1",
                params![guild_id, server_id, player],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .map(Some)
            .or_else(ignore_no_rows)?;

        let nemesis = conn
            .query_row(
                "SELECT killer, COUNT(*) AS n
                 FROM kill_events
                 WHERE guild_id = ?1 AND server_id = ?2 AND victim = ?3 AND is_suicide = 0
                 GROUP BY killer
                 ORDER BY n DESC
                 LIMIT 1",
                params![guild_id, server_id, player],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .map(Some)
            .or_else(ignore_no_rows)?;

        Ok((rival, nemesis))
    }

    /// Most recent kill events for one server, newest first.
    pub fn recent_kills(
        &self,
        guild_id: i64,
        server_id: &str,
        limit: usize,
    ) -> Result<Vec<KillEvent>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT timestamp, killer, victim, weapon, distance, is_suicide, raw_line
             FROM kill_events
             WHERE guild_id = ?1 AND server_id = ?2
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![guild_id, server_id, limit as i64], event_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Count of stored kill events for one server.
    pub fn kill_event_count(&self, guild_id: i64, server_id: &str) -> Result<i64, DbError> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM kill_events WHERE guild_id = ?1 AND server_id = ?2",
            params![guild_id, server_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn ignore_no_rows<T>(err: rusqlite::Error) -> Result<Option<T>, rusqlite::Error> {
    match err {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}

fn stats_from_row(row: &Row<'_>) -> rusqlite::Result<PlayerStats> {
    Ok(PlayerStats {
        guild_id: row.get(0)?,
        server_id: row.get(1)?,
        player_name: row.get(2)?,
        kills: row.get(3)?,
        deaths: row.get(4)?,
        suicides: row.get(5)?,
        kdr: row.get(6)?,
        longest_streak: row.get(7)?,
        current_streak: row.get(8)?,
        total_distance: row.get(9)?,
        last_updated: row.get(10)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<KillEvent> {
    let epoch: i64 = row.get(0)?;
    Ok(KillEvent {
        timestamp: Utc.timestamp_opt(epoch, 0).single().unwrap_or_default(),
        killer: row.get(1)?,
        victim: row.get(2)?,
        weapon: row.get(3)?,
        distance: row.get(4)?,
        is_suicide: row.get::<_, i64>(5)? != 0,
        raw_line: row.get(6)?,
    })
}

#[async_trait]
impl StatsDbWriter for SqliteStatsDb {
    async fn record_kill(
        &self,
        guild_id: i64,
        server_id: &str,
        player: &str,
        distance: f64,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO player_stats (
                guild_id, server_id, player_name,
                kills, deaths, suicides, kdr,
                longest_streak, current_streak, total_distance, last_updated
            ) VALUES (?1, ?2, ?3, 1, 0, 0, 1.0, 1, 1, ?4, ?5)
            ON CONFLICT(guild_id, server_id, player_name) DO UPDATE SET
                kills = kills + 1,
                kdr = CAST(kills + 1 AS REAL) / MAX(deaths, 1),
                current_streak = current_streak + 1,
                longest_streak = MAX(longest_streak, current_streak + 1),
                total_distance = total_distance + ?4,
                last_updated = ?5",
            params![guild_id, server_id, player, distance, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    async fn record_death(
        &self,
        guild_id: i64,
        server_id: &str,
        player: &str,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO player_stats (
                guild_id, server_id, player_name,
                kills, deaths, suicides, kdr,
                longest_streak, current_streak, total_distance, last_updated
            ) VALUES (?1, ?2, ?3, 0, 1, 0, 0.0, 0, 0, 0.0, ?4)
            ON CONFLICT(guild_id, server_id, player_name) DO UPDATE SET
                deaths = deaths + 1,
                kdr = CAST(kills AS REAL) / MAX(deaths + 1, 1),
                current_streak = 0,
                last_updated = ?4",
            params![guild_id, server_id, player, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    async fn record_suicide(
        &self,
        guild_id: i64,
        server_id: &str,
        player: &str,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO player_stats (
                guild_id, server_id, player_name,
                kills, deaths, suicides, kdr,
                longest_streak, current_streak, total_distance, last_updated
            ) VALUES (?1, ?2, ?3, 0, 0, 1, 0.0, 0, 0, 0.0, ?4)
            ON CONFLICT(guild_id, server_id, player_name) DO UPDATE SET
                suicides = suicides + 1,
                current_streak = 0,
                last_updated = ?4",
            params![guild_id, server_id, player, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    async fn append_kill_event(
        &self,
        guild_id: i64,
        server_id: &str,
        event: &KillEvent,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kill_events (
                guild_id, server_id, timestamp, killer, victim,
                weapon, distance, is_suicide, raw_line
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                guild_id,
                server_id,
                event.timestamp.timestamp(),
                event.killer,
                event.victim,
                event.weapon,
                event.distance,
                event.is_suicide as i64,
                event.raw_line,
            ],
        )?;
        Ok(())
    }

    async fn clear_server_data(&self, guild_id: i64, server_id: &str) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();

        let stats_deleted = conn.execute(
            "DELETE FROM player_stats WHERE guild_id = ?1 AND server_id = ?2",
            params![guild_id, server_id],
        )?;
        let events_deleted = conn.execute(
            "DELETE FROM kill_events WHERE guild_id = ?1 AND server_id = ?2",
            params![guild_id, server_id],
        )?;

        log::info!(
            "Cleared server {} data for guild {} ({} stat records, {} events)",
            server_id,
            guild_id,
            stats_deleted,
            events_deleted
        );
        Ok(())
    }

    async fn list_registered_servers(&self) -> Result<Vec<(i64, ServerConfig)>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT guild_id, server_id, sftp_host, sftp_port, sftp_username, sftp_password
             FROM server_registry
             ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                ServerConfig {
                    server_id: row.get(1)?,
                    sftp_host: row.get(2)?,
                    sftp_port: row.get::<_, i64>(3)? as u16,
                    sftp_username: row.get(4)?,
                    sftp_password: row.get(5)?,
                },
            ))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_test_db() -> (tempfile::TempDir, SqliteStatsDb) {
        let dir = tempdir().unwrap();
        let db = SqliteStatsDb::open(dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn make_event(killer: &str, victim: &str, weapon: &str, distance: f64) -> KillEvent {
        let raw = format!(
            "2024-01-01T00:00:00Z,{},{},{},{}",
            killer, victim, weapon, distance
        );
        crate::pipeline::parser::parse_line(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_record_kill_creates_and_increments() {
        let (_dir, db) = open_test_db();

        db.record_kill(1, "7020", "Alice", 100.0).await.unwrap();
        db.record_kill(1, "7020", "Alice", 50.0).await.unwrap();

        let stats = db.get_player_stats(1, "7020", "Alice").unwrap().unwrap();
        assert_eq!(stats.kills, 2);
        assert_eq!(stats.deaths, 0);
        assert_eq!(stats.kdr, 2.0);
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.total_distance, 150.0);
    }

    #[tokio::test]
    async fn test_kdr_floors_deaths_at_one() {
        let (_dir, db) = open_test_db();

        // 3 kills, 0 deaths: kdr = 3 / max(0, 1) = 3.0
        for _ in 0..3 {
            db.record_kill(1, "7020", "Alice", 0.0).await.unwrap();
        }
        let stats = db.get_player_stats(1, "7020", "Alice").unwrap().unwrap();
        assert_eq!(stats.kdr, 3.0);

        // 2 deaths: kdr = 3 / 2 = 1.5
        db.record_death(1, "7020", "Alice").await.unwrap();
        db.record_death(1, "7020", "Alice").await.unwrap();
        let stats = db.get_player_stats(1, "7020", "Alice").unwrap().unwrap();
        assert_eq!(stats.kdr, 1.5);
    }

    #[tokio::test]
    async fn test_death_resets_current_streak_only() {
        let (_dir, db) = open_test_db();

        for _ in 0..4 {
            db.record_kill(1, "7020", "Alice", 0.0).await.unwrap();
        }
        db.record_death(1, "7020", "Alice").await.unwrap();

        let stats = db.get_player_stats(1, "7020", "Alice").unwrap().unwrap();
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 4);

        // Streak restarts after the reset
        db.record_kill(1, "7020", "Alice", 0.0).await.unwrap();
        let stats = db.get_player_stats(1, "7020", "Alice").unwrap().unwrap();
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 4);
    }

    #[tokio::test]
    async fn test_suicide_touches_only_suicides_and_streak() {
        let (_dir, db) = open_test_db();

        db.record_kill(1, "7020", "Carl", 10.0).await.unwrap();
        db.record_suicide(1, "7020", "Carl").await.unwrap();

        let stats = db.get_player_stats(1, "7020", "Carl").unwrap().unwrap();
        assert_eq!(stats.kills, 1);
        assert_eq!(stats.deaths, 0);
        assert_eq!(stats.suicides, 1);
        assert_eq!(stats.kdr, 1.0);
        assert_eq!(stats.current_streak, 0);
    }

    #[tokio::test]
    async fn test_monotonic_counters() {
        let (_dir, db) = open_test_db();

        let mut last = (0, 0, 0);
        for i in 0..6 {
            match i % 3 {
                0 => db.record_kill(1, "7020", "Alice", 0.0).await.unwrap(),
                1 => db.record_death(1, "7020", "Alice").await.unwrap(),
                _ => db.record_suicide(1, "7020", "Alice").await.unwrap(),
            }
            let s = db.get_player_stats(1, "7020", "Alice").unwrap().unwrap();
            assert!(s.kills >= last.0 && s.deaths >= last.1 && s.suicides >= last.2);
            assert_eq!(s.kdr, s.kills as f64 / std::cmp::max(s.deaths, 1) as f64);
            last = (s.kills, s.deaths, s.suicides);
        }
    }

    #[tokio::test]
    async fn test_clear_server_data_is_scoped() {
        let (_dir, db) = open_test_db();

        db.record_kill(1, "7020", "Alice", 0.0).await.unwrap();
        db.record_kill(1, "7021", "Bob", 0.0).await.unwrap();
        db.append_kill_event(1, "7020", &make_event("Alice", "Bob", "AK74", 10.0))
            .await
            .unwrap();

        db.clear_server_data(1, "7020").await.unwrap();

        assert!(db.get_player_stats(1, "7020", "Alice").unwrap().is_none());
        assert_eq!(db.kill_event_count(1, "7020").unwrap(), 0);
        // Other server untouched
        assert!(db.get_player_stats(1, "7021", "Bob").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_leaderboard_ordering() {
        let (_dir, db) = open_test_db();

        for _ in 0..5 {
            db.record_kill(1, "7020", "Alice", 0.0).await.unwrap();
        }
        for _ in 0..2 {
            db.record_kill(1, "7020", "Bob", 0.0).await.unwrap();
        }
        db.record_kill(1, "7020", "Carl", 0.0).await.unwrap();

        let top = db.top_players(1, "7020", LeaderboardStat::Kills, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].player_name, "Alice");
        assert_eq!(top[1].player_name, "Bob");
    }

    #[tokio::test]
    async fn test_weapon_totals_exclude_suicide_markers() {
        let (_dir, db) = open_test_db();

        db.append_kill_event(1, "7020", &make_event("Alice", "Bob", "AK74", 10.0))
            .await
            .unwrap();
        db.append_kill_event(1, "7020", &make_event("Alice", "Dan", "AK74", 20.0))
            .await
            .unwrap();
        db.append_kill_event(1, "7020", &make_event("Alice", "Eve", "MP5", 5.0))
            .await
            .unwrap();
        // Suicide event: excluded from weapon analytics
        db.append_kill_event(
            1,
            "7020",
            &make_event("Alice", "Alice", "Suicide_by_relocation", 0.0),
        )
        .await
        .unwrap();

        let totals = db.weapon_totals(1, "7020", "Alice").unwrap();
        assert_eq!(totals, vec![("AK74".to_string(), 2), ("MP5".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_rival_and_nemesis() {
        let (_dir, db) = open_test_db();

        for victim in ["Bob", "Bob", "Carl"] {
            db.append_kill_event(1, "7020", &make_event("Alice", victim, "AK74", 10.0))
                .await
                .unwrap();
        }
        for _ in 0..2 {
            db.append_kill_event(1, "7020", &make_event("Dan", "Alice", "MP5", 10.0))
                .await
                .unwrap();
        }

        let (rival, nemesis) = db.rival_and_nemesis(1, "7020", "Alice").unwrap();
        assert_eq!(rival, Some(("Bob".to_string(), 2)));
        assert_eq!(nemesis, Some(("Dan".to_string(), 2)));

        let (rival, nemesis) = db.rival_and_nemesis(1, "7020", "Nobody").unwrap();
        assert_eq!(rival, None);
        assert_eq!(nemesis, None);
    }

    #[tokio::test]
    async fn test_registry_roundtrip() {
        let (_dir, db) = open_test_db();

        let mut server = ServerConfig::new("7020");
        server.sftp_host = Some("198.51.100.7".to_string());
        server.sftp_username = Some("deadside".to_string());
        server.sftp_password = Some("secret".to_string());

        db.register_server(42, &server).unwrap();
        db.register_server(42, &ServerConfig::new("7021")).unwrap();

        let servers = db.list_registered_servers().await.unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].0, 42);
        assert_eq!(servers[0].1, server);
        assert_eq!(servers[1].1.server_id, "7021");
    }
}
