//! Core data structures for the deathlog ingestion pipeline
//!
//! Everything here is plain data: parsed kill events, per-player aggregate
//! rows, and the per-server connection configuration stored in the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weapon marker written for menu/relocation suicides.
pub const MENU_SUICIDE: &str = "Menu Suicide";

/// Weapon marker written for all other self-inflicted deaths.
pub const SUICIDE: &str = "Suicide";

/// Fall-death marker. Never produced by the parser, but present in log data
/// and excluded from weapon analytics alongside the suicide markers.
pub const FALLING: &str = "Falling";

/// Weapons excluded from favorite-weapon / weapon-count analytics.
pub const EXCLUDED_WEAPONS: [&str; 3] = [MENU_SUICIDE, SUICIDE, FALLING];

/// One parsed kill event, immutable once created.
///
/// `raw_line` keeps the exact post-trim source text for audit and for
/// dedup-set membership on incremental runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillEvent {
    pub timestamp: DateTime<Utc>,
    pub killer: String,
    pub victim: String,
    /// Normalized weapon name. Suicides are rewritten to `MENU_SUICIDE` or
    /// `SUICIDE`; PvP weapons pass through unchanged.
    pub weapon: String,
    /// Kill distance in meters, 0.0 when unknown or unparseable.
    pub distance: f64,
    pub is_suicide: bool,
    pub raw_line: String,
}

/// Per-player aggregate counters, scoped to one (guild, server).
///
/// `kdr` is derived and recomputed on every kills/deaths change:
/// kills / max(deaths, 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub guild_id: i64,
    pub server_id: String,
    pub player_name: String,
    pub kills: i64,
    pub deaths: i64,
    pub suicides: i64,
    pub kdr: f64,
    pub longest_streak: i64,
    pub current_streak: i64,
    /// Sum of distances of PvP kills credited to this player as killer.
    pub total_distance: f64,
    /// Unix timestamp (seconds) of the last update.
    pub last_updated: i64,
}

/// Connection configuration for one registered game server.
///
/// SFTP credentials are optional; a server without them is skipped by the
/// remote source (soft condition, not an error).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server_id: String,
    pub sftp_host: Option<String>,
    pub sftp_port: u16,
    pub sftp_username: Option<String>,
    pub sftp_password: Option<String>,
}

impl ServerConfig {
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            sftp_host: None,
            sftp_port: 22,
            sftp_username: None,
            sftp_password: None,
        }
    }

    /// Remote deathlog directory for this server, relative to the SFTP
    /// login directory: `./{host}_{server_id}/actual1/deathlogs/`
    pub fn deathlog_dir(&self) -> Option<String> {
        self.sftp_host
            .as_ref()
            .map(|host| format!("./{}_{}/actual1/deathlogs/", host, self.server_id))
    }
}

/// Composite key identifying one server inside one guild.
///
/// Used for the dedup-signature map and the refresh guard, both of which are
/// process-wide and must stay correctly scoped per server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerKey {
    pub guild_id: i64,
    pub server_id: String,
}

impl ServerKey {
    pub fn new(guild_id: i64, server_id: &str) -> Self {
        Self {
            guild_id,
            server_id: server_id.to_string(),
        }
    }
}

impl std::fmt::Display for ServerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.guild_id, self.server_id)
    }
}
