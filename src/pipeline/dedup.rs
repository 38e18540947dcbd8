//! Already-seen line tracking for incremental ingestion
//!
//! Keeps one set of raw-line signatures per (guild, server). The signature
//! is the exact post-trim line text; equality of signature implies equality
//! of text, which is what incremental idempotence rests on.
//!
//! The map is process-lifetime and not persisted: after a restart the lines
//! of the current "latest" file window are treated as unseen once. Historical
//! refreshes bypass this tracker entirely.

use super::types::ServerKey;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Lock-protected per-server dedup sets, safe to share across tasks.
#[derive(Default)]
pub struct DedupTracker {
    seen: Mutex<HashMap<ServerKey, HashSet<String>>>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this exact line was already applied for the given server.
    pub fn already_seen(&self, guild_id: i64, server_id: &str, raw_line: &str) -> bool {
        let seen = self.seen.lock().unwrap();
        seen.get(&ServerKey::new(guild_id, server_id))
            .map(|lines| lines.contains(raw_line.trim()))
            .unwrap_or(false)
    }

    /// Record a line as applied. The per-server set is created lazily on
    /// first reference.
    pub fn mark_seen(&self, guild_id: i64, server_id: &str, raw_line: &str) {
        let mut seen = self.seen.lock().unwrap();
        seen.entry(ServerKey::new(guild_id, server_id))
            .or_default()
            .insert(raw_line.trim().to_string());
    }

    /// Number of tracked lines for one server, for diagnostics.
    pub fn seen_count(&self, guild_id: i64, server_id: &str) -> usize {
        let seen = self.seen.lock().unwrap();
        seen.get(&ServerKey::new(guild_id, server_id))
            .map(|lines| lines.len())
            .unwrap_or(0)
    }
}
