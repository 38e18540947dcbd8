//! Stats aggregator - routes one parsed event into the store
//!
//! Applies a [`KillEvent`] to the persisted counters: suicides charge only
//! the victim's suicide count, PvP kills credit the killer and charge the
//! victim. The event is always appended to the kill-event log first so the
//! analytics log never misses an event whose counter update succeeded.
//!
//! Killer and victim updates are two separate per-record atomic operations;
//! there is no joint transaction across the pair.

use super::db::{DbError, StatsDbWriter};
use super::types::KillEvent;
use std::sync::Arc;

pub struct StatsAggregator {
    db: Arc<dyn StatsDbWriter>,
}

impl StatsAggregator {
    pub fn new(db: Arc<dyn StatsDbWriter>) -> Self {
        Self { db }
    }

    /// Apply one event to the per-server stats and the kill-event log.
    pub async fn apply_event(
        &self,
        guild_id: i64,
        server_id: &str,
        event: &KillEvent,
    ) -> Result<(), DbError> {
        self.db.append_kill_event(guild_id, server_id, event).await?;

        if event.is_suicide {
            // killer == victim or a synthetic environment cause; only the
            // victim's suicide count moves
            self.db
                .record_suicide(guild_id, server_id, &event.victim)
                .await?;
        } else {
            self.db
                .record_kill(guild_id, server_id, &event.killer, event.distance)
                .await?;
            self.db
                .record_death(guild_id, server_id, &event.victim)
                .await?;
        }

        Ok(())
    }
}
