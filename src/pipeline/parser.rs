//! Deathlog line parser
//!
//! Turns one raw comma-delimited log line into a [`KillEvent`]. Pure
//! function, no I/O: every side effect (dedup, persistence, embeds) belongs
//! to the caller.
//!
//! Expected format: `timestamp,killer,victim,weapon,distance[,extra...]`
//! Trailing fields are ignored.

use super::types::{KillEvent, MENU_SUICIDE, SUICIDE};
use chrono::{DateTime, NaiveDateTime, Utc};

#[derive(Debug, PartialEq)]
pub enum ParseError {
    /// Fewer than 5 delimited fields.
    MalformedRecord,
    /// Timestamp matched neither the ISO-8601 form nor the fallback pattern.
    UnparseableTimestamp,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MalformedRecord => write!(f, "malformed record (need at least 5 fields)"),
            ParseError::UnparseableTimestamp => write!(f, "unparseable timestamp"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse one raw deathlog line into a kill event.
///
/// Suicide normalization: an event is a suicide when killer == victim or the
/// weapon (lowercased) starts with "suicide". Suicide weapons are rewritten
/// to a fixed vocabulary; PvP weapons pass through untouched.
///
/// Distance is best-effort: `N/A`, empty, or any non-numeric value becomes
/// 0.0 rather than failing the record.
pub fn parse_line(raw_line: &str) -> Result<KillEvent, ParseError> {
    let line = raw_line.trim();

    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 5 {
        return Err(ParseError::MalformedRecord);
    }

    let (timestamp_str, killer, victim, weapon, distance_str) =
        (parts[0], parts[1], parts[2], parts[3], parts[4]);

    let timestamp = parse_timestamp(timestamp_str)?;

    let weapon_lower = weapon.to_lowercase();
    let is_suicide = killer == victim || weapon_lower.starts_with("suicide");

    let weapon = if is_suicide {
        if weapon_lower.contains("relocation") {
            MENU_SUICIDE.to_string()
        } else {
            SUICIDE.to_string()
        }
    } else {
        weapon.to_string()
    };

    Ok(KillEvent {
        timestamp,
        killer: killer.to_string(),
        victim: victim.to_string(),
        weapon,
        distance: parse_distance(distance_str),
        is_suicide,
        raw_line: line.to_string(),
    })
}

/// ISO-8601 with offset (trailing `Z` accepted) first, then the game's older
/// `YYYY-MM-DD HH:MM:SS` format interpreted as UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ParseError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| ParseError::UnparseableTimestamp)
}

fn parse_distance(value: &str) -> f64 {
    if value.is_empty() || value == "N/A" {
        return 0.0;
    }

    match value.parse::<f64>() {
        Ok(d) if d.is_finite() && d > 0.0 => d,
        _ => 0.0,
    }
}
