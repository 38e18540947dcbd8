//! Log source backend trait
//!
//! Defines the interface for fetching raw deathlog lines for one server.
//! Two implementations exist: a local fixture directory for development and
//! an SFTP backend for production. The backend is chosen once at
//! construction time; callers only ever see `dyn LogSource`.

use super::types::ServerConfig;
use async_trait::async_trait;

#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    /// Connection, authentication, listing, or read failure against the
    /// remote host. Carries a human-readable description.
    Transport(String),
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err)
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "IO error: {}", e),
            SourceError::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

/// Backend trait for retrieving raw deathlog lines.
///
/// Both methods return lines in processing order. A server with missing or
/// incomplete credentials yields `Ok(vec![])` with a warning (soft
/// condition); genuine transport failures are returned as errors and the
/// orchestrator degrades them to an empty batch so one server's outage never
/// affects another's pass.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Lines of the single most-recently-modified deathlog file.
    async fn fetch_latest(&self, server: &ServerConfig) -> Result<Vec<String>, SourceError>;

    /// Lines of every deathlog file, oldest file first, preserving
    /// intra-file order. Used only by historical refresh.
    async fn fetch_all(&self, server: &ServerConfig) -> Result<Vec<String>, SourceError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
