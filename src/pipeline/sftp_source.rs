//! SFTP log source
//!
//! Production backend fetching deathlog files over SFTP with per-server
//! credentials. Each call opens a fresh session, reads what it needs, and
//! drops the connection before returning; nothing is cached between passes.
//!
//! The `ssh2` API is blocking, so every fetch runs on the tokio blocking
//! pool via `spawn_blocking`.

use super::source::{LogSource, SourceError};
use super::types::ServerConfig;
use async_trait::async_trait;
use ssh2::Session;
use std::io::Read;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

/// SFTP status code for a missing remote path (LIBSSH2_FX_NO_SUCH_FILE).
const SFTP_NO_SUCH_FILE: i32 = 2;

impl From<ssh2::Error> for SourceError {
    fn from(err: ssh2::Error) -> Self {
        SourceError::Transport(err.to_string())
    }
}

#[derive(Clone, Copy)]
enum Selection {
    /// Single most-recently-modified file.
    Latest,
    /// Every file, modification time ascending.
    All,
}

pub struct SftpSource;

impl SftpSource {
    pub fn new() -> Self {
        Self
    }

    async fn fetch(
        &self,
        server: &ServerConfig,
        selection: Selection,
    ) -> Result<Vec<String>, SourceError> {
        let (Some(host), Some(username), Some(password)) = (
            server.sftp_host.clone(),
            server.sftp_username.clone(),
            server.sftp_password.clone(),
        ) else {
            log::warn!(
                "SFTP credentials not configured for server {}",
                server.server_id
            );
            return Ok(Vec::new());
        };

        let port = server.sftp_port;
        // deathlog_dir() is Some whenever sftp_host is
        let remote_dir = server.deathlog_dir().unwrap_or_default();
        let server_id = server.server_id.clone();

        tokio::task::spawn_blocking(move || {
            fetch_blocking(&host, port, &username, &password, &remote_dir, &server_id, selection)
        })
        .await
        .map_err(|e| SourceError::Transport(format!("blocking task failed: {}", e)))?
    }
}

impl Default for SftpSource {
    fn default() -> Self {
        Self::new()
    }
}

fn fetch_blocking(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
    remote_dir: &str,
    server_id: &str,
    selection: Selection,
) -> Result<Vec<String>, SourceError> {
    let tcp = TcpStream::connect((host, port))
        .map_err(|e| SourceError::Transport(format!("connect {}:{}: {}", host, port, e)))?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.handshake()?;
    session.userauth_password(username, password)?;

    let sftp = session.sftp()?;

    // List .csv files with their modification times
    let mut csv_files: Vec<(PathBuf, u64)> = match sftp.readdir(Path::new(remote_dir)) {
        Ok(entries) => entries
            .into_iter()
            .filter(|(path, _)| path.extension().and_then(|s| s.to_str()) == Some("csv"))
            .map(|(path, stat)| (path, stat.mtime.unwrap_or(0)))
            .collect(),
        Err(e) if matches!(e.code(), ssh2::ErrorCode::SFTP(SFTP_NO_SUCH_FILE)) => {
            log::warn!(
                "Deathlogs directory not found for server {}: {}",
                server_id,
                remote_dir
            );
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    csv_files.sort_by_key(|(_, mtime)| *mtime);

    let selected: Vec<PathBuf> = match selection {
        Selection::Latest => csv_files.pop().map(|(path, _)| path).into_iter().collect(),
        Selection::All => csv_files.into_iter().map(|(path, _)| path).collect(),
    };

    let mut all_lines = Vec::new();
    for path in selected {
        let mut file = sftp.open(&path)?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        all_lines.extend(content.lines().map(|line| line.to_string()));
    }

    Ok(all_lines)
}

#[async_trait]
impl LogSource for SftpSource {
    async fn fetch_latest(&self, server: &ServerConfig) -> Result<Vec<String>, SourceError> {
        self.fetch(server, Selection::Latest).await
    }

    async fn fetch_all(&self, server: &ServerConfig) -> Result<Vec<String>, SourceError> {
        self.fetch(server, Selection::All).await
    }

    fn backend_type(&self) -> &'static str {
        "Sftp"
    }
}
