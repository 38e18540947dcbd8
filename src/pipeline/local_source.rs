//! Local fixture-directory log source
//!
//! Development backend reading `.csv` deathlog files from a fixed directory
//! instead of a remote host. `fetch_all` returns files sorted by name
//! (fixture files are named chronologically); `fetch_latest` picks the most
//! recently modified file, matching the remote backend's selection rule.

use super::source::{LogSource, SourceError};
use super::types::ServerConfig;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub struct LocalDirSource {
    fixture_dir: PathBuf,
}

impl LocalDirSource {
    pub fn new(fixture_dir: impl Into<PathBuf>) -> Self {
        Self {
            fixture_dir: fixture_dir.into(),
        }
    }

    /// All `.csv` files in the fixture directory, unordered.
    fn list_csv_files(&self) -> Result<Vec<PathBuf>, SourceError> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.fixture_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("csv") {
                files.push(path);
            }
        }

        Ok(files)
    }
}

fn modified_time(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

fn read_lines(path: &Path) -> Result<Vec<String>, SourceError> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(|line| line.to_string()).collect())
}

#[async_trait]
impl LogSource for LocalDirSource {
    async fn fetch_latest(&self, server: &ServerConfig) -> Result<Vec<String>, SourceError> {
        let files = self.list_csv_files()?;

        let Some(most_recent) = files.into_iter().max_by_key(|path| modified_time(path)) else {
            log::warn!(
                "No CSV files found in {} for server {}",
                self.fixture_dir.display(),
                server.server_id
            );
            return Ok(Vec::new());
        };

        read_lines(&most_recent)
    }

    async fn fetch_all(&self, server: &ServerConfig) -> Result<Vec<String>, SourceError> {
        let mut files = self.list_csv_files()?;
        files.sort();

        if files.is_empty() {
            log::warn!(
                "No CSV files found in {} for server {}",
                self.fixture_dir.display(),
                server.server_id
            );
            return Ok(Vec::new());
        }

        let mut all_lines = Vec::new();
        for path in files {
            all_lines.extend(read_lines(&path)?);
        }

        Ok(all_lines)
    }

    fn backend_type(&self) -> &'static str {
        "LocalDir"
    }
}
