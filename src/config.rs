//! Session configuration with environment overrides.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    core::history::DEFAULT_RETENTION,
    persist::{json_file::JsonFileStore, sqlite::SqliteSnapshotStore, PersistResult, SnapshotStore},
};

/// Default snapshot file name inside the data directory.
pub const DEFAULT_SNAPSHOT_FILE: &str = "tally_state.json";

/// Durable storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Pretty JSON file, replaced atomically.
    #[default]
    Json,
    /// Single-row SQLite database.
    Sqlite,
}

impl Backend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

/// Where and how a session persists its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Application-private data directory.
    pub data_dir: PathBuf,
    /// Snapshot file name within `data_dir`.
    pub snapshot_file: String,
    /// Storage backend.
    pub backend: Backend,
    /// Operation records retained for undo and on disk.
    pub history_retention: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot_file: DEFAULT_SNAPSHOT_FILE.to_string(),
            backend: Backend::Json,
            history_retention: DEFAULT_RETENTION,
        }
    }
}

impl SessionConfig {
    /// Defaults rooted at `data_dir`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults with `TALLY_DATA_DIR`, `TALLY_BACKEND` and
    /// `TALLY_HISTORY_RETENTION` applied on top.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    /// Applies recognized environment variables, ignoring malformed values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TALLY_DATA_DIR")
            && !v.trim().is_empty()
        {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TALLY_BACKEND") {
            match Backend::parse(&v) {
                Some(backend) => self.backend = backend,
                None => tracing::warn!("ignoring unknown TALLY_BACKEND={v}"),
            }
        }
        if let Ok(v) = std::env::var("TALLY_HISTORY_RETENTION") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.history_retention = n,
                _ => tracing::warn!("ignoring invalid TALLY_HISTORY_RETENTION={v}"),
            }
        }
    }

    /// Full path of the snapshot record.
    pub fn snapshot_path(&self) -> PathBuf {
        let path = self.data_dir.join(&self.snapshot_file);
        match self.backend {
            Backend::Json => path,
            Backend::Sqlite => path.with_extension("db"),
        }
    }

    /// Opens the configured backend.
    pub fn open_store(&self) -> PersistResult<Box<dyn SnapshotStore>> {
        let path = self.snapshot_path();
        match self.backend {
            Backend::Json => Ok(Box::new(JsonFileStore::new(path))),
            Backend::Sqlite => {
                std::fs::create_dir_all(&self.data_dir)?;
                Ok(Box::new(SqliteSnapshotStore::open(path)?))
            }
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("tallylog")
}
