//! Pretty JSON snapshot file, replaced atomically on every save.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::core::store::TallySnapshot;

use super::{decode_snapshot, encode_snapshot, PersistError, PersistResult, SnapshotStore};

/// [`SnapshotStore`] backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Targets `path`; nothing is touched until the first save or load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonFileStore {
    fn save(&mut self, snapshot: &TallySnapshot) -> PersistResult<()> {
        let payload = encode_snapshot(snapshot)?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        // Write beside the target so the final rename stays on one filesystem.
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(payload.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|e| PersistError::Io(e.error))?;
        Ok(())
    }

    fn load(&self) -> PersistResult<Option<TallySnapshot>> {
        let payload = match fs::read_to_string(&self.path) {
            Ok(payload) => payload,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        decode_snapshot(&payload).map(Some)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
