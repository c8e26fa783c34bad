//! JSON snapshot persistence for the in-memory repository
//!
//! The whole repository is one JSON document. Saves go to a sibling
//! temp file first and are renamed over the target, so a crash never
//! leaves a half-written snapshot behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::memory_store::{
    InMemoryRoadmapRepository, RepositorySnapshot, SNAPSHOT_VERSION,
};
use crate::infrastructure::traits::FileSystem;

pub struct SnapshotStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot; a missing file is an empty repository.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> InfraResult<RepositorySnapshot> {
        if !self.fs.exists(&self.path) {
            debug!("load: no snapshot yet");
            return Ok(RepositorySnapshot::default());
        }
        let content = self
            .fs
            .read_to_string(&self.path)
            .map_err(|e| InfraError::io(format!("read {}", self.path.display()), e))?;
        if content.trim().is_empty() {
            return Ok(RepositorySnapshot::default());
        }
        let snapshot: RepositorySnapshot =
            serde_json::from_str(&content).map_err(|e| self.snapshot_err(e.to_string()))?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(self.snapshot_err(format!(
                "version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    /// Load the snapshot straight into a repository.
    pub fn open_repository(&self) -> InfraResult<InMemoryRoadmapRepository> {
        Ok(InMemoryRoadmapRepository::from_snapshot(self.load()?))
    }

    #[instrument(level = "debug", skip(self, snapshot), fields(path = %self.path.display()))]
    pub fn save(&self, snapshot: &RepositorySnapshot) -> InfraResult<()> {
        let content =
            serde_json::to_string_pretty(snapshot).map_err(|e| self.snapshot_err(e.to_string()))?;

        self.fs
            .ensure_parent(&self.path)
            .map_err(|e| InfraError::io(format!("create parent of {}", self.path.display()), e))?;

        let tmp = self.temp_path();
        self.fs
            .write(&tmp, &content)
            .map_err(|e| InfraError::io(format!("write {}", tmp.display()), e))?;
        self.fs
            .rename(&tmp, &self.path)
            .map_err(|e| InfraError::io(format!("replace {}", self.path.display()), e))?;
        debug!(
            "save: {} roadmaps, {} nodes",
            snapshot.roadmaps.len(),
            snapshot.nodes.len()
        );
        Ok(())
    }

    pub fn save_repository(&self, repo: &InMemoryRoadmapRepository) -> InfraResult<()> {
        self.save(&repo.snapshot())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "roadmaps.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn snapshot_err(&self, message: String) -> InfraError {
        InfraError::Snapshot {
            path: self.path.clone(),
            message,
        }
    }
}
