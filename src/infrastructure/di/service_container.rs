//! Service container for dependency injection
//!
//! Wires up the repository, the generator and the roadmap service.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::application::services::{RoadmapService, ServiceOptions};
use crate::config::Settings;
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::generator::{CommandGenerator, TemplateGenerator};
use crate::infrastructure::memory_store::InMemoryRoadmapRepository;
use crate::infrastructure::snapshot::SnapshotStore;
use crate::infrastructure::traits::{
    CommandRunner, ContentGenerator, FileSystem, RealCommandRunner, RealFileSystem,
};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Command runner abstraction
    pub cmd: Arc<dyn CommandRunner>,

    /// Repository loaded from the snapshot file
    pub repo: Arc<InMemoryRoadmapRepository>,

    pub generator: Arc<dyn ContentGenerator>,
    pub snapshots: SnapshotStore,
    pub roadmaps: RoadmapService,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        Self::with_deps(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(RealCommandRunner),
        )
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
    ) -> InfraResult<Self> {
        let generator = Self::build_generator(&settings, Arc::clone(&cmd));
        Self::with_generator(settings, fs, cmd, generator)
    }

    /// Like [`Self::with_deps`] but with an explicit content generator.
    pub fn with_generator(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
        generator: Arc<dyn ContentGenerator>,
    ) -> InfraResult<Self> {
        let settings = Arc::new(settings);
        let snapshots = SnapshotStore::new(Arc::clone(&fs), settings.data_file.clone());
        let repo = Arc::new(snapshots.open_repository()?);
        let roadmaps = RoadmapService::new(
            repo.clone(),
            Arc::clone(&generator),
            ServiceOptions::from(settings.as_ref()),
        );

        Ok(Self {
            settings,
            fs,
            cmd,
            repo,
            generator,
            snapshots,
            roadmaps,
        })
    }

    /// Write the repository back to the snapshot file.
    pub fn persist(&self) -> InfraResult<()> {
        self.snapshots.save_repository(&self.repo)
    }

    fn build_generator(settings: &Settings, cmd: Arc<dyn CommandRunner>) -> Arc<dyn ContentGenerator> {
        match settings.generator.command.as_deref() {
            Some(command) if !command.trim().is_empty() => {
                debug!("using generator command {}", command);
                Arc::new(CommandGenerator::new(
                    cmd,
                    command,
                    settings.generator.args.clone(),
                    Duration::from_secs(settings.generator.timeout_secs),
                    settings.generator.max_children,
                ))
            }
            _ => {
                debug!("no generator command configured, using templates");
                Arc::new(TemplateGenerator)
            }
        }
    }
}
