//! Wiring tests for ServiceContainer

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use roadmap_engine::config::Settings;
use roadmap_engine::domain::OwnerId;
use roadmap_engine::infrastructure::di::ServiceContainer;
use roadmap_engine::infrastructure::traits::{CommandRunner, RealCommandRunner, RealFileSystem};

struct CountingRunner {
    calls: AtomicUsize,
}

impl CommandRunner for CountingRunner {
    fn run_with_stdin(
        &self,
        _cmd: &str,
        _args: &[String],
        _stdin: &str,
        _timeout: Duration,
    ) -> io::Result<Output> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Output {
            status: ExitStatus::from_raw(0),
            stdout: br#"[{"name": "Optics"}, {"name": "Waves"}]"#.to_vec(),
            stderr: Vec::new(),
        })
    }
}

fn settings(dir: &TempDir) -> Settings {
    Settings {
        data_file: dir.path().join("roadmaps.json"),
        owner: "ada".into(),
        ..Settings::default()
    }
}

#[test]
fn given_persisted_container_when_reopened_then_roadmaps_survive() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let owner = OwnerId::new("ada");
    let first = ServiceContainer::with_deps(
        settings(&dir),
        Arc::new(RealFileSystem),
        Arc::new(RealCommandRunner),
    )
    .unwrap();
    let view = first.roadmaps.create_roadmap(&owner, "", "Optics").unwrap();
    first.roadmaps.expand(&owner, view.roadmap.root_node_id).unwrap();

    // Act
    first.persist().unwrap();
    let second = ServiceContainer::with_deps(
        settings(&dir),
        Arc::new(RealFileSystem),
        Arc::new(RealCommandRunner),
    )
    .unwrap();

    // Assert
    let listed = second.roadmaps.list_roadmaps(&owner, false).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].total_nodes, 5);
}

#[test]
fn given_generator_command_when_wiring_then_command_generator_used() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let mut settings = settings(&dir);
    settings.generator.command = Some("roadmap-llm".into());
    let runner = Arc::new(CountingRunner {
        calls: AtomicUsize::new(0),
    });
    let container =
        ServiceContainer::with_deps(settings, Arc::new(RealFileSystem), runner.clone()).unwrap();
    let owner = OwnerId::new("ada");
    let root = container
        .roadmaps
        .create_roadmap(&owner, "", "Physics")
        .unwrap()
        .roadmap
        .root_node_id;

    // Act
    let outcome = container.roadmaps.expand(&owner, root).unwrap();

    // Assert
    assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    let names: Vec<_> = outcome.children.iter().map(|c| c.topic_name.as_str()).collect();
    assert_eq!(names, vec!["Optics", "Waves"]);
}
