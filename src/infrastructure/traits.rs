//! I/O boundary traits for testability
//!
//! These traits abstract storage, text generation and process/file access,
//! allowing the roadmap service to be tested with mock implementations.

use std::io::{self, Read};
use std::path::Path;
use std::process::Output;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{
    ConceptNode, DomainResult, Explanation, ExplorationRecord, NodeId, OwnerId, Roadmap,
    RoadmapId, RoadmapStatus, SubtopicDescriptor,
};

// ============================================================
// STORAGE
// ============================================================

/// Result of trying to take the expansion lock on a node.
#[derive(Debug, Clone)]
pub enum ExpansionClaim {
    /// The node moved `unexpanded -> expanding`; the caller must commit or abort.
    Claimed(ConceptNode),
    /// The node was already expanded; nothing changed.
    AlreadyExpanded(ConceptNode),
}

/// Result of applying one explore() call.
#[derive(Debug, Clone)]
pub struct ExplorationOutcome {
    pub node: ConceptNode,
    pub explanation: Explanation,
    /// This call performed the `unexplored -> explored` transition.
    pub first: bool,
}

/// What a subtree or roadmap deletion removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtreeRemoval {
    pub roadmap_id: RoadmapId,
    pub removed: Vec<NodeId>,
    pub history_removed: usize,
    pub roadmap_deleted: bool,
}

/// Persistence for roadmaps, nodes and exploration history.
///
/// Every method is one atomic unit: implementations must never expose a
/// state where counters disagree with the node set.
pub trait RoadmapRepository: Send + Sync {
    /// Insert a roadmap together with its root node.
    fn create_roadmap(&self, roadmap: Roadmap, root: ConceptNode) -> DomainResult<()>;

    fn roadmap(&self, id: RoadmapId) -> DomainResult<Option<Roadmap>>;

    /// All roadmaps of an owner, most recently accessed first.
    fn roadmaps_of(&self, owner: &OwnerId) -> DomainResult<Vec<Roadmap>>;

    /// Set `last_accessed_at` and return the updated roadmap.
    fn touch_roadmap(&self, id: RoadmapId, at: DateTime<Utc>) -> DomainResult<Roadmap>;

    fn set_roadmap_status(&self, id: RoadmapId, status: RoadmapStatus) -> DomainResult<Roadmap>;

    fn node(&self, id: NodeId) -> DomainResult<Option<ConceptNode>>;

    /// Live children of a node, in creation order.
    fn children_of(&self, id: NodeId) -> DomainResult<Vec<ConceptNode>>;

    /// Every live node of a roadmap.
    fn nodes_of(&self, roadmap: RoadmapId) -> DomainResult<Vec<ConceptNode>>;

    /// Compare-and-set `unexpanded -> expanding`.
    ///
    /// Fails with `Busy` when the node is already `expanding` and with
    /// `InvalidState` when its roadmap is archived.
    fn begin_expansion(&self, id: NodeId) -> DomainResult<ExpansionClaim>;

    /// Insert `children`, mark the parent expanded with `cache` and update
    /// the roadmap counters, all at once.
    ///
    /// Fails with `NotFound` when the parent was deleted meanwhile and with
    /// `InvalidState` when it is no longer `expanding` or its roadmap was
    /// archived meanwhile.
    fn commit_expansion(
        &self,
        parent: NodeId,
        children: Vec<ConceptNode>,
        cache: Vec<SubtopicDescriptor>,
        at: DateTime<Utc>,
    ) -> DomainResult<ConceptNode>;

    /// Revert `expanding -> unexpanded`. A no-op for nodes in any other state.
    fn abort_expansion(&self, id: NodeId) -> DomainResult<()>;

    /// Apply one explore() call and append its history record.
    ///
    /// `fresh` is only used when the node is still unexplored; an unexplored
    /// node without a fresh payload is `InvalidState`, and so is a node of an
    /// archived roadmap.
    fn record_exploration(
        &self,
        id: NodeId,
        fresh: Option<Explanation>,
        at: DateTime<Utc>,
    ) -> DomainResult<ExplorationOutcome>;

    fn exploration_history(&self, id: NodeId) -> DomainResult<Vec<ExplorationRecord>>;

    fn update_notes(&self, id: NodeId, notes: &str) -> DomainResult<ConceptNode>;

    /// Delete a node, its descendants and their history. Deleting a root
    /// deletes the whole roadmap.
    fn delete_subtree(&self, id: NodeId) -> DomainResult<SubtreeRemoval>;

    /// Delete a roadmap with every node and history record.
    fn delete_roadmap(&self, id: RoadmapId) -> DomainResult<SubtreeRemoval>;
}

// ============================================================
// TEXT GENERATION
// ============================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("generator failed: {0}")]
    Provider(String),

    #[error("generator returned malformed output: {0}")]
    Malformed(String),
}

/// External text-generation collaborator. Stateless from the core's view.
pub trait ContentGenerator: Send + Sync {
    /// Child subtopics for `topic`; `ancestors` runs from the root to the parent.
    fn expand_topic(
        &self,
        topic: &str,
        ancestors: &[String],
        depth: u32,
    ) -> Result<Vec<SubtopicDescriptor>, GenerationError>;

    /// Explanation payload for `topic`.
    fn explain_topic(
        &self,
        topic: &str,
        ancestors: &[String],
        depth: u32,
    ) -> Result<Explanation, GenerationError>;
}

// ============================================================
// FILES AND PROCESSES
// ============================================================

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Rename/move a file.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// External command runner abstraction.
pub trait CommandRunner: Send + Sync {
    /// Run a command, feed `stdin` and capture its output.
    ///
    /// A command still running after `timeout` is killed and the call fails
    /// with [`io::ErrorKind::TimedOut`].
    fn run_with_stdin(
        &self,
        cmd: &str,
        args: &[String],
        stdin: &str,
        timeout: Duration,
    ) -> io::Result<Output>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Real command runner implementation.
#[derive(Debug, Default)]
pub struct RealCommandRunner;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

impl CommandRunner for RealCommandRunner {
    fn run_with_stdin(
        &self,
        cmd: &str,
        args: &[String],
        stdin: &str,
        timeout: Duration,
    ) -> io::Result<Output> {
        use std::io::Write;
        use std::process::Stdio;

        let mut child = std::process::Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Pipes are fed and drained on their own threads so a chatty or
        // stubborn child cannot block the deadline check.
        if let Some(mut child_stdin) = child.stdin.take() {
            let input = stdin.to_string();
            thread::spawn(move || {
                if let Err(e) = child_stdin.write_all(input.as_bytes()) {
                    debug!("run_with_stdin: stdin closed early: {}", e);
                }
            });
        }
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                warn!("run_with_stdin: killing {} after {:?}", cmd, timeout);
                child.kill()?;
                child.wait()?;
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{cmd} killed after {timeout:?}"),
                ));
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf) {
                debug!("run_with_stdin: reading pipe failed: {}", e);
            }
        }
        buf
    })
}
