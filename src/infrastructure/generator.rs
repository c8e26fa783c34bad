//! Content generator implementations
//!
//! - [`TemplateGenerator`]: offline and deterministic, built from the
//!   fallback content; the default when no generator command is configured.
//! - [`CommandGenerator`]: delegates to an external program speaking JSON
//!   over stdin/stdout, e.g. a wrapper around a language-model API.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::fallback::{fallback_explanation, fallback_subtopics};
use crate::domain::{Explanation, SubtopicDescriptor};
use crate::infrastructure::traits::{CommandRunner, ContentGenerator, GenerationError};

/// Offline generator producing generic, deterministic content.
#[derive(Debug, Default, Clone)]
pub struct TemplateGenerator;

impl ContentGenerator for TemplateGenerator {
    fn expand_topic(
        &self,
        topic: &str,
        _ancestors: &[String],
        depth: u32,
    ) -> Result<Vec<SubtopicDescriptor>, GenerationError> {
        Ok(fallback_subtopics(topic, depth))
    }

    fn explain_topic(
        &self,
        topic: &str,
        ancestors: &[String],
        _depth: u32,
    ) -> Result<Explanation, GenerationError> {
        Ok(fallback_explanation(topic, ancestors))
    }
}

/// Request written to the generator command's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub task: GenerationTask,
    pub topic: String,
    pub ancestors: Vec<String>,
    pub depth: u32,
    pub max_children: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationTask {
    Expand,
    Explain,
}

/// Accepted shapes of an expand answer: a bare list or `{"subtopics": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpandResponse {
    List(Vec<SubtopicDescriptor>),
    Wrapped { subtopics: Vec<SubtopicDescriptor> },
}

/// Generator backed by an external command.
pub struct CommandGenerator {
    runner: Arc<dyn CommandRunner>,
    command: String,
    args: Vec<String>,
    timeout: Duration,
    max_children: usize,
}

impl CommandGenerator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        command: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
        max_children: usize,
    ) -> Self {
        Self {
            runner,
            command: command.into(),
            args,
            timeout,
            max_children,
        }
    }

    /// Run the command with a bounded wait and return its stdout.
    ///
    /// The runner kills the command once the timeout passes.
    fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let input = serde_json::to_string(request)
            .map_err(|e| GenerationError::Provider(format!("encode request: {e}")))?;

        let output = self
            .runner
            .run_with_stdin(&self.command, &self.args, &input, self.timeout)
            .map_err(|e| match e.kind() {
                io::ErrorKind::TimedOut => {
                    warn!("generator command {} timed out", self.command);
                    GenerationError::Timeout(self.timeout)
                }
                _ => GenerationError::Provider(format!("run {}: {e}", self.command)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenerationError::Provider(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| GenerationError::Malformed(format!("stdout is not UTF-8: {e}")))
    }

    fn request(&self, task: GenerationTask, topic: &str, ancestors: &[String], depth: u32) -> GenerationRequest {
        GenerationRequest {
            task,
            topic: topic.to_string(),
            ancestors: ancestors.to_vec(),
            depth,
            max_children: self.max_children,
        }
    }
}

impl ContentGenerator for CommandGenerator {
    #[instrument(level = "debug", skip(self, ancestors))]
    fn expand_topic(
        &self,
        topic: &str,
        ancestors: &[String],
        depth: u32,
    ) -> Result<Vec<SubtopicDescriptor>, GenerationError> {
        let stdout = self.invoke(&self.request(GenerationTask::Expand, topic, ancestors, depth))?;
        let response: ExpandResponse = serde_json::from_str(stdout.trim())
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let subtopics = match response {
            ExpandResponse::List(list) => list,
            ExpandResponse::Wrapped { subtopics } => subtopics,
        };
        debug!("expand_topic: {} subtopics from command", subtopics.len());
        Ok(subtopics)
    }

    #[instrument(level = "debug", skip(self, ancestors))]
    fn explain_topic(
        &self,
        topic: &str,
        ancestors: &[String],
        depth: u32,
    ) -> Result<Explanation, GenerationError> {
        let stdout = self.invoke(&self.request(GenerationTask::Explain, topic, ancestors, depth))?;
        serde_json::from_str(stdout.trim()).map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}
