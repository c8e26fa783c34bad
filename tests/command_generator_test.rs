//! Tests for CommandGenerator with a scripted CommandRunner

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use roadmap_engine::infrastructure::generator::{
    CommandGenerator, GenerationRequest, GenerationTask,
};
use tempfile::TempDir;

use roadmap_engine::infrastructure::traits::{
    CommandRunner, ContentGenerator, GenerationError, RealCommandRunner,
};

/// Runner replying with a fixed output and recording what it received.
struct MockRunner {
    stdout: String,
    exit_code: i32,
    delay: Duration,
    seen: Mutex<Vec<(String, Vec<String>, String)>>,
}

impl MockRunner {
    fn replying(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            exit_code: 0,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn last_request(&self) -> GenerationRequest {
        let seen = self.seen.lock().unwrap();
        let (_, _, stdin) = seen.last().expect("runner was called");
        serde_json::from_str(stdin).unwrap()
    }
}

impl CommandRunner for MockRunner {
    fn run_with_stdin(
        &self,
        cmd: &str,
        args: &[String],
        stdin: &str,
        timeout: Duration,
    ) -> io::Result<Output> {
        self.seen
            .lock()
            .unwrap()
            .push((cmd.to_string(), args.to_vec(), stdin.to_string()));
        if self.delay > timeout {
            thread::sleep(timeout);
            return Err(io::Error::new(io::ErrorKind::TimedOut, "killed"));
        }
        thread::sleep(self.delay);
        Ok(Output {
            status: ExitStatus::from_raw(self.exit_code << 8),
            stdout: self.stdout.clone().into_bytes(),
            stderr: b"model overloaded".to_vec(),
        })
    }
}

fn generator(runner: Arc<MockRunner>, timeout: Duration) -> CommandGenerator {
    CommandGenerator::new(
        runner,
        "roadmap-llm",
        vec!["--model".into(), "small".into()],
        timeout,
        4,
    )
}

#[test]
fn given_list_reply_when_expanding_then_subtopics_parsed_and_request_sent() {
    // Arrange
    let runner = Arc::new(MockRunner::replying(
        r#"[{"name": "Heat", "description": "energy in transit", "complexity": "beginner"},
            {"name": "Work"}]"#,
    ));
    let gen = generator(runner.clone(), Duration::from_secs(5));

    // Act
    let subtopics = gen
        .expand_topic("Thermodynamics", &["Physics".to_string()], 1)
        .unwrap();

    // Assert
    assert_eq!(subtopics.len(), 2);
    assert_eq!(subtopics[0].name, "Heat");
    assert_eq!(subtopics[1].description, "");

    let request = runner.last_request();
    assert_eq!(request.task, GenerationTask::Expand);
    assert_eq!(request.topic, "Thermodynamics");
    assert_eq!(request.ancestors, vec!["Physics"]);
    assert_eq!(request.depth, 1);
    assert_eq!(request.max_children, 4);
    let seen = runner.seen.lock().unwrap();
    assert_eq!(seen[0].0, "roadmap-llm");
    assert_eq!(seen[0].1, vec!["--model", "small"]);
}

#[test]
fn given_wrapped_reply_when_expanding_then_subtopics_parsed() {
    let runner = Arc::new(MockRunner::replying(
        r#"{"subtopics": [{"name": "Entropy", "description": "", "complexity": "advanced"}]}"#,
    ));
    let gen = generator(runner, Duration::from_secs(5));

    let subtopics = gen.expand_topic("Thermodynamics", &[], 0).unwrap();

    assert_eq!(subtopics.len(), 1);
    assert_eq!(subtopics[0].name, "Entropy");
}

#[test]
fn given_explanation_reply_when_explaining_then_parsed() {
    let runner = Arc::new(MockRunner::replying(
        r#"{"explanation": "Entropy measures disorder.", "key_concepts": ["microstates"]}"#,
    ));
    let gen = generator(runner.clone(), Duration::from_secs(5));

    let explanation = gen.explain_topic("Entropy", &[], 2).unwrap();

    assert_eq!(explanation.explanation, "Entropy measures disorder.");
    assert_eq!(explanation.key_concepts, vec!["microstates"]);
    assert_eq!(runner.last_request().task, GenerationTask::Explain);
}

#[test]
fn given_prose_reply_when_expanding_then_malformed() {
    let runner = Arc::new(MockRunner::replying("Sure! Here are some subtopics:"));
    let gen = generator(runner, Duration::from_secs(5));

    let err = gen.expand_topic("Thermodynamics", &[], 0).unwrap_err();

    assert!(matches!(err, GenerationError::Malformed(_)));
}

#[test]
fn given_failing_command_when_explaining_then_provider_error_with_stderr() {
    let runner = Arc::new(MockRunner {
        exit_code: 3,
        ..MockRunner::replying("")
    });
    let gen = generator(runner, Duration::from_secs(5));

    let err = gen.explain_topic("Entropy", &[], 0).unwrap_err();

    match err {
        GenerationError::Provider(message) => assert!(message.contains("model overloaded")),
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[test]
fn given_slow_command_when_expanding_then_timeout() {
    let runner = Arc::new(MockRunner {
        delay: Duration::from_millis(500),
        ..MockRunner::replying("[]")
    });
    let gen = generator(runner, Duration::from_millis(50));

    let err = gen.expand_topic("Thermodynamics", &[], 0).unwrap_err();

    assert!(matches!(err, GenerationError::Timeout(_)));
}

// ============================================================
// real processes
// ============================================================

#[test]
fn given_hanging_command_when_timed_out_then_killed_before_side_effect() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("marker");
    let script = format!("sleep 1; touch '{}'", marker.display());
    let gen = CommandGenerator::new(
        Arc::new(RealCommandRunner),
        "sh",
        vec!["-c".into(), script],
        Duration::from_millis(200),
        4,
    );

    // Act
    let err = gen.expand_topic("Thermodynamics", &[], 0).unwrap_err();
    thread::sleep(Duration::from_millis(1500));

    // Assert
    assert!(matches!(err, GenerationError::Timeout(_)));
    assert!(!marker.exists(), "timed-out command kept running");
}

#[test]
fn given_real_command_when_replying_in_time_then_output_captured() {
    let runner = RealCommandRunner;

    let output = runner
        .run_with_stdin(
            "sh",
            &["-c".to_string(), "cat; echo oops >&2".to_string()],
            r#"[{"name": "Heat"}]"#,
            Duration::from_secs(5),
        )
        .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), r#"[{"name": "Heat"}]"#);
    assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "oops");
}
