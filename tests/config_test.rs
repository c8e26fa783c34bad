//! Integration tests for Settings loading with layered precedence.
//!
//! Precedence (lowest to highest):
//! - compiled defaults
//! - config file (explicit path here, so the user's global config is never read)
//! - ROADMAP__* environment variables
//!
//! Environment-variable tests only touch `layout.radius_step`; no other test
//! in this file asserts on it, so parallel tests do not interfere.

use std::fs;

use tempfile::TempDir;

use roadmap_engine::application::ApplicationError;
use roadmap_engine::config::Settings;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("roadmap.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn given_config_file_when_load_then_overrides_defaults() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
owner = "ada"
data_file = "/tmp/roadmap-test/roadmaps.json"

[layout]
base_radius = 120.0

[generator]
command = "roadmap-llm"
args = ["--model", "small"]
max_children = 3
fallback = false
"#,
    );

    // Act
    let settings = Settings::load(Some(path.as_path())).expect("load settings");

    // Assert
    assert_eq!(settings.owner, "ada");
    assert_eq!(
        settings.data_file.to_string_lossy(),
        "/tmp/roadmap-test/roadmaps.json"
    );
    assert_eq!(settings.layout.base_radius, 120.0);
    assert_eq!(settings.generator.command.as_deref(), Some("roadmap-llm"));
    assert_eq!(settings.generator.args, vec!["--model", "small"]);
    assert_eq!(settings.generator.max_children, 3);
    assert!(!settings.generator.fallback);
    assert_eq!(settings.generator.timeout_secs, 60);
}

#[test]
fn given_tilde_in_data_file_when_load_then_expanded() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "data_file = \"~/roadmaps.json\"\n");
    let home = std::env::var("HOME").expect("HOME should be set");

    // Act
    let settings = Settings::load(Some(path.as_path())).expect("load settings");

    // Assert
    assert!(settings.data_file.starts_with(&home));
    assert!(!settings.data_file.to_string_lossy().contains('~'));
}

#[test]
fn given_missing_explicit_file_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();

    let result = Settings::load(Some(dir.path().join("nope.toml").as_path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_invalid_toml_when_load_then_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[generator\nmax_children = ");

    let result = Settings::load(Some(path.as_path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_zero_timeout_when_load_then_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[generator]\ntimeout_secs = 0\n");

    let result = Settings::load(Some(path.as_path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_max_children_out_of_range_when_load_then_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[generator]\nmax_children = 50\n");

    let result = Settings::load(Some(path.as_path()));

    assert!(matches!(result, Err(ApplicationError::Config { .. })));
}

#[test]
fn given_env_var_when_load_then_overrides_file() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[layout]\nradius_step = 10.0\n");
    std::env::set_var("ROADMAP__LAYOUT__RADIUS_STEP", "75.5");

    // Act
    let settings = Settings::load(Some(path.as_path()));
    std::env::remove_var("ROADMAP__LAYOUT__RADIUS_STEP");

    // Assert
    let settings = settings.expect("load settings");
    assert_eq!(settings.layout.radius_step, 75.5);
}

#[test]
fn given_settings_when_rendered_as_toml_then_reloadable() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let original = Settings::load(Some(write_config(&dir, "owner = \"grace\"\n").as_path())).unwrap();

    // Act
    let rendered = original.to_toml().unwrap();
    let reloaded = Settings::load(Some(write_config(&dir, &rendered).as_path())).unwrap();

    // Assert
    assert_eq!(reloaded.owner, "grace");
    assert_eq!(reloaded.generator, original.generator);
    assert_eq!(reloaded.data_file, original.data_file);
}
