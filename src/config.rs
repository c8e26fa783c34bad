//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Config file: `$XDG_CONFIG_HOME/roadmap/roadmap.toml`, or an explicit path
//! 3. Environment variables: `ROADMAP__*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::fallback::MAX_CHILDREN;
use crate::domain::layout::{LayoutEngine, DEFAULT_BASE_RADIUS, DEFAULT_RADIUS_STEP};

/// Upper bound on children per expansion.
pub const DEFAULT_MAX_CHILDREN: usize = MAX_CHILDREN;
pub const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 60;

/// Placement constants for the layout engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub base_radius: f64,
    pub radius_step: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_radius: DEFAULT_BASE_RADIUS,
            radius_step: DEFAULT_RADIUS_STEP,
        }
    }
}

impl LayoutConfig {
    pub fn engine(&self) -> LayoutEngine {
        LayoutEngine::new(self.base_radius, self.radius_step)
    }
}

/// Content generator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// External generator program; the offline template generator is used when unset
    pub command: Option<String>,
    /// Extra arguments for the generator program
    pub args: Vec<String>,
    /// Seconds to wait for one generator call
    pub timeout_secs: u64,
    /// Maximum children kept from one expansion
    pub max_children: usize,
    /// Replace malformed generator output with generic content
    pub fallback: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: DEFAULT_GENERATOR_TIMEOUT_SECS,
            max_children: DEFAULT_MAX_CHILDREN,
            fallback: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawLayoutConfig {
    pub base_radius: Option<f64>,
    pub radius_step: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawGeneratorConfig {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub max_children: Option<usize>,
    pub fallback: Option<bool>,
}

/// Raw settings for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub data_file: Option<PathBuf>,
    pub owner: Option<String>,
    pub layout: RawLayoutConfig,
    pub generator: RawGeneratorConfig,
}

/// Unified configuration for roadmap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// JSON snapshot holding all roadmaps (default: platform data dir)
    pub data_file: PathBuf,
    /// Owner id used for new roadmaps and ownership checks (default: $USER)
    pub owner: String,
    pub layout: LayoutConfig,
    pub generator: GeneratorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let owner = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "local".into());
        Self {
            data_file: default_data_file(),
            owner,
            layout: LayoutConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

fn default_data_file() -> PathBuf {
    ProjectDirs::from("", "", "roadmap")
        .map(|dirs| dirs.data_dir().join("roadmaps.json"))
        .unwrap_or_else(|| PathBuf::from("~/.roadmap/roadmaps.json"))
}

/// Get the XDG config directory for roadmap.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "roadmap").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("roadmap.toml"))
}

fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the input as is.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

impl Settings {
    fn apply_file(&self, raw: &RawSettings) -> Self {
        Self {
            data_file: raw.data_file.clone().unwrap_or_else(|| self.data_file.clone()),
            owner: raw.owner.clone().unwrap_or_else(|| self.owner.clone()),
            layout: LayoutConfig {
                base_radius: raw.layout.base_radius.unwrap_or(self.layout.base_radius),
                radius_step: raw.layout.radius_step.unwrap_or(self.layout.radius_step),
            },
            generator: GeneratorConfig {
                command: raw
                    .generator
                    .command
                    .clone()
                    .or_else(|| self.generator.command.clone()),
                args: raw
                    .generator
                    .args
                    .clone()
                    .unwrap_or_else(|| self.generator.args.clone()),
                timeout_secs: raw
                    .generator
                    .timeout_secs
                    .unwrap_or(self.generator.timeout_secs),
                max_children: raw
                    .generator
                    .max_children
                    .unwrap_or(self.generator.max_children),
                fallback: raw.generator.fallback.unwrap_or(self.generator.fallback),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// `config_file` replaces the global config location when given; it
    /// must then exist.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        match config_file {
            Some(path) => {
                let raw = load_raw_settings(path)?;
                current = current.apply_file(&raw);
            }
            None => {
                if let Some(global_path) = global_config_path() {
                    if global_path.exists() {
                        let raw = load_raw_settings(&global_path)?;
                        current = current.apply_file(&raw);
                    }
                }
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.data_file = expand_path(&current.data_file);
        current.validate()?;
        Ok(current)
    }

    /// Apply ROADMAP__* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("ROADMAP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("generator.args")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("data_file") {
            settings.data_file = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("owner") {
            settings.owner = val;
        }
        if let Ok(val) = config.get_float("layout.base_radius") {
            settings.layout.base_radius = val;
        }
        if let Ok(val) = config.get_float("layout.radius_step") {
            settings.layout.radius_step = val;
        }
        if let Ok(val) = config.get_string("generator.command") {
            settings.generator.command = Some(val);
        }
        if let Ok(val) = config.get::<Vec<String>>("generator.args") {
            settings.generator.args = val;
        }
        if let Ok(val) = config.get::<u64>("generator.timeout_secs") {
            settings.generator.timeout_secs = val;
        }
        if let Ok(val) = config.get::<usize>("generator.max_children") {
            settings.generator.max_children = val;
        }
        if let Ok(val) = config.get_bool("generator.fallback") {
            settings.generator.fallback = val;
        }

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if !(1..=MAX_CHILDREN).contains(&self.generator.max_children) {
            return Err(ApplicationError::Config {
                message: format!(
                    "generator.max_children must be between 1 and {MAX_CHILDREN}, got {}",
                    self.generator.max_children
                ),
            });
        }
        if self.generator.timeout_secs == 0 {
            return Err(ApplicationError::Config {
                message: "generator.timeout_secs must be at least 1".into(),
            });
        }
        if !(self.layout.base_radius.is_finite() && self.layout.radius_step.is_finite()) {
            return Err(ApplicationError::Config {
                message: "layout radii must be finite numbers".into(),
            });
        }
        if self.owner.trim().is_empty() {
            return Err(ApplicationError::Config {
                message: "owner must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# roadmap configuration
#
# Locations (by precedence, lowest to highest):
#   File: ~/.config/roadmap/roadmap.toml  (or --config <path>)
#   Env:  ROADMAP__* environment variables, e.g. ROADMAP__GENERATOR__COMMAND
#
# JSON file holding all roadmaps
# data_file = "~/.local/share/roadmap/roadmaps.json"

# Owner id for new roadmaps (defaults to $USER)
# owner = "ada"

[layout]
# Radius of the first ring around a parent
# base_radius = 300.0
# Extra radius per parent depth level
# radius_step = 50.0

[generator]
# External program receiving a JSON request on stdin and answering JSON on stdout.
# Without it, generic offline content is generated.
# command = "roadmap-llm"
# args = ["--model", "small"]

# Seconds to wait for one generation
# timeout_secs = 60

# Maximum subtopics kept per expansion
# max_children = 5

# Replace malformed generator output with generic content
# fallback = true
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_created_then_match_reference_constants() {
        let settings = Settings::default();
        assert_eq!(settings.layout.base_radius, 300.0);
        assert_eq!(settings.layout.radius_step, 50.0);
        assert_eq!(settings.generator.max_children, 5);
        assert!(settings.generator.fallback);
        assert!(settings.generator.command.is_none());
    }

    #[test]
    fn given_partial_file_when_applying_then_unspecified_fields_keep_base() {
        let raw: RawSettings = toml::from_str(
            r#"
owner = "ada"
[generator]
max_children = 3
"#,
        )
        .expect("parse raw settings");

        let merged = Settings::default().apply_file(&raw);

        assert_eq!(merged.owner, "ada");
        assert_eq!(merged.generator.max_children, 3);
        assert_eq!(merged.generator.timeout_secs, DEFAULT_GENERATOR_TIMEOUT_SECS);
        assert_eq!(merged.layout, LayoutConfig::default());
    }

    #[test]
    fn given_zero_max_children_when_validating_then_config_error() {
        let mut settings = Settings::default();
        settings.generator.max_children = 0;
        assert!(matches!(
            settings.validate(),
            Err(ApplicationError::Config { .. })
        ));
    }

    #[test]
    fn given_max_children_above_bound_when_validating_then_config_error() {
        let mut settings = Settings::default();
        settings.generator.max_children = MAX_CHILDREN + 1;
        assert!(matches!(
            settings.validate(),
            Err(ApplicationError::Config { .. })
        ));
    }

    #[test]
    fn given_tilde_path_when_expanding_then_uses_home() {
        let home = std::env::var("HOME").expect("HOME should be set");
        let expanded = expand_path(Path::new("~/roadmaps.json"));
        assert!(expanded.to_string_lossy().starts_with(&home));
    }

    #[test]
    fn given_template_when_parsed_then_is_valid_toml() {
        let raw: Result<RawSettings, _> = toml::from_str(&Settings::template());
        assert!(raw.is_ok());
    }
}
