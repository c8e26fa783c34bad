//! Command dispatch
//!
//! Each invocation loads the snapshot into the repository, runs one
//! command through the service and writes the snapshot back when the
//! command changed anything.

use std::io;
use std::str::FromStr;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::{NodeId, OwnerId, RoadmapId};
use crate::exitcode;
use crate::infrastructure::di::ServiceContainer;

/// Run the parsed command line; returns the process exit code.
pub fn execute(cli: &Cli) -> CliResult<i32> {
    let Some(command) = &cli.command else {
        let mut cmd = Cli::command();
        cmd.print_help()
            .map_err(|e| CliError::Usage(format!("print help: {e}")))?;
        return Ok(exitcode::USAGE);
    };

    let settings = load_settings(cli)?;

    match command {
        Commands::Config { command } => return config_command(command, cli, &settings),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            return Ok(exitcode::OK);
        }
        _ => {}
    }

    let container = ServiceContainer::new(settings)?;
    let owner = OwnerId::new(container.settings.owner.clone());
    let code = run(command, &container, &owner)?;

    if command.is_mutating() {
        container.persist()?;
        debug!("snapshot saved to {}", container.settings.data_file.display());
    }
    Ok(code)
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(data_file) = &cli.data_file {
        settings.data_file = crate::config::expand_path(data_file);
    }
    if let Some(owner) = &cli.owner {
        settings.owner = owner.clone();
    }
    Ok(settings)
}

#[instrument(level = "debug", skip(container))]
fn run(command: &Commands, container: &ServiceContainer, owner: &OwnerId) -> CliResult<i32> {
    let service = &container.roadmaps;
    match command {
        Commands::Create { topic, title } => {
            let view = service.create_roadmap(owner, title.as_deref().unwrap_or(""), topic)?;
            output::success(&format!("created roadmap '{}'", view.roadmap.title));
            output::detail(&format!("roadmap: {}", view.roadmap.id));
            output::detail(&format!("root:    {}", view.roadmap.root_node_id));
        }

        Commands::List { all } => {
            let roadmaps = service.list_roadmaps(owner, *all)?;
            if roadmaps.is_empty() {
                output::info("no roadmaps");
            }
            for r in roadmaps {
                output::info(&format!(
                    "{}  {:<30} {:>4} nodes  depth {}  {}{}",
                    r.id,
                    r.title,
                    r.total_nodes,
                    r.max_depth_reached,
                    r.last_accessed_at.format("%Y-%m-%d %H:%M"),
                    if r.is_active() { "" } else { "  (archived)" }
                ));
            }
        }

        Commands::Show { roadmap, ids } => {
            let view = service.get_roadmap(owner, parse_roadmap_id(roadmap)?)?;
            let tree = view.tree()?;
            output::header(&format!(
                "{} ({} nodes, depth {})",
                view.roadmap.title, view.roadmap.total_nodes, view.roadmap.max_depth_reached
            ));
            print!("{}", tree.to_termtree(|n| output::node_label(n, *ids)));
        }

        Commands::Expand { node } => {
            let outcome = service.expand(owner, parse_node_id(node)?)?;
            if outcome.generated {
                output::success(&format!(
                    "expanded '{}' into {} subtopics",
                    outcome.parent.topic_name,
                    outcome.children.len()
                ));
                if outcome.used_fallback {
                    output::warning("generator output unusable, generic subtopics used");
                }
            } else {
                output::action("already expanded", &outcome.parent.topic_name);
            }
            for child in &outcome.children {
                output::bullet(&format!("{}  {}", child.id, child.topic_name));
            }
        }

        Commands::Explore { node } => {
            let outcome = service.explore(owner, parse_node_id(node)?)?;
            let e = &outcome.explanation;
            output::header(&outcome.node.topic_name);
            output::info(&e.explanation);
            if !e.key_concepts.is_empty() {
                output::header("Key concepts");
                e.key_concepts.iter().for_each(|c| output::bullet(c));
            }
            if !e.why_important.is_empty() {
                output::header("Why it matters");
                output::detail(&e.why_important);
            }
            if !e.real_world_examples.is_empty() {
                output::header("Examples");
                e.real_world_examples.iter().for_each(|c| output::bullet(c));
            }
            if !e.learning_tips.is_empty() {
                output::header("Learning tips");
                output::detail(&e.learning_tips);
            }
            if outcome.used_fallback {
                output::warning("generator output unusable, generic explanation used");
            }
            debug!(
                "explored {} times, cached={}",
                outcome.node.exploration_count(),
                outcome.cached
            );
        }

        Commands::Note { node, text } => {
            let node = service.annotate(owner, parse_node_id(node)?, text)?;
            output::success(&format!("notes updated on '{}'", node.topic_name));
        }

        Commands::History { node } => {
            let id = parse_node_id(node)?;
            let records = service.exploration_history(owner, id)?;
            if records.is_empty() {
                output::info("never explored");
            }
            for r in records {
                output::info(&format!(
                    "{}  {}",
                    r.explored_at.format("%Y-%m-%d %H:%M:%S"),
                    r.kind
                ));
            }
        }

        Commands::DeleteNode { node } => {
            let outcome = service.delete_node(owner, parse_node_id(node)?)?;
            if outcome.roadmap_deleted {
                output::success(&format!("deleted roadmap {}", outcome.roadmap_id));
            } else {
                output::success(&format!("deleted {} nodes", outcome.removed));
            }
        }

        Commands::Delete { roadmap } => {
            let outcome = service.delete_roadmap(owner, parse_roadmap_id(roadmap)?)?;
            output::success(&format!(
                "deleted roadmap {} ({} nodes)",
                outcome.roadmap_id, outcome.removed
            ));
        }

        Commands::Archive { roadmap } => {
            let r = service.archive_roadmap(owner, parse_roadmap_id(roadmap)?)?;
            output::success(&format!("archived '{}'", r.title));
        }

        Commands::Check { roadmap } => {
            let check = service.verify_roadmap(owner, parse_roadmap_id(roadmap)?)?;
            if check.is_healthy() {
                output::success(&format!(
                    "'{}' is consistent ({} nodes)",
                    check.roadmap.title, check.live_nodes
                ));
            } else {
                output::error(&format!("'{}' is inconsistent", check.roadmap.title));
                check.violations.iter().for_each(|v| output::failure(v));
                return Ok(exitcode::UNHEALTHY);
            }
        }

        Commands::Config { .. } | Commands::Completion { .. } => {
            return Err(CliError::Usage("handled before loading roadmaps".into()));
        }
    }
    Ok(exitcode::OK)
}

fn config_command(command: &ConfigCommands, cli: &Cli, settings: &Settings) -> CliResult<i32> {
    match command {
        ConfigCommands::Show => output::info(&settings.to_toml()?),
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            let config = cli.config.clone().or_else(global_config_path);
            match config {
                Some(path) => output::detail(&format!("config: {}", path.display())),
                None => output::warning("no config directory on this platform"),
            }
            output::detail(&format!("data:   {}", settings.data_file.display()));
        }
    }
    Ok(exitcode::OK)
}

fn parse_node_id(raw: &str) -> CliResult<NodeId> {
    NodeId::from_str(raw.trim())
        .map_err(|e| CliError::InvalidArgs(format!("node id '{raw}': {e}")))
}

fn parse_roadmap_id(raw: &str) -> CliResult<RoadmapId> {
    RoadmapId::from_str(raw.trim())
        .map_err(|e| CliError::InvalidArgs(format!("roadmap id '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_garbage_id_when_parsing_then_invalid_args() {
        let err = parse_node_id("not-a-uuid").unwrap_err();
        assert!(matches!(err, CliError::InvalidArgs(_)));
        assert_eq!(err.exit_code(), exitcode::USAGE);
    }

    #[test]
    fn given_explored_node_when_running_explore_then_prints_every_section() {
        use std::sync::Arc;

        use crate::infrastructure::traits::{RealCommandRunner, RealFileSystem};

        let dir = tempfile::TempDir::new().unwrap();
        let settings = Settings {
            data_file: dir.path().join("roadmaps.json"),
            ..Settings::default()
        };
        let container =
            ServiceContainer::with_deps(settings, Arc::new(RealFileSystem), Arc::new(RealCommandRunner))
                .unwrap();
        let owner = OwnerId::new("ada");
        let root = container
            .roadmaps
            .create_roadmap(&owner, "", "Optics")
            .unwrap()
            .roadmap
            .root_node_id;
        let explore = Commands::Explore {
            node: root.to_string(),
        };

        let first = run(&explore, &container, &owner).unwrap();
        let again = run(&explore, &container, &owner).unwrap();

        assert_eq!(first, exitcode::OK);
        assert_eq!(again, exitcode::OK);
        let node = container.roadmaps.node(&owner, root).unwrap();
        assert_eq!(node.exploration_count(), 2);
        assert!(!node.explanation().unwrap().learning_tips.is_empty());
    }

    #[test]
    fn given_uuid_with_whitespace_when_parsing_then_ok() {
        let id = RoadmapId::new();
        let parsed = parse_roadmap_id(&format!(" {id} ")).unwrap();
        assert_eq!(parsed, id);
    }
}
