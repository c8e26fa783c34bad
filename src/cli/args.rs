//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Self-expanding knowledge roadmaps: grow a concept tree by expanding and exploring topics
#[derive(Parser, Debug)]
#[command(name = "roadmap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Config file (default: global config)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Snapshot file holding all roadmaps
    #[arg(long, global = true, env = "ROADMAP_DATA_FILE", value_hint = ValueHint::FilePath)]
    pub data_file: Option<PathBuf>,

    /// Act as this owner instead of the configured one
    #[arg(long, global = true)]
    pub owner: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a roadmap on a topic
    Create {
        /// Root topic, e.g. "Thermodynamics"
        topic: String,
        /// Display title (default: the topic)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List your roadmaps, most recently used first
    List {
        /// Include archived roadmaps
        #[arg(short, long)]
        all: bool,
    },

    /// Show a roadmap as a tree
    Show {
        /// Roadmap id
        roadmap: String,
        /// Print node ids next to topics
        #[arg(long)]
        ids: bool,
    },

    /// Generate the subtopics of a node
    Expand {
        /// Node id
        node: String,
    },

    /// Explain a node
    Explore {
        /// Node id
        node: String,
    },

    /// Replace the notes of a node
    Note {
        /// Node id
        node: String,
        /// Note text (empty clears the notes)
        text: String,
    },

    /// Show when a node was explored
    History {
        /// Node id
        node: String,
    },

    /// Delete a node and everything below it
    #[command(name = "delete-node")]
    DeleteNode {
        /// Node id
        node: String,
    },

    /// Delete a whole roadmap
    Delete {
        /// Roadmap id
        roadmap: String,
    },

    /// Archive a roadmap (read-only afterwards)
    Archive {
        /// Roadmap id
        roadmap: String,
    },

    /// Verify the structure of a roadmap
    Check {
        /// Roadmap id
        roadmap: String,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a commented config template
    Template,

    /// Show config paths
    Path,
}

impl Commands {
    /// Whether the command changes stored roadmaps.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Commands::Create { .. }
                | Commands::Show { .. }
                | Commands::Expand { .. }
                | Commands::Explore { .. }
                | Commands::Note { .. }
                | Commands::DeleteNode { .. }
                | Commands::Delete { .. }
                | Commands::Archive { .. }
        )
    }
}
