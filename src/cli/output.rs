//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use colored::Colorize;

use crate::domain::{ConceptNode, ExpansionStatus};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print success status (green checkmark)
pub fn success(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Print failure status (red X, indented)
pub fn failure(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print indented bullet item
pub fn bullet(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {} {}", "-".dimmed(), msg);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// One-line tree label: status marker, topic and optionally the id.
pub fn node_label(node: &ConceptNode, with_id: bool) -> String {
    let marker = match node.expansion_status() {
        ExpansionStatus::Expanded => "+".green(),
        ExpansionStatus::Expanding => "~".yellow(),
        ExpansionStatus::Unexpanded => "·".dimmed(),
    };
    let topic = if node.is_explored() {
        node.topic_name.bold()
    } else {
        node.topic_name.normal()
    };
    let mut label = format!("{marker} {topic}");
    if node.exploration_count() > 1 {
        label.push_str(&format!(" {}", format!("x{}", node.exploration_count()).dimmed()));
    }
    if !node.user_notes.is_empty() {
        label.push_str(&format!(" {}", "[note]".cyan()));
    }
    if with_id {
        label.push_str(&format!(" {}", node.id.to_string().dimmed()));
    }
    label
}
