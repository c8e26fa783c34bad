//! Deterministic fallback content and generator-output normalization
//!
//! Used when the content generator answers with something unusable, so a
//! node never stays stuck in `expanding`.

use itertools::Itertools;

use crate::domain::entities::{Complexity, Explanation, SubtopicDescriptor};

/// Most children a single expansion may create.
pub const MAX_CHILDREN: usize = 5;

/// Generic subtopics for `topic`. Always between 2 and 4 entries; the root
/// gets four, deeper levels fewer so fallback trees stay narrow.
pub fn fallback_subtopics(topic: &str, depth: u32) -> Vec<SubtopicDescriptor> {
    let topic = display_topic(topic);
    let all = [
        (
            format!("Foundations of {topic}"),
            format!("Core vocabulary and basic ideas behind {topic}."),
            Complexity::Beginner,
        ),
        (
            format!("Key principles of {topic}"),
            format!("The rules and mechanisms that make {topic} work."),
            Complexity::Intermediate,
        ),
        (
            format!("Applications of {topic}"),
            format!("Where {topic} shows up in practice."),
            Complexity::Intermediate,
        ),
        (
            format!("Advanced topics in {topic}"),
            format!("Open problems and deeper material around {topic}."),
            Complexity::Advanced,
        ),
    ];
    let count = match depth {
        0 => 4,
        1 => 3,
        _ => 2,
    };
    all.into_iter()
        .take(count)
        .map(|(name, description, complexity)| SubtopicDescriptor {
            name,
            description,
            complexity,
        })
        .collect()
}

/// Generic explanation for `topic`, mentioning its context when known.
pub fn fallback_explanation(topic: &str, ancestors: &[String]) -> Explanation {
    let topic = display_topic(topic);
    let context = match ancestors.last() {
        Some(parent) => format!(" within {parent}"),
        None => String::new(),
    };
    Explanation {
        explanation: format!(
            "{topic} is a subject{context} worth studying on its own. Start with its definitions, \
             then look at how its parts relate to each other."
        ),
        key_concepts: vec![
            format!("Definition of {topic}"),
            format!("Main components of {topic}"),
            format!("How {topic} is applied"),
        ],
        why_important: format!("Understanding {topic} makes the surrounding material easier to follow."),
        real_world_examples: vec![format!("Everyday situations where {topic} appears")],
        learning_tips: "Summarize each concept in your own words and revisit it after a day.".to_string(),
    }
}

/// Clean raw generator output: trim names, drop empty ones, drop
/// case-insensitive duplicates and cap at `max_children`, itself clamped
/// to `1..=MAX_CHILDREN`.
///
/// Returns `None` when nothing usable remains.
pub fn normalize_subtopics(
    raw: Vec<SubtopicDescriptor>,
    max_children: usize,
) -> Option<Vec<SubtopicDescriptor>> {
    let cleaned: Vec<SubtopicDescriptor> = raw
        .into_iter()
        .map(|d| SubtopicDescriptor {
            name: d.name.trim().to_string(),
            description: d.description.trim().to_string(),
            complexity: d.complexity,
        })
        .filter(|d| !d.name.is_empty())
        .unique_by(|d| d.name.to_lowercase())
        .take(max_children.clamp(1, MAX_CHILDREN))
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// An explanation is usable when its main text is not blank.
pub fn is_usable_explanation(explanation: &Explanation) -> bool {
    !explanation.explanation.trim().is_empty()
}

fn display_topic(topic: &str) -> &str {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        "this topic"
    } else {
        trimmed
    }
}
