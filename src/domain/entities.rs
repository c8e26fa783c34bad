//! Domain entities: roadmaps, concept nodes and their two state machines

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::layout::Position;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a concept node.
    NodeId
);
uuid_id!(
    /// Identifier of a roadmap.
    RoadmapId
);
uuid_id!(
    /// Identifier of an exploration-history record.
    RecordId
);

/// Identifier of the learner owning a roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoadmapStatus {
    Active,
    Archived,
}

impl fmt::Display for RoadmapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoadmapStatus::Active => f.write_str("active"),
            RoadmapStatus::Archived => f.write_str("archived"),
        }
    }
}

/// One learning tree rooted at a topic.
///
/// The counters mirror the live node set and are only changed by the
/// repository in the same atomic unit that inserts or removes nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    pub id: RoadmapId,
    pub owner_id: OwnerId,
    pub title: String,
    pub root_topic: String,
    pub root_node_id: NodeId,
    pub total_nodes: u32,
    pub max_depth_reached: u32,
    pub status: RoadmapStatus,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Roadmap {
    pub fn is_active(&self) -> bool {
        self.status == RoadmapStatus::Active
    }
}

/// Difficulty hint attached to a generated subtopic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Beginner => f.write_str("beginner"),
            Complexity::Intermediate => f.write_str("intermediate"),
            Complexity::Advanced => f.write_str("advanced"),
        }
    }
}

/// Child topic as returned by the content generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtopicDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub complexity: Complexity,
}

/// Explanation payload cached on an explored node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Explanation {
    pub explanation: String,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub why_important: String,
    #[serde(default)]
    pub real_world_examples: Vec<String>,
    #[serde(default)]
    pub learning_tips: String,
}

/// Expansion state machine: `Unexpanded -> Expanding -> Expanded`,
/// with `Expanding -> Unexpanded` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Expansion {
    #[default]
    Unexpanded,
    Expanding,
    Expanded {
        /// Last generator output; not reconciled when children are deleted.
        children_cache: Vec<SubtopicDescriptor>,
    },
}

/// Flat view of [`Expansion`] for display and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionStatus {
    Unexpanded,
    Expanding,
    Expanded,
}

impl fmt::Display for ExpansionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpansionStatus::Unexpanded => f.write_str("unexpanded"),
            ExpansionStatus::Expanding => f.write_str("expanding"),
            ExpansionStatus::Expanded => f.write_str("expanded"),
        }
    }
}

/// Exploration state machine: `Unexplored -> Explored`, never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Exploration {
    #[default]
    Unexplored,
    Explored {
        explanation: Explanation,
        count: u32,
        last_explored_at: DateTime<Utc>,
    },
}

/// One topic or subtopic in a roadmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub id: NodeId,
    /// Lookup relation to the owning roadmap, never ownership.
    pub roadmap_id: RoadmapId,
    pub owner_id: OwnerId,
    pub parent_id: Option<NodeId>,
    pub topic_name: String,
    pub description: String,
    pub depth_level: u32,
    #[serde(default)]
    pub expansion: Expansion,
    #[serde(default)]
    pub exploration: Exploration,
    #[serde(default)]
    pub user_notes: String,
    pub position: Position,
    pub created_at: DateTime<Utc>,
}

impl ConceptNode {
    /// Create the root node of a new roadmap, fixed at the origin.
    pub fn root(
        roadmap_id: RoadmapId,
        owner_id: OwnerId,
        topic: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            roadmap_id,
            owner_id,
            parent_id: None,
            topic_name: topic.to_string(),
            description: String::new(),
            depth_level: 0,
            expansion: Expansion::Unexpanded,
            exploration: Exploration::Unexplored,
            user_notes: String::new(),
            position: Position::ORIGIN,
            created_at: now,
        }
    }

    /// Create a fresh child of `parent` from a generated descriptor.
    pub fn child_of(
        parent: &ConceptNode,
        descriptor: &SubtopicDescriptor,
        position: Position,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            roadmap_id: parent.roadmap_id,
            owner_id: parent.owner_id.clone(),
            parent_id: Some(parent.id),
            topic_name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            depth_level: parent.depth_level + 1,
            expansion: Expansion::Unexpanded,
            exploration: Exploration::Unexplored,
            user_notes: String::new(),
            position,
            created_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn expansion_status(&self) -> ExpansionStatus {
        match self.expansion {
            Expansion::Unexpanded => ExpansionStatus::Unexpanded,
            Expansion::Expanding => ExpansionStatus::Expanding,
            Expansion::Expanded { .. } => ExpansionStatus::Expanded,
        }
    }

    pub fn generated_children_cache(&self) -> Option<&[SubtopicDescriptor]> {
        match &self.expansion {
            Expansion::Expanded { children_cache } => Some(children_cache),
            _ => None,
        }
    }

    pub fn is_explored(&self) -> bool {
        matches!(self.exploration, Exploration::Explored { .. })
    }

    pub fn exploration_count(&self) -> u32 {
        match self.exploration {
            Exploration::Explored { count, .. } => count,
            Exploration::Unexplored => 0,
        }
    }

    pub fn explanation(&self) -> Option<&Explanation> {
        match &self.exploration {
            Exploration::Explored { explanation, .. } => Some(explanation),
            Exploration::Unexplored => None,
        }
    }

    pub fn last_explored_at(&self) -> Option<DateTime<Utc>> {
        match self.exploration {
            Exploration::Explored {
                last_explored_at, ..
            } => Some(last_explored_at),
            Exploration::Unexplored => None,
        }
    }

    /// Apply one explore() call to the exploration machine.
    ///
    /// An explored node keeps its payload and only bumps the counter; a
    /// fresh payload is required for the first transition. Returns `true`
    /// when this call performed the first transition.
    pub fn record_exploration(
        &mut self,
        fresh: Option<Explanation>,
        now: DateTime<Utc>,
    ) -> Option<bool> {
        match &mut self.exploration {
            Exploration::Explored {
                count,
                last_explored_at,
                ..
            } => {
                *count += 1;
                *last_explored_at = now;
                Some(false)
            }
            Exploration::Unexplored => {
                let explanation = fresh?;
                self.exploration = Exploration::Explored {
                    explanation,
                    count: 1,
                    last_explored_at: now,
                };
                Some(true)
            }
        }
    }
}

/// Whether a history record came from the first exploration or a revisit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplorationKind {
    First,
    Revisit,
}

impl fmt::Display for ExplorationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplorationKind::First => f.write_str("first"),
            ExplorationKind::Revisit => f.write_str("revisit"),
        }
    }
}

/// Append-only exploration-history entry, one per explore() call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationRecord {
    pub id: RecordId,
    pub node_id: NodeId,
    pub roadmap_id: RoadmapId,
    pub kind: ExplorationKind,
    pub explored_at: DateTime<Utc>,
}
