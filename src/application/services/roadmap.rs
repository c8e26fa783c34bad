//! Roadmap service
//!
//! Owns the expand/explore workflows: validates ownership and state, calls
//! the content generator outside of any repository lock, and hands the
//! result to the repository as one atomic update.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::application::context::ancestor_topics;
use crate::application::ApplicationResult;
use crate::config::{Settings, DEFAULT_MAX_CHILDREN};
use crate::domain::fallback::{
    fallback_explanation, fallback_subtopics, is_usable_explanation, normalize_subtopics,
};
use crate::domain::{
    ConceptNode, ConceptTree, DomainError, DomainResult, Explanation, ExplorationRecord,
    InvariantViolation, LayoutEngine, NodeId, OwnerId, Roadmap, RoadmapId, RoadmapStatus,
    SubtopicDescriptor,
};
use crate::infrastructure::traits::{
    ContentGenerator, ExpansionClaim, GenerationError, RoadmapRepository,
};

/// Tunables of the service, usually taken from [`Settings`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceOptions {
    pub layout: LayoutEngine,
    pub max_children: usize,
    pub fallback: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            layout: LayoutEngine::default(),
            max_children: DEFAULT_MAX_CHILDREN,
            fallback: true,
        }
    }
}

impl From<&Settings> for ServiceOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            layout: settings.layout.engine(),
            max_children: settings.generator.max_children,
            fallback: settings.generator.fallback,
        }
    }
}

/// A roadmap with its nodes flattened in pre-order.
#[derive(Debug, Clone)]
pub struct RoadmapView {
    pub roadmap: Roadmap,
    pub nodes: Vec<ConceptNode>,
}

impl RoadmapView {
    pub fn root(&self) -> Option<&ConceptNode> {
        self.nodes.iter().find(|n| n.id == self.roadmap.root_node_id)
    }

    /// Arena tree over the nodes, for rendering and checks.
    pub fn tree(&self) -> DomainResult<ConceptTree> {
        ConceptTree::from_nodes(self.roadmap.root_node_id, self.nodes.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ExpandOutcome {
    pub parent: ConceptNode,
    pub children: Vec<ConceptNode>,
    /// False when the node was already expanded and nothing was generated.
    pub generated: bool,
    pub used_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct ExploreOutcome {
    pub node: ConceptNode,
    pub explanation: Explanation,
    /// True when the cached payload was returned.
    pub cached: bool,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub roadmap_id: RoadmapId,
    pub removed: usize,
    pub history_removed: usize,
    pub roadmap_deleted: bool,
}

/// Result of checking a roadmap's structural rules.
#[derive(Debug, Clone)]
pub struct RoadmapCheck {
    pub roadmap: Roadmap,
    pub live_nodes: usize,
    pub violations: Vec<InvariantViolation>,
}

impl RoadmapCheck {
    pub fn is_healthy(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Service growing and maintaining concept trees.
pub struct RoadmapService {
    repo: Arc<dyn RoadmapRepository>,
    generator: Arc<dyn ContentGenerator>,
    options: ServiceOptions,
}

impl RoadmapService {
    pub fn new(
        repo: Arc<dyn RoadmapRepository>,
        generator: Arc<dyn ContentGenerator>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            repo,
            generator,
            options,
        }
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Create a roadmap and its root node in one step.
    ///
    /// An empty title falls back to the root topic.
    #[instrument(level = "debug", skip(self))]
    pub fn create_roadmap(
        &self,
        owner: &OwnerId,
        title: &str,
        root_topic: &str,
    ) -> ApplicationResult<RoadmapView> {
        let topic = root_topic.trim();
        if topic.is_empty() {
            return Err(DomainError::InvalidInput("root topic must not be empty".into()).into());
        }
        let title = match title.trim() {
            "" => topic,
            t => t,
        };

        let now = Utc::now();
        let roadmap_id = RoadmapId::new();
        let root = ConceptNode::root(roadmap_id, owner.clone(), topic, now);
        let roadmap = Roadmap {
            id: roadmap_id,
            owner_id: owner.clone(),
            title: title.to_string(),
            root_topic: topic.to_string(),
            root_node_id: root.id,
            total_nodes: 1,
            max_depth_reached: 0,
            status: RoadmapStatus::Active,
            created_at: now,
            last_accessed_at: now,
        };
        self.repo.create_roadmap(roadmap.clone(), root.clone())?;
        info!("created roadmap {} on '{}'", roadmap.id, topic);

        Ok(RoadmapView {
            roadmap,
            nodes: vec![root],
        })
    }

    pub fn list_roadmaps(
        &self,
        owner: &OwnerId,
        include_archived: bool,
    ) -> ApplicationResult<Vec<Roadmap>> {
        let roadmaps = self.repo.roadmaps_of(owner)?;
        Ok(roadmaps
            .into_iter()
            .filter(|r| include_archived || r.is_active())
            .collect())
    }

    /// Roadmap plus all its nodes; records the access.
    #[instrument(level = "debug", skip(self))]
    pub fn get_roadmap(&self, caller: &OwnerId, id: RoadmapId) -> ApplicationResult<RoadmapView> {
        self.owned_roadmap(caller, id)?;
        let roadmap = self.repo.touch_roadmap(id, Utc::now())?;
        let nodes = self.repo.nodes_of(id)?;
        Ok(RoadmapView { roadmap, nodes })
    }

    pub fn node(&self, caller: &OwnerId, id: NodeId) -> ApplicationResult<ConceptNode> {
        Ok(self.owned_node(caller, id)?)
    }

    /// The node and all live descendants, in pre-order.
    #[instrument(level = "debug", skip(self))]
    pub fn get_subtree(&self, caller: &OwnerId, id: NodeId) -> ApplicationResult<Vec<ConceptNode>> {
        let start = self.owned_node(caller, id)?;
        let mut subtree = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            let children = self.repo.children_of(current.id)?;
            subtree.push(current);
            stack.extend(children.into_iter().rev());
        }
        Ok(subtree)
    }

    /// Generate and persist the children of a node.
    ///
    /// Already expanded nodes return their live children without calling
    /// the generator. A node that is being expanded right now is `Busy`.
    #[instrument(level = "debug", skip(self))]
    pub fn expand(&self, caller: &OwnerId, id: NodeId) -> ApplicationResult<ExpandOutcome> {
        let node = self.owned_node(caller, id)?;
        self.ensure_active(node.roadmap_id)?;

        let parent = match self.repo.begin_expansion(id)? {
            ExpansionClaim::AlreadyExpanded(parent) => {
                debug!("expand: {} already expanded", id);
                let children = self.repo.children_of(id)?;
                return Ok(ExpandOutcome {
                    parent,
                    children,
                    generated: false,
                    used_fallback: false,
                });
            }
            ExpansionClaim::Claimed(parent) => parent,
        };

        let result = self.generate_children(&parent).and_then(|(children, cache, used_fallback)| {
            let parent = self
                .repo
                .commit_expansion(parent.id, children.clone(), cache, Utc::now())?;
            Ok(ExpandOutcome {
                parent,
                children,
                generated: true,
                used_fallback,
            })
        });

        match result {
            Ok(outcome) => {
                info!(
                    "expanded {} ('{}') into {} children",
                    id,
                    outcome.parent.topic_name,
                    outcome.children.len()
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(abort_err) = self.repo.abort_expansion(id) {
                    warn!("expand: could not release {}: {}", id, abort_err);
                }
                Err(e.into())
            }
        }
    }

    /// Return the explanation of a node, generating it on first use.
    #[instrument(level = "debug", skip(self))]
    pub fn explore(&self, caller: &OwnerId, id: NodeId) -> ApplicationResult<ExploreOutcome> {
        let node = self.owned_node(caller, id)?;
        self.ensure_active(node.roadmap_id)?;

        if node.is_explored() {
            let outcome = self.repo.record_exploration(id, None, Utc::now())?;
            debug!("explore: cache hit on {} (count {})", id, outcome.node.exploration_count());
            return Ok(ExploreOutcome {
                node: outcome.node,
                explanation: outcome.explanation,
                cached: true,
                used_fallback: false,
            });
        }

        let ancestors = ancestor_topics(self.repo.as_ref(), &node)?;
        let (fresh, used_fallback) =
            match self
                .generator
                .explain_topic(&node.topic_name, &ancestors, node.depth_level)
            {
                Ok(explanation) if is_usable_explanation(&explanation) => (explanation, false),
                Ok(_) => (self.fallback_explanation(&node, &ancestors, "blank explanation")?, true),
                Err(GenerationError::Malformed(reason)) => {
                    (self.fallback_explanation(&node, &ancestors, &reason)?, true)
                }
                Err(e) => return Err(DomainError::GenerationFailed(e.to_string()).into()),
            };

        let outcome = self.repo.record_exploration(id, Some(fresh), Utc::now())?;
        info!("explored {} ('{}')", id, outcome.node.topic_name);
        Ok(ExploreOutcome {
            node: outcome.node,
            explanation: outcome.explanation,
            cached: !outcome.first,
            used_fallback: used_fallback && outcome.first,
        })
    }

    /// Replace the learner's notes on a node. Allowed in any state.
    pub fn annotate(&self, caller: &OwnerId, id: NodeId, notes: &str) -> ApplicationResult<ConceptNode> {
        self.owned_node(caller, id)?;
        Ok(self.repo.update_notes(id, notes)?)
    }

    /// Delete a node with its subtree; deleting the root deletes the roadmap.
    ///
    /// The parent's generated children cache is left as it was.
    #[instrument(level = "debug", skip(self))]
    pub fn delete_node(&self, caller: &OwnerId, id: NodeId) -> ApplicationResult<DeleteOutcome> {
        self.owned_node(caller, id)?;
        let removal = self.repo.delete_subtree(id)?;
        info!(
            "deleted {} nodes under {}{}",
            removal.removed.len(),
            id,
            if removal.roadmap_deleted {
                " (whole roadmap)"
            } else {
                ""
            }
        );
        Ok(DeleteOutcome {
            roadmap_id: removal.roadmap_id,
            removed: removal.removed.len(),
            history_removed: removal.history_removed,
            roadmap_deleted: removal.roadmap_deleted,
        })
    }

    #[instrument(level = "debug", skip(self))]
    pub fn delete_roadmap(&self, caller: &OwnerId, id: RoadmapId) -> ApplicationResult<DeleteOutcome> {
        self.owned_roadmap(caller, id)?;
        let removal = self.repo.delete_roadmap(id)?;
        info!("deleted roadmap {} ({} nodes)", id, removal.removed.len());
        Ok(DeleteOutcome {
            roadmap_id: id,
            removed: removal.removed.len(),
            history_removed: removal.history_removed,
            roadmap_deleted: true,
        })
    }

    /// Freeze a roadmap: no more expansion or exploration.
    pub fn archive_roadmap(&self, caller: &OwnerId, id: RoadmapId) -> ApplicationResult<Roadmap> {
        self.owned_roadmap(caller, id)?;
        Ok(self.repo.set_roadmap_status(id, RoadmapStatus::Archived)?)
    }

    pub fn exploration_history(
        &self,
        caller: &OwnerId,
        id: NodeId,
    ) -> ApplicationResult<Vec<ExplorationRecord>> {
        self.owned_node(caller, id)?;
        Ok(self.repo.exploration_history(id)?)
    }

    /// Rebuild the tree and report broken structural rules.
    #[instrument(level = "debug", skip(self))]
    pub fn verify_roadmap(&self, caller: &OwnerId, id: RoadmapId) -> ApplicationResult<RoadmapCheck> {
        let roadmap = self.owned_roadmap(caller, id)?;
        let nodes = self.repo.nodes_of(id)?;
        let tree = ConceptTree::from_nodes(roadmap.root_node_id, nodes)?;
        let violations = tree.violations(&roadmap);
        if !violations.is_empty() {
            warn!("roadmap {} has {} violations", id, violations.len());
        }
        Ok(RoadmapCheck {
            live_nodes: tree.node_count(),
            roadmap,
            violations,
        })
    }

    // ============================================================
    // helpers
    // ============================================================

    fn owned_node(&self, caller: &OwnerId, id: NodeId) -> DomainResult<ConceptNode> {
        let node = self
            .repo
            .node(id)?
            .ok_or_else(|| DomainError::node_not_found(id))?;
        if &node.owner_id != caller {
            return Err(DomainError::Unauthorized {
                kind: "node",
                id: id.to_string(),
            });
        }
        Ok(node)
    }

    fn owned_roadmap(&self, caller: &OwnerId, id: RoadmapId) -> DomainResult<Roadmap> {
        let roadmap = self
            .repo
            .roadmap(id)?
            .ok_or_else(|| DomainError::roadmap_not_found(id))?;
        if &roadmap.owner_id != caller {
            return Err(DomainError::Unauthorized {
                kind: "roadmap",
                id: id.to_string(),
            });
        }
        Ok(roadmap)
    }

    /// Early refusal before calling the generator. The repository repeats the
    /// check atomically when the result is committed.
    fn ensure_active(&self, id: RoadmapId) -> DomainResult<()> {
        let roadmap = self
            .repo
            .roadmap(id)?
            .ok_or_else(|| DomainError::roadmap_not_found(id))?;
        if !roadmap.is_active() {
            return Err(DomainError::InvalidState(format!("roadmap {id} is archived")));
        }
        Ok(())
    }

    /// Ask the generator for children of a claimed node and lay them out.
    fn generate_children(
        &self,
        parent: &ConceptNode,
    ) -> DomainResult<(Vec<ConceptNode>, Vec<SubtopicDescriptor>, bool)> {
        let ancestors = ancestor_topics(self.repo.as_ref(), parent)?;
        let generated =
            self.generator
                .expand_topic(&parent.topic_name, &ancestors, parent.depth_level);

        let (descriptors, used_fallback) = match generated {
            Ok(raw) => match normalize_subtopics(raw, self.options.max_children) {
                Some(descriptors) => (descriptors, false),
                None => (self.fallback_children(parent, "no usable subtopics")?, true),
            },
            Err(GenerationError::Malformed(reason)) => {
                (self.fallback_children(parent, &reason)?, true)
            }
            Err(e) => return Err(DomainError::GenerationFailed(e.to_string())),
        };

        let now = Utc::now();
        let positions =
            self.options
                .layout
                .positions(parent.position, parent.depth_level, descriptors.len());
        let children = descriptors
            .iter()
            .zip(positions)
            .map(|(descriptor, position)| ConceptNode::child_of(parent, descriptor, position, now))
            .collect();
        Ok((children, descriptors, used_fallback))
    }

    /// Generic subtopics; sized by depth only, `max_children` caps generator output.
    fn fallback_children(
        &self,
        parent: &ConceptNode,
        reason: &str,
    ) -> DomainResult<Vec<SubtopicDescriptor>> {
        if !self.options.fallback {
            return Err(DomainError::GenerationFailed(reason.to_string()));
        }
        warn!("expand: falling back to generic subtopics for {}: {}", parent.id, reason);
        Ok(fallback_subtopics(&parent.topic_name, parent.depth_level))
    }

    fn fallback_explanation(
        &self,
        node: &ConceptNode,
        ancestors: &[String],
        reason: &str,
    ) -> DomainResult<Explanation> {
        if !self.options.fallback {
            return Err(DomainError::GenerationFailed(reason.to_string()));
        }
        warn!("explore: falling back to a generic explanation for {}: {}", node.id, reason);
        Ok(fallback_explanation(&node.topic_name, ancestors))
    }
}
