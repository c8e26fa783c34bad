//! In-memory roadmap repository
//!
//! One `RwLock` guards the whole state, so every trait method is a single
//! atomic unit. Expansion itself does not hold the lock: the persisted
//! `expanding` status is the per-node lock, taken and released by
//! compare-and-set under the write guard.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::{
    ConceptNode, DomainError, DomainResult, Expansion, Explanation, ExplorationKind,
    ExplorationRecord, NodeId, OwnerId, RecordId, Roadmap, RoadmapId, RoadmapStatus,
    SubtopicDescriptor,
};
use crate::infrastructure::traits::{
    ExpansionClaim, ExplorationOutcome, RoadmapRepository, SubtreeRemoval,
};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable image of a whole repository.
///
/// Nodes are written roadmap by roadmap in pre-order, which keeps sibling
/// order stable across a save/load cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub version: u32,
    #[serde(default)]
    pub roadmaps: Vec<Roadmap>,
    #[serde(default)]
    pub nodes: Vec<ConceptNode>,
    #[serde(default)]
    pub history: Vec<ExplorationRecord>,
}

impl Default for RepositorySnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            roadmaps: Vec::new(),
            nodes: Vec::new(),
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    roadmaps: HashMap<RoadmapId, Roadmap>,
    nodes: HashMap<NodeId, ConceptNode>,
    /// Children-of index over `parent_id`, in insertion order.
    children: HashMap<NodeId, Vec<NodeId>>,
    history: HashMap<NodeId, Vec<ExplorationRecord>>,
}

impl StoreState {
    fn insert_node(&mut self, node: ConceptNode) {
        if let Some(parent) = node.parent_id {
            self.children.entry(parent).or_default().push(node.id);
        }
        self.nodes.insert(node.id, node);
    }

    /// Explicit-worklist collection of `start` and all its descendants.
    fn collect_subtree(&self, start: NodeId) -> Vec<NodeId> {
        let mut collected = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            collected.push(current);
            if let Some(children) = self.children.get(&current) {
                stack.extend(children.iter().rev().copied());
            }
        }
        collected
    }

    /// Remove nodes and their history; returns the number of history rows removed.
    fn remove_nodes(&mut self, ids: &[NodeId]) -> usize {
        let mut history_removed = 0;
        for id in ids {
            if let Some(records) = self.history.remove(id) {
                history_removed += records.len();
            }
        }
        for id in ids {
            self.children.remove(id);
            self.nodes.remove(id);
        }
        history_removed
    }

    /// Content changes are refused once a roadmap is archived.
    fn ensure_active(&self, id: RoadmapId) -> DomainResult<()> {
        let roadmap = self
            .roadmaps
            .get(&id)
            .ok_or_else(|| DomainError::roadmap_not_found(id))?;
        if roadmap.status != RoadmapStatus::Active {
            return Err(DomainError::InvalidState(format!("roadmap {id} is archived")));
        }
        Ok(())
    }

    fn deepest_level(&self, roadmap: RoadmapId) -> u32 {
        self.nodes
            .values()
            .filter(|n| n.roadmap_id == roadmap)
            .map(|n| n.depth_level)
            .max()
            .unwrap_or(0)
    }

    fn remove_roadmap(&mut self, id: RoadmapId) -> DomainResult<SubtreeRemoval> {
        let roadmap = self
            .roadmaps
            .remove(&id)
            .ok_or_else(|| DomainError::roadmap_not_found(id))?;
        // Nodes left unreachable by a broken chain still belong to the roadmap.
        let removed: Vec<NodeId> = self.members(&roadmap).into_iter().map(|n| n.id).collect();
        let history_removed = self.remove_nodes(&removed);
        Ok(SubtreeRemoval {
            roadmap_id: id,
            removed,
            history_removed,
            roadmap_deleted: true,
        })
    }

    /// Nodes of a roadmap: reachable ones in pre-order, then any strays.
    fn members(&self, roadmap: &Roadmap) -> Vec<ConceptNode> {
        let reachable = self.collect_subtree(roadmap.root_node_id);
        let seen: HashSet<NodeId> = reachable.iter().copied().collect();
        let mut members: Vec<ConceptNode> = reachable
            .into_iter()
            .filter_map(|id| self.nodes.get(&id).cloned())
            .collect();
        let mut stray: Vec<ConceptNode> = self
            .nodes
            .values()
            .filter(|n| n.roadmap_id == roadmap.id && !seen.contains(&n.id))
            .cloned()
            .collect();
        stray.sort_by_key(|n| (n.depth_level, n.created_at));
        members.extend(stray);
        members
    }
}

/// Thread-safe repository keeping everything in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRoadmapRepository {
    state: RwLock<StoreState>,
}

impl InMemoryRoadmapRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a repository from a snapshot.
    ///
    /// Nodes caught in `expanding` (an interrupted process) are reverted to
    /// `unexpanded` so they can be expanded again.
    pub fn from_snapshot(snapshot: RepositorySnapshot) -> Self {
        let mut state = StoreState::default();
        for roadmap in snapshot.roadmaps {
            state.roadmaps.insert(roadmap.id, roadmap);
        }
        for mut node in snapshot.nodes {
            if node.expansion == Expansion::Expanding {
                warn!("from_snapshot: reverting interrupted expansion of {}", node.id);
                node.expansion = Expansion::Unexpanded;
            }
            state.insert_node(node);
        }
        for record in snapshot.history {
            state.history.entry(record.node_id).or_default().push(record);
        }
        debug!(
            "from_snapshot: {} roadmaps, {} nodes",
            state.roadmaps.len(),
            state.nodes.len()
        );
        Self {
            state: RwLock::new(state),
        }
    }

    /// Consistent image of the current state.
    pub fn snapshot(&self) -> RepositorySnapshot {
        let state = self.state.read();
        let mut roadmaps: Vec<Roadmap> = state.roadmaps.values().cloned().collect();
        roadmaps.sort_by_key(|r| r.created_at);

        let mut nodes = Vec::with_capacity(state.nodes.len());
        for roadmap in &roadmaps {
            nodes.extend(state.members(roadmap));
        }

        let mut history: Vec<ExplorationRecord> =
            state.history.values().flatten().cloned().collect();
        history.sort_by_key(|r| r.explored_at);

        RepositorySnapshot {
            version: SNAPSHOT_VERSION,
            roadmaps,
            nodes,
            history,
        }
    }
}

impl RoadmapRepository for InMemoryRoadmapRepository {
    #[instrument(level = "debug", skip(self, roadmap, root), fields(roadmap = %roadmap.id))]
    fn create_roadmap(&self, roadmap: Roadmap, root: ConceptNode) -> DomainResult<()> {
        if root.id != roadmap.root_node_id || root.roadmap_id != roadmap.id || !root.is_root() {
            return Err(DomainError::InvalidState(
                "root node does not match its roadmap".to_string(),
            ));
        }
        let mut state = self.state.write();
        if state.roadmaps.contains_key(&roadmap.id) || state.nodes.contains_key(&root.id) {
            return Err(DomainError::InvalidState(format!(
                "roadmap {} already exists",
                roadmap.id
            )));
        }
        state.roadmaps.insert(roadmap.id, roadmap);
        state.insert_node(root);
        Ok(())
    }

    fn roadmap(&self, id: RoadmapId) -> DomainResult<Option<Roadmap>> {
        Ok(self.state.read().roadmaps.get(&id).cloned())
    }

    fn roadmaps_of(&self, owner: &OwnerId) -> DomainResult<Vec<Roadmap>> {
        let state = self.state.read();
        let mut found: Vec<Roadmap> = state
            .roadmaps
            .values()
            .filter(|r| &r.owner_id == owner)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        Ok(found)
    }

    fn touch_roadmap(&self, id: RoadmapId, at: DateTime<Utc>) -> DomainResult<Roadmap> {
        let mut state = self.state.write();
        let roadmap = state
            .roadmaps
            .get_mut(&id)
            .ok_or_else(|| DomainError::roadmap_not_found(id))?;
        roadmap.last_accessed_at = at;
        Ok(roadmap.clone())
    }

    fn set_roadmap_status(&self, id: RoadmapId, status: RoadmapStatus) -> DomainResult<Roadmap> {
        let mut state = self.state.write();
        let roadmap = state
            .roadmaps
            .get_mut(&id)
            .ok_or_else(|| DomainError::roadmap_not_found(id))?;
        roadmap.status = status;
        Ok(roadmap.clone())
    }

    fn node(&self, id: NodeId) -> DomainResult<Option<ConceptNode>> {
        Ok(self.state.read().nodes.get(&id).cloned())
    }

    fn children_of(&self, id: NodeId) -> DomainResult<Vec<ConceptNode>> {
        let state = self.state.read();
        Ok(state
            .children
            .get(&id)
            .map(|ids| ids.iter().filter_map(|c| state.nodes.get(c).cloned()).collect())
            .unwrap_or_default())
    }

    fn nodes_of(&self, roadmap: RoadmapId) -> DomainResult<Vec<ConceptNode>> {
        let state = self.state.read();
        let roadmap = state
            .roadmaps
            .get(&roadmap)
            .ok_or_else(|| DomainError::roadmap_not_found(roadmap))?;
        Ok(state.members(roadmap))
    }

    #[instrument(level = "debug", skip(self))]
    fn begin_expansion(&self, id: NodeId) -> DomainResult<ExpansionClaim> {
        let mut state = self.state.write();
        let roadmap_id = state
            .nodes
            .get(&id)
            .ok_or_else(|| DomainError::node_not_found(id))?
            .roadmap_id;
        state.ensure_active(roadmap_id)?;
        let node = state
            .nodes
            .get_mut(&id)
            .ok_or_else(|| DomainError::node_not_found(id))?;
        match node.expansion {
            Expansion::Unexpanded => {
                node.expansion = Expansion::Expanding;
                Ok(ExpansionClaim::Claimed(node.clone()))
            }
            Expansion::Expanding => Err(DomainError::Busy(id.to_string())),
            Expansion::Expanded { .. } => Ok(ExpansionClaim::AlreadyExpanded(node.clone())),
        }
    }

    #[instrument(level = "debug", skip(self, children, cache), fields(count = children.len()))]
    fn commit_expansion(
        &self,
        parent: NodeId,
        children: Vec<ConceptNode>,
        cache: Vec<SubtopicDescriptor>,
        at: DateTime<Utc>,
    ) -> DomainResult<ConceptNode> {
        if children.is_empty() {
            return Err(DomainError::InvalidState(format!(
                "expansion of {parent} produced no children"
            )));
        }
        let mut guard = self.state.write();
        let state = &mut *guard;

        let parent_node = state
            .nodes
            .get(&parent)
            .ok_or_else(|| DomainError::node_not_found(parent))?;
        if parent_node.expansion != Expansion::Expanding {
            return Err(DomainError::InvalidState(format!(
                "node {parent} is not being expanded"
            )));
        }
        let roadmap_id = parent_node.roadmap_id;
        state.ensure_active(roadmap_id)?;
        if children
            .iter()
            .any(|c| c.parent_id != Some(parent) || c.roadmap_id != roadmap_id)
        {
            return Err(DomainError::InvalidState(format!(
                "children do not belong to node {parent}"
            )));
        }
        let roadmap = state
            .roadmaps
            .get_mut(&roadmap_id)
            .ok_or_else(|| DomainError::roadmap_not_found(roadmap_id))?;

        let deepest = children.iter().map(|c| c.depth_level).max().unwrap_or(0);
        roadmap.total_nodes += children.len() as u32;
        roadmap.max_depth_reached = roadmap.max_depth_reached.max(deepest);
        roadmap.last_accessed_at = at;

        for child in children {
            state.insert_node(child);
        }

        let parent_node = state
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| DomainError::node_not_found(parent))?;
        parent_node.expansion = Expansion::Expanded {
            children_cache: cache,
        };
        Ok(parent_node.clone())
    }

    #[instrument(level = "debug", skip(self))]
    fn abort_expansion(&self, id: NodeId) -> DomainResult<()> {
        let mut state = self.state.write();
        if let Some(node) = state.nodes.get_mut(&id) {
            if node.expansion == Expansion::Expanding {
                node.expansion = Expansion::Unexpanded;
            }
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self, fresh))]
    fn record_exploration(
        &self,
        id: NodeId,
        fresh: Option<Explanation>,
        at: DateTime<Utc>,
    ) -> DomainResult<ExplorationOutcome> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let roadmap_id = state
            .nodes
            .get(&id)
            .ok_or_else(|| DomainError::node_not_found(id))?
            .roadmap_id;
        state.ensure_active(roadmap_id)?;
        let node = state
            .nodes
            .get_mut(&id)
            .ok_or_else(|| DomainError::node_not_found(id))?;
        let first = node.record_exploration(fresh, at).ok_or_else(|| {
            DomainError::InvalidState(format!("node {id} is unexplored and no explanation was given"))
        })?;
        let explanation = node
            .explanation()
            .cloned()
            .ok_or_else(|| DomainError::InvalidState(format!("node {id} lost its explanation")))?;
        let node = node.clone();

        state.history.entry(id).or_default().push(ExplorationRecord {
            id: RecordId::new(),
            node_id: id,
            roadmap_id: node.roadmap_id,
            kind: if first {
                ExplorationKind::First
            } else {
                ExplorationKind::Revisit
            },
            explored_at: at,
        });
        if let Some(roadmap) = state.roadmaps.get_mut(&node.roadmap_id) {
            roadmap.last_accessed_at = at;
        }

        Ok(ExplorationOutcome {
            node,
            explanation,
            first,
        })
    }

    fn exploration_history(&self, id: NodeId) -> DomainResult<Vec<ExplorationRecord>> {
        let state = self.state.read();
        if !state.nodes.contains_key(&id) {
            return Err(DomainError::node_not_found(id));
        }
        Ok(state.history.get(&id).cloned().unwrap_or_default())
    }

    fn update_notes(&self, id: NodeId, notes: &str) -> DomainResult<ConceptNode> {
        let mut state = self.state.write();
        let node = state
            .nodes
            .get_mut(&id)
            .ok_or_else(|| DomainError::node_not_found(id))?;
        node.user_notes = notes.to_string();
        Ok(node.clone())
    }

    #[instrument(level = "debug", skip(self))]
    fn delete_subtree(&self, id: NodeId) -> DomainResult<SubtreeRemoval> {
        let mut state = self.state.write();
        let node = state
            .nodes
            .get(&id)
            .ok_or_else(|| DomainError::node_not_found(id))?;
        let roadmap_id = node.roadmap_id;
        let parent = node.parent_id;
        let parent_id = match parent {
            Some(parent) => parent,
            None => return state.remove_roadmap(roadmap_id),
        };

        let removed = state.collect_subtree(id);
        let history_removed = state.remove_nodes(&removed);
        if let Some(siblings) = state.children.get_mut(&parent_id) {
            siblings.retain(|c| *c != id);
        }

        let deepest = state.deepest_level(roadmap_id);
        if let Some(roadmap) = state.roadmaps.get_mut(&roadmap_id) {
            roadmap.total_nodes = roadmap.total_nodes.saturating_sub(removed.len() as u32);
            roadmap.max_depth_reached = deepest;
        }
        debug!("delete_subtree: removed {} nodes under {}", removed.len(), id);

        Ok(SubtreeRemoval {
            roadmap_id,
            removed,
            history_removed,
            roadmap_deleted: false,
        })
    }

    #[instrument(level = "debug", skip(self))]
    fn delete_roadmap(&self, id: RoadmapId) -> DomainResult<SubtreeRemoval> {
        self.state.write().remove_roadmap(id)
    }
}
