//! Arena-backed view of one roadmap's node set
//!
//! Built from the flat node list the repository returns; used for ordered
//! traversal, rendering and invariant checks. Parent and child links are
//! arena indices, so no node owns another.

use std::collections::{HashMap, HashSet};
use std::fmt;

use generational_arena::{Arena, Index};
use termtree::Tree;
use tracing::instrument;

use crate::domain::entities::{ConceptNode, NodeId, Roadmap};
use crate::domain::error::{DomainError, DomainResult};

/// Tree node in the arena.
#[derive(Debug)]
pub struct TreeNode {
    pub data: ConceptNode,
    pub parent: Option<Index>,
    pub children: Vec<Index>,
}

#[derive(Debug)]
pub struct ConceptTree {
    arena: Arena<TreeNode>,
    root: Index,
    by_id: HashMap<NodeId, Index>,
    /// Nodes whose parent chain does not reach the root.
    orphans: Vec<NodeId>,
}

/// A broken structural rule found by [`ConceptTree::violations`].
#[derive(Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    DepthMismatch {
        node: NodeId,
        expected: u32,
        actual: u32,
    },
    TotalNodesMismatch {
        recorded: u32,
        live: u32,
    },
    MaxDepthMismatch {
        recorded: u32,
        live: u32,
    },
    Orphan(NodeId),
    RootMismatch {
        recorded: NodeId,
        actual: NodeId,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::DepthMismatch {
                node,
                expected,
                actual,
            } => write!(f, "node {node} has depth {actual}, expected {expected}"),
            InvariantViolation::TotalNodesMismatch { recorded, live } => {
                write!(f, "total_nodes is {recorded} but {live} nodes are live")
            }
            InvariantViolation::MaxDepthMismatch { recorded, live } => {
                write!(f, "max_depth_reached is {recorded} but deepest live node is at {live}")
            }
            InvariantViolation::Orphan(id) => write!(f, "node {id} is not reachable from the root"),
            InvariantViolation::RootMismatch { recorded, actual } => {
                write!(f, "roadmap points at root {recorded} but tree root is {actual}")
            }
        }
    }
}

impl ConceptTree {
    /// Link `nodes` into a tree rooted at `root_id`.
    ///
    /// Sibling order follows the order of `nodes`. Nodes that cannot be
    /// linked to the root are kept aside as orphans.
    #[instrument(level = "debug", skip(nodes), fields(count = nodes.len()))]
    pub fn from_nodes(root_id: NodeId, nodes: Vec<ConceptNode>) -> DomainResult<Self> {
        let mut arena = Arena::with_capacity(nodes.len());
        let mut by_id = HashMap::with_capacity(nodes.len());
        let mut order = Vec::with_capacity(nodes.len());

        for node in nodes {
            let id = node.id;
            let idx = arena.insert(TreeNode {
                data: node,
                parent: None,
                children: Vec::new(),
            });
            by_id.insert(id, idx);
            order.push(idx);
        }

        let root = *by_id
            .get(&root_id)
            .ok_or_else(|| DomainError::node_not_found(root_id))?;

        for &idx in &order {
            if idx == root {
                continue;
            }
            let parent_idx = arena[idx]
                .data
                .parent_id
                .and_then(|pid| by_id.get(&pid).copied());
            if let Some(parent_idx) = parent_idx {
                arena[idx].parent = Some(parent_idx);
                arena[parent_idx].children.push(idx);
            }
        }

        let mut tree = Self {
            arena,
            root,
            by_id,
            orphans: Vec::new(),
        };
        let reachable: HashSet<Index> = tree.iter().map(|(idx, _)| idx).collect();
        tree.orphans = order
            .into_iter()
            .filter(|idx| !reachable.contains(idx))
            .map(|idx| tree.arena[idx].data.id)
            .collect();
        Ok(tree)
    }

    pub fn root(&self) -> &ConceptNode {
        &self.arena[self.root].data
    }

    pub fn get(&self, id: NodeId) -> Option<&ConceptNode> {
        self.by_id.get(&id).map(|&idx| &self.arena[idx].data)
    }

    pub fn children(&self, id: NodeId) -> Vec<&ConceptNode> {
        self.by_id
            .get(&id)
            .map(|&idx| {
                self.arena[idx]
                    .children
                    .iter()
                    .map(|&c| &self.arena[c].data)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn orphans(&self) -> &[NodeId] {
        &self.orphans
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Deepest `depth_level` among reachable nodes.
    pub fn max_depth(&self) -> u32 {
        self.iter()
            .map(|(_, node)| node.data.depth_level)
            .max()
            .unwrap_or(0)
    }

    /// Pre-order, left-to-right traversal from the root.
    pub fn iter(&self) -> PreOrderIterator<'_> {
        PreOrderIterator {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Reachable nodes in pre-order, cloned out of the arena.
    pub fn flatten(&self) -> Vec<ConceptNode> {
        self.iter().map(|(_, node)| node.data.clone()).collect()
    }

    /// Check the structural rules against the roadmap's recorded counters.
    #[instrument(level = "debug", skip_all)]
    pub fn violations(&self, roadmap: &Roadmap) -> Vec<InvariantViolation> {
        let mut found = Vec::new();

        let root = self.root();
        if root.id != roadmap.root_node_id {
            found.push(InvariantViolation::RootMismatch {
                recorded: roadmap.root_node_id,
                actual: root.id,
            });
        }

        for (_, node) in self.iter() {
            let expected = match node.parent {
                Some(parent) => self.arena[parent].data.depth_level + 1,
                None => 0,
            };
            if node.data.depth_level != expected {
                found.push(InvariantViolation::DepthMismatch {
                    node: node.data.id,
                    expected,
                    actual: node.data.depth_level,
                });
            }
        }

        let live = self.node_count() as u32;
        if roadmap.total_nodes != live {
            found.push(InvariantViolation::TotalNodesMismatch {
                recorded: roadmap.total_nodes,
                live,
            });
        }
        let deepest = self.max_depth();
        if roadmap.max_depth_reached != deepest {
            found.push(InvariantViolation::MaxDepthMismatch {
                recorded: roadmap.max_depth_reached,
                live: deepest,
            });
        }

        found.extend(self.orphans.iter().copied().map(InvariantViolation::Orphan));
        found
    }

    /// Render the tree with `label` producing each node's line.
    ///
    /// Built bottom-up in post-order so deep trees do not recurse.
    pub fn to_termtree<F>(&self, label: F) -> Tree<String>
    where
        F: Fn(&ConceptNode) -> String,
    {
        let mut built: HashMap<Index, Tree<String>> = HashMap::new();
        let mut stack = vec![(self.root, false)];

        while let Some((idx, visited)) = stack.pop() {
            let node = &self.arena[idx];
            if !visited {
                stack.push((idx, true));
                for &child in node.children.iter().rev() {
                    stack.push((child, false));
                }
            } else {
                let leaves: Vec<Tree<String>> = node
                    .children
                    .iter()
                    .filter_map(|child| built.remove(child))
                    .collect();
                built.insert(idx, Tree::new(label(&node.data)).with_leaves(leaves));
            }
        }

        built
            .remove(&self.root)
            .unwrap_or_else(|| Tree::new(label(self.root())))
    }
}

pub struct PreOrderIterator<'a> {
    tree: &'a ConceptTree,
    stack: Vec<Index>,
}

impl<'a> Iterator for PreOrderIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        let node = self.tree.arena.get(current)?;
        // Push children in reverse order for left-to-right traversal
        for &child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some((current, node))
    }
}
