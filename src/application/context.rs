//! Ancestor context for generator prompts

use tracing::{debug, warn};

use crate::domain::{ConceptNode, DomainResult};
use crate::infrastructure::traits::RoadmapRepository;

/// Ancestors of `node` ordered `[root, ..., parent]`.
///
/// Follows `parent_id` one lookup at a time, so the cost is O(depth). A
/// parent that vanished (deleted concurrently) cuts the chain at that
/// point instead of failing. The walk never takes more steps than the
/// node's depth, which also stops a corrupted cycle.
pub fn ancestor_chain(
    repo: &dyn RoadmapRepository,
    node: &ConceptNode,
) -> DomainResult<Vec<ConceptNode>> {
    let mut chain = Vec::with_capacity(node.depth_level as usize);
    let mut next = node.parent_id;
    let mut steps = 0u32;

    while let Some(parent_id) = next {
        if steps >= node.depth_level {
            warn!("ancestor_chain: chain of {} is longer than its depth", node.id);
            break;
        }
        match repo.node(parent_id)? {
            Some(parent) => {
                next = parent.parent_id;
                chain.push(parent);
            }
            None => {
                debug!("ancestor_chain: parent {} missing, truncating", parent_id);
                break;
            }
        }
        steps += 1;
    }

    chain.reverse();
    Ok(chain)
}

/// Topic names of [`ancestor_chain`].
pub fn ancestor_topics(
    repo: &dyn RoadmapRepository,
    node: &ConceptNode,
) -> DomainResult<Vec<String>> {
    Ok(ancestor_chain(repo, node)?
        .into_iter()
        .map(|n| n.topic_name)
        .collect())
}
