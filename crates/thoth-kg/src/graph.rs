//! Derived adjacency view over the relational `citations` table (§9 Open
//! Question: graph/relational duality collapsed — there is no separate
//! persisted graph store, `neighbors` recomputes from `citations` on demand).

use crate::repository::Repositories;
use std::collections::{HashSet, VecDeque};
use thoth_common::error::Result;
use thoth_db::Paper;

/// Which edge direction to traverse from a paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Papers this one cites (outgoing edges).
    Citing,
    /// Papers that cite this one (incoming edges).
    CitedBy,
}

/// A paper reached during a `neighbors` traversal, with its distance from
/// the origin.
#[derive(Debug, Clone)]
pub struct NeighborHit {
    pub paper: Paper,
    pub depth: u32,
}

/// BFS over resolved citation edges up to `depth` hops. Unresolved citations
/// (no `cited_paper_id`) are not traversable and are silently skipped —
/// they have no node on the paper side of the graph.
pub async fn neighbors(repos: &Repositories, paper_id: &str, direction: Direction, depth: u32) -> Result<Vec<NeighborHit>> {
    let mut visited: HashSet<String> = HashSet::from([paper_id.to_string()]);
    let mut frontier: VecDeque<(String, u32)> = VecDeque::from([(paper_id.to_string(), 0)]);
    let mut hits = Vec::new();

    while let Some((current, current_depth)) = frontier.pop_front() {
        if current_depth >= depth {
            continue;
        }

        let adjacent_ids: Vec<String> = match direction {
            Direction::Citing => {
                let active = repos.versions.find_active(&current).await?;
                let Some(active) = active else { continue };
                repos
                    .citations
                    .find_by_citing(&current, active.version)
                    .await?
                    .into_iter()
                    .filter_map(|c| c.cited_paper_id)
                    .collect()
            }
            Direction::CitedBy => repos.citations.find_citing_paper(&current).await?.into_iter().map(|c| c.citing_paper_id).collect(),
        };

        for next_id in adjacent_ids {
            if visited.insert(next_id.clone()) {
                if let Some(paper) = repos.papers.find_by_id(&next_id).await? {
                    hits.push(NeighborHit { paper, depth: current_depth + 1 });
                }
                frontier.push_back((next_id, current_depth + 1));
            }
        }
    }

    Ok(hits)
}
