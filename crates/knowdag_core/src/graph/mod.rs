//! Edge-relation algorithms layered over the node hierarchy.
//!
//! # Responsibility
//! - Build a directed view of a project's edges keyed by node id.
//! - Provide exact cycle checks and focus-node reachability analysis.
//!
//! # Invariants
//! - Algorithms never mutate the project; callers decide what to commit.

pub mod analysis;
pub mod dag;

use crate::model::project::Project;
use dag::Dag;

/// Directed view over every node (document order) and edge (list order).
pub fn project_dag(project: &Project) -> Dag<'_> {
    Dag::new(
        project.nodes().map(|node| node.id.as_str()),
        project
            .edges
            .iter()
            .map(|edge| (edge.source.as_str(), edge.target.as_str())),
    )
}
