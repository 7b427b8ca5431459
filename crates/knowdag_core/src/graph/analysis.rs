//! Focus-node analysis: ancestors, descendants and the paths between them.

use crate::graph::project_dag;
use crate::model::project::Project;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Policy knobs for path enumeration.
///
/// Simple-path counts grow combinatorially on dense graphs, so callers may
/// cap them. `max_paths = None` enumerates everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisLimits {
    pub max_paths: Option<usize>,
}

/// Result of analyzing one focus node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphAnalysis {
    /// Nodes with a directed path to the focus, in document order.
    pub ancestors: Vec<String>,
    /// Nodes reachable from the focus, in document order.
    pub descendants: Vec<String>,
    /// Ancestors, then descendants, then the focus itself.
    pub highlight: Vec<String>,
    /// Ancestor→focus paths first, then focus→descendant paths.
    pub paths: Vec<Vec<String>>,
    /// Set when `AnalysisLimits::max_paths` cut enumeration short.
    #[serde(default)]
    pub truncated: bool,
}

impl GraphAnalysis {
    pub fn is_empty(&self) -> bool {
        self.highlight.is_empty()
    }
}

/// Analyzes `focus` inside `project`.
///
/// Returns an empty analysis when `focus` is absent, blank, or not a node of
/// this project.
pub fn analyze(project: &Project, focus: Option<&str>, limits: &AnalysisLimits) -> GraphAnalysis {
    let Some(focus) = focus.map(str::trim).filter(|value| !value.is_empty()) else {
        return GraphAnalysis::default();
    };

    let dag = project_dag(project);
    if !dag.contains(focus) || !project.node_index().contains(focus) {
        return GraphAnalysis::default();
    }

    let ancestors = dag.ancestors(focus);
    let descendants = dag.descendants(focus);

    let mut paths = Vec::new();
    let mut truncated = false;

    let upstream: HashSet<&str> = ancestors.iter().copied().collect();
    for ancestor in &ancestors {
        if dag.collect_simple_paths(ancestor, focus, &upstream, limits.max_paths, &mut paths) {
            truncated = true;
            break;
        }
    }

    let downstream: HashSet<&str> = descendants.iter().copied().collect();
    if !truncated {
        for descendant in &descendants {
            if dag.collect_simple_paths(focus, descendant, &downstream, limits.max_paths, &mut paths)
            {
                truncated = true;
                break;
            }
        }
    }

    let mut highlight: Vec<String> = Vec::with_capacity(ancestors.len() + descendants.len() + 1);
    let mut seen = HashSet::new();
    for id in ancestors
        .iter()
        .chain(descendants.iter())
        .copied()
        .chain(std::iter::once(focus))
    {
        if seen.insert(id) {
            highlight.push(id.to_string());
        }
    }

    GraphAnalysis {
        ancestors: ancestors.into_iter().map(str::to_string).collect(),
        descendants: descendants.into_iter().map(str::to_string).collect(),
        highlight,
        paths,
        truncated,
    }
}
