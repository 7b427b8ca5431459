//! Graph use-case service: labeled edges between nodes and focus analysis.
//!
//! # Responsibility
//! - Add, relabel and delete edges while keeping the relation acyclic.
//! - Expose ancestor/descendant/path analysis for one focus node.
//!
//! # Invariants
//! - Cycle checks are exact reachability over the full edge set.
//! - A rejected edge never reaches the store.

use crate::graph::analysis::{analyze, GraphAnalysis};
use crate::graph::project_dag;
use crate::model::project::{Edge, Project};
use crate::model::validation::validate_edge_label;
use crate::repo::project_repo::ProjectStore;
use crate::service::context::ServiceContext;
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::session::{log_failure, ProjectSession};
use log::info;
use std::time::Instant;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddEdgeRequest {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Graph service facade.
pub struct GraphService<S: ProjectStore> {
    store: S,
    ctx: ServiceContext,
}

impl<S: ProjectStore> GraphService<S> {
    pub fn new(store: S) -> Self {
        Self::with_context(store, ServiceContext::default())
    }

    pub fn with_context(store: S, ctx: ServiceContext) -> Self {
        Self { store, ctx }
    }

    /// Adds `source -> target`.
    ///
    /// An existing pair is returned unchanged (label untouched, nothing
    /// saved).
    ///
    /// # Errors
    /// - `NodeNotFound` when either endpoint is missing.
    /// - `CycleDetected` when `target` already reaches `source`, self-loops
    ///   included.
    pub fn add_edge(&self, project_id: &str, request: &AddEdgeRequest) -> ServiceResult<Project> {
        let mut session = ProjectSession::open(&self.store, &self.ctx, "edge_add", project_id)?;
        let (source, target) = (request.source.trim(), request.target.trim());
        let exists = session.check(|project| {
            if source.is_empty() || target.is_empty() {
                return Err(ServiceError::InvalidInput(
                    "edge endpoints must not be blank".to_string(),
                ));
            }
            validate_edge_label(&request.label)?;
            let index = project.node_index();
            for endpoint in [source, target] {
                if !index.contains(endpoint) {
                    return Err(ServiceError::NodeNotFound(endpoint.to_string()));
                }
            }
            Ok(project.edge(source, target).is_some())
        })?;
        if exists {
            return Ok(session.finish_unchanged());
        }

        session.check(|project| {
            let dag = project_dag(project);
            if dag.would_create_cycle(source, target) {
                return Err(ServiceError::CycleDetected {
                    source: source.to_string(),
                    target: target.to_string(),
                });
            }
            Ok(())
        })?;
        session
            .project
            .edges
            .push(Edge::new(source, target, request.label.clone()));
        session.commit()
    }

    /// Removes `source -> target` when present; absence is not an error.
    /// Endpoints are trimmed the same way `add_edge` trims them.
    pub fn delete_edge(
        &self,
        project_id: &str,
        source: &str,
        target: &str,
    ) -> ServiceResult<Project> {
        let (source, target) = (source.trim(), target.trim());
        let mut session =
            ProjectSession::open(&self.store, &self.ctx, "edge_delete", project_id)?;
        let before = session.project.edges.len();
        session
            .project
            .edges
            .retain(|edge| !(edge.source == source && edge.target == target));
        if session.project.edges.len() == before {
            return Ok(session.finish_unchanged());
        }
        session.commit()
    }

    /// Replaces the label of an existing edge.
    pub fn update_edge(
        &self,
        project_id: &str,
        source: &str,
        target: &str,
        label: &str,
    ) -> ServiceResult<Edge> {
        let (source, target) = (source.trim(), target.trim());
        let mut session =
            ProjectSession::open(&self.store, &self.ctx, "edge_update", project_id)?;
        let edge = session.check(|project| {
            validate_edge_label(label)?;
            let edge = project
                .edge_mut(source, target)
                .ok_or_else(|| ServiceError::EdgeNotFound {
                    source: source.to_string(),
                    target: target.to_string(),
                })?;
            edge.label = label.to_string();
            Ok(edge.clone())
        })?;
        session.commit()?;
        Ok(edge)
    }

    /// Analyzes `focus` using the context's path limits. Read-only.
    pub fn analyze(&self, project_id: &str, focus: Option<&str>) -> ServiceResult<GraphAnalysis> {
        let started_at = Instant::now();
        let project = self.store.load(project_id).map_err(|err| {
            let err = ServiceError::from(err);
            log_failure("graph_analyze", project_id, started_at, &err);
            err
        })?;
        let analysis = analyze(&project, focus, &self.ctx.limits);
        info!(
            "event=graph_analyze module=service status=ok project_id={} highlight={} paths={} truncated={} duration_ms={}",
            project_id,
            analysis.highlight.len(),
            analysis.paths.len(),
            analysis.truncated,
            started_at.elapsed().as_millis()
        );
        Ok(analysis)
    }
}
