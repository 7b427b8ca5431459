//! Project lifecycle use-cases.

use crate::model::project::{Node, Project, ProjectSummary};
use crate::model::validation::EntityKind;
use crate::repo::project_repo::ProjectStore;
use crate::service::context::ServiceContext;
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::session::{log_failure, required_name, ProjectSession};
use log::info;
use serde::Serialize;
use std::time::Instant;

/// Where one node lives in the hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLocation {
    pub chapter_id: String,
    pub chapter_name: String,
    pub section_id: String,
    pub section_name: String,
    pub node: Node,
}

/// Project lifecycle service facade.
pub struct ProjectService<S: ProjectStore> {
    store: S,
    ctx: ServiceContext,
}

impl<S: ProjectStore> ProjectService<S> {
    pub fn new(store: S) -> Self {
        Self::with_context(store, ServiceContext::default())
    }

    pub fn with_context(store: S, ctx: ServiceContext) -> Self {
        Self { store, ctx }
    }

    /// Creates and persists an empty project.
    pub fn create_project(&self, name: &str) -> ServiceResult<Project> {
        let started_at = Instant::now();
        let result = required_name(EntityKind::Project, name).and_then(|name| {
            let mut project = Project::new(self.ctx.next_id("proj"), name, self.ctx.now());
            project.version = self.store.save(&project)?;
            Ok(project)
        });
        match &result {
            Ok(project) => info!(
                "event=project_create module=service status=ok project_id={} duration_ms={}",
                project.id,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("project_create", "-", started_at, err),
        }
        result
    }

    pub fn get_project(&self, project_id: &str) -> ServiceResult<Project> {
        Ok(self.store.load(project_id)?)
    }

    /// Summaries ordered by `updated_at DESC, id ASC`.
    pub fn list_projects(&self) -> ServiceResult<Vec<ProjectSummary>> {
        Ok(self.store.list_summaries()?)
    }

    pub fn rename_project(&self, project_id: &str, name: &str) -> ServiceResult<Project> {
        let mut session =
            ProjectSession::open(&self.store, &self.ctx, "project_rename", project_id)?;
        session.check(|project| {
            project.name = required_name(EntityKind::Project, name)?;
            Ok(())
        })?;
        session.commit()
    }

    /// Deletes the project with everything it contains.
    pub fn delete_project(&self, project_id: &str) -> ServiceResult<()> {
        let started_at = Instant::now();
        match self.store.delete(project_id) {
            Ok(()) => {
                info!(
                    "event=project_delete module=service status=ok project_id={} duration_ms={}",
                    project_id,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                let err = ServiceError::from(err);
                log_failure("project_delete", project_id, started_at, &err);
                Err(err)
            }
        }
    }

    /// Resolves a node to its chapter and section.
    pub fn node_location(&self, project_id: &str, node_id: &str) -> ServiceResult<NodeLocation> {
        let project = self.store.load(project_id)?;
        let slot = project
            .node_index()
            .get(node_id)
            .ok_or_else(|| ServiceError::NodeNotFound(node_id.to_string()))?;
        let chapter = &project.chapters[slot.chapter];
        let section = &chapter.sections[slot.section];
        Ok(NodeLocation {
            chapter_id: chapter.id.clone(),
            chapter_name: chapter.name.clone(),
            section_id: section.id.clone(),
            section_name: section.name.clone(),
            node: section.nodes[slot.node].clone(),
        })
    }
}
