//! In-process aggregate store.
//!
//! Same contract as the SQLite store, including validation on save and the
//! optimistic version check. Clones share one map.

use crate::model::project::{Project, ProjectSummary};
use crate::repo::project_repo::{check_version, ProjectStore, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct MemoryProjectStore {
    projects: Arc<Mutex<BTreeMap<String, Project>>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> MutexGuard<'_, BTreeMap<String, Project>> {
        // Every write replaces a whole entry, so a poisoned map is still
        // consistent.
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProjectStore for MemoryProjectStore {
    fn load(&self, project_id: &str) -> StoreResult<Project> {
        self.guard()
            .get(project_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(project_id.to_string()))
    }

    fn save(&self, project: &Project) -> StoreResult<u64> {
        project.validate()?;

        let mut projects = self.guard();
        let stored = projects.get(&project.id).map(|current| current.version);
        check_version(&project.id, project.version, stored)?;

        let mut next = project.clone();
        next.version = project.version + 1;
        let version = next.version;
        projects.insert(next.id.clone(), next);
        Ok(version)
    }

    fn delete(&self, project_id: &str) -> StoreResult<()> {
        self.guard()
            .remove(project_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(project_id.to_string()))
    }

    fn list_summaries(&self) -> StoreResult<Vec<ProjectSummary>> {
        let mut summaries: Vec<ProjectSummary> =
            self.guard().values().map(Project::summary).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }
}
