//! Project interchange: lossless export and id-remapping import.
//!
//! # Responsibility
//! - Serialize a stored project into a self-contained JSON document.
//! - Create a brand-new project from such a document.
//!
//! # Invariants
//! - Export → import yields an isomorphic project under fresh ids.
//! - A rejected document never reaches the store.

pub mod codec;
pub mod document;

use crate::model::project::Project;
use crate::repo::project_repo::ProjectStore;
use crate::service::context::ServiceContext;
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::session::log_failure;
use codec::{build_project, export_document};
use document::InterchangeDocument;
use log::info;
use serde_json::Value;
use std::time::Instant;

/// Export/import service facade.
pub struct InterchangeService<S: ProjectStore> {
    store: S,
    ctx: ServiceContext,
}

impl<S: ProjectStore> InterchangeService<S> {
    pub fn new(store: S) -> Self {
        Self::with_context(store, ServiceContext::default())
    }

    pub fn with_context(store: S, ctx: ServiceContext) -> Self {
        Self { store, ctx }
    }

    pub fn export(&self, project_id: &str) -> ServiceResult<InterchangeDocument> {
        let project = self.store.load(project_id)?;
        Ok(export_document(&project))
    }

    /// Pretty-printed JSON form of `export`.
    pub fn export_json(&self, project_id: &str) -> ServiceResult<String> {
        let document = self.export(project_id)?;
        serde_json::to_string_pretty(&document)
            .map_err(|err| ServiceError::InvalidInput(format!("export encoding failed: {err}")))
    }

    /// Imports a parsed document value as a new project.
    ///
    /// # Errors
    /// - `ImportValidation` naming the first offending field or id.
    pub fn import_value(
        &self,
        document: &Value,
        override_name: Option<&str>,
    ) -> ServiceResult<Project> {
        let started_at = Instant::now();
        let result = build_project(document, override_name, &self.ctx).and_then(|mut project| {
            project.version = self.store.save(&project)?;
            Ok(project)
        });
        match &result {
            Ok(project) => info!(
                "event=project_import module=interchange status=ok project_id={} nodes={} edges={} duration_ms={}",
                project.id,
                project.node_count(),
                project.edges.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("project_import", "-", started_at, err),
        }
        result
    }

    pub fn import_json(
        &self,
        json: &str,
        override_name: Option<&str>,
    ) -> ServiceResult<Project> {
        let document: Value = serde_json::from_str(json)
            .map_err(|err| ServiceError::import("document", err.to_string()))?;
        self.import_value(&document, override_name)
    }

    pub fn import_document(
        &self,
        document: &InterchangeDocument,
        override_name: Option<&str>,
    ) -> ServiceResult<Project> {
        let value = serde_json::to_value(document)
            .map_err(|err| ServiceError::import("document", err.to_string()))?;
        self.import_value(&value, override_name)
    }
}
