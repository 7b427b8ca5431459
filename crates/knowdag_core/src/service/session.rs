//! Load → mutate → commit cycle shared by every mutating use-case.

use crate::model::project::{Frame, Project};
use crate::model::validation::{normalize_name, EntityKind};
use crate::repo::project_repo::ProjectStore;
use crate::service::context::ServiceContext;
use crate::service::error::{ServiceError, ServiceResult};
use log::{info, warn};
use std::time::Instant;

/// One loaded aggregate awaiting commit.
///
/// Dropping a session without `commit` discards every in-memory change.
pub(crate) struct ProjectSession<'a, S: ProjectStore> {
    store: &'a S,
    ctx: &'a ServiceContext,
    event: &'static str,
    started_at: Instant,
    pub(crate) project: Project,
}

impl<'a, S: ProjectStore> ProjectSession<'a, S> {
    pub(crate) fn open(
        store: &'a S,
        ctx: &'a ServiceContext,
        event: &'static str,
        project_id: &str,
    ) -> ServiceResult<Self> {
        let started_at = Instant::now();
        let project = store.load(project_id).map_err(|err| {
            let err = ServiceError::from(err);
            log_failure(event, project_id, started_at, &err);
            err
        })?;
        Ok(Self {
            store,
            ctx,
            event,
            started_at,
            project,
        })
    }

    /// Runs a check against the loaded aggregate, logging its failure.
    pub(crate) fn check<T>(
        &mut self,
        step: impl FnOnce(&mut Project) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        step(&mut self.project).map_err(|err| {
            log_failure(self.event, &self.project.id, self.started_at, &err);
            err
        })
    }

    /// Stamps `updated_at` and saves; returns the aggregate with its new
    /// version.
    pub(crate) fn commit(mut self) -> ServiceResult<Project> {
        self.project.touch(self.ctx.now());
        match self.store.save(&self.project) {
            Ok(version) => {
                self.project.version = version;
                info!(
                    "event={} module=service status=ok project_id={} version={} duration_ms={}",
                    self.event,
                    self.project.id,
                    version,
                    self.started_at.elapsed().as_millis()
                );
                Ok(self.project)
            }
            Err(err) => {
                let err = ServiceError::from(err);
                log_failure(self.event, &self.project.id, self.started_at, &err);
                Err(err)
            }
        }
    }

    /// Ends the session without saving.
    pub(crate) fn finish_unchanged(self) -> Project {
        info!(
            "event={} module=service status=ok project_id={} changed=false duration_ms={}",
            self.event,
            self.project.id,
            self.started_at.elapsed().as_millis()
        );
        self.project
    }
}

pub(crate) fn log_failure(event: &str, project_id: &str, started_at: Instant, err: &ServiceError) {
    warn!(
        "event={} module=service status=error project_id={} duration_ms={} error_code={}",
        event,
        project_id,
        started_at.elapsed().as_millis(),
        err.code()
    );
}

/// Uses `supplied` when it is present and non-blank, else `fallback`.
pub(crate) fn name_or_default(
    kind: EntityKind,
    supplied: Option<&str>,
    fallback: impl FnOnce() -> String,
) -> ServiceResult<String> {
    match supplied.filter(|value| !value.trim().is_empty()) {
        Some(value) => Ok(normalize_name(kind, value)?),
        None => Ok(fallback()),
    }
}

/// Normalizes a supplied replacement name; blank is rejected.
pub(crate) fn required_name(kind: EntityKind, supplied: &str) -> ServiceResult<String> {
    Ok(normalize_name(kind, supplied)?)
}

pub(crate) fn ensure_finite_frame(frame: &Frame) -> ServiceResult<()> {
    if frame.is_finite() {
        return Ok(());
    }
    Err(ServiceError::InvalidInput(
        "coordinates must be finite numbers".to_string(),
    ))
}

/// Checks that `requested` is exactly a permutation of `current`.
pub(crate) fn ensure_permutation(
    parent_id: &str,
    current: &[&str],
    requested: &[String],
) -> ServiceResult<()> {
    let mismatch = || ServiceError::OrderMismatch {
        parent_id: parent_id.to_string(),
        expected: current.len(),
        received: requested.len(),
    };
    if current.len() != requested.len() {
        return Err(mismatch());
    }
    let mut seen = std::collections::HashSet::with_capacity(requested.len());
    for id in requested {
        if !seen.insert(id.as_str()) || !current.contains(&id.as_str()) {
            return Err(mismatch());
        }
    }
    Ok(())
}
