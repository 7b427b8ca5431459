//! Core domain logic for KnowDAG.
//! This crate is the single source of truth for the hierarchy and DAG
//! invariants of a project aggregate.

pub mod config;
pub mod db;
pub mod graph;
pub mod interchange;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use graph::analysis::{AnalysisLimits, GraphAnalysis};
pub use interchange::document::InterchangeDocument;
pub use interchange::InterchangeService;
pub use logging::{init_logging, logging_status, LogLevel, LoggingConfig, LoggingError};
pub use model::project::{
    Chapter, ChapterLayout, Edge, Frame, Node, Project, ProjectSummary, Section,
};
pub use model::validation::ModelValidationError;
pub use repo::memory_repo::MemoryProjectStore;
pub use repo::project_repo::{ProjectStore, SqliteProjectStore, StoreError, StoreResult};
pub use service::context::{
    Clock, IdGenerator, SequentialIdGenerator, ServiceContext, SystemClock, UuidIdGenerator,
};
pub use service::error::{ErrorKind, ServiceError, ServiceResult};
pub use service::graph_service::{AddEdgeRequest, GraphService};
pub use service::hierarchy_service::{
    AddChapterRequest, AddNodeRequest, AddSectionRequest, DeleteNodeRequest, HierarchyService,
    ReorderNodesRequest, UpdateChapterRequest, UpdateNodePositionRequest, UpdateNodeRequest,
    UpdateSectionRequest,
};
pub use service::project_service::{NodeLocation, ProjectService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
