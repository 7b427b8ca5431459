//! Core use-case services.
//!
//! # Responsibility
//! - Turn caller requests into validated aggregate transformations.
//! - Keep outer layers decoupled from storage details.
//!
//! # Invariants
//! - Each service owns its store handle; there is no process-wide store.
//! - Mutations follow load → check → mutate → commit through
//!   `session::ProjectSession`.

pub mod context;
pub mod error;
pub mod graph_service;
pub mod hierarchy_service;
pub mod project_service;
pub(crate) mod session;
