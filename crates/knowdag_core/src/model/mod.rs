//! Project aggregate domain model.
//!
//! # Responsibility
//! - Define the hierarchy (project → chapter → section → node) and the edge
//!   list sharing node ids with it.
//! - Own name normalization and whole-aggregate validation.
//!
//! # Invariants
//! - Node ids and node names are unique project-wide.
//! - The edge relation is acyclic and only references existing nodes.

pub mod index;
pub mod project;
pub mod validation;
