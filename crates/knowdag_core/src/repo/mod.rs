//! Repository layer: aggregate persistence contracts and implementations.
//!
//! # Responsibility
//! - Define the `ProjectStore` load/save/delete/list contract.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Every store enforces `Project::validate()` before persistence.
//! - Every store applies the same optimistic version rule.

pub mod memory_repo;
pub mod project_repo;
