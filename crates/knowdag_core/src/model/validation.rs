//! Name normalization and whole-aggregate invariant checks.
//!
//! # Responsibility
//! - Normalize user-supplied names (trim, non-empty, length bound).
//! - Verify every cross-cutting invariant of a `Project` in one pass.
//!
//! # Invariants
//! - `Project::validate` is the single definition of a consistent aggregate;
//!   stores run it on both write and read paths.

use crate::graph::dag::Dag;
use crate::model::project::{Project, MAX_EDGE_LABEL_CHARS, MAX_NAME_CHARS};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Entity kind used in validation diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Chapter,
    Section,
    Node,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Chapter => "chapter",
            Self::Section => "section",
            Self::Node => "node",
        }
    }
}

/// Consistency violations detected on names or on a whole aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// Name is empty after trim.
    BlankName(EntityKind),
    /// Persisted name carries surrounding whitespace.
    UntrimmedName(EntityKind),
    /// Name exceeds `MAX_NAME_CHARS`.
    NameTooLong { kind: EntityKind, chars: usize },
    /// Edge label exceeds `MAX_EDGE_LABEL_CHARS`.
    LabelTooLong { chars: usize },
    DuplicateChapterId(String),
    DuplicateSectionId(String),
    DuplicateNodeId(String),
    /// Two nodes of the same project share a name.
    DuplicateNodeName(String),
    /// Edge endpoint does not exist as a node.
    DanglingEdge { source: String, target: String },
    /// Same ordered pair appears twice.
    DuplicateEdge { source: String, target: String },
    /// Edge closes a directed cycle (self-loops included).
    CycleDetected { source: String, target: String },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName(kind) => write!(f, "{} name must not be blank", kind.as_str()),
            Self::UntrimmedName(kind) => {
                write!(f, "{} name must be stored trimmed", kind.as_str())
            }
            Self::NameTooLong { kind, chars } => write!(
                f,
                "{} name has {chars} chars; limit is {MAX_NAME_CHARS}",
                kind.as_str()
            ),
            Self::LabelTooLong { chars } => write!(
                f,
                "edge label has {chars} chars; limit is {MAX_EDGE_LABEL_CHARS}"
            ),
            Self::DuplicateChapterId(id) => write!(f, "duplicate chapter id: {id}"),
            Self::DuplicateSectionId(id) => write!(f, "duplicate section id: {id}"),
            Self::DuplicateNodeId(id) => write!(f, "duplicate node id: {id}"),
            Self::DuplicateNodeName(name) => write!(f, "duplicate node name: `{name}`"),
            Self::DanglingEdge { source, target } => {
                write!(f, "edge {source} -> {target} references a missing node")
            }
            Self::DuplicateEdge { source, target } => {
                write!(f, "duplicate edge {source} -> {target}")
            }
            Self::CycleDetected { source, target } => {
                write!(f, "edge {source} -> {target} closes a cycle")
            }
        }
    }
}

impl Error for ModelValidationError {}

/// Trims `value` and checks it is a usable name for `kind`.
pub fn normalize_name(kind: EntityKind, value: &str) -> Result<String, ModelValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ModelValidationError::BlankName(kind));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(ModelValidationError::NameTooLong { kind, chars });
    }
    Ok(trimmed.to_string())
}

pub fn validate_edge_label(label: &str) -> Result<(), ModelValidationError> {
    let chars = label.chars().count();
    if chars > MAX_EDGE_LABEL_CHARS {
        return Err(ModelValidationError::LabelTooLong { chars });
    }
    Ok(())
}

fn check_stored_name(kind: EntityKind, value: &str) -> Result<(), ModelValidationError> {
    let normalized = normalize_name(kind, value)?;
    if normalized != value {
        return Err(ModelValidationError::UntrimmedName(kind));
    }
    Ok(())
}

impl Project {
    /// Checks every aggregate invariant.
    ///
    /// # Errors
    /// - Returns the first violation found, scanning names and ids in
    ///   document order, then edges in list order.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        check_stored_name(EntityKind::Project, &self.name)?;

        let mut chapter_ids = HashSet::new();
        let mut section_ids = HashSet::new();
        let mut node_ids = HashSet::new();
        let mut node_names = HashSet::new();

        for chapter in &self.chapters {
            check_stored_name(EntityKind::Chapter, &chapter.name)?;
            if !chapter_ids.insert(chapter.id.as_str()) {
                return Err(ModelValidationError::DuplicateChapterId(chapter.id.clone()));
            }
            for section in &chapter.sections {
                check_stored_name(EntityKind::Section, &section.name)?;
                if !section_ids.insert(section.id.as_str()) {
                    return Err(ModelValidationError::DuplicateSectionId(section.id.clone()));
                }
                for node in &section.nodes {
                    check_stored_name(EntityKind::Node, &node.name)?;
                    if !node_ids.insert(node.id.as_str()) {
                        return Err(ModelValidationError::DuplicateNodeId(node.id.clone()));
                    }
                    if !node_names.insert(node.name.as_str()) {
                        return Err(ModelValidationError::DuplicateNodeName(node.name.clone()));
                    }
                }
            }
        }

        let mut dag = Dag::new(
            self.nodes().map(|node| node.id.as_str()),
            std::iter::empty(),
        );
        let mut pairs = HashSet::new();
        for edge in &self.edges {
            validate_edge_label(&edge.label)?;
            if !node_ids.contains(edge.source.as_str()) || !node_ids.contains(edge.target.as_str())
            {
                return Err(ModelValidationError::DanglingEdge {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                });
            }
            if !pairs.insert((edge.source.as_str(), edge.target.as_str())) {
                return Err(ModelValidationError::DuplicateEdge {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                });
            }
            if dag.would_create_cycle(&edge.source, &edge.target) {
                return Err(ModelValidationError::CycleDetected {
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                });
            }
            dag.add_edge(&edge.source, &edge.target);
        }

        Ok(())
    }
}
