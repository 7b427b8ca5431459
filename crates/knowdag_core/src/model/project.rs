//! Project aggregate model.
//!
//! # Responsibility
//! - Define the owned-by-value containment tree: project → chapters →
//!   sections → nodes.
//! - Carry the project-wide edge list layered over node ids.
//!
//! # Invariants
//! - Parents own children by value; there are no back-references.
//! - `created_at` never changes after construction; `touch` only moves
//!   `updated_at`.
//! - `version == 0` means the aggregate has never been persisted.

use crate::model::index::NodeIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum length (in chars) for project/chapter/section/node names.
pub const MAX_NAME_CHARS: usize = 200;
/// Maximum length (in chars) for edge labels.
pub const MAX_EDGE_LABEL_CHARS: usize = 100;

/// Arrangement of sections inside one chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterLayout {
    /// Sections flow horizontally.
    #[default]
    Row,
    /// Sections stack vertically.
    Column,
    /// Sections use their free-form frame coordinates.
    Free,
}

impl ChapterLayout {
    /// Stable storage/interchange spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Column => "column",
            Self::Free => "free",
        }
    }

    /// Parses `row|column|free`, ignoring surrounding whitespace and case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "row" => Some(Self::Row),
            "column" => Some(Self::Column),
            "free" => Some(Self::Free),
            _ => None,
        }
    }
}

/// Opaque free-form placement metadata.
///
/// The core never interprets these values; they are carried for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Frame {
    /// Frame carrying only a point.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.width.is_none() && self.height.is_none()
    }

    /// Returns `true` when every present value is a finite number.
    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .into_iter()
            .flatten()
            .all(f64::is_finite)
    }
}

/// Knowledge node, the leaf of the hierarchy and the vertex of the DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    /// Unique across the whole project.
    pub name: String,
    #[serde(default)]
    pub content: String,
    /// Float rank inside the owning section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(flatten)]
    pub frame: Frame,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        position: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: content.into(),
            position,
            frame: Frame::default(),
        }
    }
}

/// Ordered group of nodes inside one chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(flatten)]
    pub frame: Frame,
}

impl Section {
    pub fn new(id: impl Into<String>, name: impl Into<String>, position: Option<f64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            position,
            frame: Frame::default(),
        }
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == node_id)
    }
}

/// Top-level grouping inside a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub layout: ChapterLayout,
    /// Meaningful only when `layout == ChapterLayout::Free`.
    #[serde(flatten)]
    pub frame: Frame,
}

impl Chapter {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sections: Vec::new(),
            layout: ChapterLayout::default(),
            frame: Frame::default(),
        }
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|section| section.id == section_id)
    }
}

/// Directed, labeled dependency between two nodes. Identity is the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: String,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
        }
    }

    pub fn touches(&self, node_ids: &HashSet<String>) -> bool {
        node_ids.contains(&self.source) || node_ids.contains(&self.target)
    }
}

/// Listing projection of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The aggregate: unit of load and save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Optimistic concurrency token owned by the store.
    #[serde(default)]
    pub version: u64,
}

impl Project {
    /// Creates an empty, never-saved project.
    pub fn new(id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            chapters: Vec::new(),
            edges: Vec::new(),
            version: 0,
        }
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Refreshes `updated_at`. Never moves it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    pub fn chapter_index(&self, chapter_id: &str) -> Option<usize> {
        self.chapters
            .iter()
            .position(|chapter| chapter.id == chapter_id)
    }

    pub fn chapter(&self, chapter_id: &str) -> Option<&Chapter> {
        self.chapters
            .iter()
            .find(|chapter| chapter.id == chapter_id)
    }

    /// Locates a section anywhere in the project as `(chapter, section)`
    /// list positions.
    pub fn find_section(&self, section_id: &str) -> Option<(usize, usize)> {
        self.chapters
            .iter()
            .enumerate()
            .find_map(|(chapter_pos, chapter)| {
                chapter
                    .sections
                    .iter()
                    .position(|section| section.id == section_id)
                    .map(|section_pos| (chapter_pos, section_pos))
            })
    }

    /// All nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.chapters
            .iter()
            .flat_map(|chapter| chapter.sections.iter())
            .flat_map(|section| section.nodes.iter())
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    /// Builds the node-id → location index for the current tree shape.
    pub fn node_index(&self) -> NodeIndex {
        NodeIndex::build(self)
    }

    /// Returns `true` when a node other than `except_id` already uses `name`.
    pub fn has_node_name(&self, name: &str, except_id: Option<&str>) -> bool {
        self.nodes()
            .any(|node| node.name == name && Some(node.id.as_str()) != except_id)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|edge| edge.source == source && edge.target == target)
    }

    pub fn edge_mut(&mut self, source: &str, target: &str) -> Option<&mut Edge> {
        self.edges
            .iter_mut()
            .find(|edge| edge.source == source && edge.target == target)
    }

    /// Drops every edge touching one of `node_ids`; returns the count removed.
    pub fn remove_edges_touching(&mut self, node_ids: &HashSet<String>) -> usize {
        let before = self.edges.len();
        self.edges.retain(|edge| !edge.touches(node_ids));
        before - self.edges.len()
    }
}
