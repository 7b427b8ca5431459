//! Node-id → tree location index.
//!
//! Rebuilt from the owned tree on demand, so it can never disagree with the
//! hierarchy it was built from.

use crate::model::project::Project;
use std::collections::HashMap;

/// List positions of one node inside the containment tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSlot {
    pub chapter: usize,
    pub section: usize,
    pub node: usize,
}

/// Project-wide lookup of node locations.
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    slots: HashMap<String, NodeSlot>,
}

impl NodeIndex {
    /// Indexes every node of `project`. When ids repeat (invalid aggregate),
    /// the first occurrence in document order wins.
    pub fn build(project: &Project) -> Self {
        let mut slots = HashMap::new();
        for (chapter, chapter_value) in project.chapters.iter().enumerate() {
            for (section, section_value) in chapter_value.sections.iter().enumerate() {
                for (node, node_value) in section_value.nodes.iter().enumerate() {
                    slots.entry(node_value.id.clone()).or_insert(NodeSlot {
                        chapter,
                        section,
                        node,
                    });
                }
            }
        }
        Self { slots }
    }

    pub fn get(&self, node_id: &str) -> Option<NodeSlot> {
        self.slots.get(node_id).copied()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.slots.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
