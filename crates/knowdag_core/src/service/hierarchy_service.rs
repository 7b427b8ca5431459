//! Hierarchy use-case service: chapters, sections and nodes.
//!
//! # Responsibility
//! - Add, update, reorder and delete hierarchy entities inside one project.
//! - Cascade structural deletes into the edge list.
//!
//! # Invariants
//! - Every check runs before the first mutation; a failed call never saves.
//! - Caller-supplied parent ids are verified, never trusted.
//! - Reorders accept only exact permutations.
//! - Section and node positions are dense ranks `0..n-1` after every insert,
//!   reorder and delete.

use crate::model::index::NodeSlot;
use crate::model::project::{Chapter, ChapterLayout, Frame, Node, Project, Section};
use crate::model::validation::EntityKind;
use crate::repo::project_repo::ProjectStore;
use crate::service::context::ServiceContext;
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::session::{
    ensure_finite_frame, ensure_permutation, name_or_default, required_name, ProjectSession,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddChapterRequest {
    /// Blank or absent falls back to `Chapter {n+1}`.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateChapterRequest {
    pub name: Option<String>,
    /// One of `row`, `column`, `free`.
    pub layout: Option<String>,
    pub frame: Option<Frame>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddSectionRequest {
    pub chapter_id: String,
    /// Blank or absent falls back to `Section {n+1}`.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSectionRequest {
    /// When present, must be the section's actual chapter.
    pub chapter_id: Option<String>,
    pub name: Option<String>,
    pub frame: Option<Frame>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddNodeRequest {
    pub chapter_id: String,
    pub section_id: String,
    /// Blank or absent falls back to `Item {n+1}`.
    pub name: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateNodeRequest {
    pub name: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderNodesRequest {
    pub section_id: String,
    pub chapter_id: Option<String>,
    pub node_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateNodePositionRequest {
    pub node_id: String,
    pub section_id: String,
    pub chapter_id: Option<String>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteNodeRequest {
    pub chapter_id: Option<String>,
    pub section_id: Option<String>,
}

/// Hierarchy service facade.
pub struct HierarchyService<S: ProjectStore> {
    store: S,
    ctx: ServiceContext,
}

impl<S: ProjectStore> HierarchyService<S> {
    pub fn new(store: S) -> Self {
        Self::with_context(store, ServiceContext::default())
    }

    pub fn with_context(store: S, ctx: ServiceContext) -> Self {
        Self { store, ctx }
    }

    /// Appends a chapter.
    pub fn add_chapter(
        &self,
        project_id: &str,
        request: &AddChapterRequest,
    ) -> ServiceResult<Chapter> {
        let mut session = self.session("chapter_add", project_id)?;
        let chapter = session.check(|project| {
            let count = project.chapters.len();
            let name = name_or_default(EntityKind::Chapter, request.name.as_deref(), || {
                format!("Chapter {}", count + 1)
            })?;
            let chapter = Chapter::new(self.ctx.next_id("ch"), name);
            project.chapters.push(chapter.clone());
            Ok(chapter)
        })?;
        session.commit()?;
        Ok(chapter)
    }

    /// Partially updates name, layout and frame.
    ///
    /// # Errors
    /// - `InvalidInput` for a blank name, an unknown layout or non-finite
    ///   coordinates.
    pub fn update_chapter(
        &self,
        project_id: &str,
        chapter_id: &str,
        request: &UpdateChapterRequest,
    ) -> ServiceResult<Chapter> {
        let mut session = self.session("chapter_update", project_id)?;
        let chapter = session.check(|project| {
            let position = project
                .chapter_index(chapter_id)
                .ok_or_else(|| ServiceError::ChapterNotFound(chapter_id.to_string()))?;
            let name = request
                .name
                .as_deref()
                .map(|value| required_name(EntityKind::Chapter, value))
                .transpose()?;
            let layout = request
                .layout
                .as_deref()
                .map(|value| {
                    ChapterLayout::parse(value).ok_or_else(|| {
                        ServiceError::InvalidInput(format!(
                            "unknown layout `{value}`; expected row|column|free"
                        ))
                    })
                })
                .transpose()?;
            if let Some(frame) = &request.frame {
                ensure_finite_frame(frame)?;
            }

            let chapter = &mut project.chapters[position];
            if let Some(name) = name {
                chapter.name = name;
            }
            if let Some(layout) = layout {
                chapter.layout = layout;
            }
            if let Some(frame) = request.frame {
                chapter.frame = frame;
            }
            Ok(chapter.clone())
        })?;
        session.commit()?;
        Ok(chapter)
    }

    /// Re-issues chapter order; `ordered_ids` must be a permutation of the
    /// current chapter ids.
    pub fn reorder_chapters(
        &self,
        project_id: &str,
        ordered_ids: &[String],
    ) -> ServiceResult<Project> {
        let mut session = self.session("chapter_reorder", project_id)?;
        session.check(|project| {
            let current: Vec<&str> = project
                .chapters
                .iter()
                .map(|chapter| chapter.id.as_str())
                .collect();
            ensure_permutation(&project.id, &current, ordered_ids)?;
            reorder_by(&mut project.chapters, ordered_ids, |chapter| &chapter.id);
            Ok(())
        })?;
        session.commit()
    }

    /// Removes a chapter with its sections, nodes and every touching edge.
    pub fn delete_chapter(&self, project_id: &str, chapter_id: &str) -> ServiceResult<Project> {
        let mut session = self.session("chapter_delete", project_id)?;
        session.check(|project| {
            let position = project
                .chapter_index(chapter_id)
                .ok_or_else(|| ServiceError::ChapterNotFound(chapter_id.to_string()))?;
            let chapter = project.chapters.remove(position);
            let removed: HashSet<String> = chapter
                .sections
                .into_iter()
                .flat_map(|section| section.nodes)
                .map(|node| node.id)
                .collect();
            project.remove_edges_touching(&removed);
            Ok(())
        })?;
        session.commit()
    }

    /// Appends a section to a chapter; its position is the new last rank.
    pub fn add_section(
        &self,
        project_id: &str,
        request: &AddSectionRequest,
    ) -> ServiceResult<Section> {
        let mut session = self.session("section_add", project_id)?;
        let section = session.check(|project| {
            let position = project
                .chapter_index(&request.chapter_id)
                .ok_or_else(|| ServiceError::ChapterNotFound(request.chapter_id.clone()))?;
            let siblings = project.chapters[position].sections.len();
            let name = name_or_default(EntityKind::Section, request.name.as_deref(), || {
                format!("Section {}", siblings + 1)
            })?;
            let section = Section::new(self.ctx.next_id("sec"), name, Some(siblings as f64));
            let sections = &mut project.chapters[position].sections;
            sections.push(section);
            reissue_positions(sections, |section| &mut section.position);
            Ok(sections[siblings].clone())
        })?;
        session.commit()?;
        Ok(section)
    }

    pub fn update_section(
        &self,
        project_id: &str,
        section_id: &str,
        request: &UpdateSectionRequest,
    ) -> ServiceResult<Section> {
        let mut session = self.session("section_update", project_id)?;
        let section = session.check(|project| {
            let (chapter_pos, section_pos) = locate_section(project, section_id)?;
            check_parent(
                section_id,
                request.chapter_id.as_deref(),
                &project.chapters[chapter_pos].id,
            )?;
            let name = request
                .name
                .as_deref()
                .map(|value| required_name(EntityKind::Section, value))
                .transpose()?;
            if let Some(frame) = &request.frame {
                ensure_finite_frame(frame)?;
            }

            let section = &mut project.chapters[chapter_pos].sections[section_pos];
            if let Some(name) = name {
                section.name = name;
            }
            if let Some(frame) = request.frame {
                section.frame = frame;
            }
            Ok(section.clone())
        })?;
        session.commit()?;
        Ok(section)
    }

    pub fn reorder_sections(
        &self,
        project_id: &str,
        chapter_id: &str,
        ordered_ids: &[String],
    ) -> ServiceResult<Project> {
        let mut session = self.session("section_reorder", project_id)?;
        session.check(|project| {
            let position = project
                .chapter_index(chapter_id)
                .ok_or_else(|| ServiceError::ChapterNotFound(chapter_id.to_string()))?;
            let sections = &mut project.chapters[position].sections;
            let current: Vec<&str> = sections.iter().map(|section| section.id.as_str()).collect();
            ensure_permutation(chapter_id, &current, ordered_ids)?;
            reorder_by(sections, ordered_ids, |section| &section.id);
            reissue_positions(sections, |section| &mut section.position);
            Ok(())
        })?;
        session.commit()
    }

    /// Removes a section with its nodes and every touching edge.
    pub fn delete_section(
        &self,
        project_id: &str,
        section_id: &str,
        chapter_id: Option<&str>,
    ) -> ServiceResult<Project> {
        let mut session = self.session("section_delete", project_id)?;
        session.check(|project| {
            let (chapter_pos, section_pos) = locate_section(project, section_id)?;
            check_parent(section_id, chapter_id, &project.chapters[chapter_pos].id)?;
            let sections = &mut project.chapters[chapter_pos].sections;
            let section = sections.remove(section_pos);
            reissue_positions(sections, |section| &mut section.position);
            let removed: HashSet<String> = section.nodes.into_iter().map(|node| node.id).collect();
            project.remove_edges_touching(&removed);
            Ok(())
        })?;
        session.commit()
    }

    /// Appends a node to a section; its position is the new last rank.
    ///
    /// # Errors
    /// - `SectionNotFound` when the section is not inside `chapter_id`.
    /// - `NameConflict` when the final name (supplied or default) is taken.
    pub fn add_node(&self, project_id: &str, request: &AddNodeRequest) -> ServiceResult<Node> {
        let mut session = self.session("node_add", project_id)?;
        let node = session.check(|project| {
            let chapter_pos = project
                .chapter_index(&request.chapter_id)
                .ok_or_else(|| ServiceError::ChapterNotFound(request.chapter_id.clone()))?;
            let section_pos = project.chapters[chapter_pos]
                .sections
                .iter()
                .position(|section| section.id == request.section_id)
                .ok_or_else(|| ServiceError::SectionNotFound(request.section_id.clone()))?;
            let siblings = project.chapters[chapter_pos].sections[section_pos]
                .nodes
                .len();
            let name = name_or_default(EntityKind::Node, request.name.as_deref(), || {
                format!("Item {}", siblings + 1)
            })?;
            if project.has_node_name(&name, None) {
                return Err(ServiceError::NameConflict(name));
            }

            let node = Node::new(
                self.ctx.next_id("node"),
                name,
                request.content.clone().unwrap_or_default(),
                Some(siblings as f64),
            );
            let nodes = &mut project.chapters[chapter_pos].sections[section_pos].nodes;
            nodes.push(node);
            reissue_positions(nodes, |node| &mut node.position);
            Ok(nodes[siblings].clone())
        })?;
        session.commit()?;
        Ok(node)
    }

    /// Partially updates name and content. Renaming to the current name is
    /// a no-op, not a conflict.
    pub fn update_node(
        &self,
        project_id: &str,
        node_id: &str,
        request: &UpdateNodeRequest,
    ) -> ServiceResult<Node> {
        let mut session = self.session("node_update", project_id)?;
        let node = session.check(|project| {
            let slot = locate_node(project, node_id)?;
            let name = request
                .name
                .as_deref()
                .map(|value| required_name(EntityKind::Node, value))
                .transpose()?;
            if let Some(name) = &name {
                if project.has_node_name(name, Some(node_id)) {
                    return Err(ServiceError::NameConflict(name.clone()));
                }
            }

            let node = node_at_mut(project, slot);
            if let Some(name) = name {
                node.name = name;
            }
            if let Some(content) = &request.content {
                node.content = content.clone();
            }
            Ok(node.clone())
        })?;
        session.commit()?;
        Ok(node)
    }

    pub fn reorder_nodes(
        &self,
        project_id: &str,
        request: &ReorderNodesRequest,
    ) -> ServiceResult<Project> {
        let mut session = self.session("node_reorder", project_id)?;
        session.check(|project| {
            let (chapter_pos, section_pos) = locate_section(project, &request.section_id)?;
            check_parent(
                &request.section_id,
                request.chapter_id.as_deref(),
                &project.chapters[chapter_pos].id,
            )?;
            let nodes = &mut project.chapters[chapter_pos].sections[section_pos].nodes;
            let current: Vec<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
            ensure_permutation(&request.section_id, &current, &request.node_ids)?;
            reorder_by(nodes, &request.node_ids, |node| &node.id);
            reissue_positions(nodes, |node| &mut node.position);
            Ok(())
        })?;
        session.commit()
    }

    /// Sets free-form coordinates on a node after verifying its parents.
    pub fn update_node_position(
        &self,
        project_id: &str,
        request: &UpdateNodePositionRequest,
    ) -> ServiceResult<Node> {
        let mut session = self.session("node_move", project_id)?;
        let node = session.check(|project| {
            if !request.x.is_finite() || !request.y.is_finite() {
                return Err(ServiceError::InvalidInput(
                    "coordinates must be finite numbers".to_string(),
                ));
            }
            let slot = locate_node(project, &request.node_id)?;
            check_node_parents(
                project,
                &request.node_id,
                slot,
                request.chapter_id.as_deref(),
                Some(request.section_id.as_str()),
            )?;
            let node = node_at_mut(project, slot);
            node.frame.x = Some(request.x);
            node.frame.y = Some(request.y);
            Ok(node.clone())
        })?;
        session.commit()?;
        Ok(node)
    }

    /// Removes a node and every edge touching it.
    pub fn delete_node(
        &self,
        project_id: &str,
        node_id: &str,
        request: &DeleteNodeRequest,
    ) -> ServiceResult<Project> {
        let mut session = self.session("node_delete", project_id)?;
        session.check(|project| {
            let slot = locate_node(project, node_id)?;
            check_node_parents(
                project,
                node_id,
                slot,
                request.chapter_id.as_deref(),
                request.section_id.as_deref(),
            )?;
            let nodes = &mut project.chapters[slot.chapter].sections[slot.section].nodes;
            let node = nodes.remove(slot.node);
            reissue_positions(nodes, |node| &mut node.position);
            project.remove_edges_touching(&HashSet::from([node.id]));
            Ok(())
        })?;
        session.commit()
    }

    fn session(
        &self,
        event: &'static str,
        project_id: &str,
    ) -> ServiceResult<ProjectSession<'_, S>> {
        ProjectSession::open(&self.store, &self.ctx, event, project_id)
    }
}

fn locate_section(project: &Project, section_id: &str) -> ServiceResult<(usize, usize)> {
    project
        .find_section(section_id)
        .ok_or_else(|| ServiceError::SectionNotFound(section_id.to_string()))
}

fn locate_node(project: &Project, node_id: &str) -> ServiceResult<NodeSlot> {
    project
        .node_index()
        .get(node_id)
        .ok_or_else(|| ServiceError::NodeNotFound(node_id.to_string()))
}

fn node_at_mut(project: &mut Project, slot: NodeSlot) -> &mut Node {
    &mut project.chapters[slot.chapter].sections[slot.section].nodes[slot.node]
}

fn check_parent(entity_id: &str, supplied: Option<&str>, actual: &str) -> ServiceResult<()> {
    match supplied {
        Some(expected) if expected != actual => Err(ServiceError::ParentMismatch {
            entity_id: entity_id.to_string(),
            expected_parent: expected.to_string(),
            actual_parent: actual.to_string(),
        }),
        _ => Ok(()),
    }
}

fn check_node_parents(
    project: &Project,
    node_id: &str,
    slot: NodeSlot,
    chapter_id: Option<&str>,
    section_id: Option<&str>,
) -> ServiceResult<()> {
    let chapter = &project.chapters[slot.chapter];
    check_parent(node_id, section_id, &chapter.sections[slot.section].id)?;
    check_parent(node_id, chapter_id, &chapter.id)
}

/// Rearranges `items` to follow `ordered_ids`, which must already be a
/// verified permutation of their ids.
fn reorder_by<T>(items: &mut Vec<T>, ordered_ids: &[String], id_of: impl Fn(&T) -> &String) {
    let mut by_id: HashMap<String, T> = items
        .drain(..)
        .map(|item| (id_of(&item).clone(), item))
        .collect();
    for id in ordered_ids {
        if let Some(item) = by_id.remove(id) {
            items.push(item);
        }
    }
}

/// Rewrites sibling positions as `0.0, 1.0, ..` in list order.
fn reissue_positions<T>(items: &mut [T], position: impl Fn(&mut T) -> &mut Option<f64>) {
    for (rank, item) in items.iter_mut().enumerate() {
        *position(item) = Some(rank as f64);
    }
}
