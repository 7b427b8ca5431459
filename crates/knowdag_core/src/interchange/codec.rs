//! Export and import between `Project` and the interchange document.
//!
//! # Responsibility
//! - Export in stored order with optional values omitted.
//! - Import into a brand-new aggregate with fresh ids everywhere.
//!
//! # Invariants
//! - Import never reuses ids found in the input.
//! - The old→new node id map is complete before any edge is translated.
//! - The built project passes `Project::validate()` before it is returned.

use crate::interchange::document::{
    ChapterRecord, EdgeRecord, InterchangeDocument, NodeRecord, ProjectHeader, SectionRecord,
    FORMAT_VERSION,
};
use crate::model::project::{Chapter, ChapterLayout, Edge, Frame, Node, Project, Section};
use crate::model::validation::{normalize_name, validate_edge_label, EntityKind};
use crate::service::context::ServiceContext;
use crate::service::error::{ServiceError, ServiceResult};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Project name used when neither an override nor the document supplies one.
pub const DEFAULT_IMPORT_NAME: &str = "Imported project";

/// Builds the interchange document for `project`.
pub fn export_document(project: &Project) -> InterchangeDocument {
    InterchangeDocument {
        format_version: FORMAT_VERSION,
        project: ProjectHeader {
            id: project.id.clone(),
            name: project.name.clone(),
        },
        chapters: project
            .chapters
            .iter()
            .map(|chapter| ChapterRecord {
                id: chapter.id.clone(),
                name: chapter.name.clone(),
                layout: chapter.layout,
                frame: chapter.frame,
                sections: chapter
                    .sections
                    .iter()
                    .map(|section| SectionRecord {
                        id: section.id.clone(),
                        name: section.name.clone(),
                        position: section.position,
                        frame: section.frame,
                        nodes: section
                            .nodes
                            .iter()
                            .map(|node| NodeRecord {
                                id: node.id.clone(),
                                name: node.name.clone(),
                                content: node.content.clone(),
                                position: node.position,
                                frame: node.frame,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect(),
        edges: project
            .edges
            .iter()
            .map(|edge| EdgeRecord {
                source: edge.source.clone(),
                target: edge.target.clone(),
                label: edge.label.clone(),
            })
            .collect(),
    }
}

/// Builds an unsaved project (version 0) from a parsed document value.
///
/// # Errors
/// - `ImportValidation` naming the offending field or id.
pub fn build_project(
    document: &Value,
    override_name: Option<&str>,
    ctx: &ServiceContext,
) -> ServiceResult<Project> {
    let root = as_object(document, "document")?;
    check_format_version(root)?;

    let name = project_name(root, override_name)?;
    let mut project = Project::new(ctx.next_id("proj"), name, ctx.now());

    // First pass: the whole hierarchy, including the node id map.
    let mut node_ids: HashMap<String, String> = HashMap::new();
    let mut node_ordinal = 0usize;
    for (chapter_pos, chapter_value) in optional_list(root, "chapters", "chapters")?
        .iter()
        .enumerate()
    {
        let chapter_path = format!("chapters[{chapter_pos}]");
        let chapter_obj = as_object(chapter_value, &chapter_path)?;
        let mut chapter = Chapter::new(
            ctx.next_id("ch"),
            entity_name(chapter_obj, &chapter_path, EntityKind::Chapter, || {
                format!("Chapter {}", chapter_pos + 1)
            })?,
        );
        if let Some(layout) = optional_str(chapter_obj, "layout", &chapter_path)? {
            chapter.layout = ChapterLayout::parse(layout).ok_or_else(|| {
                ServiceError::import(
                    format!("{chapter_path}.layout"),
                    format!("unknown layout `{layout}`; expected row|column|free"),
                )
            })?;
        }
        chapter.frame = read_frame(chapter_obj, &chapter_path)?;

        let sections_path = format!("{chapter_path}.sections");
        for (section_pos, section_value) in required_list(chapter_obj, "sections", &sections_path)?
            .iter()
            .enumerate()
        {
            let section_path = format!("{sections_path}[{section_pos}]");
            let section_obj = as_object(section_value, &section_path)?;
            let mut section = Section::new(
                ctx.next_id("sec"),
                entity_name(section_obj, &section_path, EntityKind::Section, || {
                    format!("Section {}", section_pos + 1)
                })?,
                optional_f64(section_obj, "position", &section_path)?,
            );
            section.frame = read_frame(section_obj, &section_path)?;

            let nodes_path = format!("{section_path}.nodes");
            for (node_pos, node_value) in required_list(section_obj, "nodes", &nodes_path)?
                .iter()
                .enumerate()
            {
                node_ordinal += 1;
                let node_path = format!("{nodes_path}[{node_pos}]");
                let node_obj = as_object(node_value, &node_path)?;
                let old_id = optional_str(node_obj, "id", &node_path)?
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        ServiceError::import(format!("{node_path}.id"), "node id is required")
                    })?;
                if node_ids.contains_key(old_id) {
                    return Err(ServiceError::import(
                        format!("{node_path}.id"),
                        format!("duplicate node id `{old_id}`"),
                    ));
                }
                let new_id = ctx.next_id("node");
                node_ids.insert(old_id.to_string(), new_id.clone());

                let mut node = Node::new(
                    new_id,
                    entity_name(node_obj, &node_path, EntityKind::Node, || {
                        format!("Item {node_ordinal}")
                    })?,
                    optional_str(node_obj, "content", &node_path)?.unwrap_or_default(),
                    optional_f64(node_obj, "position", &node_path)?,
                );
                node.frame = read_frame(node_obj, &node_path)?;
                section.nodes.push(node);
            }
            chapter.sections.push(section);
        }
        project.chapters.push(chapter);
    }

    // Second pass: edges through the completed map.
    let mut pairs: HashSet<(String, String)> = HashSet::new();
    for (edge_pos, edge_value) in optional_list(root, "edges", "edges")?.iter().enumerate() {
        let edge_path = format!("edges[{edge_pos}]");
        let edge_obj = as_object(edge_value, &edge_path)?;
        let source = translate_endpoint(edge_obj, "source", &edge_path, &node_ids)?;
        let target = translate_endpoint(edge_obj, "target", &edge_path, &node_ids)?;
        let label = optional_str(edge_obj, "label", &edge_path)?.unwrap_or_default();
        validate_edge_label(label)
            .map_err(|err| ServiceError::import(format!("{edge_path}.label"), err.to_string()))?;
        if !pairs.insert((source.clone(), target.clone())) {
            continue;
        }
        project.edges.push(Edge::new(source, target, label));
    }

    project
        .validate()
        .map_err(|err| ServiceError::import("project", err.to_string()))?;
    Ok(project)
}

fn check_format_version(root: &Map<String, Value>) -> ServiceResult<()> {
    match root.get("format_version") {
        None | Some(Value::Null) => Ok(()),
        Some(value) => match value.as_u64() {
            Some(version) if (1..=u64::from(FORMAT_VERSION)).contains(&version) => Ok(()),
            _ => Err(ServiceError::import(
                "format_version",
                format!("unsupported format version {value}; latest is {FORMAT_VERSION}"),
            )),
        },
    }
}

fn project_name(root: &Map<String, Value>, override_name: Option<&str>) -> ServiceResult<String> {
    if let Some(name) = override_name.filter(|value| !value.trim().is_empty()) {
        return Ok(normalize_name(EntityKind::Project, name)?);
    }
    let document_name = match root.get("project") {
        None | Some(Value::Null) => None,
        Some(value) => optional_str(as_object(value, "project")?, "name", "project")?,
    };
    match document_name.filter(|value| !value.trim().is_empty()) {
        Some(name) => normalize_name(EntityKind::Project, name)
            .map_err(|err| ServiceError::import("project.name", err.to_string())),
        None => Ok(DEFAULT_IMPORT_NAME.to_string()),
    }
}

fn entity_name(
    obj: &Map<String, Value>,
    path: &str,
    kind: EntityKind,
    placeholder: impl FnOnce() -> String,
) -> ServiceResult<String> {
    match optional_str(obj, "name", path)?.filter(|value| !value.trim().is_empty()) {
        Some(name) => normalize_name(kind, name)
            .map_err(|err| ServiceError::import(format!("{path}.name"), err.to_string())),
        None => Ok(placeholder()),
    }
}

fn translate_endpoint(
    edge: &Map<String, Value>,
    key: &str,
    path: &str,
    node_ids: &HashMap<String, String>,
) -> ServiceResult<String> {
    let old_id = optional_str(edge, key, path)?
        .map(str::trim)
        .ok_or_else(|| {
            ServiceError::import(format!("{path}.{key}"), "edge endpoint is required")
        })?;
    node_ids.get(old_id).cloned().ok_or_else(|| {
        ServiceError::import(
            format!("{path}.{key}"),
            format!("unknown node id `{old_id}`"),
        )
    })
}

fn read_frame(obj: &Map<String, Value>, path: &str) -> ServiceResult<Frame> {
    Ok(Frame {
        x: optional_f64(obj, "x", path)?,
        y: optional_f64(obj, "y", path)?,
        width: optional_f64(obj, "width", path)?,
        height: optional_f64(obj, "height", path)?,
    })
}

fn as_object<'v>(value: &'v Value, path: &str) -> ServiceResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| ServiceError::import(path, "must be an object"))
}

fn required_list<'v>(
    obj: &'v Map<String, Value>,
    key: &str,
    path: &str,
) -> ServiceResult<&'v Vec<Value>> {
    match obj.get(key) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ServiceError::import(path, "must be a list")),
        None => Err(ServiceError::import(path, "is required")),
    }
}

fn optional_list<'v>(
    obj: &'v Map<String, Value>,
    key: &str,
    path: &str,
) -> ServiceResult<&'v [Value]> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(ServiceError::import(path, "must be a list")),
    }
}

fn optional_str<'v>(
    obj: &'v Map<String, Value>,
    key: &str,
    path: &str,
) -> ServiceResult<Option<&'v str>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(_) => Err(ServiceError::import(format!("{path}.{key}"), "must be a string")),
    }
}

fn optional_f64(obj: &Map<String, Value>, key: &str, path: &str) -> ServiceResult<Option<f64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .filter(|number| number.is_finite())
            .map(Some)
            .ok_or_else(|| ServiceError::import(format!("{path}.{key}"), "must be a number")),
    }
}
