//! Project aggregate store contract and SQLite implementation.
//!
//! # Responsibility
//! - Load and save whole project aggregates as one unit.
//! - Enforce optimistic concurrency through `Project::version`.
//! - Keep SQL details and row ordering inside the repository boundary.
//!
//! # Invariants
//! - Write paths call `Project::validate()` before any SQL mutation.
//! - Read paths reject invalid persisted state instead of masking it.
//! - List order is deterministic: `updated_at DESC, project_id ASC`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::project::{
    Chapter, ChapterLayout, Edge, Frame, Node, Project, ProjectSummary, Section,
};
use crate::model::validation::ModelValidationError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from aggregate store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// No aggregate stored under this project id.
    NotFound(String),
    /// Stored version differs from the one the caller loaded.
    Conflict {
        project_id: String,
        expected: u64,
        /// `None` when no row exists for the project.
        actual: Option<u64>,
    },
    /// Aggregate failed validation on the write path.
    Validation(ModelValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid aggregate.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "project not found: {id}"),
            Self::Conflict {
                project_id,
                expected,
                actual,
            } => match actual {
                Some(actual) => write!(
                    f,
                    "project {project_id} was modified concurrently: expected version {expected}, found {actual}"
                ),
                None => write!(
                    f,
                    "project {project_id} was modified concurrently: expected version {expected}, found no stored row"
                ),
            },
            Self::Validation(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "project store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "project store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted project data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::NotFound(_) => None,
            Self::Conflict { .. } => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ModelValidationError> for StoreError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Persistence boundary for project aggregates.
pub trait ProjectStore {
    /// Loads one aggregate with its current version.
    fn load(&self, project_id: &str) -> StoreResult<Project>;
    /// Persists the whole aggregate and returns the new version.
    ///
    /// Succeeds only when the stored version equals `project.version`, or
    /// when no row exists and `project.version == 0`.
    fn save(&self, project: &Project) -> StoreResult<u64>;
    /// Deletes one aggregate and everything it contains.
    fn delete(&self, project_id: &str) -> StoreResult<()>;
    /// Lists summaries ordered by `updated_at DESC, id ASC`.
    fn list_summaries(&self) -> StoreResult<Vec<ProjectSummary>>;
}

impl<T: ProjectStore + ?Sized> ProjectStore for &T {
    fn load(&self, project_id: &str) -> StoreResult<Project> {
        (**self).load(project_id)
    }

    fn save(&self, project: &Project) -> StoreResult<u64> {
        (**self).save(project)
    }

    fn delete(&self, project_id: &str) -> StoreResult<()> {
        (**self).delete(project_id)
    }

    fn list_summaries(&self) -> StoreResult<Vec<ProjectSummary>> {
        (**self).list_summaries()
    }
}

/// Optimistic concurrency rule shared by every store implementation.
pub(crate) fn check_version(project_id: &str, expected: u64, stored: Option<u64>) -> StoreResult<()> {
    match (expected, stored) {
        (0, None) => Ok(()),
        (expected, Some(stored)) if expected == stored => Ok(()),
        (expected, actual) => Err(StoreError::Conflict {
            project_id: project_id.to_string(),
            expected,
            actual,
        }),
    }
}

/// SQLite-backed aggregate store.
pub struct SqliteProjectStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectStore<'conn> {
    /// Creates store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ProjectStore for SqliteProjectStore<'_> {
    fn load(&self, project_id: &str) -> StoreResult<Project> {
        let project = read_project(self.conn, project_id)?
            .ok_or_else(|| StoreError::NotFound(project_id.to_string()))?;
        project.validate().map_err(|err| {
            StoreError::InvalidData(format!("project `{project_id}` fails validation: {err}"))
        })?;
        Ok(project)
    }

    fn save(&self, project: &Project) -> StoreResult<u64> {
        project.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let stored = stored_version(&tx, &project.id)?;
        check_version(&project.id, project.version, stored)?;

        let next_version = project.version + 1;
        let next_version_db = i64::try_from(next_version)
            .map_err(|_| StoreError::InvalidData(format!("version overflow: {next_version}")))?;

        if stored.is_some() {
            tx.execute(
                "UPDATE projects
                 SET name = ?2,
                     created_at = ?3,
                     updated_at = ?4,
                     version = ?5
                 WHERE project_id = ?1;",
                params![
                    project.id,
                    project.name,
                    format_timestamp(project.created_at),
                    format_timestamp(project.updated_at),
                    next_version_db,
                ],
            )?;
            tx.execute("DELETE FROM edges WHERE project_id = ?1;", [&project.id])?;
            // Sections and nodes cascade from chapters.
            tx.execute("DELETE FROM chapters WHERE project_id = ?1;", [&project.id])?;
        } else {
            tx.execute(
                "INSERT INTO projects (project_id, name, created_at, updated_at, version)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    project.id,
                    project.name,
                    format_timestamp(project.created_at),
                    format_timestamp(project.updated_at),
                    next_version_db,
                ],
            )?;
        }

        write_children(&tx, project)?;
        tx.commit()?;
        Ok(next_version)
    }

    fn delete(&self, project_id: &str) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM projects WHERE project_id = ?1;", [project_id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(project_id.to_string()));
        }
        Ok(())
    }

    fn list_summaries(&self) -> StoreResult<Vec<ProjectSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, name, created_at, updated_at
             FROM projects
             ORDER BY updated_at DESC, project_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next()? {
            let created_at: String = row.get(2)?;
            let updated_at: String = row.get(3)?;
            summaries.push(ProjectSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: parse_timestamp(&created_at)?,
                updated_at: parse_timestamp(&updated_at)?,
            });
        }
        Ok(summaries)
    }
}

fn stored_version(conn: &Connection, project_id: &str) -> StoreResult<Option<u64>> {
    let raw = conn
        .query_row(
            "SELECT version FROM projects WHERE project_id = ?1;",
            [project_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    raw.map(|value| parse_version(project_id, value)).transpose()
}

fn write_children(conn: &Connection, project: &Project) -> StoreResult<()> {
    let mut insert_chapter = conn.prepare(
        "INSERT INTO chapters (project_id, chapter_id, name, layout, sort_order, x, y, width, height)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
    )?;
    let mut insert_section = conn.prepare(
        "INSERT INTO sections (
            project_id, section_id, chapter_id, name, sort_order, position, x, y, width, height
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
    )?;
    let mut insert_node = conn.prepare(
        "INSERT INTO nodes (
            project_id, node_id, section_id, name, content, sort_order, position, x, y, width, height
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
    )?;

    for (chapter_order, chapter) in project.chapters.iter().enumerate() {
        insert_chapter.execute(params![
            project.id,
            chapter.id,
            chapter.name,
            chapter.layout.as_str(),
            chapter_order as i64,
            chapter.frame.x,
            chapter.frame.y,
            chapter.frame.width,
            chapter.frame.height,
        ])?;
        for (section_order, section) in chapter.sections.iter().enumerate() {
            insert_section.execute(params![
                project.id,
                section.id,
                chapter.id,
                section.name,
                section_order as i64,
                section.position,
                section.frame.x,
                section.frame.y,
                section.frame.width,
                section.frame.height,
            ])?;
            for (node_order, node) in section.nodes.iter().enumerate() {
                insert_node.execute(params![
                    project.id,
                    node.id,
                    section.id,
                    node.name,
                    node.content,
                    node_order as i64,
                    node.position,
                    node.frame.x,
                    node.frame.y,
                    node.frame.width,
                    node.frame.height,
                ])?;
            }
        }
    }

    let mut insert_edge = conn.prepare(
        "INSERT INTO edges (project_id, source_id, target_id, label, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5);",
    )?;
    for (edge_order, edge) in project.edges.iter().enumerate() {
        insert_edge.execute(params![
            project.id,
            edge.source,
            edge.target,
            edge.label,
            edge_order as i64,
        ])?;
    }

    Ok(())
}

fn read_project(conn: &Connection, project_id: &str) -> StoreResult<Option<Project>> {
    let header = conn
        .query_row(
            "SELECT name, created_at, updated_at, version
             FROM projects
             WHERE project_id = ?1;",
            [project_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((name, created_at, updated_at, version)) = header else {
        return Ok(None);
    };

    let mut project = Project::new(project_id, name, parse_timestamp(&created_at)?);
    project.updated_at = parse_timestamp(&updated_at)?;
    project.version = parse_version(project_id, version)?;

    let mut chapter_slots: HashMap<String, usize> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT chapter_id, name, layout, x, y, width, height
             FROM chapters
             WHERE project_id = ?1
             ORDER BY sort_order ASC, chapter_id ASC;",
        )?;
        let mut rows = stmt.query([project_id])?;
        while let Some(row) = rows.next()? {
            let layout_text: String = row.get(2)?;
            let layout = ChapterLayout::parse(&layout_text).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "invalid layout `{layout_text}` in chapters.layout"
                ))
            })?;
            let mut chapter = Chapter::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
            chapter.layout = layout;
            chapter.frame = read_frame(row, 3)?;
            chapter_slots.insert(chapter.id.clone(), project.chapters.len());
            project.chapters.push(chapter);
        }
    }

    let mut section_slots: HashMap<String, (usize, usize)> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT section_id, chapter_id, name, position, x, y, width, height
             FROM sections
             WHERE project_id = ?1
             ORDER BY sort_order ASC, section_id ASC;",
        )?;
        let mut rows = stmt.query([project_id])?;
        while let Some(row) = rows.next()? {
            let chapter_id: String = row.get(1)?;
            let chapter_pos = *chapter_slots.get(&chapter_id).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "section references unknown chapter `{chapter_id}`"
                ))
            })?;
            let mut section = Section::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(2)?,
                row.get(3)?,
            );
            section.frame = read_frame(row, 4)?;
            let sections = &mut project.chapters[chapter_pos].sections;
            section_slots.insert(section.id.clone(), (chapter_pos, sections.len()));
            sections.push(section);
        }
    }

    {
        let mut stmt = conn.prepare(
            "SELECT node_id, section_id, name, content, position, x, y, width, height
             FROM nodes
             WHERE project_id = ?1
             ORDER BY sort_order ASC, node_id ASC;",
        )?;
        let mut rows = stmt.query([project_id])?;
        while let Some(row) = rows.next()? {
            let section_id: String = row.get(1)?;
            let (chapter_pos, section_pos) = *section_slots.get(&section_id).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "node references unknown section `{section_id}`"
                ))
            })?;
            let mut node = Node::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get(4)?,
            );
            node.frame = read_frame(row, 5)?;
            project.chapters[chapter_pos].sections[section_pos]
                .nodes
                .push(node);
        }
    }

    {
        let mut stmt = conn.prepare(
            "SELECT source_id, target_id, label
             FROM edges
             WHERE project_id = ?1
             ORDER BY sort_order ASC, source_id ASC, target_id ASC;",
        )?;
        let mut rows = stmt.query([project_id])?;
        while let Some(row) = rows.next()? {
            project.edges.push(Edge::new(
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ));
        }
    }

    Ok(Some(project))
}

fn read_frame(row: &Row<'_>, start: usize) -> rusqlite::Result<Frame> {
    Ok(Frame {
        x: row.get(start)?,
        y: row.get(start + 1)?,
        width: row.get(start + 2)?,
        height: row.get(start + 3)?,
    })
}

/// Fixed-width RFC 3339 keeps text ordering equal to time ordering.
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| StoreError::InvalidData(format!("invalid timestamp `{value}`: {err}")))
}

fn parse_version(project_id: &str, value: i64) -> StoreResult<u64> {
    match u64::try_from(value) {
        Ok(version) if version > 0 => Ok(version),
        _ => Err(StoreError::InvalidData(format!(
            "invalid version `{value}` for project `{project_id}`"
        ))),
    }
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["projects", "chapters", "sections", "nodes", "edges"] {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
