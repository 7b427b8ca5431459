use chrono::{Duration, TimeZone, Utc};
use knowdag_core::db::open_db_in_memory;
use knowdag_core::{
    Chapter, ChapterLayout, Edge, Frame, MemoryProjectStore, ModelValidationError, Node, Project,
    ProjectStore, Section, SqliteProjectStore, StoreError,
};
use rusqlite::Connection;

fn sample_project(id: &str) -> Project {
    let created = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap() + Duration::nanoseconds(123);
    let mut project = Project::new(id, "Calculus", created);
    project.updated_at = created + Duration::milliseconds(1500);

    let mut ch1 = Chapter::new("ch1", "Foundations");
    ch1.layout = ChapterLayout::Free;
    ch1.frame = Frame {
        x: Some(0.0),
        y: Some(-12.5),
        width: Some(640.0),
        height: None,
    };
    let mut sec1 = Section::new("sec1", "Sets", Some(0.0));
    sec1.nodes.push(Node::new("node1", "集合", "a collection", Some(0.0)));
    let mut node2 = Node::new("node2", "函数", "", Some(1.0));
    node2.frame = Frame::at(42.25, 7.0);
    sec1.nodes.push(node2);
    let mut sec2 = Section::new("sec2", "Arithmetic", None);
    sec2.frame = Frame::at(3.0, 4.0);
    sec2.nodes.push(Node::new("node3", "加法", "", None));
    ch1.sections.push(sec1);
    ch1.sections.push(sec2);

    let ch2 = Chapter::new("ch2", "Empty");
    project.chapters.push(ch1);
    project.chapters.push(ch2);
    project.edges.push(Edge::new("node2", "node3", ""));
    project.edges.push(Edge::new("node1", "node2", "defines"));
    project
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

/// Contract every store implementation must honor.
fn exercise_contract(store: &impl ProjectStore) {
    let project = sample_project("proj_a");
    assert_eq!(store.save(&project).unwrap(), 1);

    let loaded = store.load("proj_a").unwrap();
    let mut expected = project.clone();
    expected.version = 1;
    assert_eq!(loaded, expected);

    // A second writer holding version 0 lost the race.
    let err = store.save(&project).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Conflict {
            expected: 0,
            actual: Some(1),
            ..
        }
    ));

    let mut next = loaded.clone();
    next.name = "Calculus I".to_string();
    next.edges.remove(0);
    assert_eq!(store.save(&next).unwrap(), 2);

    // Saving from the stale copy now conflicts.
    let err = store.save(&loaded).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Conflict {
            expected: 1,
            actual: Some(2),
            ..
        }
    ));

    let reloaded = store.load("proj_a").unwrap();
    assert_eq!(reloaded.name, "Calculus I");
    assert_eq!(reloaded.edges, vec![Edge::new("node1", "node2", "defines")]);
    assert_eq!(reloaded.version, 2);

    let mut ghost = sample_project("proj_ghost");
    ghost.version = 3;
    assert!(matches!(
        store.save(&ghost).unwrap_err(),
        StoreError::Conflict { actual: None, .. }
    ));

    assert!(matches!(
        store.load("missing").unwrap_err(),
        StoreError::NotFound(_)
    ));
    store.delete("proj_a").unwrap();
    assert!(matches!(
        store.delete("proj_a").unwrap_err(),
        StoreError::NotFound(_)
    ));
}

fn exercise_listing(store: &impl ProjectStore) {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for (id, offset) in [("proj_b", 10), ("proj_a", 10), ("proj_c", 20), ("proj_d", 5)] {
        let mut project = Project::new(id, id, base);
        project.updated_at = base + Duration::seconds(offset);
        store.save(&project).unwrap();
    }

    let ids: Vec<String> = store
        .list_summaries()
        .unwrap()
        .into_iter()
        .map(|summary| summary.id)
        .collect();
    assert_eq!(ids, vec!["proj_c", "proj_a", "proj_b", "proj_d"]);
}

fn exercise_validation(store: &impl ProjectStore) {
    let mut cyclic = sample_project("proj_cycle");
    cyclic.edges.push(Edge::new("node3", "node1", ""));
    assert!(matches!(
        store.save(&cyclic).unwrap_err(),
        StoreError::Validation(ModelValidationError::CycleDetected { .. })
    ));

    let mut duplicate_name = sample_project("proj_dup");
    duplicate_name.chapters[0].sections[1].nodes[0].name = "集合".to_string();
    assert!(matches!(
        store.save(&duplicate_name).unwrap_err(),
        StoreError::Validation(ModelValidationError::DuplicateNodeName(_))
    ));

    assert!(matches!(
        store.load("proj_cycle").unwrap_err(),
        StoreError::NotFound(_)
    ));
}

#[test]
fn sqlite_store_honors_contract() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&conn).unwrap();
    exercise_contract(&store);
}

#[test]
fn memory_store_honors_contract() {
    exercise_contract(&MemoryProjectStore::new());
}

#[test]
fn sqlite_store_lists_by_updated_at_then_id() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&conn).unwrap();
    exercise_listing(&store);
}

#[test]
fn memory_store_lists_by_updated_at_then_id() {
    exercise_listing(&MemoryProjectStore::new());
}

#[test]
fn sqlite_store_rejects_invalid_aggregates() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&conn).unwrap();
    exercise_validation(&store);
    assert_eq!(count(&conn, "projects"), 0);
}

#[test]
fn memory_store_rejects_invalid_aggregates() {
    let store = MemoryProjectStore::new();
    exercise_validation(&store);
    assert!(store.is_empty());
}

#[test]
fn sqlite_delete_cascades_every_child_row() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&conn).unwrap();
    store.save(&sample_project("proj_a")).unwrap();
    store.save(&sample_project("proj_b")).unwrap();
    assert_eq!(count(&conn, "nodes"), 6);
    assert_eq!(count(&conn, "edges"), 4);

    store.delete("proj_a").unwrap();
    for (table, remaining) in [
        ("projects", 1),
        ("chapters", 2),
        ("sections", 2),
        ("nodes", 3),
        ("edges", 2),
    ] {
        assert_eq!(count(&conn, table), remaining, "table {table}");
    }
    assert_eq!(store.load("proj_b").unwrap().node_count(), 3);
}

#[test]
fn sqlite_save_replaces_children_instead_of_merging() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&conn).unwrap();
    store.save(&sample_project("proj_a")).unwrap();

    let mut project = store.load("proj_a").unwrap();
    project.chapters.remove(0);
    project.edges.clear();
    store.save(&project).unwrap();

    assert_eq!(count(&conn, "sections"), 0);
    assert_eq!(count(&conn, "nodes"), 0);
    assert_eq!(count(&conn, "edges"), 0);
    let loaded = store.load("proj_a").unwrap();
    assert_eq!(loaded.chapters.len(), 1);
    assert_eq!(loaded.chapters[0].id, "ch2");
}

#[test]
fn sqlite_load_rejects_corrupted_rows() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteProjectStore::try_new(&conn).unwrap();
    store.save(&sample_project("proj_a")).unwrap();

    conn.execute(
        "UPDATE projects SET created_at = 'yesterday' WHERE project_id = 'proj_a';",
        [],
    )
    .unwrap();
    assert!(matches!(
        store.load("proj_a").unwrap_err(),
        StoreError::InvalidData(_)
    ));
}

#[test]
fn sqlite_store_shares_state_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.sqlite3");

    let writer = knowdag_core::open_db(&path).unwrap();
    SqliteProjectStore::try_new(&writer)
        .unwrap()
        .save(&sample_project("proj_a"))
        .unwrap();

    let reader = knowdag_core::open_db(&path).unwrap();
    let store = SqliteProjectStore::try_new(&reader).unwrap();
    let loaded = store.load("proj_a").unwrap();
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.edges.len(), 2);
}
