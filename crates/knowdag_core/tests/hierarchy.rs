use chrono::{DateTime, TimeZone, Utc};
use knowdag_core::{
    AddChapterRequest, AddEdgeRequest, AddNodeRequest, AddSectionRequest, ChapterLayout, Clock,
    DeleteNodeRequest, ErrorKind, Frame, GraphService, HierarchyService, MemoryProjectStore,
    Project, ProjectService, ProjectStore, ReorderNodesRequest, SequentialIdGenerator, ServiceContext,
    ServiceError, UpdateChapterRequest, UpdateNodePositionRequest, UpdateNodeRequest,
    UpdateSectionRequest,
};
use std::sync::atomic::{AtomicI64, Ordering};

/// Advances one second per call.
struct StepClock {
    next_secs: AtomicI64,
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let secs = self.next_secs.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(secs, 0).unwrap()
    }
}

struct Harness {
    store: MemoryProjectStore,
    projects: ProjectService<MemoryProjectStore>,
    hierarchy: HierarchyService<MemoryProjectStore>,
    graph: GraphService<MemoryProjectStore>,
    project_id: String,
}

fn harness() -> Harness {
    let store = MemoryProjectStore::new();
    let ctx = ServiceContext::default()
        .with_ids(SequentialIdGenerator::new())
        .with_clock(StepClock {
            next_secs: AtomicI64::new(1_700_000_000),
        });
    let projects = ProjectService::with_context(store.clone(), ctx.clone());
    let hierarchy = HierarchyService::with_context(store.clone(), ctx.clone());
    let graph = GraphService::with_context(store.clone(), ctx);
    let project_id = projects.create_project("Math").unwrap().id;
    Harness {
        store,
        projects,
        hierarchy,
        graph,
        project_id,
    }
}

impl Harness {
    fn chapter(&self, name: Option<&str>) -> String {
        self.hierarchy
            .add_chapter(
                &self.project_id,
                &AddChapterRequest {
                    name: name.map(str::to_string),
                },
            )
            .unwrap()
            .id
    }

    fn section(&self, chapter_id: &str, name: Option<&str>) -> String {
        self.hierarchy
            .add_section(
                &self.project_id,
                &AddSectionRequest {
                    chapter_id: chapter_id.to_string(),
                    name: name.map(str::to_string),
                },
            )
            .unwrap()
            .id
    }

    fn add_node(
        &self,
        chapter_id: &str,
        section_id: &str,
        name: Option<&str>,
    ) -> Result<String, ServiceError> {
        self.hierarchy
            .add_node(
                &self.project_id,
                &AddNodeRequest {
                    chapter_id: chapter_id.to_string(),
                    section_id: section_id.to_string(),
                    name: name.map(str::to_string),
                    content: None,
                },
            )
            .map(|node| node.id)
    }

    fn version(&self) -> u64 {
        self.store.load(&self.project_id).unwrap().version
    }
}

fn assert_dense_positions(project: &Project) {
    for chapter in &project.chapters {
        let sections: Vec<Option<f64>> = chapter.sections.iter().map(|s| s.position).collect();
        let expected: Vec<Option<f64>> = (0..sections.len()).map(|i| Some(i as f64)).collect();
        assert_eq!(sections, expected, "sections of {}", chapter.id);
        for section in &chapter.sections {
            let nodes: Vec<Option<f64>> = section.nodes.iter().map(|n| n.position).collect();
            let expected: Vec<Option<f64>> = (0..nodes.len()).map(|i| Some(i as f64)).collect();
            assert_eq!(nodes, expected, "nodes of {}", section.id);
        }
    }
}

/// Small linear congruential generator so edit sequences are repeatable.
struct Lcg(u64);

impl Lcg {
    fn pick(&mut self, bound: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((self.0 >> 33) as usize) % bound.max(1)
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn add_chapter_uses_positional_default_and_trims_supplied_name() {
    let h = harness();
    let first = h.chapter(None);
    let second = h.chapter(Some("   "));
    let third = h.chapter(Some("  Algebra  "));

    let project = h.projects.get_project(&h.project_id).unwrap();
    let names: Vec<&str> = project.chapters.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Chapter 1", "Chapter 2", "Algebra"]);
    assert_eq!(project.chapters[0].id, first);
    assert_eq!(project.chapters[1].id, second);
    assert_eq!(project.chapters[2].id, third);
    assert_eq!(project.chapters[0].layout, ChapterLayout::Row);
}

#[test]
fn every_mutation_refreshes_updated_at_but_not_created_at() {
    let h = harness();
    let created = h.projects.get_project(&h.project_id).unwrap();
    h.chapter(None);
    let after = h.projects.get_project(&h.project_id).unwrap();

    assert_eq!(after.created_at, created.created_at);
    assert!(after.updated_at > created.updated_at);
    assert_eq!(after.version, created.version + 1);
}

#[test]
fn update_chapter_applies_partial_changes_and_validates_input() {
    let h = harness();
    let chapter_id = h.chapter(Some("Sets"));

    let updated = h
        .hierarchy
        .update_chapter(
            &h.project_id,
            &chapter_id,
            &UpdateChapterRequest {
                name: None,
                layout: Some("free".to_string()),
                frame: Some(Frame::at(10.0, 20.0)),
            },
        )
        .unwrap();
    assert_eq!(updated.name, "Sets");
    assert_eq!(updated.layout, ChapterLayout::Free);
    assert_eq!(updated.frame.x, Some(10.0));

    let version = h.version();
    let bad_layout = h
        .hierarchy
        .update_chapter(
            &h.project_id,
            &chapter_id,
            &UpdateChapterRequest {
                layout: Some("grid".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(bad_layout.kind(), ErrorKind::InvalidInput);

    let blank = h
        .hierarchy
        .update_chapter(
            &h.project_id,
            &chapter_id,
            &UpdateChapterRequest {
                name: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(blank.kind(), ErrorKind::InvalidInput);

    let non_finite = h
        .hierarchy
        .update_chapter(
            &h.project_id,
            &chapter_id,
            &UpdateChapterRequest {
                frame: Some(Frame::at(f64::NAN, 0.0)),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(non_finite.kind(), ErrorKind::InvalidInput);
    assert_eq!(h.version(), version);

    let missing = h
        .hierarchy
        .update_chapter(&h.project_id, "ch_missing", &UpdateChapterRequest::default())
        .unwrap_err();
    assert!(matches!(missing, ServiceError::ChapterNotFound(_)));
}

#[test]
fn reorder_chapters_requires_exact_permutation() {
    let h = harness();
    let a = h.chapter(None);
    let b = h.chapter(None);
    let c = h.chapter(None);

    let project = h
        .hierarchy
        .reorder_chapters(&h.project_id, &[c.clone(), a.clone(), b.clone()])
        .unwrap();
    let order: Vec<&str> = project.chapters.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(order, vec![c.as_str(), a.as_str(), b.as_str()]);

    for bad in [
        vec![a.clone(), b.clone()],
        vec![a.clone(), b.clone(), c.clone(), "ch_extra".to_string()],
        vec![a.clone(), a.clone(), b.clone()],
    ] {
        let err = h.hierarchy.reorder_chapters(&h.project_id, &bad).unwrap_err();
        assert!(matches!(err, ServiceError::OrderMismatch { .. }));
        assert_eq!(err.status(), 400);
    }
}

#[test]
fn sections_get_default_names_positions_and_reorder_reissues_positions() {
    let h = harness();
    let chapter_id = h.chapter(None);
    let first = h.section(&chapter_id, None);
    let second = h.section(&chapter_id, Some("Limits"));
    let third = h.section(&chapter_id, None);

    let project = h.projects.get_project(&h.project_id).unwrap();
    let chapter = project.chapter(&chapter_id).unwrap();
    let summary: Vec<(&str, Option<f64>)> = chapter
        .sections
        .iter()
        .map(|s| (s.name.as_str(), s.position))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Section 1", Some(0.0)),
            ("Limits", Some(1.0)),
            ("Section 3", Some(2.0)),
        ]
    );

    let project = h
        .hierarchy
        .reorder_sections(
            &h.project_id,
            &chapter_id,
            &[third.clone(), first.clone(), second.clone()],
        )
        .unwrap();
    let chapter = project.chapter(&chapter_id).unwrap();
    let summary: Vec<(&str, Option<f64>)> = chapter
        .sections
        .iter()
        .map(|s| (s.id.as_str(), s.position))
        .collect();
    assert_eq!(
        summary,
        vec![
            (third.as_str(), Some(0.0)),
            (first.as_str(), Some(1.0)),
            (second.as_str(), Some(2.0)),
        ]
    );

    let err = h
        .hierarchy
        .add_section(
            &h.project_id,
            &AddSectionRequest {
                chapter_id: "ch_missing".to_string(),
                name: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::ChapterNotFound(_)));
}

#[test]
fn update_section_checks_declared_parent() {
    let h = harness();
    let ch1 = h.chapter(None);
    let ch2 = h.chapter(None);
    let section_id = h.section(&ch1, None);

    let err = h
        .hierarchy
        .update_section(
            &h.project_id,
            &section_id,
            &UpdateSectionRequest {
                chapter_id: Some(ch2.clone()),
                name: Some("Moved".to_string()),
                frame: None,
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ParentMismatch { ref expected_parent, ref actual_parent, .. }
            if *expected_parent == ch2 && *actual_parent == ch1
    ));
    assert_eq!(err.status(), 400);

    let updated = h
        .hierarchy
        .update_section(
            &h.project_id,
            &section_id,
            &UpdateSectionRequest {
                chapter_id: Some(ch1.clone()),
                name: Some(" Renamed ".to_string()),
                frame: Some(Frame::at(1.0, 2.0)),
            },
        )
        .unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.frame.y, Some(2.0));
}

#[test]
fn add_node_enforces_project_wide_unique_names() {
    let h = harness();
    let ch1 = h.chapter(None);
    let sec1 = h.section(&ch1, None);
    let sec2 = h.section(&ch1, None);

    h.add_node(&ch1, &sec1, Some("集合")).unwrap();
    let default_named = h.add_node(&ch1, &sec1, None).unwrap();
    let project = h.projects.get_project(&h.project_id).unwrap();
    let node = project
        .nodes()
        .find(|node| node.id == default_named)
        .unwrap();
    assert_eq!(node.name, "Item 2");
    assert_eq!(node.position, Some(1.0));

    let version = h.version();
    let conflict = h.add_node(&ch1, &sec2, Some("  集合 ")).unwrap_err();
    assert!(matches!(conflict, ServiceError::NameConflict(ref name) if name == "集合"));
    assert_eq!(conflict.status(), 409);

    // sec2 is empty so its default would be "Item 1"; take it first elsewhere.
    h.add_node(&ch1, &sec1, Some("Item 1")).unwrap();
    let default_conflict = h.add_node(&ch1, &sec2, None).unwrap_err();
    assert!(matches!(default_conflict, ServiceError::NameConflict(_)));
    assert_eq!(h.version(), version + 1);
}

#[test]
fn add_node_requires_section_inside_named_chapter() {
    let h = harness();
    let ch1 = h.chapter(None);
    let ch2 = h.chapter(None);
    let sec1 = h.section(&ch1, None);

    let err = h.add_node(&ch2, &sec1, None).unwrap_err();
    assert!(matches!(err, ServiceError::SectionNotFound(ref id) if *id == sec1));

    let err = h.add_node("ch_missing", &sec1, None).unwrap_err();
    assert!(matches!(err, ServiceError::ChapterNotFound(_)));
}

#[test]
fn update_node_allows_self_rename_and_rejects_taken_names() {
    let h = harness();
    let ch1 = h.chapter(None);
    let sec1 = h.section(&ch1, None);
    let sets = h.add_node(&ch1, &sec1, Some("集合")).unwrap();
    h.add_node(&ch1, &sec1, Some("函数")).unwrap();

    let same = h
        .hierarchy
        .update_node(
            &h.project_id,
            &sets,
            &UpdateNodeRequest {
                name: Some("集合".to_string()),
                content: Some("a collection of elements".to_string()),
            },
        )
        .unwrap();
    assert_eq!(same.name, "集合");
    assert_eq!(same.content, "a collection of elements");

    let err = h
        .hierarchy
        .update_node(
            &h.project_id,
            &sets,
            &UpdateNodeRequest {
                name: Some("函数".to_string()),
                content: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NameConflict);

    let err = h
        .hierarchy
        .update_node(&h.project_id, "node_missing", &UpdateNodeRequest::default())
        .unwrap_err();
    assert!(matches!(err, ServiceError::NodeNotFound(_)));
}

#[test]
fn reorder_nodes_reissues_positions_and_checks_parent() {
    let h = harness();
    let ch1 = h.chapter(None);
    let ch2 = h.chapter(None);
    let sec1 = h.section(&ch1, None);
    let a = h.add_node(&ch1, &sec1, None).unwrap();
    let b = h.add_node(&ch1, &sec1, None).unwrap();
    let c = h.add_node(&ch1, &sec1, None).unwrap();

    let project = h
        .hierarchy
        .reorder_nodes(
            &h.project_id,
            &ReorderNodesRequest {
                section_id: sec1.clone(),
                chapter_id: Some(ch1.clone()),
                node_ids: vec![b.clone(), c.clone(), a.clone()],
            },
        )
        .unwrap();
    let (ci, si) = project.find_section(&sec1).unwrap();
    let order: Vec<(&str, Option<f64>)> = project.chapters[ci].sections[si]
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.position))
        .collect();
    assert_eq!(
        order,
        vec![
            (b.as_str(), Some(0.0)),
            (c.as_str(), Some(1.0)),
            (a.as_str(), Some(2.0)),
        ]
    );

    let mismatch = h
        .hierarchy
        .reorder_nodes(
            &h.project_id,
            &ReorderNodesRequest {
                section_id: sec1.clone(),
                chapter_id: Some(ch2),
                node_ids: vec![a.clone(), b.clone(), c.clone()],
            },
        )
        .unwrap_err();
    assert_eq!(mismatch.kind(), ErrorKind::ParentMismatch);

    let wrong_set = h
        .hierarchy
        .reorder_nodes(
            &h.project_id,
            &ReorderNodesRequest {
                section_id: sec1,
                chapter_id: None,
                node_ids: ids(&[a.as_str(), b.as_str()]),
            },
        )
        .unwrap_err();
    assert_eq!(wrong_set.kind(), ErrorKind::OrderMismatch);
}

#[test]
fn update_node_position_sets_frame_after_parent_checks() {
    let h = harness();
    let ch1 = h.chapter(None);
    let sec1 = h.section(&ch1, None);
    let sec2 = h.section(&ch1, None);
    let node_id = h.add_node(&ch1, &sec1, None).unwrap();

    let moved = h
        .hierarchy
        .update_node_position(
            &h.project_id,
            &UpdateNodePositionRequest {
                node_id: node_id.clone(),
                section_id: sec1.clone(),
                chapter_id: Some(ch1.clone()),
                x: 120.5,
                y: -4.0,
            },
        )
        .unwrap();
    assert_eq!(moved.frame.x, Some(120.5));
    assert_eq!(moved.frame.y, Some(-4.0));

    let err = h
        .hierarchy
        .update_node_position(
            &h.project_id,
            &UpdateNodePositionRequest {
                node_id: node_id.clone(),
                section_id: sec2,
                chapter_id: None,
                x: 0.0,
                y: 0.0,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::ParentMismatch { .. }));

    let err = h
        .hierarchy
        .update_node_position(
            &h.project_id,
            &UpdateNodePositionRequest {
                node_id,
                section_id: sec1,
                chapter_id: None,
                x: f64::INFINITY,
                y: 0.0,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn delete_node_removes_touching_edges_and_checks_parents() {
    let h = harness();
    let ch1 = h.chapter(None);
    let sec1 = h.section(&ch1, None);
    let sec2 = h.section(&ch1, None);
    let a = h.add_node(&ch1, &sec1, None).unwrap();
    let b = h.add_node(&ch1, &sec1, None).unwrap();
    let c = h.add_node(&ch1, &sec2, None).unwrap();
    for (source, target) in [(&a, &b), (&b, &c), (&a, &c)] {
        h.graph
            .add_edge(
                &h.project_id,
                &AddEdgeRequest {
                    source: source.clone(),
                    target: target.clone(),
                    label: String::new(),
                },
            )
            .unwrap();
    }

    let err = h
        .hierarchy
        .delete_node(
            &h.project_id,
            &b,
            &DeleteNodeRequest {
                chapter_id: None,
                section_id: Some(sec2.clone()),
            },
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::ParentMismatch { .. }));

    let project = h
        .hierarchy
        .delete_node(
            &h.project_id,
            &b,
            &DeleteNodeRequest {
                chapter_id: Some(ch1.clone()),
                section_id: Some(sec1.clone()),
            },
        )
        .unwrap();
    assert_eq!(project.node_count(), 2);
    assert_eq!(project.edges.len(), 1);
    assert!(project.edge(&a, &c).is_some());

    let again = h
        .hierarchy
        .delete_node(&h.project_id, &b, &DeleteNodeRequest::default())
        .unwrap_err();
    assert_eq!(again.kind(), ErrorKind::NotFound);
}

#[test]
fn delete_chapter_cascades_everything_beneath_it() {
    let h = harness();
    let ch1 = h.chapter(None);
    let ch2 = h.chapter(None);
    let sec1 = h.section(&ch1, None);
    let sec2 = h.section(&ch2, None);
    let a = h.add_node(&ch1, &sec1, None).unwrap();
    let b = h.add_node(&ch2, &sec2, Some("Limits")).unwrap();
    h.graph
        .add_edge(
            &h.project_id,
            &AddEdgeRequest {
                source: b.clone(),
                target: a.clone(),
                label: "needs".to_string(),
            },
        )
        .unwrap();

    let project = h.hierarchy.delete_chapter(&h.project_id, &ch1).unwrap();
    assert_eq!(project.chapters.len(), 1);
    assert!(project.edges.is_empty());
    assert_eq!(project.node_count(), 1);

    let err = h.hierarchy.delete_chapter(&h.project_id, &ch1).unwrap_err();
    assert!(matches!(err, ServiceError::ChapterNotFound(_)));

    let err = h
        .hierarchy
        .delete_section(&h.project_id, &sec2, Some(ch1.as_str()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParentMismatch);
}

#[test]
fn operations_on_unknown_project_fail_with_not_found() {
    let h = harness();
    let err = h
        .hierarchy
        .add_chapter("proj_missing", &AddChapterRequest::default())
        .unwrap_err();
    assert!(matches!(err, ServiceError::ProjectNotFound(ref id) if id == "proj_missing"));
    assert_eq!(err.code(), "ERR_NOT_FOUND");
    assert_eq!(err.status(), 404);
}

#[test]
fn delete_then_add_keeps_positions_dense() {
    let h = harness();
    let ch1 = h.chapter(None);
    let sec1 = h.section(&ch1, None);
    let n0 = h.add_node(&ch1, &sec1, Some("n0")).unwrap();
    let n1 = h.add_node(&ch1, &sec1, Some("n1")).unwrap();
    let n2 = h.add_node(&ch1, &sec1, Some("n2")).unwrap();

    let project = h
        .hierarchy
        .delete_node(&h.project_id, &n0, &DeleteNodeRequest::default())
        .unwrap();
    assert_dense_positions(&project);
    let n3 = h.add_node(&ch1, &sec1, Some("n3")).unwrap();

    let project = h.projects.get_project(&h.project_id).unwrap();
    let (ci, si) = project.find_section(&sec1).unwrap();
    let nodes: Vec<(&str, Option<f64>)> = project.chapters[ci].sections[si]
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.position))
        .collect();
    assert_eq!(
        nodes,
        vec![
            (n1.as_str(), Some(0.0)),
            (n2.as_str(), Some(1.0)),
            (n3.as_str(), Some(2.0)),
        ]
    );

    let first = h.section(&ch1, None);
    h.section(&ch1, None);
    let project = h
        .hierarchy
        .delete_section(&h.project_id, &sec1, None)
        .unwrap();
    assert_dense_positions(&project);
    h.hierarchy
        .delete_section(&h.project_id, &first, Some(ch1.as_str()))
        .unwrap();
    h.section(&ch1, None);
    let project = h.projects.get_project(&h.project_id).unwrap();
    let sections: Vec<Option<f64>> = project.chapters[0]
        .sections
        .iter()
        .map(|s| s.position)
        .collect();
    assert_eq!(sections, vec![Some(0.0), Some(1.0)]);
}

#[test]
fn interleaved_edits_keep_the_aggregate_consistent() {
    let h = harness();
    h.chapter(None);
    let mut rng = Lcg(7);
    let mut named = 0usize;

    for step in 0..300 {
        let project = h.projects.get_project(&h.project_id).unwrap();
        let sections: Vec<(String, String)> = project
            .chapters
            .iter()
            .flat_map(|c| c.sections.iter().map(move |s| (c.id.clone(), s.id.clone())))
            .collect();
        let nodes: Vec<String> = project.nodes().map(|n| n.id.clone()).collect();

        let result: Result<(), ServiceError> = match rng.pick(9) {
            0 if project.chapters.len() < 3 => {
                h.chapter(None);
                Ok(())
            }
            1 if project.chapters.len() > 1 => {
                let chapter = &project.chapters[rng.pick(project.chapters.len())];
                h.hierarchy
                    .delete_chapter(&h.project_id, &chapter.id)
                    .map(|_| ())
            }
            0 | 1 | 2 => {
                let chapter = &project.chapters[rng.pick(project.chapters.len())];
                h.section(&chapter.id, None);
                Ok(())
            }
            3 | 4 if !sections.is_empty() => {
                let (chapter_id, section_id) = &sections[rng.pick(sections.len())];
                // Default names can collide with nodes elsewhere; alternate.
                named += 1;
                let name = (named % 2 == 0).then(|| format!("node {named}"));
                h.add_node(chapter_id, section_id, name.as_deref())
                    .map(|_| ())
            }
            5 if nodes.len() > 1 => {
                let source = nodes[rng.pick(nodes.len())].clone();
                let target = nodes[rng.pick(nodes.len())].clone();
                h.graph
                    .add_edge(
                        &h.project_id,
                        &AddEdgeRequest {
                            source,
                            target,
                            label: String::new(),
                        },
                    )
                    .map(|_| ())
            }
            6 if !nodes.is_empty() => {
                let node_id = &nodes[rng.pick(nodes.len())];
                h.hierarchy
                    .delete_node(&h.project_id, node_id, &DeleteNodeRequest::default())
                    .map(|_| ())
            }
            7 if !sections.is_empty() => {
                let (chapter_id, section_id) = &sections[rng.pick(sections.len())];
                h.hierarchy
                    .delete_section(&h.project_id, section_id, Some(chapter_id.as_str()))
                    .map(|_| ())
            }
            8 if !sections.is_empty() => {
                let (_, section_id) = &sections[rng.pick(sections.len())];
                let (ci, si) = project.find_section(section_id).unwrap();
                let mut order: Vec<String> = project.chapters[ci].sections[si]
                    .nodes
                    .iter()
                    .map(|n| n.id.clone())
                    .collect();
                order.reverse();
                h.hierarchy
                    .reorder_nodes(
                        &h.project_id,
                        &ReorderNodesRequest {
                            section_id: section_id.clone(),
                            chapter_id: None,
                            node_ids: order,
                        },
                    )
                    .map(|_| ())
            }
            _ => Ok(()),
        };

        if let Err(err) = result {
            assert!(
                matches!(
                    err.kind(),
                    ErrorKind::NameConflict | ErrorKind::CycleDetected
                ),
                "step {step}: unexpected {err:?}"
            );
        }

        let project = h.projects.get_project(&h.project_id).unwrap();
        project
            .validate()
            .unwrap_or_else(|err| panic!("step {step}: {err}"));
        assert_dense_positions(&project);
    }
}
