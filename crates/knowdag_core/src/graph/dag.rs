//! Directed graph over node ids with exact reachability queries.
//!
//! # Responsibility
//! - Answer "would this edge close a cycle" for arbitrary graphs.
//! - Compute ancestors, descendants and simple paths for analysis.
//!
//! # Invariants
//! - Every vertex has an entry in both adjacency maps, even when isolated.
//! - Neighbor lists keep edge insertion order, so traversals are
//!   deterministic.
//! - Traversals are iterative; deep chains cannot overflow the stack.

use std::collections::{HashMap, HashSet, VecDeque};

/// Borrowed adjacency view of a project's edge relation.
#[derive(Debug, Clone, Default)]
pub struct Dag<'a> {
    order: Vec<&'a str>,
    successors: HashMap<&'a str, Vec<&'a str>>,
    predecessors: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> Dag<'a> {
    /// Builds a graph from vertices (in display order) and edges.
    ///
    /// Edge endpoints missing from `vertices` are added after them.
    pub fn new(
        vertices: impl IntoIterator<Item = &'a str>,
        edges: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut dag = Self::default();
        for vertex in vertices {
            dag.add_vertex(vertex);
        }
        for (source, target) in edges {
            dag.add_edge(source, target);
        }
        dag
    }

    pub fn add_vertex(&mut self, vertex: &'a str) {
        if self.successors.contains_key(vertex) {
            return;
        }
        self.order.push(vertex);
        self.successors.insert(vertex, Vec::new());
        self.predecessors.insert(vertex, Vec::new());
    }

    /// Adds `source -> target`; parallel duplicates are ignored.
    pub fn add_edge(&mut self, source: &'a str, target: &'a str) {
        self.add_vertex(source);
        self.add_vertex(target);
        let out = self.successors.entry(source).or_default();
        if out.contains(&target) {
            return;
        }
        out.push(target);
        self.predecessors.entry(target).or_default().push(source);
    }

    pub fn contains(&self, vertex: &str) -> bool {
        self.successors.contains_key(vertex)
    }

    /// Returns `true` when a directed path leads from `from` to `to`
    /// (a vertex always reaches itself).
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let Some(start) = self.intern(from) else {
            return false;
        };
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for &next in self.neighbors(&self.successors, current) {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// Exact check: adding `source -> target` closes a cycle iff `target`
    /// already reaches `source` (self-loops included).
    pub fn would_create_cycle(&self, source: &str, target: &str) -> bool {
        self.reaches(target, source)
    }

    /// Every vertex with a path to `vertex`, in display order.
    pub fn ancestors(&self, vertex: &str) -> Vec<&'a str> {
        self.ordered(self.closure(vertex, &self.predecessors))
    }

    /// Every vertex reachable from `vertex`, in display order.
    pub fn descendants(&self, vertex: &str) -> Vec<&'a str> {
        self.ordered(self.closure(vertex, &self.successors))
    }

    /// Appends every simple path `from -> ... -> to` whose interior vertices
    /// lie in `allowed`, following successors in insertion order.
    ///
    /// Stops early once `out` holds `max_paths` entries and returns `true`
    /// in that case (the enumeration was cut short).
    pub fn collect_simple_paths(
        &self,
        from: &str,
        to: &str,
        allowed: &HashSet<&str>,
        max_paths: Option<usize>,
        out: &mut Vec<Vec<String>>,
    ) -> bool {
        if max_paths.is_some_and(|max| out.len() >= max) {
            return true;
        }
        let (Some(start), Some(goal)) = (self.intern(from), self.intern(to)) else {
            return false;
        };
        if start == goal {
            return false;
        }

        let mut path: Vec<&'a str> = vec![start];
        let mut on_path: HashSet<&'a str> = HashSet::from([start]);
        let mut stack: Vec<(&'a str, usize)> = vec![(start, 0)];

        while let Some(frame) = stack.last_mut() {
            let current = frame.0;
            let children = self.neighbors(&self.successors, current);
            if frame.1 >= children.len() {
                stack.pop();
                path.pop();
                on_path.remove(current);
                continue;
            }
            let child = children[frame.1];
            frame.1 += 1;

            if child == goal {
                let mut found: Vec<String> = path.iter().map(|id| (*id).to_string()).collect();
                found.push(child.to_string());
                out.push(found);
                if max_paths.is_some_and(|max| out.len() >= max) {
                    return true;
                }
                continue;
            }
            if on_path.contains(child) || !allowed.contains(child) {
                continue;
            }
            path.push(child);
            on_path.insert(child);
            stack.push((child, 0));
        }
        false
    }

    fn intern(&self, vertex: &str) -> Option<&'a str> {
        self.successors.get_key_value(vertex).map(|(key, _)| *key)
    }

    fn neighbors<'m>(
        &self,
        adjacency: &'m HashMap<&'a str, Vec<&'a str>>,
        vertex: &str,
    ) -> &'m [&'a str] {
        adjacency.get(vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    fn closure(
        &self,
        vertex: &str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
    ) -> HashSet<&'a str> {
        let mut seen = HashSet::new();
        let Some(start) = self.intern(vertex) else {
            return seen;
        };
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for &next in self.neighbors(adjacency, current) {
                if next != start && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    fn ordered(&self, members: HashSet<&'a str>) -> Vec<&'a str> {
        self.order
            .iter()
            .copied()
            .filter(|vertex| members.contains(vertex))
            .collect()
    }
}
