//! Directed graph over file types and the dependency order derived from it.
//!
//! Edges point from a referencing (child) type to the referenced (parent)
//! type, so a valid processing order places every edge's target before its
//! source.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use refcheck_model::{SchemaError, SubmissionSchema};

/// Minimal adjacency-map directed graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectedGraph<N: Ord + Clone> {
    adjacency: BTreeMap<N, BTreeSet<N>>,
}

impl<N: Ord + Clone> Default for DirectedGraph<N> {
    fn default() -> Self {
        Self {
            adjacency: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Active,
    Done,
}

impl<N: Ord + Clone> DirectedGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: N) {
        self.adjacency.entry(node).or_default();
    }

    /// Adds `from -> to`, creating both nodes if needed.
    pub fn add_edge(&mut self, from: N, to: N) {
        self.adjacency.entry(to.clone()).or_default();
        self.adjacency.entry(from).or_default().insert(to);
    }

    pub fn contains(&self, node: &N) -> bool {
        self.adjacency.contains_key(node)
    }

    pub fn has_edge(&self, from: &N, to: &N) -> bool {
        self.adjacency
            .get(from)
            .is_some_and(|targets| targets.contains(to))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.adjacency.keys()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    pub fn successors<'a>(&'a self, node: &N) -> impl Iterator<Item = &'a N> + use<'a, N> {
        self.adjacency.get(node).into_iter().flatten()
    }

    pub fn predecessors<'a>(&'a self, node: &N) -> impl Iterator<Item = &'a N> + use<'a, N> {
        let node = node.clone();
        self.adjacency
            .iter()
            .filter(move |(_, targets)| targets.contains(&node))
            .map(|(source, _)| source)
    }

    /// Orders nodes so that every edge target precedes its source.
    ///
    /// Kahn's algorithm; among nodes that are ready at the same time the
    /// smallest comes first, so the result depends only on the graph and
    /// not on insertion order. On a cycle, returns one cycle as a closed
    /// path (`a -> b -> a`).
    pub fn dependency_order(&self) -> Result<Vec<N>, Vec<N>> {
        let mut pending: BTreeMap<&N, usize> = self
            .adjacency
            .iter()
            .map(|(node, targets)| (node, targets.len()))
            .collect();
        let mut dependents: BTreeMap<&N, Vec<&N>> = BTreeMap::new();
        for (source, targets) in &self.adjacency {
            for target in targets {
                dependents.entry(target).or_default().push(source);
            }
        }

        let mut ready: BTreeSet<&N> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut order = Vec::with_capacity(self.adjacency.len());

        while let Some(node) = ready.pop_first() {
            order.push(node.clone());
            for dependent in dependents.get(node).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() == self.adjacency.len() {
            Ok(order)
        } else {
            Err(self.find_cycle().unwrap_or_default())
        }
    }

    /// Returns one cycle as a closed path, if the graph has any.
    pub fn find_cycle(&self) -> Option<Vec<N>> {
        let mut marks: BTreeMap<&N, Mark> = BTreeMap::new();
        let mut stack: Vec<&N> = Vec::new();
        for start in self.adjacency.keys() {
            if marks.contains_key(start) {
                continue;
            }
            if let Some(cycle) = self.visit(start, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit<'a>(
        &'a self,
        node: &'a N,
        marks: &mut BTreeMap<&'a N, Mark>,
        stack: &mut Vec<&'a N>,
    ) -> Option<Vec<N>> {
        marks.insert(node, Mark::Active);
        stack.push(node);
        for next in self.successors(node) {
            match marks.get(next) {
                Some(Mark::Active) => {
                    let start = stack.iter().position(|entry| *entry == next)?;
                    let mut cycle: Vec<N> = stack[start..].iter().map(|n| (*n).clone()).collect();
                    cycle.push(next.clone());
                    return Some(cycle);
                }
                Some(Mark::Done) => {}
                None => {
                    if let Some(cycle) = self.visit(next, marks, stack) {
                        return Some(cycle);
                    }
                }
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
        None
    }

    /// Breadth-first shortest path following edge direction.
    ///
    /// Returns the visited nodes including both ends, `[from]` when
    /// `from == to`, or `None` when `to` is unreachable.
    pub fn shortest_path(&self, from: &N, to: &N) -> Option<Vec<N>> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if from == to {
            return Some(vec![from.clone()]);
        }
        let mut previous: BTreeMap<&N, &N> = BTreeMap::new();
        let mut seen: BTreeSet<&N> = BTreeSet::from([from]);
        let mut queue: VecDeque<&N> = VecDeque::from([from]);

        while let Some(node) = queue.pop_front() {
            for next in self.successors(node) {
                if !seen.insert(next) {
                    continue;
                }
                previous.insert(next, node);
                if next == to {
                    let mut path = vec![next.clone()];
                    let mut cursor = next;
                    while let Some(&prev) = previous.get(cursor) {
                        path.push(prev.clone());
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// True when there is a directed path from `from` to `to`.
    pub fn reaches(&self, from: &N, to: &N) -> bool {
        from != to && self.shortest_path(from, to).is_some()
    }
}

/// One declared relation, oriented child to parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationEdge {
    pub child: String,
    pub parent: String,
    /// Foreign-key field indices in the child type.
    pub fields: Vec<usize>,
}

/// File-type dependency graph with its processing order.
///
/// Built once per schema version; immutable afterwards.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DirectedGraph<String>,
    relations: BTreeMap<(String, String), Vec<usize>>,
    order: Vec<String>,
}

impl DependencyGraph {
    /// Builds the graph and resolves the order, rejecting cyclic schemas.
    pub fn build(schema: &SubmissionSchema) -> Result<Self, SchemaError> {
        let mut graph = DirectedGraph::new();
        let mut relations = BTreeMap::new();
        for file_type in schema.file_types() {
            graph.add_node(file_type.name.clone());
            for fk in &file_type.foreign_keys {
                graph.add_edge(file_type.name.clone(), fk.referenced.clone());
                relations
                    .entry((file_type.name.clone(), fk.referenced.clone()))
                    .or_insert_with(|| fk.fields.clone());
            }
        }

        let order = graph
            .dependency_order()
            .map_err(|cycle| SchemaError::Cycle { cycle })?;
        tracing::debug!(
            file_types = order.len(),
            relations = graph.edge_count(),
            "dependency order resolved"
        );
        Ok(Self {
            graph,
            relations,
            order,
        })
    }

    /// File types with parents before children, ties broken by name.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn position(&self, file_type: &str) -> Option<usize> {
        self.order.iter().position(|name| name == file_type)
    }

    /// Types directly referenced by `file_type`.
    pub fn parents(&self, file_type: &str) -> Vec<&str> {
        self.graph
            .successors(&file_type.to_string())
            .map(String::as_str)
            .collect()
    }

    /// Types that directly reference `file_type`.
    pub fn children(&self, file_type: &str) -> Vec<&str> {
        let key = file_type.to_string();
        self.graph
            .predecessors(&key)
            .map(String::as_str)
            .collect()
    }

    /// True when neither type depends on the other, directly or transitively.
    pub fn independent(&self, a: &str, b: &str) -> bool {
        let a = a.to_string();
        let b = b.to_string();
        a != b && !self.graph.reaches(&a, &b) && !self.graph.reaches(&b, &a)
    }

    /// Shortest chain of relations leading from `from` up to `to`.
    ///
    /// Empty when `to` is unreachable or both ends are the same type.
    pub fn shortest_path(&self, from: &str, to: &str) -> Vec<RelationEdge> {
        let Some(nodes) = self
            .graph
            .shortest_path(&from.to_string(), &to.to_string())
        else {
            return Vec::new();
        };
        nodes
            .windows(2)
            .map(|pair| RelationEdge {
                child: pair[0].clone(),
                parent: pair[1].clone(),
                fields: self
                    .relations
                    .get(&(pair[0].clone(), pair[1].clone()))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect()
    }

    pub fn graph(&self) -> &DirectedGraph<String> {
        &self.graph
    }
}
