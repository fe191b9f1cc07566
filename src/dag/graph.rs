// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

/// Internal node structure: stores immediate deps and dependents by index.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies: tasks that must be satisfied before this one runs.
    deps: Vec<usize>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<usize>,
}

/// Adjacency for the task DAG, keyed by registration index.
///
/// Names live in the registry; this type only knows indices so that
/// ordering ties can be broken by registration order.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: Vec<DagNode>,
}

impl DagGraph {
    pub fn with_nodes(count: usize) -> Self {
        Self {
            nodes: vec![DagNode::default(); count],
        }
    }

    /// Record that `task` depends on `dep` (edge dep -> task).
    pub fn add_dependency(&mut self, task: usize, dep: usize) {
        if !self.nodes[task].deps.contains(&dep) {
            self.nodes[task].deps.push(dep);
            self.nodes[dep].dependents.push(task);
        }
    }

    pub fn dependencies_of(&self, idx: usize) -> &[usize] {
        self.nodes.get(idx).map(|n| n.deps.as_slice()).unwrap_or(&[])
    }

    pub fn dependents_of(&self, idx: usize) -> &[usize] {
        self.nodes
            .get(idx)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Find a cycle, if any.
    ///
    /// Returns the members of one offending strongly-connected component,
    /// sorted by index (a self-dependency yields a single member).
    pub fn find_cycle(&self) -> Option<Vec<usize>> {
        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for idx in 0..self.nodes.len() {
            graph.add_node(idx);
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            for &dep in &node.deps {
                graph.add_edge(dep, idx, ());
            }
        }

        let offending = match toposort(&graph, None) {
            Ok(_) => return None,
            Err(cycle) => cycle.node_id(),
        };

        let mut members = tarjan_scc(&graph)
            .into_iter()
            .find(|scc| scc.contains(&offending))
            .unwrap_or_else(|| vec![offending]);
        members.sort_unstable();
        Some(members)
    }

    /// Topological order with ties broken by lowest index first.
    ///
    /// Nodes on a cycle are left out; see [`find_cycle`](Self::find_cycle).
    pub fn stable_topological_order(&self) -> Vec<usize> {
        let mut remaining: Vec<usize> = self.nodes.iter().map(|n| n.deps.len()).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for &dependent in &self.nodes[idx].dependents {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }
        order
    }

    /// `root` plus everything it transitively depends on.
    pub fn dependency_closure(&self, root: usize) -> BTreeSet<usize> {
        self.closure(root, |idx| self.dependencies_of(idx))
    }

    /// `root` plus everything that transitively depends on it.
    pub fn dependent_closure(&self, root: usize) -> BTreeSet<usize> {
        self.closure(root, |idx| self.dependents_of(idx))
    }

    fn closure<'a, F>(&'a self, root: usize, next: F) -> BTreeSet<usize>
    where
        F: Fn(usize) -> &'a [usize],
    {
        let mut visited = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            if visited.insert(idx) {
                stack.extend(next(idx).iter().copied());
            }
        }
        visited
    }
}
