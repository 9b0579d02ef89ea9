//! Graphs over player indices, used for spatial Moran processes

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An unweighted graph on `usize` vertices.
///
/// Undirected graphs store each edge in both directions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    directed: bool,
    edges: Vec<(usize, usize)>,
    out: BTreeMap<usize, BTreeSet<usize>>,
}

impl Graph {
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            ..Self::default()
        }
    }

    pub fn from_edges(edges: impl IntoIterator<Item = (usize, usize)>, directed: bool) -> Self {
        let mut graph = Self::new(directed);
        for (a, b) in edges {
            graph.add_edge(a, b);
        }
        graph
    }

    pub fn directed(&self) -> bool {
        self.directed
    }

    pub fn add_edge(&mut self, a: usize, b: usize) {
        if self.out.get(&a).is_some_and(|out| out.contains(&b)) {
            return;
        }
        self.edges.push((a, b));
        self.out.entry(a).or_default().insert(b);
        self.out.entry(b).or_default();
        if !self.directed && a != b {
            self.edges.push((b, a));
            self.out.entry(b).or_default().insert(a);
        }
    }

    /// Add a self-loop to every vertex
    pub fn add_loops(&mut self) {
        let vertices: Vec<usize> = self.vertices().collect();
        for v in vertices {
            self.add_edge(v, v);
        }
    }

    /// Edges in insertion order; undirected edges appear in both directions
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn vertices(&self) -> impl Iterator<Item = usize> + '_ {
        self.out.keys().copied()
    }

    pub fn out_vertices(&self, vertex: usize) -> impl Iterator<Item = usize> + '_ {
        self.out.get(&vertex).into_iter().flatten().copied()
    }

    pub fn in_vertices(&self, vertex: usize) -> impl Iterator<Item = usize> + '_ {
        self.out
            .iter()
            .filter(move |(_, out)| out.contains(&vertex))
            .map(|(v, _)| *v)
    }
}

/// Every pair of `size` vertices connected, optionally with self-loops
pub fn complete_graph(size: usize, loops: bool) -> Graph {
    let mut graph = Graph::new(false);
    for a in 0..size {
        for b in (a + 1)..size {
            graph.add_edge(a, b);
        }
    }
    if size == 1 {
        graph.out.entry(0).or_default();
    }
    if loops {
        graph.add_loops();
    }
    graph
}

/// Undirected ring of `length` vertices
pub fn cycle(length: usize) -> Graph {
    let mut graph = Graph::new(false);
    for a in 0..length {
        graph.add_edge(a, (a + 1) % length);
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undirected_edges_both_ways() {
        let graph = Graph::from_edges([(0, 1), (1, 2)], false);
        assert_eq!(graph.vertices().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(graph.out_vertices(1).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(graph.edges().len(), 4);
    }

    #[test]
    fn test_directed_edges() {
        let graph = Graph::from_edges([(0, 1), (1, 2)], true);
        assert_eq!(graph.out_vertices(1).collect::<Vec<_>>(), vec![2]);
        assert_eq!(graph.out_vertices(2).count(), 0);
        assert_eq!(graph.in_vertices(1).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_duplicate_edges_ignored() {
        let mut graph = Graph::new(false);
        graph.add_edge(0, 1);
        graph.add_edge(1, 0);
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_complete_graph() {
        let graph = complete_graph(4, false);
        for v in 0..4 {
            assert_eq!(graph.out_vertices(v).count(), 3);
        }
        let looped = complete_graph(4, true);
        assert!(looped.out_vertices(2).any(|v| v == 2));
        assert_eq!(complete_graph(1, false).vertices().count(), 1);
    }

    #[test]
    fn test_cycle() {
        let ring = cycle(5);
        assert_eq!(ring.out_vertices(0).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(ring.out_vertices(3).collect::<Vec<_>>(), vec![2, 4]);
    }

    #[test]
    fn test_add_loops() {
        let mut graph = cycle(3);
        graph.add_loops();
        for v in 0..3 {
            assert!(graph.out_vertices(v).any(|u| u == v));
        }
    }
}
