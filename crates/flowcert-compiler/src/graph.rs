use std::collections::{HashMap, HashSet, VecDeque};

use flowcert_design::{Design, Edge, Node};

/// Borrowed lookup index over a design's nodes and edges.
#[derive(Debug, Clone)]
pub struct FlowGraph<'a> {
    design: &'a Design,
    /// First node with a given id wins; duplicates are reported by the shape pass.
    nodes: HashMap<&'a str, &'a Node>,
    edges: Vec<&'a Edge>,
    /// Maps node_id to a range (start, count) into the sorted `edges` vec.
    /// Edges are sorted by `from` so each node's outgoing edges are contiguous.
    adjacency: HashMap<&'a str, (usize, usize)>,
}

impl<'a> FlowGraph<'a> {
    pub fn new(design: &'a Design) -> Self {
        let mut nodes = HashMap::new();
        for node in &design.graph.nodes {
            nodes.entry(node.id.as_str()).or_insert(node);
        }

        // Stable sort keeps declaration order within one source node
        let mut edges: Vec<&Edge> = design.graph.edges.iter().collect();
        edges.sort_by(|a, b| a.from.cmp(&b.from));

        let mut adjacency = HashMap::new();
        let mut i = 0;
        while i < edges.len() {
            let start = i;
            let head: &'a Edge = edges[i];
            let from = head.from.as_str();
            while i < edges.len() && edges[i].from == from {
                i += 1;
            }
            adjacency.insert(from, (start, i - start));
        }

        Self {
            design,
            nodes,
            edges,
            adjacency,
        }
    }

    pub fn design(&self) -> &'a Design {
        self.design
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes.get(id).copied()
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &'a Node> {
        self.design.graph.nodes.iter()
    }

    /// Edges in declaration order, paired with their index in the design.
    pub fn edges(&self) -> impl Iterator<Item = (usize, &'a Edge)> {
        self.design.graph.edges.iter().enumerate()
    }

    pub fn outgoing(&self, node_id: &str) -> &[&'a Edge] {
        match self.adjacency.get(node_id) {
            Some(&(start, count)) => &self.edges[start..start + count],
            None => &[],
        }
    }

    /// Entry targets that resolve to a node.
    pub fn entry_roots(&self) -> Vec<&'a str> {
        self.design
            .entries
            .iter()
            .map(|e| e.target.as_str())
            .filter(|t| self.has_node(t))
            .collect()
    }

    /// Breadth-first reachability over edges whose target exists.
    pub fn reachable_from(&self, roots: &[&'a str]) -> HashSet<&'a str> {
        let mut visited: HashSet<&'a str> = HashSet::new();
        let mut queue: VecDeque<&'a str> = VecDeque::new();
        for &root in roots {
            if visited.insert(root) {
                queue.push_back(root);
            }
        }
        while let Some(current) = queue.pop_front() {
            for &edge in self.outgoing(current) {
                if self.has_node(&edge.to) && visited.insert(edge.to.as_str()) {
                    queue.push_back(edge.to.as_str());
                }
            }
        }
        visited
    }
}
