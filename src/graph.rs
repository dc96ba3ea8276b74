//! The resolved dependency DAG: an arena of nodes plus edges, built once per
//! scan and handed to the report model as a read-only snapshot.
//!
//! Nodes are stored in a [`petgraph::graph::DiGraph`]; logical identity is
//! the `(name, version, framework)` tuple, not the arena index petgraph
//! assigns, so two resolver paths that arrive at the same package+version
//! share one node rather than duplicating it.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::framework::Tfm;
use crate::version::Version;

/// The identity tuple used for node equality/hashing, per the data model's
/// `(name, pinned_version, framework)` rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    pub name: String,
    pub version: Version,
    pub framework: Option<Tfm>,
}

impl NodeIdentity {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            framework: None,
        }
    }
}

/// One vertex in the resolved graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedNode {
    pub name: String,
    pub version: Version,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<Tfm>,
    /// Non-fatal issues recorded against this specific node (e.g.
    /// `NoVersionSatisfies`, metadata-fetch failures).
    pub warnings: Vec<String>,
}

impl ResolvedNode {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            framework: None,
            warnings: Vec::new(),
        }
    }

    fn identity(&self) -> NodeIdentity {
        NodeIdentity {
            name: self.name.clone(),
            version: self.version.clone(),
            framework: self.framework.clone(),
        }
    }
}

/// The resolved dependency DAG. Deduplicates nodes by [`NodeIdentity`] so
/// shared subtrees (diamonds) are represented once with multiple incoming
/// edges rather than cloned per path.
#[derive(Default)]
pub struct Graph {
    inner: DiGraph<ResolvedNode, ()>,
    index: HashMap<NodeIdentity, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `node` if no node with the same identity exists yet, and
    /// returns the index of the (possibly pre-existing) node.
    pub fn upsert(&mut self, node: ResolvedNode) -> NodeIndex {
        let identity = node.identity();
        if let Some(&idx) = self.index.get(&identity) {
            return idx;
        }
        let idx = self.inner.add_node(node);
        self.index.insert(identity, idx);
        idx
    }

    /// Records that `from` depends on `to`. A no-op if the edge already
    /// exists, keeping each node's outgoing edge set deduplicated.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        if !self.inner.contains_edge(from, to) {
            self.inner.add_edge(from, to, ());
        }
    }

    pub fn mark_root(&mut self, idx: NodeIndex) {
        if !self.roots.contains(&idx) {
            self.roots.push(idx);
        }
    }

    pub fn node(&self, idx: NodeIndex) -> &ResolvedNode {
        &self.inner[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut ResolvedNode {
        &mut self.inner[idx]
    }

    pub fn find(&self, identity: &NodeIdentity) -> Option<NodeIndex> {
        self.index.get(identity).copied()
    }

    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    pub fn children(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.inner
            .edges(idx)
            .map(|edge| edge.target())
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.inner.node_indices()
    }

    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diamond_shares_a_single_node() {
        let mut g = Graph::new();
        let a = g.upsert(ResolvedNode::new("A", "1.0.0".parse().unwrap()));
        let b = g.upsert(ResolvedNode::new("B", "1.0.0".parse().unwrap()));
        let c1 = g.upsert(ResolvedNode::new("C", "1.1.0".parse().unwrap()));
        let c2 = g.upsert(ResolvedNode::new("C", "1.1.0".parse().unwrap()));
        assert_eq!(c1, c2);

        g.add_edge(a, c1);
        g.add_edge(b, c2);
        g.mark_root(a);
        g.mark_root(b);

        assert_eq!(g.len(), 3);
        assert_eq!(g.roots().len(), 2);
    }

    #[test]
    fn different_versions_are_distinct_nodes() {
        let mut g = Graph::new();
        let c1 = g.upsert(ResolvedNode::new("C", "1.0.0".parse().unwrap()));
        let c2 = g.upsert(ResolvedNode::new("C", "1.1.0".parse().unwrap()));
        assert_ne!(c1, c2);
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn duplicate_edges_are_not_repeated() {
        let mut g = Graph::new();
        let a = g.upsert(ResolvedNode::new("A", "1.0.0".parse().unwrap()));
        let b = g.upsert(ResolvedNode::new("B", "1.0.0".parse().unwrap()));
        g.add_edge(a, b);
        g.add_edge(a, b);
        assert_eq!(g.children(a).count(), 1);
    }
}
