// Copyright 2025 Hyperjoin Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Hypergraph model of a multi-way join query
//!
//! One [`Node`] per base relation, one [`Edge`] per join predicate. An edge
//! generalizes a binary join condition: its endpoints are two disjoint
//! non-empty *sets* of nodes, so a predicate produced by merging several
//! conditions can span more than two relations.
//!
//! Graphs are built once through [`HyperGraphBuilder`] and are immutable
//! afterwards. The builder validates every edge (non-empty disjoint sides
//! inside the node universe, selectivity in (0, 1]) and rejects the graph
//! rather than letting a malformed edge reach enumeration.

use smallvec::SmallVec;

use crate::common::NodeSet;
use crate::core::{Error, Result};

/// Opaque handle to a leaf plan owned by the host optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanId(pub usize);

/// Opaque handle to an originating two-way join operator owned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorId(pub usize);

/// One base relation in the query graph
#[derive(Debug, Clone)]
pub struct Node {
    /// Bit position of this relation in the node universe
    pub index: usize,
    /// Leaf plan handle
    pub plan: PlanId,
    /// Base row count estimate from the statistics collaborator
    pub rows: f64,
}

/// One join predicate, generalized over node sets
#[derive(Debug, Clone)]
pub struct Edge {
    /// Unique index within the graph, stable ordering key
    pub index: usize,
    /// Originating join operator handle
    pub op: OperatorId,
    /// Estimated selectivity in (0, 1], fixed at edge finalization
    pub selectivity: f64,
    left: NodeSet,
    right: NodeSet,
}

impl Edge {
    fn new(index: usize, op: OperatorId, selectivity: f64, left: NodeSet, right: NodeSet) -> Self {
        Self {
            index,
            op,
            selectivity,
            left,
            right,
        }
    }

    /// Left endpoint set
    #[inline]
    pub fn left(&self) -> &NodeSet {
        &self.left
    }

    /// Right endpoint set
    #[inline]
    pub fn right(&self) -> &NodeSet {
        &self.right
    }

    /// True iff both sides reference exactly one relation (a classic binary
    /// join predicate)
    pub fn is_simple(&self) -> bool {
        self.left.cardinality() == 1 && self.right.cardinality() == 1
    }

    /// All relations this edge references (left union right)
    pub fn reference_nodes(&self) -> NodeSet {
        self.left.union(&self.right)
    }

    /// True iff this edge's reference nodes are a subset of the other edge's.
    /// A subset-footprint edge must be applied before the broader one.
    pub fn is_sub(&self, other: &Edge) -> bool {
        self.reference_nodes().is_subset_of(&other.reference_nodes())
    }

    /// A copy with the sides swapped and a fresh index
    pub fn reverse(&self, index: usize) -> Edge {
        Edge::new(
            index,
            self.op,
            self.selectivity,
            self.right.clone(),
            self.left.clone(),
        )
    }

    /// True iff this edge licenses joining `s1` with `s2` in either
    /// orientation
    pub fn connects(&self, s1: &NodeSet, s2: &NodeSet) -> bool {
        (self.left.is_subset_of(s1) && self.right.is_subset_of(s2))
            || (self.left.is_subset_of(s2) && self.right.is_subset_of(s1))
    }
}

/// The whole-query container: all nodes, all edges, and the derived per-node
/// adjacency used to answer neighborhood and connectivity queries without
/// re-scanning the full edge set.
#[derive(Debug, Clone)]
pub struct HyperGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// node index -> indices of edges touching it
    adjacency: Vec<SmallVec<[usize; 4]>>,
}

impl HyperGraph {
    /// Number of relations
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of hyperedges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All nodes, ordered by index
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges, in application order (subset-footprint edges first)
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Node by index
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// Edge by index
    pub fn edge(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    /// The full node universe
    pub fn universe(&self) -> NodeSet {
        NodeSet::from_indices(0..self.nodes.len())
    }

    /// Indices of edges touching a node
    pub fn edges_touching(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    /// Indices of edges licensing a join between `s1` and `s2` (in either
    /// orientation), ascending
    pub fn connecting_edges(&self, s1: &NodeSet, s2: &NodeSet) -> Vec<usize> {
        let mut seen = vec![false; self.edges.len()];
        let mut out = Vec::new();
        for node in s1.iter() {
            for &e in &self.adjacency[node] {
                if seen[e] {
                    continue;
                }
                seen[e] = true;
                if self.edges[e].connects(s1, s2) {
                    out.push(e);
                }
            }
        }
        out.sort_unstable();
        out
    }

    /// True iff the subset is internally connected: every relation reachable
    /// from every other using only edges whose entire reference-node set lies
    /// inside the subset. An edge fully contained in the subset links all of
    /// its reference nodes at once.
    pub fn is_connected(&self, set: &NodeSet) -> bool {
        let Some(start) = set.lowest() else {
            return false;
        };
        if set.cardinality() == 1 {
            return true;
        }
        let mut reached = NodeSet::single(start);
        loop {
            let mut grew = false;
            for edge in &self.edges {
                let refs = edge.reference_nodes();
                if refs.is_subset_of(set)
                    && refs.overlaps(&reached)
                    && !refs.is_subset_of(&reached)
                {
                    reached = reached.union(&refs);
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }
        set.is_subset_of(&reached)
    }

    /// Neighborhood of `set` under a forbidden set: for every edge with one
    /// side fully inside `set` and the far side disjoint from both `set` and
    /// `forbidden`, the far side keyed by its lowest node index. Deduplicated
    /// and ascending by representative, so enumeration order is
    /// deterministic.
    pub fn neighbors(&self, set: &NodeSet, forbidden: &NodeSet) -> Vec<(usize, NodeSet)> {
        let blocked = set.union(forbidden);
        let mut seen = vec![false; self.edges.len()];
        let mut out: Vec<(usize, NodeSet)> = Vec::new();
        for node in set.iter() {
            for &e in &self.adjacency[node] {
                if seen[e] {
                    continue;
                }
                seen[e] = true;
                let edge = &self.edges[e];
                let far = if edge.left().is_subset_of(set) {
                    edge.right()
                } else if edge.right().is_subset_of(set) {
                    edge.left()
                } else {
                    continue;
                };
                if far.overlaps(&blocked) {
                    continue;
                }
                out.push((far.lowest().expect("edge side is non-empty"), far.clone()));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        out.dedup_by(|a, b| a.1 == b.1);
        out
    }
}

/// Input model for [`HyperGraphBuilder::from_join_tree`]: a tree of two-way
/// join operators over leaf relations, as produced by the host's logical
/// planner.
#[derive(Debug, Clone)]
pub enum JoinExpr {
    /// A base relation with its row count estimate
    Relation { plan: PlanId, rows: f64 },
    /// A two-way join of two subtrees
    Join {
        left: Box<JoinExpr>,
        right: Box<JoinExpr>,
        op: OperatorId,
        selectivity: f64,
    },
}

impl JoinExpr {
    /// Leaf constructor
    pub fn relation(plan: PlanId, rows: f64) -> Self {
        JoinExpr::Relation { plan, rows }
    }

    /// Join constructor
    pub fn join(left: JoinExpr, right: JoinExpr, op: OperatorId, selectivity: f64) -> Self {
        JoinExpr::Join {
            left: Box::new(left),
            right: Box::new(right),
            op,
            selectivity,
        }
    }
}

/// Builder for [`HyperGraph`]
///
/// Node and edge indices are assigned sequentially by the builder itself, so
/// construction is reproducible: the same sequence of calls yields the same
/// graph.
#[derive(Debug, Default)]
pub struct HyperGraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl HyperGraphBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a base relation; returns its node index (the next unused bit)
    pub fn add_relation(&mut self, plan: PlanId, rows: f64) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node { index, plan, rows });
        index
    }

    /// Add a join predicate connecting `left` with `right`.
    ///
    /// If an edge with the same endpoint pair already exists the predicates
    /// are subsumed into it by multiplying selectivities, instead of minting
    /// a parallel edge. Returns the edge index.
    pub fn add_join(
        &mut self,
        left: NodeSet,
        right: NodeSet,
        op: OperatorId,
        selectivity: f64,
    ) -> Result<usize> {
        let index = self.edges.len();
        if left.is_empty() || right.is_empty() {
            return Err(Error::EmptyEdgeSide { edge: index });
        }
        if left.overlaps(&right) {
            return Err(Error::OverlappingEdgeSides { edge: index });
        }
        if !(selectivity > 0.0 && selectivity <= 1.0) {
            return Err(Error::InvalidSelectivity { edge: index, selectivity });
        }
        self.check_universe(index, &left)?;
        self.check_universe(index, &right)?;

        for edge in &mut self.edges {
            let same = (edge.left == left && edge.right == right)
                || (edge.left == right && edge.right == left);
            if same {
                edge.selectivity *= selectivity;
                return Ok(edge.index);
            }
        }

        self.edges
            .push(Edge::new(index, op, selectivity, left, right));
        Ok(index)
    }

    /// Grow an edge's left side by union, for transitive predicate merging.
    /// The widened edge is re-validated at [`build`](Self::build).
    pub fn widen_left(&mut self, edge: usize, nodes: &NodeSet) {
        let e = &mut self.edges[edge];
        e.left = e.left.union(nodes);
    }

    /// Grow an edge's right side by union
    pub fn widen_right(&mut self, edge: usize, nodes: &NodeSet) {
        let e = &mut self.edges[edge];
        e.right = e.right.union(nodes);
    }

    fn check_universe(&self, edge: usize, side: &NodeSet) -> Result<()> {
        let universe = NodeSet::from_indices(0..self.nodes.len());
        if !side.is_subset_of(&universe) {
            let node = side.difference(&universe).lowest().unwrap_or(usize::MAX);
            return Err(Error::UnknownNode { edge, node });
        }
        Ok(())
    }

    /// Translate a tree of two-way join operators into a hypergraph: one node
    /// per leaf in tree order, one edge per join operator whose sides are the
    /// reference-node sets of the join's inputs.
    pub fn from_join_tree(expr: &JoinExpr) -> Result<HyperGraph> {
        let mut builder = Self::new();
        builder.translate(expr)?;
        builder.build()
    }

    fn translate(&mut self, expr: &JoinExpr) -> Result<NodeSet> {
        match expr {
            JoinExpr::Relation { plan, rows } => {
                let index = self.add_relation(*plan, *rows);
                Ok(NodeSet::single(index))
            }
            JoinExpr::Join {
                left,
                right,
                op,
                selectivity,
            } => {
                let left_refs = self.translate(left)?;
                let right_refs = self.translate(right)?;
                self.add_join(left_refs.clone(), right_refs.clone(), *op, *selectivity)?;
                Ok(left_refs.union(&right_refs))
            }
        }
    }

    /// Validate every edge, freeze the adjacency index, and fix the edge
    /// application order: subset-footprint edges before broader ones, ties by
    /// insertion order.
    pub fn build(mut self) -> Result<HyperGraph> {
        if self.nodes.is_empty() {
            return Err(Error::EmptyGraph);
        }

        for edge in &self.edges {
            if edge.left.is_empty() || edge.right.is_empty() {
                return Err(Error::EmptyEdgeSide { edge: edge.index });
            }
            if edge.left.overlaps(&edge.right) {
                return Err(Error::OverlappingEdgeSides { edge: edge.index });
            }
            if !(edge.selectivity > 0.0 && edge.selectivity <= 1.0) {
                return Err(Error::InvalidSelectivity {
                    edge: edge.index,
                    selectivity: edge.selectivity,
                });
            }
            let universe = NodeSet::from_indices(0..self.nodes.len());
            let refs = edge.reference_nodes();
            if !refs.is_subset_of(&universe) {
                let node = refs.difference(&universe).lowest().unwrap_or(usize::MAX);
                return Err(Error::UnknownNode {
                    edge: edge.index,
                    node,
                });
            }
        }

        self.edges.sort_by(|a, b| {
            a.reference_nodes()
                .cardinality()
                .cmp(&b.reference_nodes().cardinality())
                .then(a.index.cmp(&b.index))
        });
        for (new_index, edge) in self.edges.iter_mut().enumerate() {
            edge.index = new_index;
        }

        let mut adjacency: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); self.nodes.len()];
        for edge in &self.edges {
            for node in edge.reference_nodes().iter() {
                adjacency[node].push(edge.index);
            }
        }

        Ok(HyperGraph {
            nodes: self.nodes,
            edges: self.edges,
            adjacency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain3() -> HyperGraph {
        // r0 - r1 - r2
        let mut b = HyperGraphBuilder::new();
        let r0 = b.add_relation(PlanId(0), 100.0);
        let r1 = b.add_relation(PlanId(1), 200.0);
        let r2 = b.add_relation(PlanId(2), 300.0);
        b.add_join(NodeSet::single(r0), NodeSet::single(r1), OperatorId(0), 0.1)
            .unwrap();
        b.add_join(NodeSet::single(r1), NodeSet::single(r2), OperatorId(1), 0.1)
            .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_builder_assigns_sequential_indices() {
        let graph = chain3();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        for (i, node) in graph.nodes().iter().enumerate() {
            assert_eq!(node.index, i);
        }
    }

    #[test]
    fn test_empty_side_rejected() {
        let mut b = HyperGraphBuilder::new();
        let r0 = b.add_relation(PlanId(0), 10.0);
        b.add_relation(PlanId(1), 10.0);
        let err = b
            .add_join(NodeSet::single(r0), NodeSet::empty(), OperatorId(0), 0.5)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyEdgeSide { .. }));
    }

    #[test]
    fn test_overlapping_sides_rejected() {
        let mut b = HyperGraphBuilder::new();
        let r0 = b.add_relation(PlanId(0), 10.0);
        let r1 = b.add_relation(PlanId(1), 10.0);
        let err = b
            .add_join(
                NodeSet::from_indices([r0, r1]),
                NodeSet::single(r1),
                OperatorId(0),
                0.5,
            )
            .unwrap_err();
        assert!(matches!(err, Error::OverlappingEdgeSides { .. }));
    }

    #[test]
    fn test_unknown_node_rejected() {
        let mut b = HyperGraphBuilder::new();
        let r0 = b.add_relation(PlanId(0), 10.0);
        let err = b
            .add_join(NodeSet::single(r0), NodeSet::single(7), OperatorId(0), 0.5)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownNode { node: 7, .. }));
    }

    #[test]
    fn test_widened_edge_revalidated_at_build() {
        let mut b = HyperGraphBuilder::new();
        let r0 = b.add_relation(PlanId(0), 10.0);
        let r1 = b.add_relation(PlanId(1), 10.0);
        let e = b
            .add_join(NodeSet::single(r0), NodeSet::single(r1), OperatorId(0), 0.5)
            .unwrap();
        // Widening the left side onto the right side's node corrupts the edge
        b.widen_left(e, &NodeSet::single(r1));
        let err = b.build().unwrap_err();
        assert!(matches!(err, Error::OverlappingEdgeSides { .. }));
    }

    #[test]
    fn test_invalid_selectivity_rejected() {
        let mut b = HyperGraphBuilder::new();
        let r0 = b.add_relation(PlanId(0), 10.0);
        let r1 = b.add_relation(PlanId(1), 10.0);
        let err = b
            .add_join(NodeSet::single(r0), NodeSet::single(r1), OperatorId(0), 0.0)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelectivity { .. }));
    }

    #[test]
    fn test_empty_graph_rejected() {
        let err = HyperGraphBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::EmptyGraph));
    }

    #[test]
    fn test_duplicate_predicate_subsumed() {
        let mut b = HyperGraphBuilder::new();
        let r0 = b.add_relation(PlanId(0), 10.0);
        let r1 = b.add_relation(PlanId(1), 10.0);
        let e1 = b
            .add_join(NodeSet::single(r0), NodeSet::single(r1), OperatorId(0), 0.5)
            .unwrap();
        // Same endpoints (reversed) merge into the existing edge
        let e2 = b
            .add_join(NodeSet::single(r1), NodeSet::single(r0), OperatorId(1), 0.5)
            .unwrap();
        assert_eq!(e1, e2);
        let graph = b.build().unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert!((graph.edge(0).selectivity - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_edge_is_simple_and_reference_nodes() {
        let graph = chain3();
        let edge = graph.edge(0);
        assert!(edge.is_simple());
        assert_eq!(edge.reference_nodes().cardinality(), 2);
    }

    #[test]
    fn test_edge_reverse() {
        let graph = chain3();
        let edge = graph.edge(0);
        let reversed = edge.reverse(99);
        assert_eq!(reversed.index, 99);
        assert_eq!(reversed.left(), edge.right());
        assert_eq!(reversed.right(), edge.left());
        assert_eq!(reversed.op, edge.op);
        assert_eq!(reversed.selectivity, edge.selectivity);
        // Reversal does not change what the edge licenses
        let s1 = NodeSet::single(0);
        let s2 = NodeSet::single(1);
        assert!(edge.connects(&s1, &s2));
        assert!(reversed.connects(&s1, &s2));
    }

    #[test]
    fn test_is_sub_orders_edge_application() {
        let mut b = HyperGraphBuilder::new();
        for i in 0..3 {
            b.add_relation(PlanId(i), 10.0);
        }
        // Insert the broad hyperedge first; build() must order the simple
        // edge in front of it.
        b.add_join(
            NodeSet::from_indices([0, 1]),
            NodeSet::single(2),
            OperatorId(0),
            0.5,
        )
        .unwrap();
        b.add_join(NodeSet::single(0), NodeSet::single(1), OperatorId(1), 0.5)
            .unwrap();
        let graph = b.build().unwrap();
        assert!(graph.edge(0).is_simple());
        assert!(!graph.edge(1).is_simple());
        assert!(graph.edge(0).is_sub(graph.edge(1)));
        assert!(!graph.edge(1).is_sub(graph.edge(0)));
    }

    #[test]
    fn test_connectivity() {
        let graph = chain3();
        assert!(graph.is_connected(&NodeSet::from_indices([0, 1])));
        assert!(graph.is_connected(&NodeSet::from_indices([1, 2])));
        assert!(graph.is_connected(&NodeSet::from_indices([0, 1, 2])));
        // No direct r0 - r2 edge
        assert!(!graph.is_connected(&NodeSet::from_indices([0, 2])));
        assert!(graph.is_connected(&NodeSet::single(2)));
        assert!(!graph.is_connected(&NodeSet::empty()));
    }

    #[test]
    fn test_hyperedge_connectivity_links_whole_reference_set() {
        // {r0} - {r1, r2}: the contained hyperedge links all three at once
        let mut b = HyperGraphBuilder::new();
        for i in 0..3 {
            b.add_relation(PlanId(i), 10.0);
        }
        b.add_join(
            NodeSet::single(0),
            NodeSet::from_indices([1, 2]),
            OperatorId(0),
            0.5,
        )
        .unwrap();
        let graph = b.build().unwrap();
        assert!(graph.is_connected(&NodeSet::from_indices([0, 1, 2])));
        // The far side alone has no contained edge
        assert!(!graph.is_connected(&NodeSet::from_indices([1, 2])));
    }

    #[test]
    fn test_neighbors() {
        let graph = chain3();
        let n = graph.neighbors(&NodeSet::single(1), &NodeSet::empty());
        let reps: Vec<usize> = n.iter().map(|(rep, _)| *rep).collect();
        assert_eq!(reps, vec![0, 2]);

        // Forbidding node 0 removes it from the neighborhood
        let n = graph.neighbors(&NodeSet::single(1), &NodeSet::single(0));
        let reps: Vec<usize> = n.iter().map(|(rep, _)| *rep).collect();
        assert_eq!(reps, vec![2]);

        // r0's only neighbor is r1; r2 is not adjacent
        let n = graph.neighbors(&NodeSet::single(0), &NodeSet::empty());
        let reps: Vec<usize> = n.iter().map(|(rep, _)| *rep).collect();
        assert_eq!(reps, vec![1]);
    }

    #[test]
    fn test_connecting_edges() {
        let graph = chain3();
        let e = graph.connecting_edges(&NodeSet::single(0), &NodeSet::single(1));
        assert_eq!(e.len(), 1);
        let e = graph.connecting_edges(&NodeSet::single(0), &NodeSet::single(2));
        assert!(e.is_empty());
        let e = graph.connecting_edges(&NodeSet::from_indices([0, 1]), &NodeSet::single(2));
        assert_eq!(e.len(), 1);
    }

    #[test]
    fn test_from_join_tree() {
        let expr = JoinExpr::join(
            JoinExpr::join(
                JoinExpr::relation(PlanId(10), 100.0),
                JoinExpr::relation(PlanId(11), 200.0),
                OperatorId(0),
                0.1,
            ),
            JoinExpr::relation(PlanId(12), 300.0),
            OperatorId(1),
            0.2,
        );
        let graph = HyperGraphBuilder::from_join_tree(&expr).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.node(0).plan, PlanId(10));
        assert_eq!(graph.node(2).rows, 300.0);

        // First edge is the simple one; the second spans the lower join's
        // output and the third relation.
        assert!(graph.edge(0).is_simple());
        let top = graph.edge(1);
        assert_eq!(top.left(), &NodeSet::from_indices([0, 1]));
        assert_eq!(top.right(), &NodeSet::single(2));
    }
}
