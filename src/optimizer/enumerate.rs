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

//! Connected subgraph / connected complement enumeration
//!
//! Implements the pair search of "Dynamic Programming Strikes Back"
//! (Moerkotte & Neumann): every pair (S1, S2) of disjoint, internally
//! connected node subsets licensed by at least one hyperedge is produced
//! exactly once. Pairs are delivered with |S1| + |S2| non-decreasing, so by
//! the time a pair arrives, every decomposition of S1 and of S2 has already
//! been delivered and the consumer can treat both sides' best plans as final.
//!
//! Each single node seeds the search, iterated in descending index order.
//! Subsets are only ever extended with nodes of index greater than the seed,
//! which is what makes the enumeration duplicate-free: a connected subset is
//! grown exactly once, from its lowest-indexed node. S1 always contains the
//! lower minimum index, fixing the canonical orientation of each unordered
//! pair; consumers price both orientations themselves.
//!
//! Expansion steps absorb a hyperedge's far side as a whole, so every grown
//! subgraph is connected by construction. Complements seeded from a
//! multi-node far side can be internally disconnected until further growth
//! absorbs a linking edge; such intermediate sets are extended but never
//! emitted.

use rustc_hash::FxHashSet;

use crate::common::NodeSet;
use crate::core::Result;
use crate::optimizer::graph::HyperGraph;

type Pair = (NodeSet, NodeSet, Vec<usize>);

/// Enumerates all valid (S1, S2) pairs of a frozen [`HyperGraph`].
///
/// The emission budget bounds worst-case exponential blow-up: `enumerate`
/// returns `Ok(false)` when the budget is exhausted so the caller can switch
/// to a non-exhaustive strategy.
pub struct SubgraphEnumerator<'g> {
    graph: &'g HyperGraph,
    emit_limit: usize,
    pairs: Vec<Pair>,
    /// Subgraphs whose complements were already produced. Multi-node far
    /// sides overlapping other neighbors open more than one growth path to
    /// the same subset; revisits are cut here.
    visited: FxHashSet<NodeSet>,
    seen_pairs: FxHashSet<(NodeSet, NodeSet)>,
}

impl<'g> SubgraphEnumerator<'g> {
    /// Create an enumerator without an emission budget
    pub fn new(graph: &'g HyperGraph) -> Self {
        Self::with_emit_limit(graph, usize::MAX)
    }

    /// Create an enumerator that gives up after `emit_limit` emitted pairs
    pub fn with_emit_limit(graph: &'g HyperGraph, emit_limit: usize) -> Self {
        Self {
            graph,
            emit_limit,
            pairs: Vec::new(),
            visited: FxHashSet::default(),
            seen_pairs: FxHashSet::default(),
        }
    }

    /// Number of pairs emitted so far
    pub fn emitted(&self) -> usize {
        self.pairs.len()
    }

    /// Run the enumeration, handing each pair and its licensing edge indices
    /// to `consumer` in non-decreasing order of total cardinality. Returns
    /// `Ok(true)` on exhaustive completion, `Ok(false)` if the emission
    /// budget ran out.
    pub fn enumerate<F>(&mut self, mut consumer: F) -> Result<bool>
    where
        F: FnMut(&NodeSet, &NodeSet, &[usize]) -> Result<()>,
    {
        let n = self.graph.node_count();
        let mut complete = true;
        'seeds: for seed in (0..n).rev() {
            let s1 = NodeSet::single(seed);
            if !self.emit_subgraph(&s1) {
                complete = false;
                break 'seeds;
            }
            let forbidden = NodeSet::from_indices(0..=seed);
            if !self.extend_subgraph(&s1, &forbidden) {
                complete = false;
                break 'seeds;
            }
        }

        // Deliver smaller pairs first; the stable sort keeps discovery order
        // within one size class, so delivery is deterministic.
        self.pairs
            .sort_by_key(|(s1, s2, _)| s1.cardinality() + s2.cardinality());
        for (s1, s2, edges) in &self.pairs {
            consumer(s1, s2, edges)?;
        }
        Ok(complete)
    }

    /// Collect every complement pair for the connected subset `s1`: first the
    /// single-far-side complements, then their extensions.
    fn emit_subgraph(&mut self, s1: &NodeSet) -> bool {
        if s1.cardinality() == self.graph.node_count() {
            return true;
        }
        if !self.visited.insert(s1.clone()) {
            return true;
        }
        let min = s1.lowest().expect("subgraph is non-empty");
        let below_seed = NodeSet::from_indices(0..min);
        let forbidden = below_seed.union(s1);

        let neighbors = self.graph.neighbors(s1, &forbidden);

        // Prefix unions: branch i may not grow into neighbors 0..=i, which
        // get their own branches.
        let mut prefixes: Vec<NodeSet> = Vec::with_capacity(neighbors.len());
        let mut acc = forbidden;
        for (_, far) in &neighbors {
            acc = acc.union(far);
            prefixes.push(acc.clone());
        }

        for i in (0..neighbors.len()).rev() {
            let s2 = neighbors[i].1.clone();
            let edges = self.graph.connecting_edges(s1, &s2);
            if !edges.is_empty()
                && self.graph.is_connected(&s2)
                && !self.emit(s1, &s2, edges)
            {
                return false;
            }
            if !self.extend_complement(s1, &s2, &prefixes[i]) {
                return false;
            }
        }
        true
    }

    /// Grow the complement `s2` through its neighborhood until no more valid
    /// pairs with `s1` exist.
    fn extend_complement(&mut self, s1: &NodeSet, s2: &NodeSet, forbidden: &NodeSet) -> bool {
        let neighbors = self.graph.neighbors(s2, forbidden);
        if neighbors.is_empty() {
            return true;
        }

        let mut merged_sets = Vec::with_capacity(neighbors.len());
        for (_, far) in &neighbors {
            let merged = s2.union(far);
            let edges = self.graph.connecting_edges(s1, &merged);
            if !edges.is_empty()
                && self.graph.is_connected(&merged)
                && !self.emit(s1, &merged, edges)
            {
                return false;
            }
            merged_sets.push(merged);
        }

        let mut grown_forbidden = forbidden.clone();
        for (i, (_, far)) in neighbors.iter().enumerate() {
            grown_forbidden = grown_forbidden.union(far);
            if !self.extend_complement(s1, &merged_sets[i], &grown_forbidden) {
                return false;
            }
        }
        true
    }

    /// Grow the connected subset `s1` through its neighborhood, collecting
    /// the complement pairs of every grown subset.
    fn extend_subgraph(&mut self, s1: &NodeSet, forbidden: &NodeSet) -> bool {
        let neighbors = self.graph.neighbors(s1, forbidden);
        if neighbors.is_empty() {
            return true;
        }

        let mut merged_sets = Vec::with_capacity(neighbors.len());
        for (_, far) in &neighbors {
            let merged = s1.union(far);
            if !self.emit_subgraph(&merged) {
                return false;
            }
            merged_sets.push(merged);
        }

        let mut grown_forbidden = forbidden.clone();
        for (i, (_, far)) in neighbors.iter().enumerate() {
            grown_forbidden = grown_forbidden.union(far);
            if !self.extend_subgraph(&merged_sets[i], &grown_forbidden) {
                return false;
            }
        }
        true
    }

    /// Record a pair; false once the budget is exhausted
    fn emit(&mut self, s1: &NodeSet, s2: &NodeSet, edges: Vec<usize>) -> bool {
        if !self.seen_pairs.insert((s1.clone(), s2.clone())) {
            return true;
        }
        if self.pairs.len() >= self.emit_limit {
            return false;
        }
        self.pairs.push((s1.clone(), s2.clone(), edges));
        true
    }
}
