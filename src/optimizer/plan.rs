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

//! Join order planning
//!
//! [`JoinReorderer`] drives the search: it seeds a dynamic-programming table
//! with every single relation, feeds each pair produced by the subgraph
//! enumerator through the cost oracle in both orientations, and keeps the
//! cheapest plan per relation subset. The entry for the full relation set is
//! the answer.
//!
//! Two fallbacks keep planning total:
//! - A disconnected query graph leaves the full set unreachable through
//!   licensed pairs; the planner then cross-combines the cheapest covered
//!   subsets (cartesian products) until the universe is covered.
//! - Past `dp_relation_limit` relations, or when enumeration exhausts its
//!   emission budget, exhaustive search is abandoned for a greedy pairing
//!   that always merges the cheapest connected pair. Fast, not optimal.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::common::NodeSet;
use crate::core::{Error, Result};
use crate::optimizer::cost::{CostModel, DefaultCostModel, SubsetStats};
use crate::optimizer::enumerate::SubgraphEnumerator;
use crate::optimizer::graph::{Edge, HyperGraph, OperatorId, PlanId};

/// Search knobs. No file or environment I/O; the host passes values in.
#[derive(Debug, Clone)]
pub struct ReorderConfig {
    /// Relation count above which the exhaustive search is skipped entirely
    pub dp_relation_limit: usize,
    /// Pair emission budget for one exhaustive enumeration
    pub emit_limit: usize,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            dp_relation_limit: 12,
            emit_limit: 10_000,
        }
    }
}

/// The chosen join tree, covering every input relation exactly once.
///
/// `operators` lists the originating join operators applied at a join node,
/// most specific predicate first; it is empty for a cartesian product.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinTree {
    /// A base relation
    Leaf { plan: PlanId },
    /// A binary join of two subtrees
    Join {
        left: Box<JoinTree>,
        right: Box<JoinTree>,
        operators: Vec<OperatorId>,
    },
}

impl JoinTree {
    /// Number of base relations in the tree
    pub fn leaf_count(&self) -> usize {
        match self {
            JoinTree::Leaf { .. } => 1,
            JoinTree::Join { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }

    /// Leaf plan handles, left to right
    pub fn leaves(&self) -> Vec<PlanId> {
        fn walk(tree: &JoinTree, out: &mut Vec<PlanId>) {
            match tree {
                JoinTree::Leaf { plan } => out.push(*plan),
                JoinTree::Join { left, right, .. } => {
                    walk(left, out);
                    walk(right, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    /// True for a join node with no licensing predicate
    pub fn is_cartesian(&self) -> bool {
        matches!(self, JoinTree::Join { operators, .. } if operators.is_empty())
    }
}

/// Result of join reordering
#[derive(Debug, Clone)]
pub struct JoinPlan {
    /// The chosen join tree
    pub root: JoinTree,
    /// Cumulative estimated cost of the tree
    pub total_cost: f64,
    /// Estimated output row count
    pub output_rows: f64,
}

/// Arena node realizing one DP entry. Children are arena indices, so shared
/// subplans are stored once.
#[derive(Debug, Clone)]
enum PlanNode {
    Leaf {
        node: usize,
    },
    Join {
        left: usize,
        right: usize,
        edges: SmallVec<[usize; 2]>,
    },
}

/// Best known realization of one relation subset
#[derive(Debug, Clone)]
struct DpEntry {
    cost: f64,
    rows: f64,
    plan: usize,
}

/// Join order planner
pub struct JoinReorderer<C = DefaultCostModel> {
    config: ReorderConfig,
    cost_model: C,
}

impl JoinReorderer<DefaultCostModel> {
    /// Create a planner with the default configuration and cost model
    pub fn new() -> Self {
        Self {
            config: ReorderConfig::default(),
            cost_model: DefaultCostModel::new(),
        }
    }

    /// Create a planner with a custom configuration and the default model
    pub fn with_config(config: ReorderConfig) -> Self {
        Self {
            config,
            cost_model: DefaultCostModel::new(),
        }
    }
}

impl Default for JoinReorderer<DefaultCostModel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CostModel> JoinReorderer<C> {
    /// Create a planner with a host-supplied cost model
    pub fn with_cost_model(config: ReorderConfig, cost_model: C) -> Self {
        Self { config, cost_model }
    }

    /// Find the cheapest join order for the graph.
    ///
    /// Exhaustive within the configured limits, greedy beyond them; always
    /// returns a plan covering every relation exactly once, or an error when
    /// the graph or the cost model violates its contract.
    pub fn optimize(&self, graph: &HyperGraph) -> Result<JoinPlan> {
        if graph.node_count() == 0 {
            return Err(Error::EmptyGraph);
        }
        let universe = graph.universe();

        if graph.node_count() <= self.config.dp_relation_limit {
            let mut search = DpTable::new(graph, &self.cost_model);
            search.seed();
            let mut enumerator =
                SubgraphEnumerator::with_emit_limit(graph, self.config.emit_limit);
            let complete =
                enumerator.enumerate(|s1, s2, edges| search.apply_pair(s1, s2, edges))?;
            if complete {
                if search.get(&universe).is_none() {
                    search.cartesian_fallback()?;
                }
                return search.materialize(&universe);
            }
            // Emission budget exhausted: restart on the greedy path
        }

        self.optimize_greedy(graph)
    }

    /// Greedy pairing: repeatedly merge the connected pair with the lowest
    /// priced total, falling back to a cartesian product of the two
    /// smallest-row subsets when nothing connects. O(n^3) pair pricings.
    fn optimize_greedy(&self, graph: &HyperGraph) -> Result<JoinPlan> {
        let mut search = DpTable::new(graph, &self.cost_model);
        search.seed();

        let mut frontier: Vec<NodeSet> = (0..graph.node_count()).map(NodeSet::single).collect();
        while frontier.len() > 1 {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in 0..frontier.len() {
                for j in (i + 1)..frontier.len() {
                    let edges = graph.connecting_edges(&frontier[i], &frontier[j]);
                    if edges.is_empty() {
                        continue;
                    }
                    let total = search.price_pair(&frontier[i], &frontier[j], &edges)?;
                    if best.map_or(true, |(_, _, cost)| total < cost) {
                        best = Some((i, j, total));
                    }
                }
            }

            let (i, j) = match best {
                Some((i, j, _)) => (i, j),
                None => search.cheapest_cross_pair(&frontier),
            };
            // Remove the higher index first so the lower one stays valid
            let s2 = frontier.remove(j.max(i));
            let s1 = frontier.remove(j.min(i));
            let edges = graph.connecting_edges(&s1, &s2);
            search.apply_pair(&s1, &s2, &edges)?;
            let merged = s1.union(&s2);
            if search.get(&merged).is_none() {
                return Err(Error::missing_plan(&merged));
            }
            frontier.push(merged);
        }

        search.materialize(&frontier[0])
    }
}

/// The DP table plus the plan arena backing its entries
struct DpTable<'a, C: CostModel> {
    graph: &'a HyperGraph,
    cost_model: &'a C,
    arena: Vec<PlanNode>,
    table: FxHashMap<NodeSet, DpEntry>,
}

impl<'a, C: CostModel> DpTable<'a, C> {
    fn new(graph: &'a HyperGraph, cost_model: &'a C) -> Self {
        Self {
            graph,
            cost_model,
            arena: Vec::new(),
            table: FxHashMap::default(),
        }
    }

    fn get(&self, set: &NodeSet) -> Option<&DpEntry> {
        self.table.get(set)
    }

    /// Seed every singleton subset with its leaf plan: base rows, zero cost
    fn seed(&mut self) {
        for node in self.graph.nodes() {
            let plan = self.arena.len();
            self.arena.push(PlanNode::Leaf { node: node.index });
            self.table.insert(
                NodeSet::single(node.index),
                DpEntry {
                    cost: 0.0,
                    rows: node.rows,
                    plan,
                },
            );
        }
    }

    /// Price a pair in both orientations and record the cheaper result for
    /// the union if it beats the current entry. Pairs whose sides have no
    /// entry yet are skipped; they become reachable through the fallbacks.
    fn apply_pair(&mut self, s1: &NodeSet, s2: &NodeSet, edges: &[usize]) -> Result<()> {
        let (Some(e1), Some(e2)) = (self.table.get(s1), self.table.get(s2)) else {
            return Ok(());
        };
        let (e1, e2) = (e1.clone(), e2.clone());
        self.combine(&e1, &e2, s1.union(s2), edges)?;
        self.combine(&e2, &e1, s1.union(s2), edges)?;
        Ok(())
    }

    /// One orientation: `left` is the build side
    fn combine(
        &mut self,
        left: &DpEntry,
        right: &DpEntry,
        union: NodeSet,
        edges: &[usize],
    ) -> Result<()> {
        let edge_refs: SmallVec<[&Edge; 2]> =
            edges.iter().map(|&e| self.graph.edge(e)).collect();
        let estimate = self.cost_model.estimate_join(
            &SubsetStats {
                rows: left.rows,
                cost: left.cost,
            },
            &SubsetStats {
                rows: right.rows,
                cost: right.cost,
            },
            &edge_refs,
        );
        if !estimate.is_valid() {
            return Err(Error::InvalidCostEstimate {
                rows: estimate.rows,
                cost: estimate.cost,
            });
        }
        let total = left.cost + right.cost + estimate.cost;

        // Strictly cheaper replaces; ties keep the plan discovered first so
        // repeated optimizations of the same query shape reproduce the plan.
        let better = match self.table.get(&union) {
            None => true,
            Some(current) => total < current.cost,
        };
        if better {
            let plan = self.arena.len();
            self.arena.push(PlanNode::Join {
                left: left.plan,
                right: right.plan,
                edges: edges.iter().copied().collect(),
            });
            self.table.insert(
                union,
                DpEntry {
                    cost: total,
                    rows: estimate.rows,
                    plan,
                },
            );
        }
        Ok(())
    }

    /// Price both orientations of a candidate pair without recording anything
    fn price_pair(&self, s1: &NodeSet, s2: &NodeSet, edges: &[usize]) -> Result<f64> {
        let e1 = self.table.get(s1).ok_or_else(|| Error::missing_plan(s1))?;
        let e2 = self.table.get(s2).ok_or_else(|| Error::missing_plan(s2))?;
        let edge_refs: SmallVec<[&Edge; 2]> =
            edges.iter().map(|&e| self.graph.edge(e)).collect();

        let mut best = f64::INFINITY;
        for (left, right) in [(e1, e2), (e2, e1)] {
            let estimate = self.cost_model.estimate_join(
                &SubsetStats {
                    rows: left.rows,
                    cost: left.cost,
                },
                &SubsetStats {
                    rows: right.rows,
                    cost: right.cost,
                },
                &edge_refs,
            );
            if !estimate.is_valid() {
                return Err(Error::InvalidCostEstimate {
                    rows: estimate.rows,
                    cost: estimate.cost,
                });
            }
            best = best.min(left.cost + right.cost + estimate.cost);
        }
        Ok(best)
    }

    /// Indices of the two smallest-row frontier sets, deterministic on ties
    fn cheapest_cross_pair(&self, frontier: &[NodeSet]) -> (usize, usize) {
        let mut order: Vec<usize> = (0..frontier.len()).collect();
        order.sort_by(|&a, &b| {
            let ra = self.table[&frontier[a]].rows;
            let rb = self.table[&frontier[b]].rows;
            ra.total_cmp(&rb)
                .then_with(|| frontier[a].cmp(&frontier[b]))
        });
        (order[0], order[1])
    }

    /// Cover the universe with cartesian products when no licensed
    /// decomposition exists: combine the two cheapest covered subsets until
    /// one entry spans every relation. Explicit policy for disconnected
    /// query graphs, not an error.
    fn cartesian_fallback(&mut self) -> Result<()> {
        // Maximal recorded subsets form the starting cover; singletons
        // guarantee it completes.
        let mut keys: Vec<NodeSet> = self.table.keys().cloned().collect();
        keys.sort_by(|a, b| {
            b.cardinality()
                .cmp(&a.cardinality())
                .then_with(|| a.cmp(b))
        });
        let mut frontier: Vec<NodeSet> = Vec::new();
        let mut covered = NodeSet::empty();
        for key in keys {
            if !key.overlaps(&covered) {
                covered = covered.union(&key);
                frontier.push(key);
            }
        }

        while frontier.len() > 1 {
            let (i, j) = self.cheapest_cross_pair(&frontier);
            let s2 = frontier.remove(j.max(i));
            let s1 = frontier.remove(j.min(i));
            // A connecting edge may exist here when one side could not be
            // built through licensed pairs alone; apply it if so.
            let edges = self.graph.connecting_edges(&s1, &s2);
            self.apply_pair(&s1, &s2, &edges)?;
            let merged = s1.union(&s2);
            if self.table.get(&merged).is_none() {
                return Err(Error::missing_plan(&merged));
            }
            frontier.push(merged);
        }
        Ok(())
    }

    /// Walk the arena into an owned join tree for the subset's best entry
    fn materialize(&self, set: &NodeSet) -> Result<JoinPlan> {
        let entry = self.table.get(set).ok_or_else(|| Error::missing_plan(set))?;
        Ok(JoinPlan {
            root: self.build_tree(entry.plan),
            total_cost: entry.cost,
            output_rows: entry.rows,
        })
    }

    fn build_tree(&self, plan: usize) -> JoinTree {
        match &self.arena[plan] {
            PlanNode::Leaf { node } => JoinTree::Leaf {
                plan: self.graph.node(*node).plan,
            },
            PlanNode::Join { left, right, edges } => JoinTree::Join {
                left: Box::new(self.build_tree(*left)),
                right: Box::new(self.build_tree(*right)),
                operators: edges.iter().map(|&e| self.graph.edge(e).op).collect(),
            },
        }
    }
}
