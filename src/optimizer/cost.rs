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

//! Cost oracle contract for join order planning
//!
//! The planner does not compute statistics. For every candidate combination
//! of two relation subsets it asks a [`CostModel`] for the estimated output
//! row count and the cost of the join step; the planner only orchestrates
//! *which* combinations get priced. Higher cost is strictly worse and costs
//! are assumed comparable across unrelated subsets.
//!
//! The left operand is the build side: a model may price the two orientations
//! of the same pair differently, and the planner tries both.
//!
//! [`DefaultCostModel`] is a selectivity-product model with relative-unit
//! constants. The constants are tuned empirically and do not correspond to
//! wall-clock time; hosts with real statistics should bring their own model.

use crate::optimizer::graph::Edge;

/// Cost constants for the default model
#[derive(Debug, Clone)]
pub struct CostConstants {
    /// Cost to produce one output row
    pub cpu_tuple_cost: f64,

    /// Cost per build-side (left) input row
    pub build_row_cost: f64,

    /// Cost per probe-side (right) input row
    pub probe_row_cost: f64,

    /// Multiplier applied to combinations with no licensing edge
    pub cross_product_penalty: f64,
}

impl Default for CostConstants {
    fn default() -> Self {
        DEFAULT_COST_CONSTANTS
    }
}

/// Default cost constants (relative units)
pub const DEFAULT_COST_CONSTANTS: CostConstants = CostConstants {
    cpu_tuple_cost: 0.01,
    build_row_cost: 0.02,
    probe_row_cost: 0.01,
    cross_product_penalty: 1000.0,
};

/// What the planner knows about one side of a candidate combination
#[derive(Debug, Clone, Copy)]
pub struct SubsetStats {
    /// Best known output row estimate for the subset
    pub rows: f64,
    /// Best known cumulative cost for the subset
    pub cost: f64,
}

/// The oracle's answer for one candidate combination
#[derive(Debug, Clone, Copy)]
pub struct JoinEstimate {
    /// Estimated output row count
    pub rows: f64,
    /// Estimated cost of this join step, excluding the inputs' own costs
    pub cost: f64,
}

impl JoinEstimate {
    /// True iff both numbers are finite and non-negative. The planner rejects
    /// invalid estimates as a hard failure instead of clamping them.
    pub fn is_valid(&self) -> bool {
        self.rows.is_finite() && self.rows >= 0.0 && self.cost.is_finite() && self.cost >= 0.0
    }
}

/// Cost oracle supplied by the host optimizer.
///
/// `edges` holds the hyperedges licensing the combination, most specific
/// first; it is empty exactly when the planner is pricing a cartesian
/// fallback. Implementations must be deterministic for a given input.
pub trait CostModel {
    /// Estimate output rows and step cost for joining `left` with `right`
    fn estimate_join(&self, left: &SubsetStats, right: &SubsetStats, edges: &[&Edge])
        -> JoinEstimate;
}

/// Selectivity-product cost model used when the host brings no statistics
#[derive(Debug, Clone, Default)]
pub struct DefaultCostModel {
    constants: CostConstants,
}

impl DefaultCostModel {
    /// Create a model with the default constants
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model with custom constants
    pub fn with_constants(constants: CostConstants) -> Self {
        Self { constants }
    }
}

impl CostModel for DefaultCostModel {
    fn estimate_join(
        &self,
        left: &SubsetStats,
        right: &SubsetStats,
        edges: &[&Edge],
    ) -> JoinEstimate {
        let c = &self.constants;

        // All applied predicates filter the cartesian product
        let mut rows = left.rows * right.rows;
        for edge in edges {
            rows *= edge.selectivity;
        }
        let rows = rows.max(1.0);

        let mut cost = rows * c.cpu_tuple_cost
            + left.rows * c.build_row_cost
            + right.rows * c.probe_row_cost;
        if edges.is_empty() {
            cost *= c.cross_product_penalty;
        }

        JoinEstimate { rows, cost }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NodeSet;
    use crate::optimizer::graph::{HyperGraphBuilder, OperatorId, PlanId};

    fn stats(rows: f64) -> SubsetStats {
        SubsetStats { rows, cost: 0.0 }
    }

    fn two_node_graph(selectivity: f64) -> crate::optimizer::graph::HyperGraph {
        let mut b = HyperGraphBuilder::new();
        let r0 = b.add_relation(PlanId(0), 100.0);
        let r1 = b.add_relation(PlanId(1), 100.0);
        b.add_join(
            NodeSet::single(r0),
            NodeSet::single(r1),
            OperatorId(0),
            selectivity,
        )
        .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_selectivity_scales_output_rows() {
        let graph = two_node_graph(0.01);
        let model = DefaultCostModel::new();
        let est = model.estimate_join(&stats(1000.0), &stats(500.0), &[graph.edge(0)]);
        assert!((est.rows - 5000.0).abs() < 1e-9);
        assert!(est.is_valid());
    }

    #[test]
    fn test_cross_product_penalized() {
        let graph = two_node_graph(1.0);
        let model = DefaultCostModel::new();
        let joined = model.estimate_join(&stats(100.0), &stats(100.0), &[graph.edge(0)]);
        let cross = model.estimate_join(&stats(100.0), &stats(100.0), &[]);
        assert!(cross.cost > joined.cost * 100.0);
    }

    #[test]
    fn test_orientation_matters() {
        // Build side is more expensive per row, so putting the big input on
        // the left must cost more.
        let graph = two_node_graph(0.1);
        let model = DefaultCostModel::new();
        let big_left = model.estimate_join(&stats(10_000.0), &stats(10.0), &[graph.edge(0)]);
        let big_right = model.estimate_join(&stats(10.0), &stats(10_000.0), &[graph.edge(0)]);
        assert!(big_left.cost > big_right.cost);
        assert_eq!(big_left.rows, big_right.rows);
    }

    #[test]
    fn test_rows_floor_at_one() {
        let graph = two_node_graph(0.000001);
        let model = DefaultCostModel::new();
        let est = model.estimate_join(&stats(2.0), &stats(2.0), &[graph.edge(0)]);
        assert_eq!(est.rows, 1.0);
    }

    #[test]
    fn test_estimate_validity() {
        assert!(JoinEstimate {
            rows: 1.0,
            cost: 0.0
        }
        .is_valid());
        assert!(!JoinEstimate {
            rows: -1.0,
            cost: 0.0
        }
        .is_valid());
        assert!(!JoinEstimate {
            rows: 1.0,
            cost: f64::NAN
        }
        .is_valid());
        assert!(!JoinEstimate {
            rows: f64::INFINITY,
            cost: 1.0
        }
        .is_valid());
    }
}
