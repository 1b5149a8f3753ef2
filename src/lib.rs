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

//! # Hyperjoin - Join order search for cost-based SQL optimizers
//!
//! Hyperjoin is the join ordering core of a cost-based query optimizer. It
//! models a multi-way join query as a hypergraph (relations as nodes, join
//! predicates as hyperedges connecting two disjoint relation sets) and runs a
//! DPhyp-style connected-subgraph / connected-complement enumeration to find,
//! for every connected relation subset, the cheapest way to build it from two
//! smaller connected subsets. The final plan for the full relation set is the
//! lowest-estimated-cost join tree for the whole query.
//!
//! The crate does not execute queries, compute statistics, or pick physical
//! join algorithms. Leaf plans and join operators are opaque integer handles
//! owned by the host optimizer; cardinality and cost estimation is delegated
//! to a [`CostModel`] implementation supplied by the host.
//!
//! ## Quick Start
//!
//! ```rust
//! use hyperjoin::{HyperGraphBuilder, JoinExpr, JoinReorderer, OperatorId, PlanId};
//!
//! // (orders JOIN users ON ...) JOIN items ON ...
//! let expr = JoinExpr::join(
//!     JoinExpr::join(
//!         JoinExpr::relation(PlanId(0), 10_000.0),
//!         JoinExpr::relation(PlanId(1), 500.0),
//!         OperatorId(0),
//!         0.001,
//!     ),
//!     JoinExpr::relation(PlanId(2), 2_000.0),
//!     OperatorId(1),
//!     0.01,
//! );
//!
//! let graph = HyperGraphBuilder::from_join_tree(&expr).unwrap();
//! let plan = JoinReorderer::new().optimize(&graph).unwrap();
//!
//! assert_eq!(plan.root.leaf_count(), 3);
//! assert!(plan.total_cost.is_finite());
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Error types ([`Error`], [`Result`])
//! - [`common`] - Allocation-light data structures ([`NodeSet`])
//! - [`optimizer`] - Hypergraph model, subgraph enumeration, cost model, and
//!   the dynamic-programming join order planner

pub mod common;
pub mod core;
pub mod optimizer;

// Re-export main types for convenience
pub use crate::core::{Error, Result};

pub use common::NodeSet;

pub use optimizer::{
    CostConstants, CostModel, DefaultCostModel, Edge, HyperGraph, HyperGraphBuilder, JoinEstimate,
    JoinExpr, JoinPlan, JoinReorderer, JoinTree, Node, OperatorId, PlanId, ReorderConfig,
    SubgraphEnumerator, SubsetStats, DEFAULT_COST_CONSTANTS,
};
