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

//! Join order search
//!
//! Data flows strictly leaf to root: node sets ([`crate::common::NodeSet`])
//! feed the hypergraph model, the enumerator walks the frozen graph, and the
//! planner turns emitted pairs into the cheapest join tree.
//!
//! ## Modules
//!
//! - `graph` - Hypergraph model: nodes, hyperedges, builder, adjacency
//! - `enumerate` - Connected subgraph / complement pair enumeration
//! - `cost` - Cost oracle contract and the default cost model
//! - `plan` - Dynamic-programming driver, fallbacks, and the final join tree

pub mod cost;
pub mod enumerate;
pub mod graph;
pub mod plan;

pub use cost::{
    CostConstants, CostModel, DefaultCostModel, JoinEstimate, SubsetStats, DEFAULT_COST_CONSTANTS,
};

pub use enumerate::SubgraphEnumerator;

pub use graph::{Edge, HyperGraph, HyperGraphBuilder, JoinExpr, Node, OperatorId, PlanId};

pub use plan::{JoinPlan, JoinReorderer, JoinTree, ReorderConfig};
