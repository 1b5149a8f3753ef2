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

//! Error types for Hyperjoin
//!
//! Every error aborts the join-ordering pass for the current query. The
//! computation is deterministic, so nothing is retried; the host optimizer is
//! expected to fall back to its default join sequence on failure.

use thiserror::Error;

/// Result type alias for Hyperjoin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for join ordering
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Graph construction errors
    // =========================================================================
    /// Hyperedge with an empty left or right side
    #[error("edge {edge} has an empty side")]
    EmptyEdgeSide { edge: usize },

    /// Hyperedge whose sides share a node
    #[error("edge {edge} has overlapping left and right sides")]
    OverlappingEdgeSides { edge: usize },

    /// Hyperedge referencing a node outside the graph universe
    #[error("edge {edge} references unknown node {node}")]
    UnknownNode { edge: usize, node: usize },

    /// Selectivity outside (0, 1]
    #[error("edge {edge} has selectivity {selectivity} outside (0, 1]")]
    InvalidSelectivity { edge: usize, selectivity: f64 },

    /// Reordering invoked on a graph without relations
    #[error("hypergraph has no relations")]
    EmptyGraph,

    // =========================================================================
    // Planning errors
    // =========================================================================
    /// The cost model returned a negative or non-finite estimate
    #[error("cost model returned invalid estimate: rows={rows}, cost={cost}")]
    InvalidCostEstimate { rows: f64, cost: f64 },

    /// The planner needed a best-plan entry that was never recorded
    #[error("no plan recorded for subset {subset}")]
    MissingPlan { subset: String },

    /// Internal error for unexpected conditions
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create a new MissingPlan error
    pub fn missing_plan(subset: impl std::fmt::Debug) -> Self {
        Error::MissingPlan {
            subset: format!("{:?}", subset),
        }
    }

    /// Check if this is a graph-construction error
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyEdgeSide { .. }
                | Error::OverlappingEdgeSides { .. }
                | Error::UnknownNode { .. }
                | Error::InvalidSelectivity { .. }
                | Error::EmptyGraph
        )
    }

    /// Check if this is a planning error
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidCostEstimate { .. } | Error::MissingPlan { .. } | Error::Internal { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::EmptyEdgeSide { edge: 3 }.to_string(),
            "edge 3 has an empty side"
        );
        assert_eq!(
            Error::OverlappingEdgeSides { edge: 0 }.to_string(),
            "edge 0 has overlapping left and right sides"
        );
        assert_eq!(
            Error::UnknownNode { edge: 1, node: 9 }.to_string(),
            "edge 1 references unknown node 9"
        );
        assert_eq!(Error::EmptyGraph.to_string(), "hypergraph has no relations");
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::EmptyEdgeSide { edge: 0 }.is_construction_error());
        assert!(Error::EmptyGraph.is_construction_error());
        assert!(!Error::EmptyGraph.is_planning_error());

        let cost_err = Error::InvalidCostEstimate {
            rows: -1.0,
            cost: f64::NAN,
        };
        assert!(cost_err.is_planning_error());
        assert!(!cost_err.is_construction_error());
        assert!(Error::internal("oops").is_planning_error());
    }
}
