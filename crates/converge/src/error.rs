//! Graph-construction errors.
//!
//! These are fatal before any provider call: a graph that fails
//! validation never reaches the diff engine or the executor.

use thiserror::Error;

/// Errors raised while building or validating a resource graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A logical id was declared twice
    #[error("duplicate logical id: {id}")]
    DuplicateId {
        /// The offending logical id
        id: String,
    },

    /// The dependency relation contains a cycle
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle {
        /// The ids forming the cycle, first id repeated at the end
        path: Vec<String>,
    },

    /// A dependency references a logical id that is not in the graph
    #[error("resource '{id}' depends on unknown id '{reference}'")]
    DanglingReference {
        /// The resource holding the bad reference
        id: String,
        /// The unknown logical id it references
        reference: String,
    },
}

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;
