//! # Converge
//!
//! A declarative provisioning engine: declare a resource graph, diff it
//! against last-known state, lower the changes into dependency-ordered
//! groups, and execute them against an external provider with retry and
//! abort semantics.
//!
//! ## Core Concepts
//!
//! - **Resource / ResourceGraph**: declared infrastructure entities and
//!   their dependency edges (unique ids, resolvable references, acyclic)
//! - **ChangePlan**: the diff between the graph and prior state - one
//!   create/update/replace/delete/no-op action per resource
//! - **ExecutionPlan**: the change plan lowered into ordered groups;
//!   actions in a group are independent and run concurrently
//! - **Executor**: applies groups in order against a [`Provider`],
//!   persisting [`StateRecord`]s through a [`StateStore`] as it goes
//!
//! ## Example
//!
//! ```ignore
//! use converge::{
//!     diff, execute, plan, CancelToken, ExecuteOptions, MemoryStore,
//!     NoObserver, Resource, ResourceGraph, UpdateInPlace,
//! };
//!
//! let mut graph = ResourceGraph::new();
//! graph.declare(Resource::new("v1", "network").with_property("cidr_block", "10.0.0.0/16"))?;
//! graph.declare(Resource::new("c1", "cluster").with_dependency("v1"))?;
//! graph.validate()?;
//!
//! let store = MemoryStore::new();
//! let changes = diff(&graph, &store.load()?, &UpdateInPlace);
//! let execution = plan(&changes, &graph)?;
//! let results = execute(
//!     &execution,
//!     &provider,
//!     &store,
//!     &ExecuteOptions::default(),
//!     &CancelToken::new(),
//!     &NoObserver,
//! )?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`Provider`]: the external control plane that physically creates,
//!   updates, and deletes resources
//! - [`StateStore`]: durable persistence of per-resource state records
//! - [`ReplacementPolicy`]: decides which property changes force a
//!   delete + create instead of an in-place update
//! - [`RunObserver`]: receives progress events during execution
//!
//! This keeps the engine free of any cloud SDK, storage format, or
//! terminal dependency.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod planner;
pub mod provider;
pub mod report;
pub mod resource;
pub mod retry;
pub mod state;

// Re-export main types at crate root
pub use context::{NoObserver, RunObserver};
pub use diff::{
    diff, ChangeAction, ChangeKind, ChangePlan, DiffSummary, ReplacementPolicy, UpdateInPlace,
};
pub use error::{GraphError, GraphResult};
pub use executor::{execute, CancelToken, ExecuteOptions};
pub use planner::{plan, ExecutionPlan, PlannedAction, PlannedOp};
pub use provider::{Provider, ProviderError, ProviderResult};
pub use report::{ActionOutcome, ActionResult, ReportEntry, RunReport, RunSummary};
pub use resource::{changed_keys, PropertyMap, PropertyValue, Resource, ResourceGraph};
pub use retry::{with_retry, NoCallback, RetryCallback, RetryConfig};
pub use state::{MemoryStore, RecordStatus, StateRecord, StateStore};
