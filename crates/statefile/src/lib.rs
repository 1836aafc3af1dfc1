//! # Statefile
//!
//! Durable persistence for provisioning state: the last-known physical
//! state of every resource in a deployment unit, one checksummed TOML
//! file per logical id.
//!
//! Guarantees:
//!
//! - **Atomic saves**: a record file is replaced via temp-file +
//!   rename, so a concurrent reader never observes a partial record.
//! - **Crash durability**: whatever the executor last saved is what the
//!   next run's diff sees, even after a crash mid-run.
//! - **Loud corruption**: every record carries a blake3 checksum; an
//!   unreadable or tampered record fails the whole load with
//!   [`StateError::Corruption`] rather than being silently dropped.
//!
//! [`FileStore`] implements `converge::StateStore`, so the engine
//! stays unaware of the on-disk format.

pub mod error;
pub mod store;

pub use error::{Result, StateError};
pub use store::FileStore;
