//! # singlerun-state - Success Markers for Run-Once Units
//!
//! Trait-based storage for the "has this unit already succeeded?" markers
//! that guard idempotent work units.
//!
//! ## Overview
//!
//! - [`StateKey`] - compound `(unit, tenant)` key
//! - [`StateRecord`] - persisted marker with an opaque `payload`
//! - [`StateStore`] - async key-value trait implemented by backends
//! - [`InMemoryStateStore`] - reference implementation for tests and demos
//! - [`FileStateStore`] - JSON-file persistence for local runs
//!
//! A record is created the first time a unit succeeds, overwritten on every
//! re-run, and never deleted by the orchestration layer. A unit counts as
//! succeeded only when its payload equals [`SUCCESS_PAYLOAD`]; an absent
//! record means "not yet succeeded".
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use singlerun_state::{InMemoryStateStore, StateKey, StateRecord, StateStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStateStore::new();
//!     let key = StateKey::new("create-admin-user", "tenant-1");
//!
//!     if !store.has_succeeded(&key).await? {
//!         // ... do the work ...
//!         store.put(StateRecord::succeeded(key)).await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod file;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{Result, StateError};
pub use file::FileStateStore;
pub use memory::InMemoryStateStore;
pub use record::{StateKey, StateRecord, PAYLOAD_FIELD, SUCCESS_PAYLOAD};
pub use traits::StateStore;
