//! # singlerun-core - Run-Once Step Plans
//!
//! Builds linear execution plans from an ordered registry of work units and
//! runs them so that idempotent units execute at most until they first
//! succeed for a tenant.
//!
//! ## Overview
//!
//! - **Registry** - ordered, uniquely named [`WorkUnit`]s ([`Registry`])
//! - **Builder** - folds a registry into a plan ([`ChainBuilder`])
//! - **Plan** - an initial step plus one [`Segment`] per unit ([`ExecutionPlan`])
//! - **Finalization** - names the plan, bounds it with a timeout and hands it
//!   to a [`PlanSink`] ([`finalize`])
//! - **Engine** - [`LocalEngine`] runs registered plans against a
//!   [`StateStore`](singlerun_state::StateStore)
//!
//! ## Plan Shape
//!
//! For a registry `{A: non-idempotent, B: idempotent}`:
//!
//! ```text
//! [Start] → [invoke A] → [check B] → [branch: payload == "true" ? skip B : invoke B]
//! ```
//!
//! Non-idempotent units are invoked on every run. Idempotent units are
//! preceded by a state check for `(unit, tenant)`; the unit is skipped when
//! the stored payload equals `"true"` and invoked otherwise, including when no
//! record exists. Writing the marker is the unit's own job.
//!
//! ## Quick Start
//!
//! ```rust
//! use singlerun_core::{finalize, ChainBuilder, LocalEngine, Registry, Step};
//! use singlerun_core::engine::record_success_invoker;
//! use singlerun_state::InMemoryStateStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> singlerun_core::Result<()> {
//! let registry = Registry::builder()
//!     .unit("notify", false)?
//!     .unit("seed", true)?
//!     .build();
//! let plan = ChainBuilder::new("acme")?.build(Step::pass("Start"), &registry);
//!
//! let engine = LocalEngine::new(Arc::new(InMemoryStateStore::new()));
//! engine.register_invoker("notify", record_success_invoker()).await;
//! engine.register_invoker("seed", record_success_invoker()).await;
//! finalize(&engine, plan, "deploy-hooks", Duration::from_secs(60)).await?;
//!
//! let first = engine.execute("deploy-hooks").await?;
//! assert_eq!(first.invoked(), vec!["notify", "seed"]);
//!
//! let second = engine.execute("deploy-hooks").await?;
//! assert_eq!(second.invoked(), vec!["notify"]);
//! assert_eq!(second.skipped(), vec!["seed"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`builder`] - chain builder and step factories
//! - [`config`] - environment-backed engine configuration
//! - [`engine`] - finalization, plan sinks and the local engine
//! - [`schedule`] - fixed-rate triggers
//! - [`visualization`] - DOT, Mermaid, ASCII and state-machine renderings
//! - [`yaml`] - registry definitions on disk

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod plan;
pub mod schedule;
pub mod unit;
pub mod visualization;
pub mod yaml;

pub use builder::{ChainBuilder, PlanStepFactory, StepFactory};
pub use engine::{
    finalize, ExecutionReport, InvocationContext, Invoker, LocalEngine, PlanDefinition, PlanSink,
    RegisteredPlan,
};
pub use error::{PlanError, Result};
pub use plan::{Chain, Condition, ExecutionPlan, Segment, Step};
pub use schedule::{spawn_trigger, Schedule, TriggerHandle};
pub use unit::{Registry, RegistryBuilder, WorkUnit};
pub use visualization::{visualize, VisualizationFormat, VisualizationOptions};
pub use yaml::RegistryDef;
