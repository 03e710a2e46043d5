//! Plan registration and execution
//!
//! Finalizing a plan hands it to a [`PlanSink`], the registration capability
//! of an execution engine. After finalization the plan is wrapped in an
//! immutable [`PlanDefinition`] and can no longer change.
//!
//! ```text
//! ChainBuilder::build ──► ExecutionPlan ──► finalize(sink, plan, name, timeout)
//!                                              │  validates name + timeout
//!                                              ▼
//!                                         PlanSink::register ──► RegisteredPlan
//! ```
//!
//! [`LocalEngine`] is the in-process engine shipped with the crate. It is a
//! `PlanSink` and runs registered plans against a
//! [`StateStore`](singlerun_state::StateStore) and a set of [`Invoker`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use singlerun_core::{finalize, ChainBuilder, LocalEngine, Registry, Step};
//! use singlerun_state::InMemoryStateStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::builder().unit("seed", true)?.build();
//!     let plan = ChainBuilder::new("acme")?.build(Step::pass("Start"), &registry);
//!
//!     let engine = LocalEngine::new(Arc::new(InMemoryStateStore::new()));
//!     engine.register_invoker("seed", singlerun_core::engine::record_success_invoker()).await;
//!
//!     finalize(&engine, plan, "deploy-hooks", Duration::from_secs(300)).await?;
//!     let report = engine.execute("deploy-hooks").await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

mod invoker;
mod local;
mod report;

pub use invoker::{invoker_fn, record_success_invoker, BoxError, FnInvoker, InvocationContext, Invoker};
pub use local::LocalEngine;
pub use report::{ExecutionReport, UnitOutcome, UnitReport};

use crate::error::{PlanError, Result};
use crate::plan::{Chain, Step};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// A finalized plan: named, bounded by a timeout, no longer mutable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDefinition<S = Step> {
    name: String,
    timeout: Duration,
    plan: Chain<S>,
}

impl<S> PlanDefinition<S> {
    /// Validate and wrap a plan
    ///
    /// # Errors
    ///
    /// [`PlanError::Configuration`] if `name` is empty or `timeout` is zero.
    /// Values are never clamped.
    pub fn new(plan: Chain<S>, name: impl Into<String>, timeout: Duration) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PlanError::Configuration("plan name must not be empty".to_string()));
        }
        if timeout.is_zero() {
            return Err(PlanError::Configuration(format!(
                "timeout for plan '{}' must be greater than zero",
                name
            )));
        }
        Ok(Self {
            name,
            timeout,
            plan,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn plan(&self) -> &Chain<S> {
        &self.plan
    }
}

/// Receipt returned by a sink after registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredPlan {
    /// Plan name
    pub name: String,
    /// Identifier assigned at registration
    pub id: Uuid,
    /// Registration time
    pub registered_at: DateTime<Utc>,
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Number of unit segments
    pub units: usize,
}

impl RegisteredPlan {
    /// Receipt for a definition, stamped now
    pub fn for_definition<S>(definition: &PlanDefinition<S>) -> Self {
        Self {
            name: definition.name.clone(),
            id: Uuid::new_v4(),
            registered_at: Utc::now(),
            timeout_ms: u64::try_from(definition.timeout.as_millis()).unwrap_or(u64::MAX),
            units: definition.plan.len(),
        }
    }
}

/// Registration capability of an execution engine
#[async_trait]
pub trait PlanSink<S: Send + 'static = Step>: Send + Sync {
    /// Take ownership of a finalized plan
    async fn register(&self, definition: PlanDefinition<S>) -> Result<RegisteredPlan>;
}

/// Finalize a plan and register it with `sink`
///
/// Validation happens before the sink is touched: a zero timeout or an empty
/// name fails with [`PlanError::Configuration`] and the sink is never called.
pub async fn finalize<S, K>(
    sink: &K,
    plan: Chain<S>,
    name: impl Into<String>,
    timeout: Duration,
) -> Result<RegisteredPlan>
where
    S: Send + 'static,
    K: PlanSink<S> + ?Sized,
{
    let definition = PlanDefinition::new(plan, name, timeout)?;
    let name = definition.name().to_string();
    let registered = sink.register(definition).await?;
    info!(plan = %name, id = %registered.id, units = registered.units, "plan finalized");
    Ok(registered)
}
