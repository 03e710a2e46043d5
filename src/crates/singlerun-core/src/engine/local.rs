//! In-process execution engine
//!
//! [`LocalEngine`] registers finalized plans and runs them one step at a
//! time:
//!
//! | step | behaviour |
//! |------|-----------|
//! | `Pass` | no-op |
//! | `CheckState` | reads `(unit, tenant)` from the state store; the record (or its absence) becomes the branch input |
//! | `Branch` | string-compares `condition.field` of the branch input with `condition.equals` and runs exactly one outcome |
//! | `Invoke` | calls the unit's [`Invoker`] |
//! | `Skip` | no-op, reported as skipped |
//!
//! Steps run strictly sequentially. The whole run is bounded by the plan's
//! timeout. Any invocation or store failure stops the run; there is no retry.

use super::invoker::{InvocationContext, Invoker};
use super::report::{ExecutionReport, UnitOutcome, UnitReport};
use super::{PlanDefinition, PlanSink, RegisteredPlan};
use crate::error::{PlanError, Result};
use crate::logging::LogGuard;
use crate::plan::Step;
use async_trait::async_trait;
use serde_json::Value;
use singlerun_state::{StateKey, StateStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct EngineInner {
    store: Arc<dyn StateStore>,
    invokers: RwLock<HashMap<String, Arc<dyn Invoker>>>,
    plans: RwLock<HashMap<String, Arc<PlanDefinition>>>,
}

/// Engine running plans inside the current process
///
/// Cloning is cheap; clones share plans, invokers and the state store.
#[derive(Clone)]
pub struct LocalEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for LocalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEngine").finish_non_exhaustive()
    }
}

/// Mutable state of one run
struct RunState {
    execution_id: Uuid,
    tenant: String,
    /// Result of the last check step, `None` when no record existed
    last_check: Option<Value>,
    units: Vec<UnitReport>,
}

impl LocalEngine {
    /// Engine reading and writing success markers in `store`
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                invokers: RwLock::new(HashMap::new()),
                plans: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// State store shared with invokers
    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.inner.store)
    }

    /// Bind the code behind a unit name
    pub async fn register_invoker(&self, unit: impl Into<String>, invoker: Arc<dyn Invoker>) {
        let unit = unit.into();
        if self
            .inner
            .invokers
            .write()
            .await
            .insert(unit.clone(), invoker)
            .is_some()
        {
            debug!(unit = %unit, "replaced invoker");
        }
    }

    /// Definition registered under `name`
    pub async fn plan(&self, name: &str) -> Option<Arc<PlanDefinition>> {
        self.inner.plans.read().await.get(name).cloned()
    }

    /// Names of registered plans, sorted
    pub async fn plan_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.plans.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run the plan registered under `name` once
    ///
    /// # Errors
    ///
    /// - [`PlanError::NotRegistered`] for an unknown plan
    /// - [`PlanError::Timeout`] if the run exceeds the plan's timeout
    /// - [`PlanError::Invocation`] if a unit fails or has no invoker
    /// - [`PlanError::State`] if the state store fails
    pub async fn execute(&self, name: &str) -> Result<ExecutionReport> {
        let definition = self
            .plan(name)
            .await
            .ok_or_else(|| PlanError::NotRegistered(name.to_string()))?;

        let _guard = LogGuard::info(format!("plan '{}'", name));
        let timeout = definition.timeout();

        match tokio::time::timeout(timeout, self.run(&definition)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(plan = %name, timeout_ms = timeout.as_millis() as u64, "plan timed out");
                Err(PlanError::Timeout {
                    operation: format!("plan '{}'", name),
                    duration_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn run(&self, definition: &PlanDefinition) -> Result<ExecutionReport> {
        let started = Instant::now();
        let plan = definition.plan();
        let mut state = RunState {
            execution_id: Uuid::new_v4(),
            tenant: plan.tenant().to_string(),
            last_check: None,
            units: Vec::with_capacity(plan.len()),
        };

        info!(
            plan = %definition.name(),
            tenant = %state.tenant,
            execution_id = %state.execution_id,
            "executing plan"
        );

        for step in plan.steps() {
            self.run_step(step, &mut state).await?;
        }

        Ok(ExecutionReport {
            execution_id: state.execution_id,
            plan: definition.name().to_string(),
            tenant: state.tenant,
            units: state.units,
            elapsed: started.elapsed(),
        })
    }

    async fn run_step(&self, step: &Step, state: &mut RunState) -> Result<()> {
        debug!(step = %step.id(), "running step");
        match step {
            Step::CheckState { unit, tenant } => {
                let record = self
                    .inner
                    .store
                    .get(&StateKey::new(unit.as_str(), tenant.as_str()))
                    .await?;
                state.last_check = record.map(serde_json::to_value).transpose()?;
                debug!(unit = %unit, found = state.last_check.is_some(), "state checked");
                Ok(())
            }
            Step::Branch {
                unit,
                condition,
                on_match,
                otherwise,
            } => {
                let matched = condition.evaluate(state.last_check.take().as_ref());
                debug!(unit = %unit, matched, "branch evaluated");
                let chosen = if matched { on_match } else { otherwise };
                self.run_leaf(chosen, state).await
            }
            leaf => self.run_leaf(leaf, state).await,
        }
    }

    /// Steps allowed as branch outcomes and at top level
    async fn run_leaf(&self, step: &Step, state: &mut RunState) -> Result<()> {
        match step {
            Step::Pass { .. } => Ok(()),
            Step::Skip { unit } => {
                info!(unit = %unit, tenant = %state.tenant, "skipping unit, already succeeded");
                state.units.push(UnitReport {
                    unit: unit.clone(),
                    outcome: UnitOutcome::Skipped,
                });
                Ok(())
            }
            Step::Invoke { unit } => {
                let output = self.invoke(unit, state).await?;
                state.units.push(UnitReport {
                    unit: unit.clone(),
                    outcome: UnitOutcome::Invoked { output },
                });
                Ok(())
            }
            Step::CheckState { unit, .. } | Step::Branch { unit, .. } => Err(PlanError::Validation(format!(
                "step '{}' for unit '{}' cannot be a branch outcome",
                step.id(),
                unit
            ))),
        }
    }

    async fn invoke(&self, unit: &str, state: &RunState) -> Result<Value> {
        let invoker = self
            .inner
            .invokers
            .read()
            .await
            .get(unit)
            .cloned()
            .ok_or_else(|| PlanError::invocation(unit, "no invoker registered"))?;

        let ctx = InvocationContext::new(
            unit,
            state.tenant.as_str(),
            state.execution_id,
            Arc::clone(&self.inner.store),
        );

        let _guard = LogGuard::new(format!("invoke {}", unit));
        invoker
            .invoke(ctx)
            .await
            .map_err(|e| PlanError::invocation(unit, e.to_string()))
    }
}

#[async_trait]
impl PlanSink for LocalEngine {
    async fn register(&self, definition: PlanDefinition) -> Result<RegisteredPlan> {
        let registered = RegisteredPlan::for_definition(&definition);
        let name = definition.name().to_string();

        let previous = self
            .inner
            .plans
            .write()
            .await
            .insert(name.clone(), Arc::new(definition));
        if previous.is_some() {
            warn!(plan = %name, "replaced previously registered plan");
        }

        info!(plan = %name, units = registered.units, "plan registered");
        Ok(registered)
    }
}
