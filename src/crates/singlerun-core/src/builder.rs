//! Chain builder - turns a registry into a linear plan
//!
//! [`ChainBuilder`] folds a [`Registry`] into a [`Chain`] in insertion order.
//! For every unit it emits exactly one segment:
//!
//! - **direct** (`idempotent == false`): `[invoke]`
//! - **guarded** (`idempotent == true`): `[check, branch(skip | invoke)]`
//!
//! The builder never reorders units, never executes anything and performs no
//! I/O. Step nodes come from a [`StepFactory`], so the same fold can target
//! any execution engine. [`PlanStepFactory`] emits the crate's own [`Step`]
//! enum.
//!
//! # Example
//!
//! ```rust
//! use singlerun_core::{ChainBuilder, Registry, Step};
//!
//! let registry = Registry::builder()
//!     .unit("notify", false)?
//!     .unit("seed", true)?
//!     .build();
//!
//! let plan = ChainBuilder::new("acme")?.build(Step::pass("Start"), &registry);
//!
//! assert_eq!(plan.unit_names(), vec!["notify", "seed"]);
//! assert_eq!(plan.guarded_units(), vec!["seed"]);
//! # Ok::<(), singlerun_core::PlanError>(())
//! ```

use crate::error::{PlanError, Result};
use crate::plan::{Chain, Condition, Segment, Step};
use crate::unit::{Registry, WorkUnit};
use tracing::debug;

/// Factory for the step nodes a plan is made of
///
/// Implement this to make the builder emit nodes for a different execution
/// engine. Factories must be pure: the same unit always yields an equivalent
/// node.
pub trait StepFactory {
    /// Node type produced
    type Step;

    /// Step invoking the unit
    fn invoke(&self, unit: &WorkUnit) -> Self::Step;

    /// Step reading the unit's state record for `tenant`
    fn check(&self, unit: &WorkUnit, tenant: &str) -> Self::Step;

    /// No-op step taken when the unit already succeeded
    fn skip(&self, unit: &WorkUnit) -> Self::Step;

    /// Two-way choice following a check step
    fn branch(
        &self,
        unit: &WorkUnit,
        condition: Condition,
        on_match: Self::Step,
        otherwise: Self::Step,
    ) -> Self::Step;
}

/// Factory emitting [`Step`] nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanStepFactory;

impl StepFactory for PlanStepFactory {
    type Step = Step;

    fn invoke(&self, unit: &WorkUnit) -> Step {
        Step::Invoke {
            unit: unit.name.clone(),
        }
    }

    fn check(&self, unit: &WorkUnit, tenant: &str) -> Step {
        Step::CheckState {
            unit: unit.name.clone(),
            tenant: tenant.to_string(),
        }
    }

    fn skip(&self, unit: &WorkUnit) -> Step {
        Step::Skip {
            unit: unit.name.clone(),
        }
    }

    fn branch(&self, unit: &WorkUnit, condition: Condition, on_match: Step, otherwise: Step) -> Step {
        Step::Branch {
            unit: unit.name.clone(),
            condition,
            on_match: Box::new(on_match),
            otherwise: Box::new(otherwise),
        }
    }
}

/// Builds linear plans from registries for one tenant
#[derive(Debug, Clone)]
pub struct ChainBuilder<F = PlanStepFactory> {
    factory: F,
    tenant: String,
}

impl ChainBuilder<PlanStepFactory> {
    /// Builder emitting [`Step`] nodes for `tenant`
    ///
    /// # Errors
    ///
    /// [`PlanError::Configuration`] if `tenant` is empty.
    pub fn new(tenant: impl Into<String>) -> Result<Self> {
        Self::with_factory(PlanStepFactory, tenant)
    }
}

impl<F: StepFactory> ChainBuilder<F> {
    /// Builder using a custom step factory
    pub fn with_factory(factory: F, tenant: impl Into<String>) -> Result<Self> {
        let tenant = tenant.into();
        if tenant.is_empty() {
            return Err(PlanError::Configuration("tenant must not be empty".to_string()));
        }
        Ok(Self { factory, tenant })
    }

    /// Tenant the check steps read records for
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Fold the registry into a chain starting at `initial`
    pub fn build(&self, initial: F::Step, registry: &Registry) -> Chain<F::Step> {
        let mut chain = Chain::starting_at(self.tenant.clone(), initial);

        for unit in registry {
            if unit.idempotent {
                self.emit_guarded(&mut chain, unit);
            } else {
                self.emit_direct(&mut chain, unit);
            }
        }

        debug!(
            tenant = %self.tenant,
            units = registry.len(),
            guarded = chain.guarded_units().len(),
            "built chain"
        );
        chain
    }

    /// Append `[invoke]` for a unit
    pub fn emit_direct(&self, chain: &mut Chain<F::Step>, unit: &WorkUnit) {
        debug!(unit = %unit.name, "emit direct segment");
        chain.push(Segment {
            unit: unit.name.clone(),
            guarded: false,
            steps: vec![self.factory.invoke(unit)],
        });
    }

    /// Append `[check, branch(skip | invoke)]` for a unit
    pub fn emit_guarded(&self, chain: &mut Chain<F::Step>, unit: &WorkUnit) {
        debug!(unit = %unit.name, tenant = %self.tenant, "emit guarded segment");
        let check = self.factory.check(unit, &self.tenant);
        let branch = self.factory.branch(
            unit,
            Condition::succeeded(),
            self.factory.skip(unit),
            self.factory.invoke(unit),
        );
        chain.push(Segment {
            unit: unit.name.clone(),
            guarded: true,
            steps: vec![check, branch],
        });
    }
}
