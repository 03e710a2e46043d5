//! YAML-based registry definitions
//!
//! ```yaml
//! name: deploy-hooks
//! description: Post-deploy tasks
//! tenant: acme
//! timeout_secs: 300
//! schedule:
//!   rate_minutes: 60
//! units:
//!   - name: notify-deploy
//!   - name: seed-database
//!     idempotent: true
//!     description: Load reference data once
//! ```

use crate::builder::ChainBuilder;
use crate::error::{PlanError, Result};
use crate::plan::{ExecutionPlan, Step};
use crate::schedule::Schedule;
use crate::unit::{Registry, WorkUnit};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Timeout used when a definition omits `timeout_secs`
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Name of the initial pass step of plans built from a definition
pub const START_STEP: &str = "Start";

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Top-level YAML registry definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDef {
    /// Plan name used at finalization
    pub name: String,

    /// Plan description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tenant the plan runs for
    pub tenant: String,

    /// Execution timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional periodic trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleDef>,

    /// Work units in execution order
    #[serde(default)]
    pub units: Vec<WorkUnit>,
}

/// Schedule section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDef {
    /// Minutes between runs
    pub rate_minutes: u64,
}

impl RegistryDef {
    /// Load a definition from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a definition from a YAML string
    pub fn from_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Starter definition written by `singlerun init`
    pub fn template(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some("Tasks run after every deployment".to_string()),
            tenant: "default".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            schedule: None,
            units: vec![
                WorkUnit::new("notify-deploy").with_description("Runs on every deployment"),
                WorkUnit::idempotent("seed-database")
                    .with_description("Runs until it succeeds once per tenant"),
            ],
        }
    }

    /// Validate the definition
    ///
    /// Checks the plan name, tenant, timeout, schedule rate, that at least
    /// one unit is listed, and that unit names are well-formed, unique and
    /// not [`START_STEP`].
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PlanError::Validation("plan name must not be empty".to_string()));
        }
        if self.tenant.is_empty() {
            return Err(PlanError::Validation(format!(
                "plan '{}' has no tenant",
                self.name
            )));
        }
        if self.timeout_secs == 0 {
            return Err(PlanError::Configuration(format!(
                "timeout_secs for plan '{}' must be greater than zero",
                self.name
            )));
        }
        self.schedule()?;

        if self.units.is_empty() {
            return Err(PlanError::Validation(format!(
                "plan '{}' lists no units",
                self.name
            )));
        }

        let mut names = HashSet::new();
        for unit in &self.units {
            crate::unit::validate_unit_name(&unit.name)?;
            if unit.name == START_STEP {
                return Err(PlanError::Validation(format!(
                    "unit name '{}' is reserved for the entry step",
                    START_STEP
                )));
            }
            if !names.insert(unit.name.as_str()) {
                return Err(PlanError::Validation(format!(
                    "Duplicate unit name: {}",
                    unit.name
                )));
            }
        }

        Ok(())
    }

    /// Registry of the listed units, in file order
    pub fn to_registry(&self) -> Result<Registry> {
        Registry::from_units(self.units.iter().cloned())
    }

    /// Validate and build the plan for the definition's tenant
    pub fn build_plan(&self) -> Result<ExecutionPlan> {
        self.validate()?;
        let registry = self.to_registry()?;
        Ok(ChainBuilder::new(self.tenant.as_str())?.build(Step::pass(START_STEP), &registry))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parsed schedule, if one is configured
    pub fn schedule(&self) -> Result<Option<Schedule>> {
        self.schedule
            .as_ref()
            .map(|s| Schedule::minutes(s.rate_minutes))
            .transpose()
    }

    /// Convert to a YAML string
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_definition() {
        let yaml = r#"
name: deploy-hooks
description: Post-deploy tasks
tenant: acme
timeout_secs: 120
schedule:
  rate_minutes: 30
units:
  - name: notify-deploy
  - name: seed-database
    idempotent: true
    description: Load reference data once
"#;

        let def = RegistryDef::from_str(yaml).unwrap();
        assert_eq!(def.name, "deploy-hooks");
        assert_eq!(def.tenant, "acme");
        assert_eq!(def.timeout(), Duration::from_secs(120));
        assert_eq!(def.units.len(), 2);
        assert!(!def.units[0].idempotent);
        assert!(def.units[1].idempotent);
        assert_eq!(def.schedule().unwrap().unwrap().expression(), "rate(30 minutes)");

        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
name: minimal
tenant: acme
units:
  - name: only
"#;

        let def = RegistryDef::from_str(yaml).unwrap();
        assert_eq!(def.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(def.schedule().unwrap().is_none());
        assert!(def.description.is_none());
    }

    #[test]
    fn test_build_plan_keeps_file_order() {
        let yaml = r#"
name: ordered
tenant: acme
units:
  - name: c
  - name: a
    idempotent: true
  - name: b
"#;

        let plan = RegistryDef::from_str(yaml).unwrap().build_plan().unwrap();
        assert_eq!(plan.unit_names(), vec!["c", "a", "b"]);
        assert_eq!(plan.guarded_units(), vec!["a"]);
        assert_eq!(plan.tenant(), "acme");
        assert_eq!(plan.initial(), &Step::pass(START_STEP));
    }

    #[test]
    fn test_validation_failures() {
        let base = RegistryDef::template("hooks");
        assert!(base.validate().is_ok());

        let mut def = base.clone();
        def.units.push(WorkUnit::new("notify-deploy"));
        assert!(matches!(def.validate(), Err(PlanError::Validation(_))));

        let mut def = base.clone();
        def.timeout_secs = 0;
        assert!(matches!(def.validate(), Err(PlanError::Configuration(_))));

        let mut def = base.clone();
        def.units.clear();
        assert!(def.validate().is_err());

        let mut def = base.clone();
        def.schedule = Some(ScheduleDef { rate_minutes: 0 });
        assert!(def.validate().is_err());

        let mut def = base.clone();
        def.units.push(WorkUnit::new("has space"));
        assert!(def.validate().is_err());

        let mut def = base;
        def.tenant.clear();
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_reserved_and_out_of_range_values() {
        let mut def = RegistryDef::template("hooks");
        def.units.push(WorkUnit::new(START_STEP));
        assert!(matches!(def.validate(), Err(PlanError::Validation(_))));

        let mut def = RegistryDef::template("hooks");
        def.units.push(WorkUnit::new("Done"));
        let plan = def.build_plan().unwrap();
        let options = crate::visualization::VisualizationOptions::ascii();
        assert!(crate::visualization::visualize(&plan, &options).is_ok());

        let def = RegistryDef::from_str(
            "name: hooks\ntenant: acme\nschedule:\n  rate_minutes: 18446744073709551615\nunits:\n  - name: a\n",
        )
        .unwrap();
        assert!(matches!(def.validate(), Err(PlanError::Configuration(_))));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let def = RegistryDef::template("hooks");
        let yaml = def.to_yaml().unwrap();
        assert_eq!(RegistryDef::from_str(&yaml).unwrap(), def);
    }

    #[test]
    fn test_malformed_yaml() {
        let result = RegistryDef::from_str("name: [unclosed");
        assert!(matches!(result, Err(PlanError::Yaml(_))));
    }
}
