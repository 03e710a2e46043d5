//! Work units and the ordered registry
//!
//! A [`WorkUnit`] is a named, invocable task. Units marked idempotent are
//! guarded by a state check in the generated plan; the rest are invoked on
//! every run.
//!
//! A [`Registry`] is an append-only, ordered list of units. Names are unique
//! and insertion order is execution order.
//!
//! ```rust
//! use singlerun_core::{Registry, WorkUnit};
//!
//! let registry = Registry::builder()
//!     .register(WorkUnit::new("notify-deploy"))?
//!     .register(WorkUnit::idempotent("seed-database"))?
//!     .build();
//!
//! assert_eq!(registry.names(), vec!["notify-deploy", "seed-database"]);
//! # Ok::<(), singlerun_core::PlanError>(())
//! ```

use crate::error::{PlanError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Longest accepted unit name
pub const MAX_UNIT_NAME_LEN: usize = 80;

fn unit_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("unit name pattern is valid"))
}

/// Check a unit name against the naming rules
///
/// Names become step identifiers in rendered plans, so they are limited to
/// ASCII letters, digits, `_`, `.` and `-`, at most [`MAX_UNIT_NAME_LEN`]
/// characters.
pub fn validate_unit_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PlanError::Validation("unit name must not be empty".to_string()));
    }
    if name.len() > MAX_UNIT_NAME_LEN {
        return Err(PlanError::Validation(format!(
            "unit name '{}' exceeds {} characters",
            name, MAX_UNIT_NAME_LEN
        )));
    }
    if !unit_name_pattern().is_match(name) {
        return Err(PlanError::Validation(format!(
            "unit name '{}' may only contain letters, digits, '_', '.' and '-'",
            name
        )));
    }
    Ok(())
}

/// A named task eligible for inclusion in an execution plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Unique name within a registry
    pub name: String,

    /// Guard this unit with a prior-success check
    #[serde(default)]
    pub idempotent: bool,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkUnit {
    /// A unit invoked on every run
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            idempotent: false,
            description: None,
        }
    }

    /// A unit skipped once it has succeeded for the tenant
    pub fn idempotent(name: impl Into<String>) -> Self {
        Self {
            idempotent: true,
            ..Self::new(name)
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered, immutable collection of uniquely named work units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registry {
    units: Vec<WorkUnit>,
}

impl Registry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build a registry from units in order, rejecting duplicates
    pub fn from_units(units: impl IntoIterator<Item = WorkUnit>) -> Result<Self> {
        let mut builder = Self::builder();
        for unit in units {
            builder = builder.register(unit)?;
        }
        Ok(builder.build())
    }

    /// Units in insertion order
    pub fn units(&self) -> &[WorkUnit] {
        &self.units
    }

    /// Unit names in insertion order
    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name.as_str()).collect()
    }

    /// Look up a unit by name
    pub fn get(&self, name: &str) -> Option<&WorkUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WorkUnit> {
        self.units.iter()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a WorkUnit;
    type IntoIter = std::slice::Iter<'a, WorkUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

/// Append-only builder for [`Registry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    units: Vec<WorkUnit>,
    names: HashSet<String>,
}

impl RegistryBuilder {
    /// Append a unit
    ///
    /// # Errors
    ///
    /// [`PlanError::Validation`] if the name is malformed or already
    /// registered.
    pub fn register(mut self, unit: WorkUnit) -> Result<Self> {
        validate_unit_name(&unit.name)?;
        if !self.names.insert(unit.name.clone()) {
            return Err(PlanError::Validation(format!(
                "unit '{}' is already registered",
                unit.name
            )));
        }
        self.units.push(unit);
        Ok(self)
    }

    /// Shorthand for registering a unit by name and flag
    pub fn unit(self, name: impl Into<String>, idempotent: bool) -> Result<Self> {
        let unit = if idempotent {
            WorkUnit::idempotent(name)
        } else {
            WorkUnit::new(name)
        };
        self.register(unit)
    }

    /// Freeze the registry
    pub fn build(self) -> Registry {
        Registry { units: self.units }
    }
}
