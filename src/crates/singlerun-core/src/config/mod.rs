//! Engine configuration
//!
//! [`EngineConfig`] collects the settings a run needs beyond the registry
//! definition itself. Values come from environment variables with the
//! [`ENV_PREFIX`] prefix and can be overridden field by field with
//! [`ConfigBuilder::merge`]:
//!
//! | variable | field |
//! |----------|-------|
//! | `SINGLERUN_TENANT` | tenant the plan runs for |
//! | `SINGLERUN_PLAN_TIMEOUT_SECS` | execution timeout |
//! | `SINGLERUN_STATE_FILE` | JSON file holding success markers |
//! | `SINGLERUN_SCHEDULE_RATE_MINUTES` | trigger period |
//!
//! Unset fields fall back to the registry definition.
//!
//! # Example
//!
//! ```rust
//! use singlerun_core::config::{ConfigBuilder, EngineConfig};
//!
//! let mut config = EngineConfig::from_env_with_defaults("SINGLERUN_DOC_")?;
//! config.merge(EngineConfig {
//!     tenant: Some("acme".to_string()),
//!     ..Default::default()
//! });
//! assert_eq!(config.tenant.as_deref(), Some("acme"));
//! # Ok::<(), singlerun_core::PlanError>(())
//! ```

mod env;

pub use env::{build_env_key, get_env, get_env_parse};

use crate::error::{PlanError, Result};
use crate::schedule::Schedule;
use crate::yaml::{RegistryDef, ScheduleDef};
use std::path::PathBuf;

/// Prefix of all engine environment variables
pub const ENV_PREFIX: &str = "SINGLERUN_";

/// Consistent validation, environment loading and merging for config types
pub trait ConfigBuilder: Default + Clone {
    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from `{prefix}{FIELD}` environment variables
    fn from_env(prefix: &str) -> Result<Self>;

    /// Overwrite fields of `self` that are set in `other`
    fn merge(&mut self, other: Self) -> &mut Self;

    /// Default configuration, validated
    fn build() -> Result<Self> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the environment, validated
    fn from_env_with_defaults(prefix: &str) -> Result<Self> {
        let mut config = Self::default();
        config.merge(Self::from_env(prefix)?);
        config.validate()?;
        Ok(config)
    }
}

/// Run settings layered over a registry definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub tenant: Option<String>,
    pub plan_timeout_secs: Option<u64>,
    pub state_file: Option<PathBuf>,
    pub schedule_rate_minutes: Option<u64>,
}

impl EngineConfig {
    /// Write the set fields into `def`
    pub fn apply(&self, def: &mut RegistryDef) {
        if let Some(tenant) = &self.tenant {
            def.tenant = tenant.clone();
        }
        if let Some(timeout) = self.plan_timeout_secs {
            def.timeout_secs = timeout;
        }
        if let Some(rate_minutes) = self.schedule_rate_minutes {
            def.schedule = Some(ScheduleDef { rate_minutes });
        }
    }
}

impl ConfigBuilder for EngineConfig {
    fn validate(&self) -> Result<()> {
        if matches!(&self.tenant, Some(tenant) if tenant.is_empty()) {
            return Err(PlanError::Configuration("tenant must not be empty".to_string()));
        }
        if self.plan_timeout_secs == Some(0) {
            return Err(PlanError::Configuration(
                "plan timeout must be greater than zero".to_string(),
            ));
        }
        if let Some(rate_minutes) = self.schedule_rate_minutes {
            Schedule::minutes(rate_minutes)?;
        }
        Ok(())
    }

    fn from_env(prefix: &str) -> Result<Self> {
        Ok(Self {
            tenant: get_env(&build_env_key(prefix, "tenant"))?,
            plan_timeout_secs: get_env_parse(&build_env_key(prefix, "plan_timeout_secs"))?,
            state_file: get_env(&build_env_key(prefix, "state_file"))?.map(PathBuf::from),
            schedule_rate_minutes: get_env_parse(&build_env_key(prefix, "schedule_rate_minutes"))?,
        })
    }

    fn merge(&mut self, other: Self) -> &mut Self {
        if other.tenant.is_some() {
            self.tenant = other.tenant;
        }
        if other.plan_timeout_secs.is_some() {
            self.plan_timeout_secs = other.plan_timeout_secs;
        }
        if other.state_file.is_some() {
            self.state_file = other.state_file;
        }
        if other.schedule_rate_minutes.is_some() {
            self.schedule_rate_minutes = other.schedule_rate_minutes;
        }
        self
    }
}
