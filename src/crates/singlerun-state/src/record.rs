//! State record and key types
//!
//! A [`StateRecord`] is the persisted "this unit already succeeded" marker for
//! one work unit within one tenant. Records are addressed by a compound
//! [`StateKey`] of `(unit, tenant)`.
//!
//! The payload is opaque to the store. The orchestration layer only compares
//! it against [`SUCCESS_PAYLOAD`].

use crate::error::{Result, StateError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload value that marks a unit as having completed successfully
pub const SUCCESS_PAYLOAD: &str = "true";

/// Name of the record field the success check reads
pub const PAYLOAD_FIELD: &str = "payload";

/// Compound key addressing a state record
///
/// # Examples
///
/// ```rust
/// use singlerun_state::StateKey;
///
/// let key = StateKey::new("seed-database", "acme");
/// assert_eq!(key.to_string(), "seed-database#acme");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    /// Work unit name
    pub unit: String,
    /// Tenant identifier partitioning records
    pub tenant: String,
}

impl StateKey {
    /// Create a key for a unit within a tenant
    pub fn new(unit: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            tenant: tenant.into(),
        }
    }

    /// Reject keys with an empty component
    pub fn validate(&self) -> Result<()> {
        if self.unit.is_empty() {
            return Err(StateError::Invalid("unit is required".to_string()));
        }
        if self.tenant.is_empty() {
            return Err(StateError::Invalid("tenant is required".to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.unit, self.tenant)
    }
}

/// Persisted marker for a work unit's last run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Record key
    #[serde(flatten)]
    pub key: StateKey,

    /// Opaque payload written by the unit; `"true"` means success
    pub payload: String,

    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    /// Create a record with an arbitrary payload, stamped now
    pub fn new(key: StateKey, payload: impl Into<String>) -> Self {
        Self {
            key,
            payload: payload.into(),
            updated_at: Utc::now(),
        }
    }

    /// Create a record carrying the success sentinel
    pub fn succeeded(key: StateKey) -> Self {
        Self::new(key, SUCCESS_PAYLOAD)
    }

    /// Whether the payload equals the success sentinel
    pub fn is_success(&self) -> bool {
        self.payload == SUCCESS_PAYLOAD
    }
}
