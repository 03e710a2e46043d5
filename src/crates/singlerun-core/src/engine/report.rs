//! Execution reports

use crate::logging::format_duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// What happened to one unit during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// The unit ran and returned `output`
    Invoked { output: Value },
    /// The unit already succeeded for the tenant and was skipped
    Skipped,
}

/// Outcome of one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub unit: String,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

/// Result of executing a registered plan once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub execution_id: Uuid,
    pub plan: String,
    pub tenant: String,
    pub units: Vec<UnitReport>,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl ExecutionReport {
    /// Names of units that were invoked, in order
    pub fn invoked(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::Invoked { .. }))
            .map(|u| u.unit.as_str())
            .collect()
    }

    /// Names of units that were skipped, in order
    pub fn skipped(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, UnitOutcome::Skipped))
            .map(|u| u.unit.as_str())
            .collect()
    }

    /// How many times `unit` was invoked in this run
    pub fn invocation_count(&self, unit: &str) -> usize {
        self.invoked().into_iter().filter(|name| *name == unit).count()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "plan '{}' for tenant '{}': {} invoked, {} skipped in {}",
            self.plan,
            self.tenant,
            self.invoked().len(),
            self.skipped().len(),
            format_duration(self.elapsed)
        )
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
