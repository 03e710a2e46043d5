//! Error types for plan construction, registration and execution
//!
//! All errors implement `std::error::Error` via `thiserror`.
//!
//! # Error Hierarchy
//!
//! ```text
//! PlanError
//! ├── Validation      - Malformed units or registries (bad names, duplicates)
//! ├── Configuration   - Invalid settings (zero timeout, empty plan name)
//! ├── NotRegistered   - Running a plan name the engine does not know
//! ├── Invocation      - A work unit failed or has no invoker
//! ├── State           - State store failures
//! ├── Timeout         - Plan execution exceeded its timeout
//! ├── Serialization   - JSON errors
//! ├── Yaml            - Registry definition parse errors
//! └── Io              - File errors
//! ```
//!
//! # Missing State Records
//!
//! A unit with no State Record is *not* an error anywhere in this crate. The
//! guarded segment treats it as "not yet succeeded" and invokes the unit.
//!
//! # Example
//!
//! ```rust
//! use singlerun_core::error::PlanError;
//!
//! fn describe(err: &PlanError) -> &'static str {
//!     match err {
//!         PlanError::Configuration(_) => "fix the plan settings",
//!         PlanError::Invocation { .. } => "inspect the failing unit",
//!         PlanError::Timeout { .. } => "raise the timeout",
//!         _ => "see error message",
//!     }
//! }
//! ```

use thiserror::Error;

/// Result type alias for plan operations
pub type Result<T> = std::result::Result<T, PlanError>;

/// Errors raised by the builder, the engine and the definition loaders
#[derive(Error, Debug)]
pub enum PlanError {
    /// Registry or unit failed validation
    ///
    /// **Common causes**: duplicate unit name, empty or over-long name,
    /// characters outside `[A-Za-z0-9_.-]`.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid configuration value
    ///
    /// Raised by finalization when the timeout is not strictly positive or
    /// the plan name is empty, and by config loaders for bad values.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The engine has no plan registered under this name
    #[error("Plan not registered: {0}")]
    NotRegistered(String),

    /// A work unit invocation failed
    #[error("Unit '{unit}' failed: {error}")]
    Invocation {
        /// Name of the unit that failed
        unit: String,
        /// Error description
        error: String,
    },

    /// State store failure
    ///
    /// Wraps errors from `singlerun_state::StateError`.
    #[error("State store error: {0}")]
    State(#[from] singlerun_state::StateError),

    /// Plan execution exceeded its timeout
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out
        operation: String,
        /// Timeout in milliseconds
        duration_ms: u64,
    },

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlanError {
    /// Create an invocation error for a unit
    ///
    /// ```rust
    /// use singlerun_core::error::PlanError;
    ///
    /// let err = PlanError::invocation("seed-database", "connection refused");
    /// assert_eq!(err.to_string(), "Unit 'seed-database' failed: connection refused");
    /// ```
    pub fn invocation(unit: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Invocation {
            unit: unit.into(),
            error: error.into(),
        }
    }

    /// Whether this error is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
