//! Execution plan model
//!
//! A plan is an initial step followed by one [`Segment`] per work unit, in
//! registry order:
//!
//! ```text
//! [initial] → [invoke A] → [check B] → [branch B: payload == "true" ? skip B : invoke B] → …
//!             └ segment A ┘ └────────────────── segment B ──────────────────────┘
//! ```
//!
//! [`Chain`] is generic over the step type so that alternative
//! [`StepFactory`](crate::builder::StepFactory) implementations can emit
//! their own node types. [`ExecutionPlan`] is the chain of the crate's own
//! serializable [`Step`] enum, which the local engine and the renderers
//! understand.

use serde::{Deserialize, Serialize};
use singlerun_state::{PAYLOAD_FIELD, SUCCESS_PAYLOAD};

/// String-equality test on one field of the previous step's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Field of the state record to read
    pub field: String,
    /// Value the field must equal for the condition to hold
    pub equals: String,
}

impl Condition {
    /// `payload == "true"`
    pub fn succeeded() -> Self {
        Self {
            field: PAYLOAD_FIELD.to_string(),
            equals: SUCCESS_PAYLOAD.to_string(),
        }
    }

    /// Evaluate against a looked-up record, `None` meaning no record
    ///
    /// A missing record, a missing field, or a non-string field all evaluate
    /// to `false`.
    pub fn evaluate(&self, record: Option<&serde_json::Value>) -> bool {
        record
            .and_then(|value| value.get(&self.field))
            .and_then(|field| field.as_str())
            .map(|field| field == self.equals)
            .unwrap_or(false)
    }
}

/// One node of an [`ExecutionPlan`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// No-op entry step the chain starts from
    Pass { name: String },

    /// Invoke the work unit
    Invoke { unit: String },

    /// Read the state record for `(unit, tenant)`
    CheckState { unit: String, tenant: String },

    /// Choose between two outcomes based on the preceding check
    Branch {
        unit: String,
        condition: Condition,
        on_match: Box<Step>,
        otherwise: Box<Step>,
    },

    /// No-op taken when the unit already succeeded
    Skip { unit: String },
}

impl Step {
    /// Entry step with a display name
    pub fn pass(name: impl Into<String>) -> Self {
        Step::Pass { name: name.into() }
    }

    /// Human-readable identifier, unique within a plan
    pub fn id(&self) -> String {
        match self {
            Step::Pass { name } => name.clone(),
            Step::Invoke { unit } => unit.clone(),
            Step::CheckState { unit, .. } => format!("Check {}", unit),
            Step::Branch { unit, .. } => format!("{} succeeded?", unit),
            Step::Skip { unit } => format!("Skip {}", unit),
        }
    }

    /// Work unit this step belongs to, `None` for the entry step
    pub fn unit(&self) -> Option<&str> {
        match self {
            Step::Pass { .. } => None,
            Step::Invoke { unit }
            | Step::CheckState { unit, .. }
            | Step::Branch { unit, .. }
            | Step::Skip { unit } => Some(unit),
        }
    }

    pub fn is_invoke(&self) -> bool {
        matches!(self, Step::Invoke { .. })
    }

    pub fn is_check(&self) -> bool {
        matches!(self, Step::CheckState { .. })
    }
}

/// Contiguous steps contributed by one work unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment<S> {
    /// Unit the segment was emitted for
    pub unit: String,
    /// Whether the segment starts with a state check
    pub guarded: bool,
    /// Steps in execution order
    pub steps: Vec<S>,
}

/// Linear plan: an initial step and one segment per unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain<S> {
    tenant: String,
    initial: S,
    segments: Vec<Segment<S>>,
}

/// A chain of the crate's own [`Step`] nodes
pub type ExecutionPlan = Chain<Step>;

impl<S> Chain<S> {
    /// A chain for `tenant` holding only its initial step
    pub fn starting_at(tenant: impl Into<String>, initial: S) -> Self {
        Self {
            tenant: tenant.into(),
            initial,
            segments: Vec::new(),
        }
    }

    /// Append a segment after the current last one
    ///
    /// The builder uses this for every registered unit. Callers may use it
    /// to extend a built chain with their own segments.
    pub fn then(mut self, segment: Segment<S>) -> Self {
        self.segments.push(segment);
        self
    }

    pub(crate) fn push(&mut self, segment: Segment<S>) {
        self.segments.push(segment);
    }

    /// Tenant the plan's state checks and invocations run for
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn initial(&self) -> &S {
        &self.initial
    }

    pub fn segments(&self) -> &[Segment<S>] {
        &self.segments
    }

    /// Number of segments (one per unit)
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Unit names in plan order
    pub fn unit_names(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.unit.as_str()).collect()
    }

    /// Units whose segments are guarded by a state check
    pub fn guarded_units(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter(|s| s.guarded)
            .map(|s| s.unit.as_str())
            .collect()
    }

    /// Top-level steps including the initial one
    pub fn step_count(&self) -> usize {
        1 + self.segments.iter().map(|s| s.steps.len()).sum::<usize>()
    }

    /// Top-level steps in execution order, initial step first
    pub fn steps(&self) -> impl Iterator<Item = &S> {
        std::iter::once(&self.initial).chain(self.segments.iter().flat_map(|s| s.steps.iter()))
    }
}
