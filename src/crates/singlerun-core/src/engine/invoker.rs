//! Work unit invokers
//!
//! An [`Invoker`] is the code behind a work unit. The engine calls it with an
//! [`InvocationContext`] carrying the unit name, tenant, execution id and the
//! state store. Idempotent units are expected to write their own success
//! marker through [`InvocationContext::record_success`]; the engine never
//! writes markers on a unit's behalf.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use singlerun_state::{StateKey, StateRecord, StateStore};
use std::sync::Arc;
use uuid::Uuid;

/// Error type invokers return
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything an invocation gets to see
#[derive(Clone)]
pub struct InvocationContext {
    /// Unit being invoked
    pub unit: String,
    /// Tenant the plan runs for
    pub tenant: String,
    /// Identifier of the current plan execution
    pub execution_id: Uuid,
    store: Arc<dyn StateStore>,
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("unit", &self.unit)
            .field("tenant", &self.tenant)
            .field("execution_id", &self.execution_id)
            .field("store", &"<state store>")
            .finish()
    }
}

impl InvocationContext {
    pub(crate) fn new(
        unit: impl Into<String>,
        tenant: impl Into<String>,
        execution_id: Uuid,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            unit: unit.into(),
            tenant: tenant.into(),
            execution_id,
            store,
        }
    }

    /// Key of this unit's state record
    pub fn state_key(&self) -> StateKey {
        StateKey::new(&self.unit, &self.tenant)
    }

    /// Write the success marker for this unit and tenant
    pub async fn record_success(&self) -> singlerun_state::Result<()> {
        self.store.put(StateRecord::succeeded(self.state_key())).await
    }

    /// Write an arbitrary payload for this unit and tenant
    pub async fn record(&self, payload: impl Into<String>) -> singlerun_state::Result<()> {
        self.store
            .put(StateRecord::new(self.state_key(), payload))
            .await
    }

    /// Shared state store
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }
}

/// Code executed for a work unit
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Run the unit; the returned value is kept in the execution report
    async fn invoke(&self, ctx: InvocationContext) -> Result<Value, BoxError>;
}

/// Adapter turning a closure into an [`Invoker`]
pub struct FnInvoker<F> {
    f: F,
}

#[async_trait]
impl<F> Invoker for FnInvoker<F>
where
    F: Fn(InvocationContext) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync,
{
    async fn invoke(&self, ctx: InvocationContext) -> Result<Value, BoxError> {
        (self.f)(ctx).await
    }
}

/// Wrap a closure as a shareable invoker
///
/// ```rust
/// use singlerun_core::engine::invoker_fn;
/// use serde_json::json;
///
/// let invoker = invoker_fn(|ctx| {
///     Box::pin(async move {
///         ctx.record_success().await?;
///         Ok(json!({"unit": ctx.unit}))
///     })
/// });
/// ```
pub fn invoker_fn<F>(f: F) -> Arc<dyn Invoker>
where
    F: Fn(InvocationContext) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync + 'static,
{
    Arc::new(FnInvoker { f })
}

/// Invoker that does nothing but record success
pub fn record_success_invoker() -> Arc<dyn Invoker> {
    invoker_fn(|ctx| {
        Box::pin(async move {
            ctx.record_success().await?;
            Ok(Value::Null)
        })
    })
}
