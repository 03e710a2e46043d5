//! Integration tests for building, finalizing and running plans
//!
//! These tests drive the builder, the local engine and the state stores
//! together the way a deployment hook runner would.

use serde_json::json;
use singlerun_core::engine::{invoker_fn, record_success_invoker, UnitOutcome};
use singlerun_core::visualization::{to_state_machine, VisualizationOptions};
use singlerun_core::{
    finalize, ChainBuilder, LocalEngine, PlanError, Registry, RegistryDef, Step, WorkUnit,
};
use singlerun_state::{FileStateStore, InMemoryStateStore, StateKey, StateRecord, StateStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn deploy_registry() -> Registry {
    Registry::builder()
        .register(WorkUnit::new("A"))
        .unwrap()
        .register(WorkUnit::idempotent("B"))
        .unwrap()
        .build()
}

/// Invoker counting its calls and recording success
fn counting_invoker(calls: Arc<AtomicUsize>) -> Arc<dyn singlerun_core::Invoker> {
    invoker_fn(move |ctx| {
        let calls = Arc::clone(&calls);
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            ctx.record_success().await?;
            Ok(json!({ "unit": ctx.unit, "tenant": ctx.tenant }))
        })
    })
}

#[tokio::test]
async fn test_mixed_registry_end_to_end() {
    let plan = ChainBuilder::new("acme")
        .unwrap()
        .build(Step::pass("Start"), &deploy_registry());

    // [invoke A] -> [check B] -> [branch: payload == "true" ? skip B : invoke B]
    let ids: Vec<String> = plan.steps().map(Step::id).collect();
    assert_eq!(ids, vec!["Start", "A", "Check B", "B succeeded?"]);

    let a_calls = Arc::new(AtomicUsize::new(0));
    let b_calls = Arc::new(AtomicUsize::new(0));
    let engine = LocalEngine::new(Arc::new(InMemoryStateStore::new()));
    engine.register_invoker("A", counting_invoker(Arc::clone(&a_calls))).await;
    engine.register_invoker("B", counting_invoker(Arc::clone(&b_calls))).await;

    let registered = finalize(&engine, plan, "deploy-hooks", Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(registered.units, 2);

    for _ in 0..3 {
        engine.execute("deploy-hooks").await.unwrap();
    }

    assert_eq!(a_calls.load(Ordering::SeqCst), 3);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_existing_marker_prevents_invocation() {
    let store = InMemoryStateStore::with_records(vec![StateRecord::succeeded(StateKey::new(
        "B", "acme",
    ))]);
    let engine = LocalEngine::new(Arc::new(store));
    let b_calls = Arc::new(AtomicUsize::new(0));
    engine.register_invoker("A", record_success_invoker()).await;
    engine.register_invoker("B", counting_invoker(Arc::clone(&b_calls))).await;

    let plan = ChainBuilder::new("acme")
        .unwrap()
        .build(Step::pass("Start"), &deploy_registry());
    finalize(&engine, plan, "deploy-hooks", Duration::from_secs(30))
        .await
        .unwrap();

    let report = engine.execute("deploy-hooks").await.unwrap();
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.skipped(), vec!["B"]);
    assert_eq!(report.units[1].outcome, UnitOutcome::Skipped);
}

#[tokio::test]
async fn test_unit_without_marker_is_retried_next_run() {
    // B succeeds without writing its marker, so it stays eligible
    let engine = LocalEngine::new(Arc::new(InMemoryStateStore::new()));
    let b_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&b_calls);
    engine.register_invoker("A", record_success_invoker()).await;
    engine
        .register_invoker(
            "B",
            invoker_fn(move |_ctx| {
                let calls = Arc::clone(&calls);
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(serde_json::Value::Null)
                })
            }),
        )
        .await;

    let plan = ChainBuilder::new("acme")
        .unwrap()
        .build(Step::pass("Start"), &deploy_registry());
    finalize(&engine, plan, "deploy-hooks", Duration::from_secs(30))
        .await
        .unwrap();

    engine.execute("deploy-hooks").await.unwrap();
    engine.execute("deploy-hooks").await.unwrap();
    assert_eq!(b_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_markers_persist_in_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let plan = ChainBuilder::new("acme")
        .unwrap()
        .build(Step::pass("Start"), &deploy_registry());

    {
        let engine = LocalEngine::new(Arc::new(FileStateStore::open(&path).await.unwrap()));
        engine.register_invoker("A", record_success_invoker()).await;
        engine.register_invoker("B", record_success_invoker()).await;
        finalize(&engine, plan.clone(), "deploy-hooks", Duration::from_secs(30))
            .await
            .unwrap();
        let report = engine.execute("deploy-hooks").await.unwrap();
        assert_eq!(report.invoked(), vec!["A", "B"]);
    }

    let store = FileStateStore::open(&path).await.unwrap();
    assert!(store.has_succeeded(&StateKey::new("B", "acme")).await.unwrap());

    let engine = LocalEngine::new(Arc::new(store));
    engine.register_invoker("A", record_success_invoker()).await;
    engine.register_invoker("B", record_success_invoker()).await;
    finalize(&engine, plan, "deploy-hooks", Duration::from_secs(30))
        .await
        .unwrap();
    let report = engine.execute("deploy-hooks").await.unwrap();
    assert_eq!(report.invoked(), vec!["A"]);
    assert_eq!(report.skipped(), vec!["B"]);
}

#[tokio::test]
async fn test_tenants_are_tracked_separately() {
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let registry = deploy_registry();

    let engine = LocalEngine::new(Arc::clone(&store));
    engine.register_invoker("A", record_success_invoker()).await;
    engine.register_invoker("B", record_success_invoker()).await;

    for tenant in ["acme", "globex"] {
        let plan = ChainBuilder::new(tenant)
            .unwrap()
            .build(Step::pass("Start"), &registry);
        finalize(&engine, plan, format!("hooks-{}", tenant), Duration::from_secs(30))
            .await
            .unwrap();
    }

    engine.execute("hooks-acme").await.unwrap();
    let globex = engine.execute("hooks-globex").await.unwrap();
    assert_eq!(globex.invoked(), vec!["A", "B"]);

    let acme = engine.execute("hooks-acme").await.unwrap();
    assert_eq!(acme.skipped(), vec!["B"]);
    assert_eq!(store.list_tenant("acme").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_zero_timeout_never_registers() {
    let engine = LocalEngine::new(Arc::new(InMemoryStateStore::new()));
    let plan = ChainBuilder::new("acme")
        .unwrap()
        .build(Step::pass("Start"), &deploy_registry());

    let result = finalize(&engine, plan, "deploy-hooks", Duration::ZERO).await;
    assert!(matches!(result, Err(PlanError::Configuration(_))));
    assert!(engine.plan_names().await.is_empty());
}

#[tokio::test]
async fn test_yaml_definition_to_state_machine() {
    let def = RegistryDef::from_str(
        r#"
name: deploy-hooks
tenant: acme
timeout_secs: 60
units:
  - name: A
  - name: B
    idempotent: true
"#,
    )
    .unwrap();

    let plan = def.build_plan().unwrap();
    let doc = to_state_machine(&plan, &VisualizationOptions::states()).unwrap();
    assert_eq!(doc["States"]["A"]["Next"], "Check B");
    assert_eq!(doc["States"]["B succeeded?"]["Choices"][0]["Variable"], "$.B.payload");

    let engine = LocalEngine::new(Arc::new(InMemoryStateStore::new()));
    engine.register_invoker("A", record_success_invoker()).await;
    engine.register_invoker("B", record_success_invoker()).await;
    let registered = finalize(&engine, plan, def.name.as_str(), def.timeout())
        .await
        .unwrap();
    assert_eq!(registered.timeout_ms, 60_000);
}
