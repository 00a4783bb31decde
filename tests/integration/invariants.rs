//! Universal invariants that must hold for every state reachable through the
//! public APIs.

use aegis_brain::{EchoProvider, LlmRouter, RouterConfig, ThinkOptions};
use aegis_policy::{ApprovalQueue, RiskLevel};
use aegis_swarm::{
    Budget, Coordinator, CoordinatorConfig, DagConfig, Executor, ExecutorOutput, FnExecutor,
    NodeType, PolicyDecision, PolicyGuard, SharedContext, TaskDag, TaskNode,
};
use aegis_kernel::{WatchTarget, Watchdog, WatchdogConfig};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn monotonic_results_and_versions() {
    let ctx = SharedContext::new("task");

    let v1 = ctx.add_result("a", "planner", json!("first"), 10).await;
    let first = ctx.get_result("a").await.unwrap();

    let v2 = ctx.add_result("b", "coder", json!("second"), 20).await;
    assert!(v2 > v1);

    // The original result is still readable, unchanged.
    let still_first = ctx.get_result("a").await.unwrap();
    assert_eq!(still_first.output, first.output);
    assert_eq!(still_first.tokens_used, first.tokens_used);
}

#[tokio::test]
async fn reservation_never_exceeds_thirty_percent_of_remaining() {
    let budget = Budget::new(10_000);
    let mut remaining = 10_000u64;

    for agent in ["a", "b", "c", "d", "e"] {
        let granted = budget.reserve(agent, 9_999).await;
        assert!(granted <= remaining * 3 / 10);
        remaining -= granted;
    }
}

#[test]
fn topological_sort_is_a_permutation_in_dependency_order() {
    let mut dag = TaskDag::new(DagConfig {
        max_nodes: 10,
        max_depth: 3,
    });

    let node = |id: &str, deps: &[&str]| {
        TaskNode::new(id, "coder", NodeType::Hybrid, "w")
            .with_dependencies(deps.iter().map(|s| s.to_string()).collect())
    };

    dag.add_node(node("a", &[])).unwrap();
    dag.add_node(node("b", &["a"])).unwrap();
    dag.add_node(node("c", &["a", "b"])).unwrap();
    dag.add_node(node("d", &["c"])).unwrap();

    let sorted = dag.topological_sort();
    assert_eq!(sorted.len(), 4);

    for id in ["a", "b", "c", "d"] {
        assert_eq!(sorted.iter().filter(|s| s.as_str() == id).count(), 1);
    }
    let pos = |id: &str| sorted.iter().position(|s| s == id).unwrap();
    assert!(pos("a") < pos("b"));
    assert!(pos("b") < pos("c"));
    assert!(pos("c") < pos("d"));
}

#[test]
fn dag_bounds_are_enforced() {
    let mut dag = TaskDag::new(DagConfig {
        max_nodes: 3,
        max_depth: 2,
    });

    for i in 0..3 {
        dag.add_node(TaskNode::new(
            format!("n{i}"),
            "coder",
            NodeType::Hybrid,
            "w",
        ))
        .unwrap();
    }
    assert!(dag
        .add_node(TaskNode::new("overflow", "coder", NodeType::Hybrid, "w"))
        .is_err());

    let mut fresh = TaskDag::new(DagConfig {
        max_nodes: 3,
        max_depth: 2,
    });
    assert!(fresh
        .add_node(TaskNode::new("deep", "coder", NodeType::Hybrid, "w").with_depth(2))
        .is_err());
}

#[tokio::test]
async fn policy_guard_consulted_for_every_spawn() {
    struct CountingGuard(AtomicU32);

    #[async_trait::async_trait]
    impl PolicyGuard for CountingGuard {
        async fn assess(&self, operation: &str, _target: &str) -> PolicyDecision {
            assert_eq!(operation, "spawn_agent");
            self.0.fetch_add(1, Ordering::SeqCst);
            PolicyDecision {
                approved: true,
                reason: "ok".to_string(),
            }
        }
    }

    let guard = Arc::new(CountingGuard(AtomicU32::new(0)));
    let coordinator = Coordinator::with_parts(
        "guarded run",
        CoordinatorConfig::default(),
        Some(Arc::clone(&guard) as Arc<dyn PolicyGuard>),
        None,
    )
    .await
    .unwrap();

    coordinator
        .add_node(TaskNode::new("a", "planner", NodeType::Llm, "p").with_budget(100))
        .await
        .unwrap();
    coordinator
        .add_node(
            TaskNode::new("b", "coder", NodeType::Hybrid, "c")
                .with_budget(100)
                .with_dependencies(vec!["a".to_string()]),
        )
        .await
        .unwrap();

    let executor: Arc<dyn Executor> = Arc::new(FnExecutor::new(|_, _, _| {
        Ok(ExecutorOutput {
            output: json!("out"),
            tokens_used: 10,
        })
    }));
    coordinator.run(executor).await.unwrap();

    assert_eq!(guard.0.load(Ordering::SeqCst), 2);
}

#[test]
fn collapse_only_touches_pending_descendants() {
    let mut dag = TaskDag::new(DagConfig {
        max_nodes: 10,
        max_depth: 3,
    });

    let node = |id: &str, deps: &[&str]| {
        TaskNode::new(id, "coder", NodeType::Hybrid, "w")
            .with_dependencies(deps.iter().map(|s| s.to_string()).collect())
    };
    dag.add_node(node("root", &[])).unwrap();
    dag.add_node(node("done", &["root"])).unwrap();
    dag.add_node(node("pending", &["root"])).unwrap();
    dag.add_node(node("unrelated", &[])).unwrap();

    dag.set_status("done", aegis_swarm::NodeStatus::Done, None, None)
        .unwrap();

    let cancelled = dag.collapse("root");
    assert_eq!(cancelled, vec!["pending".to_string()]);
    assert_eq!(
        dag.get("unrelated").unwrap().status,
        aegis_swarm::NodeStatus::Pending
    );
}

#[tokio::test]
async fn token_accounting_matches_recorded_results() {
    let coordinator = Coordinator::new(
        "accounting",
        CoordinatorConfig {
            total_budget: 5_000,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    coordinator
        .add_node(TaskNode::new("a", "planner", NodeType::Llm, "p").with_budget(1000))
        .await
        .unwrap();
    coordinator
        .add_node(
            TaskNode::new("b", "coder", NodeType::Hybrid, "c")
                .with_budget(1000)
                .with_dependencies(vec!["a".to_string()]),
        )
        .await
        .unwrap();

    let executor: Arc<dyn Executor> = Arc::new(FnExecutor::new(|_, _, _| {
        Ok(ExecutorOutput {
            output: json!("out"),
            tokens_used: 321,
        })
    }));
    coordinator.run(executor).await.unwrap();

    let recorded: u64 = coordinator
        .context()
        .results()
        .await
        .iter()
        .map(|r| r.tokens_used)
        .sum();
    assert_eq!(recorded, coordinator.budget().spent().await);
}

#[tokio::test]
async fn approvals_are_idempotent() {
    let queue = ApprovalQueue::new();
    let id = queue
        .enqueue(RiskLevel::High, "deploy", "production", "risky")
        .await;

    assert!(queue.approve(id).await);
    assert!(!queue.approve(id).await);
    assert!(!queue.reject(id).await);

    let other = queue.enqueue(RiskLevel::High, "delete", "system", "r").await;
    assert!(queue.reject(other).await);
    assert!(!queue.reject(other).await);
}

#[tokio::test]
async fn cache_law_within_and_past_ttl() {
    let router = LlmRouter::new(RouterConfig {
        cache_ttl_secs: 300,
        daily_token_cap: None,
    });
    router.register(Arc::new(EchoProvider::new("echo", 10))).await;
    let opts = ThinkOptions::default();

    let first = router.think("prompt", &opts).await.unwrap();
    let second = router.think("prompt", &opts).await.unwrap();
    assert!(!first.cached);
    assert!(second.cached);

    let expiring = LlmRouter::new(RouterConfig {
        cache_ttl_secs: 0,
        daily_token_cap: None,
    });
    expiring
        .register(Arc::new(EchoProvider::new("echo", 10)))
        .await;
    expiring.think("prompt", &opts).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let after_ttl = expiring.think("prompt", &opts).await.unwrap();
    assert!(!after_ttl.cached);
}

#[tokio::test]
async fn safe_mode_latches_until_explicit_reset() {
    struct AlwaysFailing;

    #[async_trait::async_trait]
    impl WatchTarget for AlwaysFailing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn check(&self) -> bool {
            false
        }
    }

    let watchdog = Watchdog::new(WatchdogConfig {
        max_failures: 3,
        interval_ms: 30_000,
    });
    watchdog.register(Arc::new(AlwaysFailing)).await;

    for _ in 0..4 {
        watchdog.health_check().await;
    }
    assert!(watchdog.safe_mode());

    // Further failures do not reset the latch, nor do they clear it.
    watchdog.health_check().await;
    assert!(watchdog.safe_mode());

    watchdog.deactivate_safe_mode();
    assert!(!watchdog.safe_mode());
}
