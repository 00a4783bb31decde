//! Literal end-to-end scenarios covering the happy path, retries, budget
//! clipping, risk banding, contract blocking and context compression.

use aegis_kernel::{PipelineStatus, UnifiedPipeline};
use aegis_policy::{ActionContext, ContractChecker, RiskEngine, RiskLevel};
use aegis_swarm::{
    compress_context, Coordinator, CoordinatorConfig, Executor, ExecutorOutput, FnExecutor,
    NodeType, SharedContext, TaskNode,
};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn role_executor() -> Arc<dyn Executor> {
    Arc::new(FnExecutor::new(|node_id, role, _summary| {
        Ok(ExecutorOutput {
            output: json!(format!("{role} result for {node_id}")),
            tokens_used: if role == "tester" { 0 } else { 500 },
        })
    }))
}

#[tokio::test]
async fn happy_path_three_role_dag() {
    let coordinator = Coordinator::new(
        "plan, code and test a change",
        CoordinatorConfig {
            total_budget: 5000,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    coordinator
        .add_node(TaskNode::new("plan", "planner", NodeType::Llm, "plan the work").with_budget(1000))
        .await
        .unwrap();
    coordinator
        .add_node(
            TaskNode::new("code", "coder", NodeType::Hybrid, "write the code")
                .with_budget(1500)
                .with_dependencies(vec!["plan".to_string()]),
        )
        .await
        .unwrap();
    coordinator
        .add_node(
            TaskNode::new("test", "tester", NodeType::Tool, "run the tests")
                .with_dependencies(vec!["code".to_string()]),
        )
        .await
        .unwrap();

    let summary = coordinator.run(role_executor()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.nodes_completed, 3);
    assert_eq!(summary.tokens_used, 1000);
}

#[tokio::test]
async fn retry_then_success_invokes_executor_three_times() {
    let coordinator = Coordinator::new("flaky single node", CoordinatorConfig::default())
        .await
        .unwrap();
    coordinator
        .add_node(
            TaskNode::new("fail", "coder", NodeType::Hybrid, "fails twice")
                .with_budget(1500)
                .with_max_retries(2),
        )
        .await
        .unwrap();

    let attempts = Arc::new(AtomicU32::new(0));
    let executor = {
        let attempts = Arc::clone(&attempts);
        Arc::new(FnExecutor::new(move |_, _, _| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= 2 {
                anyhow::bail!("induced failure {attempt}");
            }
            Ok(ExecutorOutput {
                output: json!("success"),
                tokens_used: 500,
            })
        }))
    };

    let summary = coordinator.run(executor).await.unwrap();

    assert_eq!(summary.nodes_completed, 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn budget_clip_never_overspends() {
    let coordinator = Coordinator::new(
        "tight budget",
        CoordinatorConfig {
            total_budget: 100,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    coordinator
        .add_node(TaskNode::new("a", "planner", NodeType::Llm, "plan").with_budget(50))
        .await
        .unwrap();
    coordinator
        .add_node(
            TaskNode::new("b", "coder", NodeType::Hybrid, "code")
                .with_budget(200)
                .with_dependencies(vec!["a".to_string()]),
        )
        .await
        .unwrap();

    let executor: Arc<dyn Executor> = Arc::new(FnExecutor::new(|_, _, _| {
        Ok(ExecutorOutput {
            output: json!("x"),
            tokens_used: 80,
        })
    }));

    let summary = coordinator.run(executor).await.unwrap();

    assert!(summary.tokens_used <= 100);
    // `b` must not complete: either it was never scheduled or it failed at spawn.
    assert!(summary.nodes_completed <= 1);
}

#[test]
fn risk_bands_match_expected_examples() {
    let engine = RiskEngine::new();

    let read = engine.assess(&ActionContext::new("read", "workspace"));
    assert_eq!(read.risk, RiskLevel::Low);
    assert!(read.approved);

    let deploy = engine.assess(&ActionContext::new("deploy", "production").irreversible());
    assert_eq!(deploy.risk, RiskLevel::High);
    assert!(deploy.requires_human_approval);

    let write = engine.assess(&ActionContext::new("write", "config").irreversible());
    assert_eq!(write.risk, RiskLevel::Medium);
}

#[tokio::test]
async fn naming_contract_blocks_pipeline() {
    let pipeline = UnifiedPipeline::new().with_contracts(Arc::new(ContractChecker::new()));
    let outcome = pipeline
        .prepare("[TASK: X]\ntype: auto\nfiles: src/MyComponent.ts\naction: a\nverify: v\ndone: d")
        .await;

    assert_eq!(outcome.status, PipelineStatus::Blocked);
    assert!(outcome
        .violations
        .iter()
        .any(|v| v.contains("src/MyComponent.ts")));
}

#[tokio::test]
async fn context_compression_bounds_output_without_mutation() {
    let ctx = SharedContext::new("a very busy task");
    for i in 0..50 {
        ctx.add_result(format!("agent{i}"), "coder", json!("x".repeat(500)), 10)
            .await;
    }
    let version_before = ctx.version().await;

    let compressed = compress_context(&ctx, 100).await;

    assert!(compressed.chars().count() <= 300);
    assert_eq!(ctx.version().await, version_before);
}
