//! Bundled Workflow Integration Tests
//!
//! End-to-end runs of the document workflows against a scripted invoker.

mod common;

use std::sync::Arc;

use docflow::adapters::{
    ROLE_ANALYST, ROLE_ARCHITECTURE_UPDATER, ROLE_LEAD_ENGINEER, ROLE_MARKET_RESEARCHER,
    ROLE_PRODUCT_LEAD, ROLE_REVIEW_DECIDER, ROLE_SECURITY_ENGINEER, ROLE_SOFTWARE_ENGINEER,
    ROLE_SYNTHESIZER,
};
use docflow::domain::{RunContext, RunStatus, StepOutcome};
use docflow::workflows::implementation_cycle::{
    KEY_ARCHITECTURE, KEY_IMPLEMENTATION, KEY_IMPLEMENTATION_PATH, KEY_ITERATIONS, KEY_STATUS,
};
use docflow::workflows::{code_review, generate, Catalog, GenerationRequest, Scope};
use tempfile::TempDir;

use common::{fixed_clock, orchestrator, ScriptedInvoker, SteppingClock};

fn file_name(path: &std::path::Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

#[tokio::test]
async fn test_feature_request_writes_prd_and_ticket() {
    let temp = TempDir::new().unwrap();
    let invoker = Arc::new(ScriptedInvoker::new());
    let orchestrator = orchestrator(invoker.clone(), temp.path(), Arc::new(SteppingClock::new()));
    let catalog = Catalog::build().unwrap();

    let params = GenerationRequest::new("Blog Scheduler", "schedule posts")
        .with_scope(Scope::Feature)
        .to_params();
    let report = orchestrator
        .run(&catalog.software_development, params)
        .await
        .unwrap();

    let names: Vec<String> = report.artifact_paths().iter().map(|p| file_name(p)).collect();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("prd_blog_scheduler_"));
    assert!(names[1].starts_with("ticket_blog_scheduler_"));

    assert_eq!(
        report.step("discovery", "research").unwrap().outcome,
        StepOutcome::Skipped
    );
    assert!(report.skipped("classify_scope"));
    assert!(!invoker.roles().iter().any(|r| r == ROLE_MARKET_RESEARCHER));

    assert_eq!(report.context.get_text("scope").unwrap(), "feature");
    assert!(report.context.get_path("prd_path").unwrap().exists());
    assert!(report.context.get_path("ticket_path").unwrap().exists());
    assert!(!report.context.contains("research_path"));
}

#[tokio::test]
async fn test_product_request_with_research_flows_notes_into_synthesis() {
    let temp = TempDir::new().unwrap();
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply(ROLE_ANALYST, "ANALYSIS-NOTES: posting at odd hours")
            .reply(ROLE_MARKET_RESEARCHER, "MARKET-FINDINGS: busy creators"),
    );
    let orchestrator = orchestrator(invoker.clone(), temp.path(), Arc::new(SteppingClock::new()));
    let catalog = Catalog::build().unwrap();

    let params = GenerationRequest::new("Blog Scheduler", "schedule posts")
        .with_scope(Scope::Product)
        .with_research(true, false)
        .to_params();
    let report = orchestrator
        .run(&catalog.software_development, params)
        .await
        .unwrap();

    let names: Vec<String> = report.artifact_paths().iter().map(|p| file_name(p)).collect();
    assert!(names.len() >= 3);
    assert!(names[0].starts_with("research_blog_scheduler_"));
    assert!(names.iter().any(|n| n.starts_with("prd_")));
    assert!(names.iter().any(|n| n.starts_with("ticket_")));

    assert_eq!(
        report.step("discovery", "research").unwrap().outcome,
        StepOutcome::Executed
    );
    assert!(report.skipped("competitor_analysis"));

    let synthesis_prompt = invoker.prompt_for(ROLE_SYNTHESIZER).unwrap();
    assert!(synthesis_prompt.contains("MARKET-FINDINGS: busy creators"));

    let prd_prompt = invoker.prompt_for(ROLE_PRODUCT_LEAD).unwrap();
    assert!(prd_prompt.contains("MARKET-FINDINGS: busy creators"));
    assert!(prd_prompt.contains("ANALYSIS-NOTES: posting at odd hours"));

    assert_eq!(
        invoker.roles(),
        vec![
            ROLE_ANALYST,
            ROLE_MARKET_RESEARCHER,
            ROLE_SYNTHESIZER,
            ROLE_PRODUCT_LEAD,
            ROLE_LEAD_ENGINEER
        ]
    );
}

#[tokio::test]
async fn test_scope_is_classified_when_not_given() {
    let temp = TempDir::new().unwrap();
    let invoker = Arc::new(
        ScriptedInvoker::new().reply(ROLE_ANALYST, "Scope: product\n\nA brand new tool."),
    );
    let orchestrator = orchestrator(invoker.clone(), temp.path(), fixed_clock());
    let catalog = Catalog::build().unwrap();

    let request =
        GenerationRequest::new("Blog Scheduler", "schedule posts").with_research(false, true);
    let result = generate(&orchestrator, &catalog.discovery, &request).await;

    assert!(result.is_completed());
    assert_eq!(result.generated_artifact_paths.len(), 2);
    assert!(invoker
        .prompt_for(ROLE_PRODUCT_LEAD)
        .unwrap()
        .contains("Problem Statement"));
}

#[tokio::test]
async fn test_failure_reports_step_and_no_paths() {
    let temp = TempDir::new().unwrap();
    let invoker = Arc::new(ScriptedInvoker::new().fail_on_call(2));
    let orchestrator = orchestrator(invoker.clone(), temp.path(), fixed_clock());
    let catalog = Catalog::build().unwrap();

    let request = GenerationRequest::new("Blog Scheduler", "schedule posts").with_scope(Scope::Feature);
    let result = generate(&orchestrator, &catalog.software_development, &request).await;

    assert!(result.generated_artifact_paths.is_empty());
    match result.status {
        RunStatus::Failed { step, error } => {
            assert_eq!(step, "product_discovery/synthesis");
            assert!(error.contains("unavailable"));
        }
        RunStatus::Completed => panic!("Expected failure"),
    }
    assert_eq!(invoker.roles(), vec![ROLE_ANALYST, ROLE_SYNTHESIZER]);
}

#[tokio::test]
async fn test_whitespace_variant_subject_collides_in_same_second() {
    let temp = TempDir::new().unwrap();
    let invoker = Arc::new(ScriptedInvoker::new());
    let orchestrator = orchestrator(invoker, temp.path(), fixed_clock());
    let catalog = Catalog::build().unwrap();

    let params = |subject: &str| {
        RunContext::from_params([("subject", subject), ("prd_content", "# PRD\n\nSchedule posts.")])
    };

    orchestrator
        .run(&catalog.architecture, params("Blog Scheduler"))
        .await
        .unwrap();

    let err = orchestrator
        .run(&catalog.architecture, params("Blog  Scheduler "))
        .await
        .unwrap_err();

    assert!(err.is_artifact_collision());
    assert_eq!(err.step(), Some("ticket_creation"));
}

#[tokio::test]
async fn test_discovery_is_repeatable() {
    let temp = TempDir::new().unwrap();
    let invoker = Arc::new(ScriptedInvoker::new());
    let orchestrator = orchestrator(invoker, temp.path(), Arc::new(SteppingClock::new()));
    let catalog = Catalog::build().unwrap();

    let request = GenerationRequest::new("Blog Scheduler", "schedule posts")
        .with_scope(Scope::Product)
        .with_research(true, true);

    let first = orchestrator
        .run(&catalog.discovery, request.to_params())
        .await
        .unwrap();
    let second = orchestrator
        .run(&catalog.discovery, request.to_params())
        .await
        .unwrap();

    assert_eq!(first.artifacts.len(), second.artifacts.len());
    for (a, b) in first.artifacts.iter().zip(&second.artifacts) {
        assert_ne!(a.path, b.path);
        assert_eq!(a.sha256, b.sha256);
    }
    assert_eq!(
        first.context.get_text("prd_creation_content").unwrap(),
        second.context.get_text("prd_creation_content").unwrap()
    );
}

#[tokio::test]
async fn test_code_review_updates_architecture_on_divergence() {
    let temp = TempDir::new().unwrap();
    let invoker = Arc::new(ScriptedInvoker::new().reply(
        ROLE_REVIEW_DECIDER,
        "Approved. The implementation refactored to an event queue on purpose.",
    ));
    let orchestrator = orchestrator(invoker.clone(), temp.path(), fixed_clock());
    let catalog = Catalog::build().unwrap();

    let params = RunContext::from_params([
        ("subject", "Blog Scheduler"),
        (code_review::KEY_CODE, "fn schedule() {}"),
        (code_review::KEY_ARCHITECTURE, "Cron based scheduler."),
    ]);
    let report = orchestrator.run(&catalog.code_review, params).await.unwrap();

    assert_eq!(report.context.get_text(code_review::KEY_STATUS).unwrap(), "approved");
    assert!(report.executed("update_architecture"));
    assert!(invoker.roles().iter().any(|r| r == ROLE_ARCHITECTURE_UPDATER));

    let report_text = report.context.get_text(code_review::KEY_REPORT).unwrap();
    assert!(report_text.contains("## Architecture Update"));
    assert!(file_name(report.context.get_path(code_review::KEY_REPORT_PATH).unwrap())
        .starts_with("review_blog_scheduler_"));
}

#[tokio::test]
async fn test_code_review_without_divergence_skips_update() {
    let temp = TempDir::new().unwrap();
    let invoker = Arc::new(
        ScriptedInvoker::new().reply(ROLE_REVIEW_DECIDER, "Changes requested: add tests."),
    );
    let orchestrator = orchestrator(invoker.clone(), temp.path(), fixed_clock());
    let catalog = Catalog::build().unwrap();

    let params = RunContext::from_params([
        ("subject", "Blog Scheduler"),
        (code_review::KEY_CODE, "fn schedule() {}"),
    ]);
    let report = orchestrator.run(&catalog.code_review, params).await.unwrap();

    assert_eq!(
        report.context.get_text(code_review::KEY_STATUS).unwrap(),
        "changes_requested"
    );
    assert!(report.skipped("update_architecture"));
    assert!(!report.context.contains(code_review::KEY_UPDATE));
}

fn implementation_params() -> RunContext {
    RunContext::from_params([
        ("subject", "Blog Scheduler"),
        ("context", "queue posts for later"),
        (KEY_ARCHITECTURE, "Cron based scheduler."),
    ])
}

#[tokio::test]
async fn test_implementation_cycle_stops_once_both_reviews_approve() {
    let temp = TempDir::new().unwrap();
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .replies_in_order(
                ROLE_SOFTWARE_ENGINEER,
                &["fn schedule_v1() {}", "fn schedule_v2() {}"],
            )
            .replies_in_order(
                ROLE_LEAD_ENGINEER,
                &[
                    "Review Status: CHANGES_REQUESTED\n\nValidate the post time.",
                    "Review Status: APPROVED",
                ],
            )
            .reply(ROLE_SECURITY_ENGINEER, "Security Status: APPROVED"),
    );
    let orchestrator = orchestrator(invoker.clone(), temp.path(), fixed_clock());
    let catalog = Catalog::build().unwrap();

    let report = orchestrator
        .run(&catalog.implementation_cycle, implementation_params())
        .await
        .unwrap();

    assert!(report.executed("iteration_1"));
    assert!(report.executed("iteration_2"));
    assert_eq!(
        report.step("implementation_cycle", "iteration_3").unwrap().outcome,
        StepOutcome::Skipped
    );
    assert_eq!(
        invoker.roles(),
        vec![
            ROLE_SOFTWARE_ENGINEER,
            ROLE_LEAD_ENGINEER,
            ROLE_SECURITY_ENGINEER,
            ROLE_SOFTWARE_ENGINEER,
            ROLE_LEAD_ENGINEER,
            ROLE_SECURITY_ENGINEER
        ]
    );

    // The revision sees the first pass's code and its review
    let calls = invoker.calls();
    let revision = &calls[3].prompt;
    assert!(revision.contains("fn schedule_v1() {}"));
    assert!(revision.contains("Validate the post time."));

    assert_eq!(report.context.get_text(KEY_STATUS).unwrap(), "approved");
    assert_eq!(report.context.get_text(KEY_ITERATIONS).unwrap(), "2");
    assert_eq!(
        report.context.get_text(KEY_IMPLEMENTATION).unwrap(),
        "fn schedule_v2() {}"
    );

    assert_eq!(report.artifacts.len(), 1);
    let path = report.context.get_path(KEY_IMPLEMENTATION_PATH).unwrap();
    assert!(file_name(path).starts_with("implementation_blog_scheduler_"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "fn schedule_v2() {}");
}

#[tokio::test]
async fn test_implementation_cycle_gives_up_after_three_passes() {
    let temp = TempDir::new().unwrap();
    let invoker = Arc::new(
        ScriptedInvoker::new()
            .reply(ROLE_LEAD_ENGINEER, "Review Status: APPROVED")
            .reply(ROLE_SECURITY_ENGINEER, "One critical SQL injection remains."),
    );
    let orchestrator = orchestrator(invoker.clone(), temp.path(), fixed_clock());
    let catalog = Catalog::build().unwrap();

    let report = orchestrator
        .run(&catalog.implementation_cycle, implementation_params())
        .await
        .unwrap();

    assert!(report.executed("iteration_3"));
    assert_eq!(invoker.calls().len(), 9);
    assert_eq!(
        report.context.get_text(KEY_STATUS).unwrap(),
        "completed_with_notes"
    );
    assert_eq!(report.context.get_text(KEY_ITERATIONS).unwrap(), "3");
    assert_eq!(report.artifacts.len(), 1);
}
