use kiln_agent::{
    AgentConfig, BufferedEventEmitter, EventKind, NoopEventEmitter, PlanStepStatus,
    RecordingContextInvalidator, ToolContext, build_default_registry, parse_tool_calls,
    parse_tool_calls_with_report,
};
use std::sync::Arc;
use tempfile::tempdir;

fn context(
    dir: &std::path::Path,
    config: AgentConfig,
) -> (ToolContext, RecordingContextInvalidator) {
    let invalidator = RecordingContextInvalidator::default();
    let context = ToolContext::local(
        dir,
        config,
        Arc::new(NoopEventEmitter),
        Arc::new(invalidator.clone()),
    );
    (context, invalidator)
}

#[tokio::test(flavor = "current_thread")]
async fn model_text_drives_write_read_and_edit_in_order() {
    let dir = tempdir().expect("temp dir should be created");
    let (context, invalidator) = context(dir.path(), AgentConfig::default());
    let registry = build_default_registry();

    let text = r#"I'll create the module first.
<tool name="write_file" path="src/lib.rs" description="add greeting">
pub fn greet() -> &'static str {
    "hello"
}
</tool>
Then check it:
<tool name="read_file" path="src/lib.rs"/>
And tweak it:
<tool name="edit_file" path="src/lib.rs">
<<<<<<< SEARCH
    "hello"
=======
    "hello, world"
>>>>>>> REPLACE
</tool>"#;

    let results = registry.dispatch(parse_tool_calls(text), &context).await;
    assert_eq!(results.len(), 3);
    for result in &results {
        assert!(!result.is_error(), "{result:?}");
    }

    assert_eq!(results[0].tool, "write_file");
    assert!(results[0].result.starts_with("Created src/lib.rs (+4 -0): add greeting"));
    assert!(results[0].result.contains("@@ -0,0 +1,4 @@"));
    assert_eq!(
        results[1].result,
        "1 | pub fn greet() -> &'static str {\n2 |     \"hello\"\n3 | }"
    );
    assert!(results[2].result.starts_with("Updated src/lib.rs (+1 -1)"));

    let on_disk = std::fs::read_to_string(dir.path().join("src/lib.rs")).expect("read back");
    assert_eq!(
        on_disk,
        "pub fn greet() -> &'static str {\n    \"hello, world\"\n}\n"
    );
    assert_eq!(invalidator.count(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn destructive_and_elided_writes_are_refused() {
    let dir = tempdir().expect("temp dir should be created");
    std::fs::write(dir.path().join("keep.txt"), "precious\n").expect("seed file");
    let (context, invalidator) = context(dir.path(), AgentConfig::default());
    let registry = build_default_registry();

    let text = r#"<tool name="write_file" path="keep.txt"></tool>
<tool name="write_file" path="keep.txt">start
// ... rest of file unchanged
</tool>"#;
    let results = registry.dispatch(parse_tool_calls(text), &context).await;

    assert!(
        results[0]
            .error
            .as_deref()
            .is_some_and(|error| error.contains("delete_file"))
    );
    assert!(
        results[1]
            .error
            .as_deref()
            .is_some_and(|error| error.contains("placeholder"))
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("keep.txt")).expect("read back"),
        "precious\n"
    );
    assert_eq!(invalidator.count(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn ambiguous_section_edit_names_the_occurrence_count() {
    let dir = tempdir().expect("temp dir should be created");
    std::fs::write(dir.path().join("dup.txt"), "same\nsame\n").expect("seed file");
    let (context, _) = context(dir.path(), AgentConfig::default());

    let text = r#"<tool name="edit_file" path="dup.txt" old_text="same" new_text="other"/>"#;
    let results = build_default_registry()
        .dispatch(parse_tool_calls(text), &context)
        .await;

    let error = results[0].error.as_deref().expect("edit should fail");
    assert!(error.contains("matches 2 locations"), "{error}");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("dup.txt")).expect("read back"),
        "same\nsame\n"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn dry_run_previews_without_writing() {
    let dir = tempdir().expect("temp dir should be created");
    let config = AgentConfig {
        apply_edits: false,
        ..AgentConfig::default()
    };
    let (context, invalidator) = context(dir.path(), config);

    let text = r#"<tool name="write_file" path="new.txt">line</tool>
<tool name="delete_file" path="new.txt"/>"#;
    let results = build_default_registry()
        .dispatch(parse_tool_calls(text), &context)
        .await;

    assert!(results[0].result.starts_with("Dry run: new.txt was not written (+2 -0)"));
    assert!(results[0].result.contains("+line"));
    assert_eq!(results[1].result, "Dry run: new.txt was not deleted");
    assert!(!dir.path().join("new.txt").exists());
    assert_eq!(invalidator.count(), 0);
}

#[cfg(unix)]
#[tokio::test(flavor = "current_thread")]
async fn run_command_streams_output_and_honors_cwd() {
    let dir = tempdir().expect("temp dir should be created");
    std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
    let emitter = BufferedEventEmitter::default();
    let context = ToolContext::local(
        dir.path(),
        AgentConfig::default(),
        Arc::new(emitter.clone()),
        Arc::new(RecordingContextInvalidator::default()),
    );

    let text = r#"<tool name="run_command" cwd="sub">pwd</tool>
<tool name="run_command" command="exit 7"/>
<tool name="run_command" command="sleep 5" timeout_ms="100"/>"#;
    let results = build_default_registry()
        .dispatch(parse_tool_calls(text), &context)
        .await;

    assert!(results[0].result.trim_end().ends_with("sub"), "{:?}", results[0]);
    assert!(
        results[1]
            .error
            .as_deref()
            .is_some_and(|error| error.contains("exit code 7"))
    );
    assert!(
        results[2]
            .error
            .as_deref()
            .is_some_and(|error| error.contains("timed out after 100 ms"))
    );

    let deltas = emitter
        .snapshot()
        .into_iter()
        .filter(|event| event.kind == EventKind::ToolCallOutputDelta)
        .count();
    assert!(deltas >= 1);
    let invalidations = emitter
        .snapshot()
        .into_iter()
        .filter(|event| event.kind == EventKind::ContextInvalidated)
        .count();
    assert_eq!(invalidations, 1, "only the successful pwd invalidates");
}

#[tokio::test(flavor = "current_thread")]
async fn update_plan_replaces_the_shared_plan() {
    let dir = tempdir().expect("temp dir should be created");
    let (context, _) = context(dir.path(), AgentConfig::default());

    let text = "<tool name=\"update_plan\">\n- [x] read code\n- [~] write tests\n- [ ] ship\n</tool>";
    let results = build_default_registry()
        .dispatch(parse_tool_calls(text), &context)
        .await;

    let plan = results[0].plan.as_ref().expect("plan snapshot should be attached");
    assert_eq!(plan.steps.len(), 3);
    assert_eq!(plan.steps[1].status, PlanStepStatus::InProgress);
    assert!(results[0].result.starts_with("Plan updated (1/3 completed)"));
    assert_eq!(context.plan.snapshot(), *plan);
}

#[tokio::test(flavor = "current_thread")]
async fn malformed_fragments_are_skipped_and_unknown_tools_reported() {
    let dir = tempdir().expect("temp dir should be created");
    let (context, _) = context(dir.path(), AgentConfig::default());

    let text = r#"<tool path="a.txt"/> <tool name="teleport" to="mars"/> <tool name=read_file/>"#;
    let report = parse_tool_calls_with_report(text);
    assert_eq!(report.invocations.len(), 1);
    assert_eq!(report.skipped, 2);

    let results = build_default_registry()
        .dispatch(report.invocations, &context)
        .await;
    assert_eq!(results[0].error.as_deref(), Some("Unknown tool: teleport"));
}
