use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

#[derive(Debug, Deserialize)]
struct DispatchSummary {
    results: Vec<ResultRow>,
    skipped: usize,
    context_invalidations: usize,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    tool: String,
    result: String,
    error: Option<String>,
}

fn kiln() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_kiln"));
    command.env("RUST_LOG", "off");
    command
}

fn write_input(dir: &Path, text: &str) -> std::path::PathBuf {
    let path = dir.join("model.txt");
    std::fs::write(&path, text).expect("input file write should succeed");
    path
}

#[test]
fn dispatch_json_reports_results_and_invalidations() {
    let temp = TempDir::new().expect("temp dir should create");
    let work = temp.path().join("work");
    std::fs::create_dir(&work).expect("work dir should create");
    let input = write_input(
        temp.path(),
        r#"<tool name="write_file" path="notes.txt">first line</tool>
<tool name="read_file" path="notes.txt"/>
<tool name="bogus"/>
<tool oops"#,
    );

    let output = kiln()
        .args(["dispatch", "--json", "--input"])
        .arg(&input)
        .arg("--cwd")
        .arg(&work)
        .output()
        .expect("dispatch command should run");

    assert_eq!(output.status.code(), Some(2), "unknown tool should fail the run");
    let summary: DispatchSummary =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.context_invalidations, 1);
    assert_eq!(summary.results[0].tool, "write_file");
    assert_eq!(summary.results[0].error, None);
    assert_eq!(summary.results[1].result, "1 | first line");
    assert_eq!(
        summary.results[2].error.as_deref(),
        Some("Unknown tool: bogus")
    );
    assert_eq!(
        std::fs::read_to_string(work.join("notes.txt")).expect("file should exist"),
        "first line\n"
    );
}

#[test]
fn dispatch_dry_run_leaves_tree_untouched() {
    let temp = TempDir::new().expect("temp dir should create");
    let input = write_input(
        temp.path(),
        r#"<tool name="write_file" path="draft.txt">hello</tool>"#,
    );

    let output = kiln()
        .args(["dispatch", "--dry-run", "--input"])
        .arg(&input)
        .arg("--cwd")
        .arg(temp.path())
        .output()
        .expect("dispatch command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[1] write_file (ok)"), "{stdout}");
    assert!(stdout.contains("Dry run: draft.txt was not written"), "{stdout}");
    assert!(!temp.path().join("draft.txt").exists());
}

#[cfg(unix)]
#[test]
fn dispatch_mirrors_command_output_unless_quiet() {
    let temp = TempDir::new().expect("temp dir should create");
    let input = write_input(
        temp.path(),
        r#"<tool name="run_command" command="echo mirrored"/>"#,
    );

    let output = kiln()
        .args(["dispatch", "--input"])
        .arg(&input)
        .arg("--cwd")
        .arg(temp.path())
        .output()
        .expect("dispatch command should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("mirrored\n[1] run_command (ok)"), "{stdout}");

    let output = kiln()
        .args(["dispatch", "--quiet", "--input"])
        .arg(&input)
        .arg("--cwd")
        .arg(temp.path())
        .output()
        .expect("dispatch command should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("[1] run_command (ok)\nmirrored"), "{stdout}");
}

#[cfg(unix)]
#[test]
fn run_reports_timeouts_in_json() {
    let temp = TempDir::new().expect("temp dir should create");
    let output = kiln()
        .args(["run", "--json", "--timeout-ms", "100", "--cwd"])
        .arg(temp.path())
        .args(["sleep", "5"])
        .output()
        .expect("run command should run");

    assert_eq!(output.status.code(), Some(2));
    let row: ResultRow = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(row.tool, "run_command");
    assert!(
        row.error
            .as_deref()
            .is_some_and(|error| error.contains("timed out after 100 ms"))
    );
}

#[cfg(unix)]
#[test]
fn run_streams_stdout_live() {
    let temp = TempDir::new().expect("temp dir should create");
    let output = kiln()
        .args(["run", "--cwd"])
        .arg(temp.path())
        .args(["echo", "streamed"])
        .output()
        .expect("run command should run");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "streamed\n");
}

#[test]
fn diff_prints_unified_hunks() {
    let temp = TempDir::new().expect("temp dir should create");
    let old = temp.path().join("old.txt");
    let new = temp.path().join("new.txt");
    std::fs::write(&old, "a\nb\nc").expect("old file write should succeed");
    std::fs::write(&new, "a\nB\nc").expect("new file write should succeed");

    let output = kiln()
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .args(["--label", "file.txt"])
        .output()
        .expect("diff command should run");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "--- a/file.txt\n+++ b/file.txt\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n"
    );
}

#[test]
fn tools_lists_builtin_tools() {
    let output = kiln()
        .args(["tools"])
        .output()
        .expect("tools command should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in [
        "read_file",
        "write_file",
        "edit_file",
        "delete_file",
        "run_command",
        "update_plan",
    ] {
        assert!(stdout.contains(&format!("{name}: ")), "{stdout}");
    }
}

#[test]
fn missing_input_file_exits_with_error() {
    let temp = TempDir::new().expect("temp dir should create");
    let output = kiln()
        .args(["dispatch", "--input"])
        .arg(temp.path().join("absent.txt"))
        .output()
        .expect("dispatch command should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error: failed reading"));
}
