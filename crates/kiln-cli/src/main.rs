mod logging;

use clap::{ArgAction, Parser, Subcommand};
use kiln_agent::{
    AgentConfig, EventEmitter, NoopEventEmitter, ProcessSupervisor, RecordingContextInvalidator,
    TerminalEventEmitter, ToolContext, ToolResult, build_default_registry,
    parse_tool_calls_with_report, render_unified,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(about = "Executes tool calls found in model output against a working tree")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse model text and run every tool invocation it contains.
    Dispatch(DispatchArgs),
    /// Run one shell command under the process supervisor.
    Run(RunArgs),
    /// Print the unified diff between two files.
    Diff(DiffArgs),
    /// List the built-in tools.
    Tools(ToolsArgs),
}

#[derive(clap::Args, Debug)]
struct DispatchArgs {
    /// File holding the model text; reads stdin when omitted or `-`.
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    cwd: Option<PathBuf>,
    /// Default timeout for run_command invocations without one.
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long)]
    kill_grace_ms: Option<u64>,
    /// Validate and preview edits without writing them.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Do not mirror command output to the terminal while it runs.
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[arg(long)]
    cwd: Option<PathBuf>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    #[arg(long)]
    kill_grace_ms: Option<u64>,
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct DiffArgs {
    old: PathBuf,
    new: PathBuf,
    /// Path shown in the `---`/`+++` headers; defaults to NEW.
    #[arg(long)]
    label: Option<String>,
}

#[derive(clap::Args, Debug)]
struct ToolsArgs {
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Dispatch(args) => dispatch_command(args).await,
        Commands::Run(args) => run_command(args).await,
        Commands::Diff(args) => diff_command(args),
        Commands::Tools(args) => tools_command(args),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

async fn dispatch_command(args: DispatchArgs) -> Result<ExitCode, String> {
    let text = load_input(args.input.as_deref())?;
    let cwd = resolve_cwd(args.cwd)?;
    let mut config = build_config(args.timeout_ms, args.kill_grace_ms)?;
    config.apply_edits = !args.dry_run;

    let emitter: Arc<dyn EventEmitter> = if !args.quiet && !args.json {
        Arc::new(TerminalEventEmitter)
    } else {
        Arc::new(NoopEventEmitter)
    };
    let invalidator = RecordingContextInvalidator::default();
    let context = ToolContext::local(&cwd, config, emitter, Arc::new(invalidator.clone()));

    let report = parse_tool_calls_with_report(&text);
    debug!(
        invocations = report.invocations.len(),
        skipped = report.skipped,
        cwd = %cwd.display(),
        "parsed model text"
    );
    if report.skipped > 0 && !args.json {
        eprintln!("warning: skipped {} malformed tool tag(s)", report.skipped);
    }
    let results = build_default_registry()
        .dispatch(report.invocations, &context)
        .await;

    if args.json {
        let summary = serde_json::json!({
            "results": results,
            "skipped": report.skipped,
            "context_invalidations": invalidator.count(),
        });
        let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        for (index, result) in results.iter().enumerate() {
            print_result(index + 1, result);
        }
        if invalidator.count() > 0 {
            eprintln!("context invalidated: {} time(s)", invalidator.count());
        }
    }

    Ok(exit_code_for_results(&results))
}

async fn run_command(args: RunArgs) -> Result<ExitCode, String> {
    let cwd = resolve_cwd(args.cwd)?;
    let config = build_config(None, args.kill_grace_ms)?;
    let timeout_ms = config.effective_timeout_ms(args.timeout_ms);
    let command = args.command.join(" ");

    let emitter: Arc<dyn EventEmitter> = if args.json {
        Arc::new(NoopEventEmitter)
    } else {
        Arc::new(TerminalEventEmitter)
    };
    let supervisor = ProcessSupervisor::new(emitter).with_kill_grace(config.kill_grace_ms);
    let result = supervisor.run(&command, &cwd, timeout_ms).await;

    if args.json {
        let json = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
        println!("{json}");
    } else if let Some(error) = result.error.as_deref() {
        eprintln!("error: {error}");
    }
    Ok(exit_code_for_results(std::slice::from_ref(&result)))
}

fn diff_command(args: DiffArgs) -> Result<ExitCode, String> {
    let old = read_text(&args.old)?;
    let new = read_text(&args.new)?;
    let label = args
        .label
        .unwrap_or_else(|| args.new.display().to_string());
    print!("{}", render_unified(&label, &old, &new));
    Ok(ExitCode::SUCCESS)
}

fn tools_command(args: ToolsArgs) -> Result<ExitCode, String> {
    let definitions = build_default_registry().definitions();
    if args.json {
        let json = serde_json::to_string_pretty(&definitions).map_err(|e| e.to_string())?;
        println!("{json}");
    } else {
        for definition in definitions {
            println!("{}: {}", definition.name, definition.description);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn build_config(timeout_ms: Option<u64>, kill_grace_ms: Option<u64>) -> Result<AgentConfig, String> {
    let mut config = AgentConfig::default();
    if let Some(timeout_ms) = timeout_ms {
        config.default_command_timeout_ms = timeout_ms;
        config.max_command_timeout_ms = config.max_command_timeout_ms.max(timeout_ms);
    }
    if let Some(kill_grace_ms) = kill_grace_ms {
        config.kill_grace_ms = kill_grace_ms;
    }
    config.validate().map_err(|error| error.to_string())?;
    Ok(config)
}

fn resolve_cwd(cwd: Option<PathBuf>) -> Result<PathBuf, String> {
    let cwd = match cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir()
            .map_err(|e| format!("failed to read current directory: {e}"))?,
    };
    if !cwd.is_dir() {
        return Err(format!("working directory '{}' does not exist", cwd.display()));
    }
    Ok(cwd)
}

fn load_input(input: Option<&Path>) -> Result<String, String> {
    match input {
        Some(path) if path != Path::new("-") => read_text(path),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("failed reading stdin: {e}"))?;
            Ok(text)
        }
    }
}

fn read_text(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("failed reading '{}': {e}", path.display()))
}

fn print_result(index: usize, result: &ToolResult) {
    let status = if result.is_error() { "error" } else { "ok" };
    println!("[{index}] {} ({status})", result.tool);
    if !result.result.is_empty() {
        println!("{}", result.result);
    }
    if let Some(error) = result.error.as_deref() {
        println!("error: {error}");
    }
}

fn exit_code_for_results(results: &[ToolResult]) -> ExitCode {
    if results.iter().any(ToolResult::is_error) {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}
