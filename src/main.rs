// GhostBot - autonomous mobile QA agent
// Main entry point for the ghostbot binary

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use ghostbot::agent::{AgentConfig, AgentController, SessionRecorder};
use ghostbot::brain::{Brain, BrainConfig, Provider};
use ghostbot::device::{doctor, AdbDriver, DeviceTransport};
use ghostbot::metrics;
use ghostbot::tracing::{init_tracing, shutdown_tracing};

const BANNER: &str = r"
   _____ _               _   ____        _
  / ____| |             | | |  _ \      | |
 | |  __| |__   ___  ___| |_| |_) | ___ | |_
 | | |_ | '_ \ / _ \/ __| __|  _ < / _ \| __|
 | |__| | | | | (_) \__ \ |_| |_) | (_) | |_
  \_____|_| |_|\___/|___/\__|____/ \___/ \__|

    AI Mobile QA & UX Auditor Agent
";

/// GhostBot mobile QA agent
///
/// Drives an Android device towards a goal with a vision model and writes a
/// Markdown report of every step and UX finding.
#[derive(Parser, Debug)]
#[command(name = "ghostbot")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// OTLP gRPC endpoint for span export
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT", value_name = "URL")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a QA session (default)
    Run(RunArgs),

    /// Check that adb, maestro and a device are available
    Doctor,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Test goal; prompted for when omitted
    #[arg(short, long)]
    goal: Option<String>,

    /// Vision model provider: openai, anthropic (or claude)
    #[arg(long, env = "AI_PROVIDER", default_value = "openai")]
    provider: String,

    /// Model name; defaults to OPENAI_MODEL / ANTHROPIC_MODEL or the provider default
    #[arg(long)]
    model: Option<String>,

    /// API base URL; defaults to OPENAI_BASE_URL / ANTHROPIC_BASE_URL or the public API
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Step budget
    #[arg(long, env = "GHOSTBOT_MAX_STEPS", default_value_t = 50)]
    max_steps: u32,

    /// Directory for Markdown reports
    #[arg(long, env = "GHOSTBOT_REPORT_DIR", default_value = "reports")]
    output_dir: PathBuf,

    /// Name folded into the report file name
    #[arg(long)]
    session_name: Option<String>,

    /// Package to launch before the session starts
    #[arg(long, value_name = "PACKAGE")]
    app: Option<String>,

    /// adb serial of the target device
    #[arg(long, env = "ANDROID_SERIAL")]
    serial: Option<String>,

    /// Write Prometheus metrics to this file when the session ends
    #[arg(long, value_name = "PATH")]
    metrics_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env first so clap's env fallbacks see it
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = init_tracing("ghostbot", cli.otlp_endpoint.as_deref()) {
        eprintln!("Failed to initialize tracing: {}", e);
    }
    match dotenv {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env"),
    }

    let result = match cli.command {
        Some(Command::Doctor) => run_doctor().await,
        Some(Command::Run(args)) => run_session(args).await,
        None => run_session(cli.run).await,
    };

    if cli.otlp_endpoint.is_some() {
        shutdown_tracing();
    }

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "ghostbot failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_session(args: RunArgs) -> anyhow::Result<ExitCode> {
    println!("{}", BANNER);

    let provider: Provider = args.provider.parse()?;
    let api_key = std::env::var(provider.api_key_env()).unwrap_or_default();
    let model = args.model.or_else(|| env_override(provider_model_env(provider)));
    let base_url = args
        .base_url
        .or_else(|| env_override(provider_base_url_env(provider)));

    let mut brain_config = BrainConfig::new(provider, api_key);
    if let Some(model) = model {
        brain_config = brain_config.with_model(model);
    }
    if let Some(base_url) = base_url {
        brain_config = brain_config.with_base_url(base_url);
    }
    let brain = Brain::new(brain_config).with_context(|| {
        format!(
            "Set {} in a .env file or the environment to use {}",
            provider.api_key_env(),
            provider.display_name()
        )
    })?;
    println!("[AGENT] Using AI provider: {}", provider.display_name());

    let goal = match args.goal {
        Some(goal) => goal,
        None => prompt_goal().await?,
    };
    let goal = goal.trim().to_string();
    if goal.is_empty() {
        bail!("Goal cannot be empty");
    }

    let mut device = match args.serial {
        Some(serial) => AdbDriver::with_serial(serial),
        None => AdbDriver::new(),
    };
    if let Some(package) = &args.app {
        println!("[AGENT] Launching {}", package);
        if !device.launch(package).await {
            tracing::warn!(
                package = %package,
                error = device.last_error().unwrap_or("unknown error"),
                "App launch failed, continuing"
            );
        }
    }

    let recorder = SessionRecorder::new(&args.output_dir, args.session_name.as_deref())
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    let config = AgentConfig {
        max_steps: args.max_steps,
        ..AgentConfig::default()
    };

    let mut agent = AgentController::new(device, brain, recorder, config);
    let result = agent.run(&goal).await?;

    if let Some(path) = &args.metrics_out {
        std::fs::write(path, metrics::render())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        println!("[AGENT] Metrics written to {}", path.display());
    }

    println!("\nReport: {}", result.report.display());
    Ok(ExitCode::SUCCESS)
}

async fn run_doctor() -> anyhow::Result<ExitCode> {
    println!("GhostBot setup check\n");

    let results = doctor::run_checks().await;
    for check in &results {
        if check.ok {
            println!("  ✅ {:<8} {}", check.name, check.detail);
        } else {
            println!("  ❌ {:<8} {}", check.name, check.detail);
            println!("     → {}", check.hint);
        }
    }

    for provider in [Provider::OpenAi, Provider::Anthropic] {
        let set = env_override(provider.api_key_env()).is_some();
        println!(
            "  {} {:<8} {} {}",
            if set { "✅" } else { "➖" },
            provider.as_str(),
            provider.api_key_env(),
            if set { "set" } else { "not set" }
        );
    }

    if results.iter().all(|c| c.ok) {
        println!("\nAll checks passed.");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("\nSome checks failed.");
        Ok(ExitCode::FAILURE)
    }
}

async fn prompt_goal() -> anyhow::Result<String> {
    println!("Enter your test goal:");
    println!("Examples:");
    println!("  - Login with user@test.com and password 'test123'");
    println!("  - Navigate to settings and enable dark mode");
    println!("  - Add an item to cart and proceed to checkout\n");
    print!("Goal: ");
    std::io::Write::flush(&mut std::io::stdout())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    Ok(lines.next_line().await?.unwrap_or_default())
}

fn provider_model_env(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "OPENAI_MODEL",
        Provider::Anthropic => "ANTHROPIC_MODEL",
    }
}

fn provider_base_url_env(provider: Provider) -> &'static str {
    match provider {
        Provider::OpenAi => "OPENAI_BASE_URL",
        Provider::Anthropic => "ANTHROPIC_BASE_URL",
    }
}

/// Non-empty environment variable
fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotenv_values_reach_cli_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".env");
        std::fs::write(&file, "GHOSTBOT_REPORT_DIR=from-dotenv\nGHOSTBOT_MAX_STEPS=7\n").unwrap();

        dotenvy::from_path(&file).unwrap();
        let cli = Cli::try_parse_from(["ghostbot", "--goal", "Log in"]).unwrap();

        assert_eq!(cli.run.output_dir, PathBuf::from("from-dotenv"));
        assert_eq!(cli.run.max_steps, 7);
        assert!(cli.command.is_none());
    }
}
