//! Veil - assemble, inspect and run fingerprint evasion hook packages

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tokio::io::BufReader;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use veil_core::{
    ConfigOverrides, EngineConfig, ExecutionContext, HookRegistry, PackageAssembler,
    ProfileManager, ProfileService, ProfileStore, RunReport, TargetKind,
};

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "veil",
    about = "Profile-driven fingerprint evasion hooks for embedded JavaScript runtimes",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit structured JSON logs with span context
    #[clap(long, global = true)]
    trace: bool,

    /// Configuration file (defaults to veil.yml in the platform config directory)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Profile document, overrides VEIL_PROFILE and the config file
    #[clap(long, global = true)]
    profile: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// List registered hooks in scheduling order
    Hooks {
        /// Mark which hooks would be packed for this target
        #[clap(long)]
        target: Option<TargetKind>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Assemble a package and run it against the profile
    Run {
        /// Execution-context kind to assemble for
        #[clap(long)]
        target: Option<TargetKind>,

        /// Hooks to leave out (comma-separated)
        #[clap(long, value_delimiter = ',')]
        exclude: Vec<String>,

        /// Script evaluated before the hooks, e.g. a navigator shim
        #[clap(long)]
        host_script: Option<PathBuf>,

        /// Expression evaluated after the hooks; its JSON value is printed
        #[clap(long)]
        inspect: Option<String>,

        /// Print the run report as JSON
        #[clap(long)]
        json: bool,

        /// Exit non-zero when any hook fails
        #[clap(long)]
        strict: bool,
    },

    /// Resolve a path in the profile and print its value
    Query {
        /// Path segments, e.g. `navigator userAgent`
        path: Vec<String>,
    },

    /// Check a profile document and report what each hook would receive
    Validate {
        /// Profile to check (defaults to the configured profile)
        file: Option<PathBuf>,

        /// Output results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Answer profile requests as JSON lines on stdin/stdout
    Serve {
        /// Accept set_profile_string requests
        #[clap(long)]
        allow_writes: bool,
    },
}

fn initialize_tracing(log_level: &LogLevel, trace: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if trace {
        // JSON output for structured tracing - MUST go to stderr
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        // stdout carries command output and the serve protocol
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.trace);

    let overrides = ConfigOverrides {
        config_file: cli.config.clone(),
        profile: cli.profile.clone(),
        ..Default::default()
    };

    match cli.command {
        Command::Hooks { target, json } => hooks_command(target, json),
        Command::Run {
            target,
            exclude,
            host_script,
            inspect,
            json,
            strict,
        } => {
            let overrides = ConfigOverrides {
                target,
                exclude,
                ..overrides
            };
            run_command(&overrides, host_script, inspect, json, strict)
        }
        Command::Query { path } => query_command(&overrides, &path),
        Command::Validate { file, json } => validate_command(&overrides, file, json),
        Command::Serve { allow_writes } => serve_command(&overrides, allow_writes).await,
    }
}

fn load_profile(config: &EngineConfig) -> Result<Arc<ProfileManager>> {
    let manager = ProfileManager::global();
    manager
        .init(config)
        .context("Failed to initialize the profile manager")?;
    Ok(manager)
}

#[derive(Tabled)]
struct HookTableRow {
    #[tabled(rename = "Codename")]
    codename: String,
    #[tabled(rename = "Priority")]
    priority: i32,
    #[tabled(rename = "Targets")]
    targets: String,
    #[tabled(rename = "Packed")]
    packed: String,
}

fn hooks_command(target: Option<TargetKind>, json: bool) -> Result<()> {
    let registry = HookRegistry::global();

    if json {
        let hooks: Vec<serde_json::Value> = registry
            .iter()
            .map(|e| {
                serde_json::json!({
                    "codename": e.codename(),
                    "priority": e.priority(),
                    "targets": e.allowed_targets().to_string(),
                    "packed": target.map(|t| e.allowed_targets().intersects(t.scope())),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&hooks)?);
        return Ok(());
    }

    let rows: Vec<HookTableRow> = registry
        .iter()
        .map(|e| HookTableRow {
            codename: e.codename().to_string(),
            priority: e.priority(),
            targets: e.allowed_targets().to_string(),
            packed: match target {
                Some(t) if e.allowed_targets().intersects(t.scope()) => "yes".into(),
                Some(_) => "no".into(),
                None => "-".into(),
            },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
    Ok(())
}

#[derive(Tabled)]
struct OutcomeTableRow {
    #[tabled(rename = "Hook")]
    codename: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Time (ms)")]
    elapsed: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn print_report(report: &RunReport) {
    let rows: Vec<OutcomeTableRow> = report
        .outcomes
        .iter()
        .map(|o| OutcomeTableRow {
            codename: o.codename.clone(),
            outcome: o.outcome.to_string(),
            elapsed: format!("{:.2}", o.elapsed_ms),
            message: o.message.clone().unwrap_or_default(),
        })
        .collect();

    println!("Run {} ({})\n", report.trace_id, report.target);
    if rows.is_empty() {
        println!("No hooks packed.");
        return;
    }
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
}

fn run_command(
    overrides: &ConfigOverrides,
    host_script: Option<PathBuf>,
    inspect: Option<String>,
    json: bool,
    strict: bool,
) -> Result<()> {
    let config = EngineConfig::resolve(overrides)?;
    let manager = load_profile(&config)?;
    let store = manager
        .store()
        .ok_or_else(|| anyhow!("Profile manager has no profile loaded"))?;

    let package = PackageAssembler::default().pack(config.target, &config.excluded());
    info!(hooks = ?package.codenames(), "Running package");

    let mut context = ExecutionContext::with_config(package, store, &config.runtime)?;

    if let Some(path) = host_script {
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read host script: {}", path.display()))?;
        context
            .eval_host_script(&source)
            .with_context(|| format!("Host script failed: {}", path.display()))?;
        debug!(path = %path.display(), "Host script installed");
    }

    let report = context.run();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if let Some(expression) = inspect {
        let value = context
            .eval_host_script(&expression)
            .context("Inspect expression failed")?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    if strict && !report.is_clean() {
        let failed = report.failures().count();
        return Err(anyhow!("{failed} hook(s) failed"));
    }
    Ok(())
}

fn query_command(overrides: &ConfigOverrides, path: &[String]) -> Result<()> {
    let config = EngineConfig::resolve(overrides)?;
    let manager = load_profile(&config)?;
    let store = manager
        .store()
        .ok_or_else(|| anyhow!("Profile manager has no profile loaded"))?;

    match store.find(path) {
        Some(node) => {
            println!("{}", serde_json::to_string_pretty(&node.to_value())?);
            Ok(())
        }
        None => Err(anyhow!("Path not found in profile: {}", path.join("."))),
    }
}

#[derive(Tabled)]
struct ValidationRow {
    #[tabled(rename = "Hook")]
    codename: String,
    #[tabled(rename = "Data")]
    data: String,
}

fn validate_command(overrides: &ConfigOverrides, file: Option<PathBuf>, json: bool) -> Result<()> {
    let path = match file {
        Some(path) => path,
        None => EngineConfig::resolve(overrides)?
            .profile
            .ok_or_else(|| anyhow!("No profile given and none configured"))?,
    };
    let store = ProfileStore::load(&path)
        .with_context(|| format!("Invalid profile: {}", path.display()))?;

    let client_hints = if store.has_client_hints() {
        Some(store.user_agent_metadata().map_err(|e| e.to_string()))
    } else {
        None
    };

    let hooks: Vec<(String, bool)> = HookRegistry::global()
        .iter()
        .map(|entry| {
            let hook = entry.construct();
            (entry.codename().to_string(), hook.data(&store).is_some())
        })
        .collect();

    if json {
        let output = serde_json::json!({
            "path": path,
            "digest": store.digest(),
            "client_hints": match &client_hints {
                Some(Ok(_)) => serde_json::json!("valid"),
                Some(Err(e)) => serde_json::json!({ "invalid": e }),
                None => serde_json::Value::Null,
            },
            "hooks": hooks
                .iter()
                .map(|(codename, has_data)| serde_json::json!({ "codename": codename, "data": has_data }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Profile: {}", path.display());
    println!("Digest:  {}", store.digest());
    match &client_hints {
        Some(Ok(_)) => println!("Client hints: valid"),
        Some(Err(e)) => println!("Client hints: INVALID ({e})"),
        None => println!("Client hints: absent"),
    }
    println!();

    let rows: Vec<ValidationRow> = hooks
        .into_iter()
        .map(|(codename, has_data)| ValidationRow {
            codename,
            data: if has_data { "present" } else { "none (no-op)" }.to_string(),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
    Ok(())
}

async fn serve_command(overrides: &ConfigOverrides, allow_writes: bool) -> Result<()> {
    let config = EngineConfig::resolve(overrides)?;
    let manager = ProfileManager::global();

    // A missing or broken profile is not fatal: the service reports disabled.
    if let Err(e) = manager.init(&config) {
        warn!(error = %e, "Serving without a profile");
    }

    let service = ProfileService::new(manager).with_writes(allow_writes);
    let served = service
        .serve_json_lines(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    info!(served, "Profile service finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::parse_from([
            "veil",
            "--log-level",
            "debug",
            "run",
            "--target",
            "worker",
            "--exclude",
            "webgl,navigator_hardware",
            "--strict",
        ]);
        match cli.command {
            Command::Run {
                target,
                exclude,
                strict,
                json,
                ..
            } => {
                assert_eq!(target, Some(TargetKind::DedicatedWorker));
                assert_eq!(exclude, vec!["webgl", "navigator_hardware"]);
                assert!(strict);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_profile_after_subcommand() {
        let cli = Cli::parse_from(["veil", "query", "navigator", "userAgent", "--profile", "p.json"]);
        assert_eq!(cli.profile, Some(PathBuf::from("p.json")));
        assert!(matches!(cli.command, Command::Query { ref path } if path.len() == 2));
    }

    #[test]
    fn test_unknown_target_rejected() {
        assert!(Cli::try_parse_from(["veil", "run", "--target", "service_worker"]).is_err());
    }
}
