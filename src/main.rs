//! Ralph - autonomous coding-agent loop
//!
//! Works through a PRD checklist one task at a time with a coding agent,
//! leaving a short review window between iterations.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ralph_loop::agent::ClaudeAgent;
use ralph_loop::console::{format_stats, format_task_line, ConsoleObserver};
use ralph_loop::prompt::sanitize_task_description;
use ralph_loop::r#loop::{LoopCommand, LoopHandle, LoopOrchestrator, OrchestratorConfig};
use ralph_loop::task::{next_pending, PrdReader, TaskStats};
use ralph_loop::{ProjectConfig, RalphError, Result, StallPolicy, TaskRequirements};

#[derive(Parser)]
#[command(name = "ralph")]
#[command(version = "0.1.0")]
#[command(about = "Autonomous coding-agent loop over a PRD checklist", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the loop, reading control commands from stdin
    Run {
        /// Maximum iterations per session (0 for unlimited)
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// What to do when the agent stalls
        #[arg(long, value_enum)]
        stall_policy: Option<StallPolicy>,

        /// Acceptance criteria, comma separated (tests, run-tests, typecheck,
        /// lint, docs, commit) or "none"
        #[arg(long, value_name = "LIST")]
        require: Option<String>,

        /// Wait for a start command instead of starting immediately
        #[arg(long)]
        no_start: bool,
    },

    /// Show task progress
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every task in the PRD
    Tasks,

    /// Ask the agent to write a PRD from a description
    Prd {
        /// What to build
        #[arg(required = true, trailing_var_arg = true)]
        description: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration files
    Validate,

    /// Show configuration file paths
    Paths,
}

const CONSOLE_HELP: &str = "Commands:
  start              start a new session
  stop               stop and reset the session
  pause              pause after cancelling the current step
  resume             continue a paused loop
  next | step        run a single iteration
  prd <text>         generate a PRD from a description
  max <n>            set max iterations (0 = unlimited)
  require <list>     set requirements (tests, run-tests, typecheck, lint, docs, commit, none)
  status             show loop status
  help               show this help
  quit               stop and exit";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing; loop events already reach the console through the
    // observer, so library logs stay quiet unless asked for.
    let filter = if cli.verbose {
        "ralph=debug,ralph_loop=debug"
    } else {
        "ralph=info,ralph_loop=error"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Resolve project path
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.is_dir() {
        return Err(RalphError::MissingFile { path: project_path });
    }

    match cli.command {
        Commands::Run {
            max_iterations,
            stall_policy,
            require,
            no_start,
        } => {
            let mut config = ProjectConfig::load(&project_path)?;
            if let Some(max) = max_iterations {
                config.settings.max_iterations = max;
            }
            if let Some(policy) = stall_policy {
                config.loop_config.stall_policy = policy;
            }
            if let Some(list) = require {
                config.requirements = parse_requirements(&list)?;
            }
            config.validate()?;
            run_loop(&project_path, &config, no_start).await
        }

        Commands::Status { json } => {
            let config = ProjectConfig::load(&project_path)?;
            let reader = existing_prd(&project_path, &config).await?;
            let tasks = reader.tasks().await?;
            let stats = TaskStats::from_tasks(&tasks);
            let next = next_pending(&tasks);

            if json {
                let value = serde_json::json!({
                    "prd": reader.prd_path(),
                    "completed": stats.completed,
                    "pending": stats.pending,
                    "total": stats.total,
                    "percent_complete": stats.percent_complete(),
                    "next_task": next,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{} {}", "PRD:".cyan().bold(), reader.prd_path().display());
                println!("{}", format_stats(&stats, next));
            }
            Ok(())
        }

        Commands::Tasks => {
            let config = ProjectConfig::load(&project_path)?;
            let reader = existing_prd(&project_path, &config).await?;
            let tasks = reader.tasks().await?;
            if tasks.is_empty() {
                return Err(RalphError::EmptyTaskList {
                    path: reader.prd_path().to_path_buf(),
                });
            }
            for task in &tasks {
                println!("{}", format_task_line(task));
            }
            Ok(())
        }

        Commands::Prd { description } => {
            let description = description.join(" ");
            if sanitize_task_description(&description).is_empty() {
                return Err(RalphError::invalid_config(
                    "description",
                    "must not be empty",
                ));
            }
            let config = ProjectConfig::load(&project_path)?;
            generate_prd(&project_path, &config, description).await
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                let config = ProjectConfig::load(&project_path)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    print!("{}", config.to_toml()?);
                }
                Ok(())
            }
            ConfigAction::Validate => {
                let config = ProjectConfig::load(&project_path)?;
                config.validate()?;
                println!("{} Configuration is valid", "OK".green().bold());
                Ok(())
            }
            ConfigAction::Paths => {
                let project_file = ProjectConfig::config_path(&project_path);
                println!(
                    "{} {}{}",
                    "Project:".cyan(),
                    project_file.display(),
                    found_marker(&project_file)
                );
                match ProjectConfig::user_config_path() {
                    Some(user_file) => println!(
                        "{} {}{}",
                        "User:".cyan(),
                        user_file.display(),
                        found_marker(&user_file)
                    ),
                    None => println!("{} (no config directory)", "User:".cyan()),
                }
                Ok(())
            }
        },
    }
}

fn found_marker(path: &Path) -> String {
    if path.exists() {
        format!(" {}", "(found)".green())
    } else {
        format!(" {}", "(not found)".dimmed())
    }
}

fn parse_requirements(list: &str) -> Result<TaskRequirements> {
    TaskRequirements::from_names(list.split(|c: char| c == ',' || c.is_whitespace()))
}

/// Reader for the configured PRD, which must exist.
async fn existing_prd(project_path: &Path, config: &ProjectConfig) -> Result<PrdReader> {
    let reader = PrdReader::new(
        config.prd_path(project_path),
        config.progress_path(project_path),
    )?;
    if reader.read_prd().await?.is_none() {
        return Err(RalphError::MissingFile {
            path: reader.prd_path().to_path_buf(),
        });
    }
    Ok(reader)
}

fn build_orchestrator(
    project_path: &Path,
    config: &ProjectConfig,
) -> Result<(LoopOrchestrator, LoopHandle)> {
    let agent = ClaudeAgent::from_config(&config.agent, project_path.to_path_buf());
    if !agent.is_available() {
        return Err(RalphError::MissingTool {
            tool: agent.command().to_string(),
        });
    }
    LoopOrchestrator::new(
        OrchestratorConfig::from_project(project_path.to_path_buf(), config),
        Arc::new(agent),
        Arc::new(ConsoleObserver::new()),
    )
}

enum ConsoleAction {
    Continue,
    /// A command went to the orchestrator.
    Sent,
    Quit,
}

async fn run_loop(project_path: &Path, config: &ProjectConfig, no_start: bool) -> Result<()> {
    let (orchestrator, handle) = build_orchestrator(project_path, config)?;
    let runner = tokio::spawn(orchestrator.run());

    // Revision the loop must move past before an idle loop counts as done.
    let mut awaiting = None;
    if !no_start {
        awaiting = Some(handle.snapshot().revision);
        handle.send(LoopCommand::Start).await?;
    }
    println!("{}", "Type 'help' for commands.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        let baseline = awaiting;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                handle.send(LoopCommand::Stop).await?;
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let before = handle.snapshot().revision;
                    match handle_console_line(&handle, &line).await? {
                        ConsoleAction::Quit => {
                            handle.send(LoopCommand::Stop).await?;
                            break;
                        }
                        ConsoleAction::Sent => awaiting = Some(before),
                        ConsoleAction::Continue => {}
                    }
                }
                Ok(None) | Err(_) => {
                    debug!("stdin closed; waiting for the loop to settle");
                    stdin_open = false;
                }
            },
            _ = handle.wait_until(move |s| {
                baseline.map_or(true, |r| s.revision > r)
                    && !s.status.is_active()
                    && !s.prd_generating
            }), if !stdin_open => break,
        }
    }

    drop(handle);
    let _ = runner.await;
    Ok(())
}

async fn handle_console_line(handle: &LoopHandle, line: &str) -> Result<ConsoleAction> {
    let line = line.trim();
    match line {
        "" => {}
        "quit" | "exit" => return Ok(ConsoleAction::Quit),
        "help" => println!("{}", CONSOLE_HELP),
        "status" => {
            let snapshot = handle.snapshot();
            println!(
                "{} ({} completed{})",
                snapshot.status.status_text(snapshot.iteration + 1),
                snapshot.iteration,
                if snapshot.prd_generating {
                    ", generating PRD"
                } else {
                    ""
                }
            );
        }
        _ => match line.parse::<LoopCommand>() {
            Ok(command) => {
                handle.send(command).await?;
                return Ok(ConsoleAction::Sent);
            }
            Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
        },
    }
    Ok(ConsoleAction::Continue)
}

async fn generate_prd(project_path: &Path, config: &ProjectConfig, description: String) -> Result<()> {
    let (orchestrator, handle) = build_orchestrator(project_path, config)?;
    let runner = tokio::spawn(orchestrator.run());

    handle.send(LoopCommand::GeneratePrd { description }).await?;
    let snapshot = handle.wait_until(|s| s.prd_generations > 0).await?;

    drop(handle);
    let _ = runner.await;

    match snapshot.last_prd_succeeded {
        Some(true) => Ok(()),
        _ => Err(RalphError::agent("PRD generation failed")),
    }
}
