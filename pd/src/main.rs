//! PartyDaemon - reactive multi-agent party planner
//!
//! CLI entry point.

use std::fs;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use serde_json::Map;
use tracing::{debug, info};

use partydaemon::analyzer::{DependencyGraph, KeywordTable, agent_name};
use partydaemon::cli::{Cli, Command, OutputFormat, get_log_path};
use partydaemon::config::Config;
use partydaemon::domain::{AgentStatus, SourceType};
use partydaemon::events::Topic;
use partydaemon::orchestrator::{Orchestrator, SessionSnapshot};

/// Upper bound on waiting for a session to settle
const MAX_SETTLE_WAIT: Duration = Duration::from_secs(30);

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            inputs,
            tags,
            remove,
            settle_ms,
            format,
        } => cmd_run(config, inputs, tags, remove, Duration::from_millis(settle_ms), format).await,
        Command::Classify { text, tags } => cmd_classify(&config, &text, &tags),
        Command::Topics => cmd_topics(),
        Command::Graph => cmd_graph(&config),
    }
}

/// Run one planning session end to end
async fn cmd_run(
    config: Config,
    inputs: Vec<String>,
    tags: Vec<String>,
    remove: Option<usize>,
    settle: Duration,
    format: OutputFormat,
) -> Result<()> {
    debug!(inputs = inputs.len(), ?remove, ?settle, "cmd_run: called");
    let mut orchestrator = Orchestrator::new(config)?;
    orchestrator.start()?;

    let session_id = orchestrator.create_session(None, Vec::new()).await?;
    let mut input_ids = Vec::with_capacity(inputs.len());
    for text in &inputs {
        let id = orchestrator
            .add_input(&session_id, text, SourceType::Text, tags.clone(), Map::new())
            .await?;
        input_ids.push(id);
    }
    orchestrator.wait_until_settled(&session_id, settle, MAX_SETTLE_WAIT).await;

    if let Some(index) = remove {
        let input_id = input_ids
            .get(index)
            .ok_or_else(|| eyre!("--remove {} is out of range ({} inputs)", index, input_ids.len()))?;
        orchestrator.remove_input(&session_id, input_id).await?;
        orchestrator.wait_until_settled(&session_id, settle, MAX_SETTLE_WAIT).await;
    }

    let snapshot = orchestrator
        .get_session_status(&session_id)
        .await
        .ok_or_else(|| eyre!("Session {} vanished", session_id))?;
    orchestrator.stop().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Text => print_snapshot(&snapshot),
    }
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let state = &snapshot.state;
    println!("{} {}", "Session".bold(), state.session_id.cyan());
    println!("  status:  {}", state.status.to_string().yellow());
    println!("  version: {}", state.version);
    println!("  inputs:  {}", state.inputs.len());

    println!("\n{}", "Agents".bold());
    for (name, result) in &state.agent_results {
        let status = match result.status {
            AgentStatus::Completed => result.status.to_string().green(),
            AgentStatus::Failed => result.status.to_string().red(),
            AgentStatus::Pending | AgentStatus::Running => result.status.to_string().yellow(),
        };
        println!("  {:<18} {} ({:.2})", name, status, result.confidence);
    }

    if let Some(budget) = &state.budget {
        println!(
            "\n{} ${:.0} - ${:.0}",
            "Budget".bold(),
            budget.total_budget.min,
            budget.total_budget.max
        );
        for (agent, range) in &budget.breakdown {
            println!("  {:<18} ${:.0} - ${:.0}", agent, range.min, range.max);
        }
    }

    if let Some(plan) = &state.final_plan {
        println!("\n{} {}% complete", "Plan".bold(), plan.completion_percent);
        for rec in &plan.recommendations {
            println!("  - {}", rec);
        }
        if !plan.next_steps.is_empty() {
            println!("\n{}", "Next steps".bold());
            for step in &plan.next_steps {
                println!("  - {}", step.dimmed());
            }
        }
    }
}

/// Print category scores for a piece of text
fn cmd_classify(config: &Config, text: &str, tags: &[String]) -> Result<()> {
    debug!(%text, ?tags, "cmd_classify: called");
    let keywords = KeywordTable::from_config(&config.classifier).context("Invalid classifier.keywords")?;
    let graph = DependencyGraph::from_config(&config.classifier)?;

    let mut scores: Vec<(String, u32)> = keywords.score(text, tags, &[]).into_iter().collect();
    scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    if scores.is_empty() {
        println!("{}", "No category matched".dimmed());
        return Ok(());
    }
    for (category, score) in scores {
        let priority = graph.priority(&category).unwrap_or(5);
        println!(
            "{:<18} score {:>2}  priority {}",
            agent_name(&category).green(),
            score,
            priority
        );
    }
    Ok(())
}

fn cmd_topics() -> Result<()> {
    for topic in Topic::ALL {
        println!("{}", topic);
    }
    Ok(())
}

/// Print the dependency graph in priority order
fn cmd_graph(config: &Config) -> Result<()> {
    let graph = DependencyGraph::from_config(&config.classifier).context("Invalid classifier.dependencies")?;
    for (category, priority) in graph.by_priority() {
        let affects = graph.affects(category);
        let downstream = if affects.is_empty() {
            "-".dimmed().to_string()
        } else {
            affects.iter().map(|c| agent_name(c)).collect::<Vec<_>>().join(", ")
        };
        println!("[{}] {:<16} → {}", priority, agent_name(category).cyan(), downstream);
    }
    println!("{}", "Graph is acyclic".green());
    Ok(())
}
