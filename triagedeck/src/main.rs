//! triagedeck - CLI for the issue-triage core
//!
//! Two subcommands exercise the library end to end:
//!
//! - `issues` loads a raw provider payload file, runs it through
//!   normalization and the view pipeline, and prints the resulting groups.
//! - `feed` replays a fix-agent event stream (from a file, or live from
//!   stdin) into a processing session and prints the reconciled activity
//!   feed. Ctrl-C cancels the run.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use triagedeck_core::normalize::normalize_batch;
use triagedeck_core::run::Dispatcher;
use triagedeck_core::session::{SessionEvent, SessionStore};
use triagedeck_core::types::{GroupBy, Issue, RunMode, Severity, SortField};
use triagedeck_core::view::{SearchScope, ViewState};
use triagedeck_core::{Config, SortDirection};

#[derive(Parser)]
#[command(name = "triagedeck")]
#[command(about = "Triage issues and replay fix-agent runs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a provider payload file and print the composed issue groups
    Issues {
        /// JSON file mapping provider name to an array of raw payloads
        file: PathBuf,

        /// Restrict to these providers (repeatable)
        #[arg(long)]
        provider: Vec<String>,

        /// Restrict to these severities (repeatable)
        #[arg(long)]
        severity: Vec<Severity>,

        /// Free-text query
        #[arg(short, long)]
        query: Option<String>,

        /// Search scope: all, title, description, location, id
        #[arg(long, default_value = "all")]
        scope: SearchScope,

        /// Sort field: priority, count, title, provider, severity, repo
        #[arg(long)]
        sort: Option<SortField>,

        /// Sort direction: asc or desc (defaults per field)
        #[arg(long)]
        direction: Option<String>,

        /// Group dimension: provider, severity, repo
        #[arg(long)]
        group_by: Option<GroupBy>,

        /// Lower priority bound (inclusive)
        #[arg(long)]
        min_priority: Option<u8>,

        /// Upper priority bound (inclusive)
        #[arg(long)]
        max_priority: Option<u8>,
    },

    /// Replay an agent event stream into a processing session
    Feed {
        /// Issue being processed
        issue_id: String,

        /// Stream file; reads stdin when omitted
        file: Option<PathBuf>,

        /// Run mode: plan or build
        #[arg(long)]
        mode: Option<RunMode>,

        /// Model selection
        #[arg(long)]
        model: Option<String>,

        /// Iteration cap for the run
        #[arg(long)]
        max_iterations: Option<u32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = triagedeck_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    match cli.command {
        Command::Issues {
            file,
            provider,
            severity,
            query,
            scope,
            sort,
            direction,
            group_by,
            min_priority,
            max_priority,
        } => {
            let issues = load_issues(&file)?;
            let mut view = ViewState::new();
            view.scope = scope;
            view.query = query.unwrap_or_default();
            view.filters.providers = provider;
            view.filters.severities = severity;
            view.group_by = group_by;
            if min_priority.is_some() || max_priority.is_some() {
                view.filters
                    .set_priority_range(min_priority.unwrap_or(0), max_priority.unwrap_or(100));
            }
            if let Some(field) = sort {
                view.sort.field = field;
                view.sort.direction = match direction.as_deref() {
                    Some("asc") => SortDirection::Asc,
                    Some("desc") => SortDirection::Desc,
                    Some(other) => anyhow::bail!("unknown sort direction: {}", other),
                    None => field.default_direction(),
                };
            }

            print_groups(&view, &issues);
        }

        Command::Feed {
            issue_id,
            file,
            mode,
            model,
            max_iterations,
        } => {
            let mut options = config.processing.to_options()?;
            if let Some(mode) = mode {
                options.mode = mode;
            }
            if model.is_some() {
                options.model = model;
            }
            if let Some(cap) = max_iterations {
                options.max_iterations = cap;
            }

            run_feed(&issue_id, file, &config, &options)?;
        }
    }

    Ok(())
}

fn load_issues(file: &PathBuf) -> Result<Vec<Issue>> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let by_provider: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&content).context("payload file must be a JSON object")?;

    let mut issues = Vec::new();
    for (provider, payloads) in &by_provider {
        let payloads = payloads
            .as_array()
            .with_context(|| format!("provider {} must map to an array", provider))?;
        let result = normalize_batch(provider, payloads);
        for warning in &result.warnings {
            tracing::warn!(provider = %provider, warning = %warning, "skipped payload record");
            eprintln!("warning: {}: {}", provider, warning);
        }
        issues.extend(result.issues);
    }
    Ok(issues)
}

fn print_groups(view: &ViewState, issues: &[Issue]) {
    let groups = view.compose(issues);
    let total: usize = groups.iter().map(|g| g.count).sum();
    println!("{} issue(s) in {} group(s)\n", total, groups.len());

    for group in &groups {
        println!("== {} ({})", group.label, group.count);
        for issue in &group.issues {
            println!(
                "  {:<20} {:<8} p{:<3} x{:<5} {}",
                issue.id,
                issue.severity.as_str(),
                issue.priority,
                issue.count,
                issue.title
            );
        }
        println!();
    }
}

fn run_feed(
    issue_id: &str,
    file: Option<PathBuf>,
    config: &Config,
    options: &triagedeck_core::types::ProcessOptions,
) -> Result<()> {
    let store = Arc::new(SessionStore::new(
        config.retention.max_activities_per_session,
    ));
    let dispatcher = Dispatcher::new(Arc::clone(&store), config.stream.stale_after_secs);

    let handles = dispatcher.submit(&[issue_id.to_string()], options)?;
    let handle = Arc::clone(&handles[0]);

    let _sub = store.subscribe(issue_id, |event| match event {
        SessionEvent::Activity(activity) => {
            let tool = activity.tool.as_deref().unwrap_or("");
            println!(
                "{} [{}/{}] {} {}",
                activity.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S"),
                format!("{:?}", activity.kind).to_lowercase(),
                format!("{:?}", activity.status).to_lowercase(),
                tool,
                activity.details
            );
        }
        SessionEvent::Metrics(metrics) => {
            println!(
                "-- iteration {}/{} cost ${:.2} ({}ms)",
                metrics.iteration,
                metrics.max_iterations,
                metrics.total_cost_usd,
                metrics.total_duration_ms
            );
        }
        SessionEvent::Completed => println!("-- run completed"),
        SessionEvent::Failed { message } => println!("-- run failed: {}", message),
        SessionEvent::Cancelled => println!("-- run cancelled"),
    });

    let cancel_handle = Arc::clone(&handle);
    ctrlc::set_handler(move || {
        cancel_handle.cancel();
    })
    .context("failed to install ctrl-c handler")?;

    match file {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            for line in content.lines() {
                handle.ingest_line(line);
            }
        }
        None => {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                handle.ingest_line(&line?);
                if handle.cancel_token().is_cancelled() {
                    break;
                }
            }
        }
    }
    handle.complete();
    tracing::info!(issue_id, "feed replay finished");

    if let Some(session) = store.get(issue_id) {
        println!(
            "\nsession {}: {} ({} activities)",
            session.issue_id,
            session.status.as_str(),
            session.activities.len()
        );
    }
    Ok(())
}
