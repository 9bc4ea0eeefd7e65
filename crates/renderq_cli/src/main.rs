//! renderq - Main entry point
//!
//! Loads configuration, initializes logging, restores the persisted queue
//! and dispatches the requested command.

mod cli;

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam::channel::RecvTimeoutError;

use renderq_core::config::{ConfigManager, ConfigSection};
use renderq_core::format::{format_duration, format_eta};
use renderq_core::jobs::{Job, JobId, JobSpec, JobStatus};
use renderq_core::logging::init_tracing_with_file;
use renderq_core::orchestrator::{QueueEvent, QueueOrchestrator, RunSummary};
use renderq_core::store::JsonFileStore;

use cli::{default_config_path, AddArgs, Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logs directory path)
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = ConfigManager::new(&config_path);
    if let Err(e) = config.load_or_create() {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
    }

    let logs_dir = config.logs_folder();
    let _log_guard = init_tracing_with_file(config.settings().logging.level, &logs_dir);

    tracing::debug!("renderq {} starting", renderq_core::version());
    tracing::debug!("Config: {}", config_path.display());

    if let Err(e) = config.ensure_dirs_exist() {
        tracing::error!("Failed to create directories: {}", e);
        eprintln!("Warning: Failed to create directories: {}", e);
    }

    match cli.command {
        Command::SetRenderer { path } => set_renderer(&mut config, &path),
        Command::Add(args) => add(&open_queue(&config)?, args),
        Command::List { json } => list(&open_queue(&config)?, json),
        Command::Remove { id } => remove(&open_queue(&config)?, &id),
        Command::Run => run(&open_queue(&config)?),
        Command::Clear { finished } => clear(&open_queue(&config)?, finished),
        Command::Estimate { name, frames } => {
            let frames = frames.unwrap_or(config.settings().renderer.estimate_frames);
            match open_queue(&config)?.estimate(&name, frames) {
                Some(secs) => println!("{} ({} frames): ~{}", name, frames, format_duration(secs)),
                None => println!("{}: no render history yet", name),
            }
            Ok(())
        }
        Command::History { name } => history(&open_queue(&config)?, name.as_deref()),
        Command::TestEmail => {
            open_queue(&config)?
                .notifications()
                .send_test_email()
                .context("Test email failed")?;
            println!("Test email sent");
            Ok(())
        }
    }
}

/// Open the store and restore the persisted queue.
fn open_queue(config: &ConfigManager) -> Result<QueueOrchestrator> {
    let store_file = config.store_file();
    let store = JsonFileStore::open(&store_file)
        .with_context(|| format!("Failed to open store {}", store_file.display()))?;

    let queue = QueueOrchestrator::builder(Arc::new(store))
        .settings(config.settings().clone())
        .job_logs_dir(config.logs_folder().join("jobs"))
        .build();
    queue.restore().context("Failed to restore queue")?;
    Ok(queue)
}

fn set_renderer(config: &mut ConfigManager, path: &Path) -> Result<()> {
    config.settings_mut().renderer.executable_path = path.to_string_lossy().to_string();
    config
        .update_section(ConfigSection::Renderer)
        .context("Failed to save renderer settings")?;
    println!("Renderer set to {}", path.display());
    Ok(())
}

fn add(queue: &QueueOrchestrator, args: AddArgs) -> Result<()> {
    if !args.project.exists() {
        tracing::warn!("Project file does not exist yet: {}", args.project.display());
    }

    let mut spec = JobSpec::new(args.project);
    if let Some(name) = args.name {
        spec = spec.with_name(name);
    }
    if let Some(comp) = args.composition {
        spec = spec.with_composition(comp);
    }
    if let Some(output) = args.output {
        spec = spec.with_output(output);
    }
    if let Some(template) = args.render_settings {
        spec = spec.with_render_settings(template);
    }
    if let Some(template) = args.output_module {
        spec = spec.with_output_module(template);
    }

    let id = queue.enqueue(spec);
    let job = queue
        .job(id)
        .ok_or_else(|| anyhow!("Job {} vanished after enqueue", id))?;
    println!("Queued {} [{}]{}", job.name(), id.short(), estimate_suffix(&job));
    Ok(())
}

fn list(queue: &QueueOrchestrator, json: bool) -> Result<()> {
    let jobs = queue.jobs();
    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }

    for job in &jobs {
        println!("{}  {:<10} {}{}", job.id.short(), job.status.as_str(), job.name(), status_detail(job));
    }

    let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
    println!(
        "\n{} items • {} pending • {} completed • {} errors",
        jobs.len(),
        count(JobStatus::Pending),
        count(JobStatus::Completed),
        count(JobStatus::Error)
    );
    Ok(())
}

fn remove(queue: &QueueOrchestrator, prefix: &str) -> Result<()> {
    let job = queue
        .find_job(prefix)
        .ok_or_else(|| anyhow!("No single job matches '{}'", prefix))?;
    queue.remove(job.id);
    println!("Removed {} [{}]", job.name(), job.id.short());
    Ok(())
}

fn clear(queue: &QueueOrchestrator, finished_only: bool) -> Result<()> {
    if finished_only {
        let removed = queue.clear_finished();
        println!("Removed {} finished job(s)", removed);
    } else {
        queue.clear()?;
        println!("Queue cleared");
    }
    Ok(())
}

fn run(queue: &QueueOrchestrator) -> Result<()> {
    let events = queue.subscribe();
    let handle = queue.start_all_in_background()?;
    stop_on_interrupt(queue.clone())?;

    loop {
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(QueueEvent::RunFinished(_)) => break,
            Ok(event) => print_event(queue, &event),
            Err(RecvTimeoutError::Timeout) if handle.is_finished() => break,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let summary = handle
        .join()
        .map_err(|_| anyhow!("Render thread panicked"))??;
    print_summary(&summary, &queue.stats());
    Ok(())
}

/// First Ctrl-C stops the run after cancelling the active job; a second one exits.
fn stop_on_interrupt(queue: QueueOrchestrator) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("Failed to start signal runtime")?;

    thread::Builder::new()
        .name("renderq-signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                    return;
                }
                eprintln!("\nStopping... (Ctrl-C again to quit)");
                queue.stop_all();

                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            });
        })
        .context("Failed to start signal thread")?;
    Ok(())
}

fn history(queue: &QueueOrchestrator, name: Option<&str>) -> Result<()> {
    let names = match name {
        Some(name) => vec![name.to_string()],
        None => queue.history().projects(),
    };
    if names.is_empty() {
        println!("No render history yet");
        return Ok(());
    }

    for name in names {
        let records = queue.history().records(&name);
        println!("{} ({} renders)", name, records.len());
        for record in records {
            println!(
                "  {}  {:>10}  {} frames",
                record.timestamp.format("%Y-%m-%d %H:%M"),
                format_duration(record.duration_secs),
                record.frame_count
            );
        }
    }
    Ok(())
}

fn job_name(queue: &QueueOrchestrator, id: JobId) -> String {
    queue
        .job(id)
        .map(|j| j.name().to_string())
        .unwrap_or_else(|| id.short())
}

fn print_event(queue: &QueueOrchestrator, event: &QueueEvent) {
    match event {
        QueueEvent::JobStarted { job_id } => {
            println!("Rendering {}", job_name(queue, *job_id));
        }
        QueueEvent::Progress(update) => {
            let frames = match update.total_frames {
                Some(total) => format!(" frame {}/{}", update.current_frame, total),
                None => String::new(),
            };
            println!("  {:>3}%{}  {}", update.percent, frames, format_eta(update.eta_secs));
        }
        QueueEvent::JobFinished(update) => {
            let name = job_name(queue, update.job_id);
            match update.status {
                JobStatus::Completed => println!(
                    "Completed {} in {}",
                    name,
                    format_duration(update.duration_secs.unwrap_or(0))
                ),
                JobStatus::Cancelled => println!("Cancelled {}", name),
                _ => println!(
                    "Failed {}: {}",
                    name,
                    update.error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
        QueueEvent::Output { .. }
        | QueueEvent::JobCreated { .. }
        | QueueEvent::JobRemoved { .. }
        | QueueEvent::RunFinished(_) => {}
    }
}

fn print_summary(run: &RunSummary, totals: &RunSummary) {
    println!(
        "\n{} rendered • {} failed • {} cancelled • {} total • {}% success",
        run.completed,
        run.failed,
        run.cancelled,
        format_duration(run.total_secs),
        run.success_rate()
    );
    tracing::info!(
        processed = totals.processed,
        success_rate = totals.success_rate(),
        "Session totals"
    );
}

fn estimate_suffix(job: &Job) -> String {
    job.estimate_secs
        .map(|secs| format!(" (est. {})", format_duration(secs)))
        .unwrap_or_default()
}

fn status_detail(job: &Job) -> String {
    match job.status {
        JobStatus::Pending => estimate_suffix(job),
        JobStatus::Rendering => format!("  {}%", job.progress.percent),
        JobStatus::Completed => format!(
            "  {} • {} frames",
            format_duration(job.duration_secs.unwrap_or(0)),
            job.frames.unwrap_or(0)
        ),
        JobStatus::Error => format!("  {}", job.error.as_deref().unwrap_or("unknown error")),
        JobStatus::Cancelled => String::new(),
    }
}
