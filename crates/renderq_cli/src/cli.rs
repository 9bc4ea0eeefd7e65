//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

/// Default config path: .config/settings.toml (relative to current working directory)
pub fn default_config_path() -> PathBuf {
    PathBuf::from(".config").join("settings.toml")
}

#[derive(Debug, Parser)]
#[command(name = "renderq", version, about = "Sequential render queue for After Effects' aerender")]
pub struct Cli {
    /// Settings file (created with defaults if missing).
    #[arg(long, global = true, env = "RENDERQ_CONFIG", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Queue a project for rendering.
    Add(AddArgs),
    /// Show the queue.
    List {
        /// Print jobs as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Remove a job by id (a unique prefix is enough).
    Remove {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Render every pending job, one at a time.
    Run,
    /// Remove jobs from the queue.
    Clear {
        /// Only remove completed, failed and cancelled jobs.
        #[arg(long)]
        finished: bool,
    },
    /// Estimate render time from history.
    Estimate {
        /// Project display name (usually the file name).
        name: String,
        /// Frame count to estimate for (defaults to `renderer.estimate_frames`).
        #[arg(long)]
        frames: Option<u32>,
    },
    /// Show recorded render history.
    History {
        /// Only this project.
        name: Option<String>,
    },
    /// Save the renderer executable path to the settings file.
    SetRenderer {
        #[arg(value_hint = ValueHint::ExecutablePath)]
        path: PathBuf,
    },
    /// Send a test email with the configured settings.
    TestEmail,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Project file (.aep).
    #[arg(value_hint = ValueHint::FilePath)]
    pub project: PathBuf,

    /// Display name (defaults to the file name).
    #[arg(long)]
    pub name: Option<String>,

    /// Composition to render; omit or pass "All Comps" for the project's render queue.
    #[arg(long = "comp")]
    pub composition: Option<String>,

    /// Output file path.
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Render settings template.
    #[arg(long = "render-settings")]
    pub render_settings: Option<String>,

    /// Output module template.
    #[arg(long = "output-module")]
    pub output_module: Option<String>,
}
