use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, error};

use treekeeper::config::{load_job_document, JobSource, Settings, Toolchain};
use treekeeper::exec::Orchestrator;
use treekeeper::subprocess::SubprocessManager;

/// Apply bulk ownership and permission jobs to filesystem trees
#[derive(Parser)]
#[command(name = "treekeeper")]
#[command(about = "Apply bulk ownership and permission jobs to filesystem trees", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Inline YAML job document
    #[arg(long, value_name = "YAML", conflicts_with_all = ["jobs_file", "jobs_url"])]
    jobs: Option<String>,

    /// Read the job document from a file
    #[arg(long, value_name = "PATH", conflicts_with = "jobs_url")]
    jobs_file: Option<PathBuf>,

    /// Fetch the job document from a URL
    #[arg(long, value_name = "URL")]
    jobs_url: Option<String>,

    /// Validate and probe, but do not change any target
    #[arg(long)]
    dry_run: bool,

    /// Treat change-command failures as expected (running without root)
    #[arg(long)]
    unprivileged: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let settings = match Settings::from_env() {
        Ok(mut settings) => {
            settings.dry_run |= cli.dry_run;
            settings.reduced_privileges |= cli.unprivileged;
            settings
        }
        Err(e) => {
            error!("{e}");
            return 2;
        }
    };
    debug!(
        "settings: parallelism={} batch_size={} dry_run={} reduced_privileges={}",
        settings.parallelism, settings.batch_size, settings.dry_run, settings.reduced_privileges
    );

    let source = match JobSource::resolve(cli.jobs, cli.jobs_file, cli.jobs_url) {
        Ok(source) => source,
        Err(e) => {
            error!("{e}");
            return 2;
        }
    };
    let document = match load_job_document(&source).await {
        Ok(document) => document,
        Err(e) => {
            error!("{e}");
            return 2;
        }
    };

    let tools = match Toolchain::discover() {
        Ok(tools) => tools,
        Err(e) => {
            error!("{e}");
            return 2;
        }
    };

    let orchestrator = Orchestrator::new(settings, tools, SubprocessManager::production());
    match orchestrator.run(&document).await {
        Ok(summary) => {
            tracing::info!(
                "run complete: {} job(s), {} succeeded, {} skipped",
                summary.total,
                summary.succeeded,
                summary.skipped
            );
            0
        }
        Err(e) => {
            error!("{e}");
            if e.is_configuration() {
                2
            } else {
                1
            }
        }
    }
}
