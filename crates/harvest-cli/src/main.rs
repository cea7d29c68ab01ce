//! Harvest CLI: scheduler daemon, one-off cycles, statistics and problem review.
//!
//! Configuration comes from the environment (and `.env`); organizations from
//! the JSON file named by `ORGS_CONFIG_PATH` or `--orgs-config`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use harvest_cli::{
    build_engine, load_organizations, open_stores, print_json, render_orgs_table,
    render_problems_table, render_stats_table,
};
use harvest_core::models::{MediaId, PageRequest, ProblemStatus};
use harvest_core::HarvestConfig;
use harvest_engine::{CycleOutcome, ProblemTracker, StatisticsService};
use harvest_infra::{init_telemetry, LogFormat};
use harvest_worker::{CycleScheduler, SchedulerConfig, TracingMonitor};

/// Time given to in-flight cycles after Ctrl-C.
const SHUTDOWN_GRACE_SECS: u64 = 30;

#[derive(Parser)]
#[command(name = "harvest", about = "Harvest media from partner organizations and upload it")]
struct Cli {
    /// Organization definitions file
    #[arg(long, global = true, env = "ORGS_CONFIG_PATH")]
    orgs_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the periodic scheduler until Ctrl-C
    Daemon,
    /// Run one cycle for one organization
    Cycle {
        #[arg(long)]
        org: String,
        /// Human-triggered: bypasses cooldowns and MANUAL mode
        #[arg(long)]
        manual: bool,
    },
    /// Upload one stored media by hand
    Upload {
        #[arg(long)]
        org: String,
        /// Source-specific media id
        #[arg(long)]
        media: String,
    },
    /// Show statistics for one or every organization
    Stats {
        #[arg(long)]
        org: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// List an organization's problems
    Problems {
        #[arg(long)]
        org: String,
        /// Filter by status: open, reviewed, resolved
        #[arg(long)]
        status: Option<ProblemStatus>,
        /// Zero-based page number
        #[arg(long, default_value = "0")]
        page: u32,
        #[arg(long, default_value = "50")]
        page_size: u32,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Review one problem
    Problem {
        #[command(subcommand)]
        action: ProblemCommands,
    },
    /// List registered organizations
    Orgs {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
enum ProblemCommands {
    /// Acknowledge a problem without resolving it
    Review {
        #[arg(long)]
        org: String,
        #[arg(long)]
        media: String,
    },
    /// Mark a problem resolved
    Resolve {
        #[arg(long)]
        org: String,
        #[arg(long)]
        media: String,
    },
    /// Delete a problem
    Delete {
        #[arg(long)]
        org: String,
        #[arg(long)]
        media: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = HarvestConfig::from_env().context("Invalid configuration")?;
    init_telemetry(LogFormat::from_env())?;

    let orgs_path = cli
        .orgs_config
        .or_else(|| config.orgs_config_path.as_ref().map(PathBuf::from))
        .context("Set ORGS_CONFIG_PATH or pass --orgs-config")?;
    let (registry, definitions) = load_organizations(&orgs_path).await?;
    let stores = open_stores(&config).await?;

    match cli.command {
        Commands::Daemon => {
            let engine = build_engine(&config, registry, &definitions, &stores, env_lookup)?;
            let scheduler = CycleScheduler::new(
                Arc::new(engine),
                Arc::new(TracingMonitor),
                SchedulerConfig::from_config(&config),
            );

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            scheduler.shutdown().await;
            if !scheduler
                .drain(Duration::from_secs(SHUTDOWN_GRACE_SECS))
                .await
            {
                tracing::warn!("Exiting with cycles still in flight");
            }
        }
        Commands::Cycle { org, manual } => {
            let engine = build_engine(&config, registry, &definitions, &stores, env_lookup)?;
            match engine.update_media(&org, manual).await? {
                CycleOutcome::Completed(report) => print_json(&report)?,
                CycleOutcome::AlreadyRunning => bail!("A cycle is already running for {}", org),
            }
        }
        Commands::Upload { org, media } => {
            let engine = build_engine(&config, registry, &definitions, &stores, env_lookup)?;
            match engine.upload_media(&MediaId::new(org, media)).await? {
                CycleOutcome::Completed(report) => print_json(&report)?,
                CycleOutcome::AlreadyRunning => bail!("A cycle is already running"),
            }
        }
        Commands::Stats { org, format } => {
            let organizations = match org {
                Some(id) => vec![registry.get(&id).await?],
                None => registry.list().await,
            };
            let service = StatisticsService::new(stores.media.clone(), stores.problems.clone());
            let mut stats = Vec::with_capacity(organizations.len());
            for organization in organizations {
                stats.push(service.compute(&organization.id, &organization.name).await?);
            }
            match format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Table => print!("{}", render_stats_table(&stats)),
            }
        }
        Commands::Problems {
            org,
            status,
            page,
            page_size,
            format,
        } => {
            registry.get(&org).await?;
            let tracker = tracker(&stores);
            let problems = tracker
                .list(&org, status, PageRequest::new(page, page_size))
                .await?;
            match format {
                OutputFormat::Json => print_json(&problems)?,
                OutputFormat::Table => print!("{}", render_problems_table(&problems)),
            }
        }
        Commands::Problem { action } => {
            let tracker = tracker(&stores);
            match action {
                ProblemCommands::Review { org, media } => {
                    print_json(&tracker.mark_reviewed(&MediaId::new(org, media)).await?)?;
                }
                ProblemCommands::Resolve { org, media } => {
                    print_json(&tracker.resolve(&MediaId::new(org, media)).await?)?;
                }
                ProblemCommands::Delete { org, media } => {
                    let key = MediaId::new(org, media);
                    if !tracker.delete(&key).await? {
                        bail!("No problem recorded for {}", key);
                    }
                    println!("Problem for {} deleted", key);
                }
            }
        }
        Commands::Orgs { format } => match format {
            OutputFormat::Json => print_json(&definitions)?,
            OutputFormat::Table => print!("{}", render_orgs_table(&definitions)),
        },
    }

    Ok(())
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn tracker(stores: &harvest_cli::Stores) -> ProblemTracker {
    ProblemTracker::new(stores.problems.clone())
}
