//! Coordhive CLI entry point.
//!
//! A thin example harness over [`coordhive::api::CoordinationApi`], standing
//! in for whatever real tool-invocation transport a deployment layers on
//! top of the kernel.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coordhive::domain::models::Priority;
use coordhive::infrastructure::config::ConfigLoader;
use coordhive::infrastructure::logging;
use coordhive::Coordhive;

#[derive(Parser)]
#[command(name = "coordhive", about = "Multi-agent work queue coordination kernel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new work item.
    CreateTask {
        persona_id: String,
        description: String,
        #[arg(long)]
        agent_id: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<CliPriority>,
    },
    /// Block until work becomes available for an agent, or time out.
    GetNextTask {
        agent_id: String,
        #[arg(long)]
        timeout_ms: Option<i64>,
    },
    /// Show a single work item.
    TaskStatus { task_id: String },
    /// List agents, optionally filtered by persona.
    ListAgents {
        #[arg(long)]
        persona: Option<String>,
    },
    /// Terminate an agent and reclaim its in-progress work.
    KillAgent { agent_id: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliPriority {
    Low,
    Normal,
    High,
    Critical,
}

impl From<CliPriority> for Priority {
    fn from(p: CliPriority) -> Self {
        match p {
            CliPriority::Low => Priority::Low,
            CliPriority::Normal => Priority::Normal,
            CliPriority::High => Priority::High,
            CliPriority::Critical => Priority::Critical,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load().context("failed to load configuration")?;
    logging::init(&config.logging);

    let kernel = Coordhive::bootstrap(config).await.context("failed to bootstrap coordhive")?;

    match cli.command {
        Commands::CreateTask {
            persona_id,
            description,
            agent_id,
            priority,
        } => {
            let response = kernel
                .api
                .create_task(&persona_id, &description, agent_id.as_deref(), priority.map(Into::into))
                .await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::GetNextTask { agent_id, timeout_ms } => {
            let response = kernel.api.get_next_task(&agent_id, timeout_ms).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::TaskStatus { task_id } => {
            let item = kernel.api.get_task_status(&task_id).await;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        Commands::ListAgents { persona } => {
            let agents = kernel.api.list_agents(persona.as_deref()).await;
            println!("{}", serde_json::to_string_pretty(&agents)?);
        }
        Commands::KillAgent { agent_id } => {
            let outcome = kernel.api.kill_agent(&agent_id).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    kernel.shutdown().await;
    Ok(())
}

