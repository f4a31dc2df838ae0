use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use collector::metrics;
use collector::{Pipeline, PipelineError, StackExchangeClient, Step, StepFailure, StepOutcome, TaskGraph};
use common::{config::AppConfig, logging, AppError};
use db::pg::PgDatabase;
use db::Repositories;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// `EX_TEMPFAIL`: the scheduler may retry the step.
const EXIT_TRANSIENT: u8 = 75;

#[derive(Debug, Parser)]
#[command(name = "so-pipeline")]
#[command(about = "Loads recent Stack Overflow questions into Postgres")]
struct Cli {
    /// Directory holding `config/default.toml` and `config/local.toml`.
    #[arg(long, env = "SO_PIPELINE_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Commands {
    /// Empty the questions table.
    Truncate,
    /// Fetch the current window and insert every question.
    FetchAndLoad,
    /// Log a small sample of stored rows.
    VerifyRead,
    /// Walk the whole task graph once.
    Run,
    /// Print the step order and exit.
    Graph,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let transient = is_transient(&err);
            error!(error = ?err, transient, "so-pipeline failed");
            eprintln!("so-pipeline: {err:#}");
            if transient {
                ExitCode::from(EXIT_TRANSIENT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let graph = TaskGraph::standard();
    if let Commands::Graph = cli.command {
        for step in graph.topological_order()? {
            let preds: Vec<&str> = graph.predecessors(step).iter().map(|p| p.name()).collect();
            println!("{step} <- [{}]", preds.join(", "));
        }
        return Ok(());
    }

    let config = AppConfig::load_from_path(&cli.config_dir).map_err(AppError::from)?;
    logging::init_logging(&config.logging)?;

    let span = info_span!("so_pipeline", run_id = %Uuid::new_v4(), command = ?cli.command);
    let result = run_command(&config, &graph, cli.command).instrument(span).await;

    if let Some(path) = &config.observability.metrics_textfile {
        if let Err(err) = metrics::write_textfile(path) {
            error!(error = %err, path = %path.display(), "failed to write metrics textfile");
        }
    }
    result
}

async fn run_command(config: &AppConfig, graph: &TaskGraph, command: Commands) -> Result<()> {
    let source = Arc::new(StackExchangeClient::new(
        &config.stackoverflow,
        config.pipeline.page_size,
    )?);
    let database = PgDatabase::connect(&config.database.url)
        .await
        .map_err(PipelineError::from)?;
    let repositories: Arc<dyn Repositories> = Arc::new(database);
    let pipeline = Pipeline::new(config.pipeline.clone(), source, repositories);

    let step = match command {
        Commands::Truncate => Step::Truncate,
        Commands::FetchAndLoad => Step::FetchAndLoad,
        Commands::VerifyRead => Step::VerifyRead,
        Commands::Run => {
            let outcomes = pipeline.run(graph).await?;
            info!(steps = outcomes.len(), "pipeline run complete");
            return Ok(());
        }
        Commands::Graph => return Ok(()),
    };

    match pipeline.run_step(step).await? {
        StepOutcome::Truncated => info!("truncate complete"),
        StepOutcome::Loaded(summary) => info!(
            fetched = summary.fetched,
            inserted = summary.inserted,
            "fetch_and_load complete"
        ),
        StepOutcome::Verified(records) => info!(sampled = records.len(), "verify_read complete"),
    }
    Ok(())
}

fn is_transient(err: &anyhow::Error) -> bool {
    if let Some(failure) = err.downcast_ref::<StepFailure>() {
        return failure.error.is_transient();
    }
    err.downcast_ref::<PipelineError>()
        .map(PipelineError::is_transient)
        .unwrap_or(false)
}
