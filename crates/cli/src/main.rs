use crate::{
    commands::{Commands, RunArgs, parse_schema},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::{
    destination::{WriteClient, local::LocalDestination},
    file::csv::source::CsvSource,
};
use engine_runtime::{error::IngestError, pipeline::Pipeline};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "ingest",
    version = "0.1.0",
    about = "Streams delimited files into append-only tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match execute(cli.command, &shutdown).await {
        Ok(()) => ExitCode::Success,
        Err(CliError::ShutdownRequested) => {
            warn!("Ingestion stopped by shutdown request");
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!("{err}");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn execute(command: Commands, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    match command {
        Commands::Run(args) => run(args, shutdown).await?,
        Commands::CreateTable {
            table,
            schema,
            warehouse,
        } => {
            let content = tokio::fs::read_to_string(&schema).await?;
            let schema = parse_schema(&content)?;
            let warehouse = LocalDestination::new(warehouse.resolve()?);
            warehouse.create_table(&table, &schema).await?;
            info!(table = %table, root = %warehouse.root().display(), "Table ready");
        }
        Commands::Describe {
            table,
            warehouse,
            json,
        } => {
            let warehouse = LocalDestination::new(warehouse.resolve()?);
            let info = warehouse.describe(&table).await?;
            output::print_table_info(&table, &info, json)?;
        }
    }

    Ok(())
}

async fn run(args: RunArgs, shutdown: &ShutdownCoordinator) -> Result<(), CliError> {
    let client: Arc<dyn WriteClient> = Arc::new(LocalDestination::new(args.warehouse.resolve()?));
    let source = CsvSource::open(&args.source, args.csv_settings()?)?;
    let pipeline =
        Pipeline::new(client, args.settings()).with_cancellation(shutdown.cancel_token());

    match pipeline.run_csv(&args.table, source).await {
        Ok(report) => output::print_report(&report, args.json),
        Err(IngestError::Cancelled) => Err(CliError::ShutdownRequested),
        Err(_) if shutdown.is_shutdown_requested() => Err(CliError::ShutdownRequested),
        Err(err) => Err(err.into()),
    }
}
