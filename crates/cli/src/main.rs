use crate::{
    commands::{Commands, OutputArgs},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use engine_config::{
    report::summary::{JobReport, JobStatus},
    settings::spec::JobSpec,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "bulkload", version = "0.1.0", about = "Bulk data loader")]
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

    let code = match execute(cli.command, &shutdown).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "bulkload failed");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn execute(command: Commands, shutdown: &ShutdownCoordinator) -> Result<ExitCode, CliError> {
    match command {
        Commands::Load {
            job,
            file,
            delimiter,
            entity,
            chunk_size,
            target,
            tuning,
            output,
        } => {
            let spec = commands::load_spec(
                job.as_ref(),
                file.as_ref(),
                delimiter.as_ref(),
                entity.as_ref(),
                chunk_size,
                &target,
                &tuning,
            )?;
            run_load(spec, &output, shutdown).await
        }
        Commands::Generate {
            rows,
            entity,
            target,
            tuning,
            output,
        } => {
            let spec = commands::generate_spec(rows, &entity, &target, &tuning)?;
            run_load(spec, &output, shutdown).await
        }
        Commands::Validate { job } => {
            let spec = JobSpec::from_json_file(&job)?;
            info!(job = %job.display(), name = %spec.config.name, "Job file is valid");
            println!("{}", serde_json::to_string_pretty(&spec)?);
            Ok(ExitCode::Success)
        }
    }
}

async fn run_load(
    spec: JobSpec,
    output: &OutputArgs,
    shutdown: &ShutdownCoordinator,
) -> Result<ExitCode, CliError> {
    shutdown.register_handlers();

    let report = engine_runtime::execution::job::run(spec, shutdown.cancel_token()).await?;

    output::print_report(&report, output.json)?;
    if let Some(path) = &output.report {
        output::write_report(&report, path).await?;
        info!(path = %path.display(), "Report written");
    }
    info!("{}", report.summary_line());

    Ok(exit_code(&report, shutdown.is_shutdown_requested()))
}

fn exit_code(report: &JobReport, shutdown_requested: bool) -> ExitCode {
    match report.status {
        JobStatus::Completed if !shutdown_requested => ExitCode::Success,
        JobStatus::Cancelled => ExitCode::ShutdownRequested,
        _ if shutdown_requested => ExitCode::ShutdownRequested,
        _ => ExitCode::GeneralError,
    }
}
