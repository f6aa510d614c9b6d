use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use cagecat_client::{
    config::ClientConfig,
    ledger::JobLedger,
    poller::{PeriodicTask, StatusClient, StatusPoller},
    sink::{RenderSink, TerminalSink},
    store::FileStore,
    validate,
};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL of the CAGECAT service
    #[arg(short, long)]
    base_url: Option<String>,

    /// File holding the local job history
    #[arg(long)]
    history_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remember a submitted job in the local history
    Record {
        #[arg(long)]
        id: String,
        #[arg(long)]
        job_type: String,
        #[arg(long, default_value = "")]
        title: String,
    },
    /// List previously submitted jobs
    History {
        /// Show type, date and title as well
        #[arg(short, long)]
        detailed: bool,
    },
    /// Fetch the server status once
    Status,
    /// Keep showing the server status until interrupted
    Watch,
    /// Follow the execution stages of a job until it finishes
    Stage { job_id: String },
    /// Check a job id against the id format
    CheckId { job_id: String },
    /// Check a newline separated list of NCBI accessions (stdin when no file)
    CheckAccessions { file: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cagecat_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(url) = args.base_url {
        config.base_url = url;
    }
    if let Some(path) = args.history_file {
        config.history_file = path;
    }

    let sink: Arc<dyn RenderSink> = Arc::new(TerminalSink);

    match args.command {
        Command::Record { id, job_type, title } => {
            if !validate::is_storable_field(&id) || !validate::is_storable_field(&job_type) {
                eprintln!("❌ job id and job type must not contain ';'");
                std::process::exit(2);
            }
            if !validate::is_valid_job_id(&id) {
                tracing::warn!(job_id = %id, "Job id does not match the expected format");
            }
            let mut ledger = JobLedger::new(FileStore::open(&config.history_file)?);
            match ledger.record(&id, &job_type, &title)? {
                Some(slot) => tracing::info!(job_id = %id, slot, "Job recorded"),
                None => tracing::info!(job_id = %id, "Job history is full"),
            }
        }
        Command::History { detailed } => {
            let ledger = JobLedger::new(FileStore::open(&config.history_file)?);
            if detailed {
                ledger.render_detailed(sink.as_ref())?;
            } else {
                ledger.render_summaries(sink.as_ref());
            }
        }
        Command::Status => {
            poller(&config, sink)?.refresh_status().await?;
        }
        Command::Watch => {
            let poller = poller(&config, sink)?;
            if let Err(e) = poller.refresh_status().await {
                tracing::warn!(error = %e, "Unable to fetch server status");
            }
            run_until_interrupted(poller.start_status_loop()).await;
        }
        Command::Stage { job_id } => {
            if !validate::is_valid_job_id(&job_id) {
                eprintln!("❌ {job_id} is not a valid job id");
                std::process::exit(2);
            }
            let task = poller(&config, sink)?.start_stage_loop(&job_id);
            run_until_interrupted(task).await;
        }
        Command::CheckId { job_id } => {
            if validate::is_valid_job_id(&job_id) {
                println!("✅ {job_id}");
            } else {
                println!("❌ {job_id} does not match {}", validate::JOB_ID_PATTERN);
                std::process::exit(1);
            }
        }
        Command::CheckAccessions { file } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let report = validate::validate_accessions(&text);
            for accession in &report.accepted {
                println!("✅ {accession}");
            }
            if !report.is_valid() {
                println!("❌ Invalid accessions: {}", report.invalid.join(", "));
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn poller(
    config: &ClientConfig,
    sink: Arc<dyn RenderSink>,
) -> Result<StatusPoller, Box<dyn std::error::Error>> {
    let client = StatusClient::new(&config.base_url, config.request_timeout)?;
    Ok(StatusPoller::new(Arc::new(client), sink)
        .with_intervals(config.status_interval, config.stage_interval))
}

async fn run_until_interrupted(task: PeriodicTask) {
    task.stop_on(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Interrupted, stopping"),
            Err(e) => {
                tracing::error!(error = %e, "Unable to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    })
    .await;
}
