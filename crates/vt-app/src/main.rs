mod api;
mod client;
mod config;
mod error;
mod store;
mod worker;

use std::io::Write;
use std::path::{Path, PathBuf};
use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{error, info};
use vt_core::progress::PollProgress;
use vt_core::{Category, ImageInput, TryOnRequest};
use crate::api::HttpApi;
use crate::client::TryOnClient;
use crate::config::Config;
use crate::store::{export_download, ResultStore};
use crate::worker::{TryOnWorker, WorkerResponse};

#[derive(Parser)]
#[command(name = "vt-app")]
#[command(about = "Virtual try-on: see a garment on a person photo")]
struct Cli {
    /// Directory where results are stored
    #[arg(long, global = true)]
    results_dir: Option<PathBuf>,

    /// Maximum number of status checks before giving up
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Delay between status checks, in milliseconds
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a person and a garment photo and wait for the result
    Run {
        /// Photo of the person
        #[arg(short, long)]
        model: PathBuf,

        /// Photo of the clothing item
        #[arg(short, long)]
        garment: PathBuf,

        /// auto, tops, bottoms or one-pieces
        #[arg(short, long, default_value = "auto")]
        category: String,

        /// Also export the result as a JPEG download into this directory
        #[arg(short, long)]
        download: Option<PathBuf>,

        /// Decode both photos and re-encode them as JPEG before upload
        #[arg(long)]
        jpeg: bool,
    },

    /// Check the status of a submitted job once
    Status {
        job_id: String,
    },

    /// Keep polling a submitted job and store its result
    Wait {
        job_id: String,

        #[arg(short, long)]
        download: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    config.apply_overrides(cli.results_dir, cli.max_attempts, cli.poll_interval_ms);
    config.validate()?;

    let api = HttpApi::new(&config.api_url, config.api_key.clone(), config.http_timeout)?;
    let client = TryOnClient::new(api, config.poll_policy(), ResultStore::new(&config.results_dir));
    info!(
        "Using {} (results in {}, {} checks every {:?})",
        config.api_url,
        client.store().dir().display(),
        client.policy().max_attempts,
        client.policy().interval
    );

    match cli.command {
        Commands::Run { model, garment, category, download, jpeg } => {
            let request = TryOnRequest::new(
                load_input(&model, jpeg)?,
                load_input(&garment, jpeg)?,
                Category::from(category.as_str()),
            );
            let worker = TryOnWorker::new(client);
            worker.send_request(request)?;
            drive(&worker, download)
        }
        Commands::Status { job_id } => {
            let job = client.check(&job_id)?;
            println!("Job {}: {:?}", job.id, job.status);
            for url in &job.output_urls {
                println!("  output: {}", url);
            }
            if let Some(error) = &job.error {
                println!("  error: {}", error);
            }
            Ok(())
        }
        Commands::Wait { job_id, download } => {
            let worker = TryOnWorker::new(client);
            worker.send_resume(job_id)?;
            drive(&worker, download)
        }
    }
}

fn load_input(path: &Path, jpeg: bool) -> anyhow::Result<ImageInput> {
    if !jpeg {
        return Ok(ImageInput::from_path(path)?);
    }
    let img = image::ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok(ImageInput::from_image(&img)?)
}

/// Render worker output until the job reaches a terminal outcome.
fn drive(worker: &TryOnWorker, download: Option<PathBuf>) -> anyhow::Result<()> {
    while let Some(response) = worker.recv_response() {
        match response {
            WorkerResponse::Status(status) => info!("{}", status),
            WorkerResponse::Progress(progress) => render_progress(&progress),
            WorkerResponse::Success(artifact) => {
                eprintln!();
                println!("Processing completed successfully!");
                println!("Result: {}", artifact.path.display());
                if let Some((w, h)) = artifact.dimensions {
                    println!("Size: {}x{}", w, h);
                }
                if let Some(dir) = download {
                    let path = export_download(&artifact, &dir).context("Failed to export download")?;
                    println!("Download: {}", path.display());
                }
                return Ok(());
            }
            WorkerResponse::Error(e) => {
                eprintln!();
                if e.is_remote() {
                    error!("Try-on did not produce a result: {}", e);
                }
                return Err(e.into());
            }
        }
    }

    anyhow::bail!("Worker exited before the job finished")
}

fn render_progress(progress: &PollProgress) {
    const WIDTH: usize = 30;
    let filled = (progress.fraction * WIDTH as f32) as usize;
    eprint!(
        "\r[{}{}] {}",
        "#".repeat(filled),
        " ".repeat(WIDTH - filled),
        progress.label()
    );
    let _ = std::io::stderr().flush();
}
