#![warn(missing_docs)]
//! # dermalens binary
//!
//! Command-line entry point: analyze a skin photo or ask the dermatology
//! assistant a question.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dermalens_app::{APP_VERSION, AppConfig, AppError, init_logging, redact_sensitive};
use dermalens_capture::NoCameraDevices;
use dermalens_service::{GenerativeTransport, HttpTransport};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "dermalens", version = APP_VERSION)]
#[command(about = "Skin photo analysis and dermatology chat.")]
struct CommandLine {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a skin photo and print the report as JSON
    #[command(alias = "d")]
    Diagnose { image: PathBuf },
    /// Ask the dermatology assistant one question
    #[command(alias = "c")]
    Chat { message: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CommandLine::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("dermalens: {}", redact_sensitive(&error.to_string()));
            return ExitCode::FAILURE;
        }
    };
    if let Err(error) = init_logging(&config.log_filter) {
        eprintln!("dermalens: {error}");
    }
    info!(version = APP_VERSION, model = config.service.model(), "starting");

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let transport: Arc<dyn GenerativeTransport> = Arc::new(HttpTransport::new(&config.service));
    let outcome = match cli.command {
        Commands::Diagnose { image } => diagnose(&config, transport, &image, &cancel).await,
        Commands::Chat { message } => chat(&config, transport, &message, &cancel).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            let message = redact_sensitive(&failure.to_string());
            error!(retryable = failure.is_retryable(), "{message}");
            eprintln!("dermalens: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn diagnose(
    config: &AppConfig,
    transport: Arc<dyn GenerativeTransport>,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let bytes = std::fs::read(path).map_err(|source| AppError::ReadImage {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (mut workflow, view) = config.scan_workflow(Arc::new(NoCameraDevices), transport);
    let result = workflow.run_file(&name, &bytes, cancel).await?;

    if let Some(report) = view.report() {
        eprintln!(
            "{} ({}, {}% confidence): {}",
            report.classification, report.severity, report.confidence_percent, report.status
        );
    }
    let json = serde_json::to_string_pretty(result.as_ref())
        .map_err(|error| AppError::Output(error.to_string()))?;
    println!("{json}");
    Ok(())
}

async fn chat(
    config: &AppConfig,
    transport: Arc<dyn GenerativeTransport>,
    message: &str,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    let mut flow = config.chat_flow(transport);
    let reply = flow.send(message, cancel).await?;

    println!("{}", reply.text);
    for source in &reply.grounding {
        match &source.title {
            Some(title) => println!("  - {title} <{}>", source.uri),
            None => println!("  - <{}>", source.uri),
        }
    }
    Ok(())
}
