//! Unpackr - S3 archive extraction
//!
//! Runs as a Lambda function by default; `extract` runs one job locally.

use clap::{Parser, Subcommand};
use lambda_http::{run, service_fn, Request};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use unpackr::{config::Config, handler::ExtractRequest, logging, metrics, s3::S3Store};
use unpackr::{Extractor, Handler};

/// Unpackr - extract .zip, .gz and .tar.gz objects from S3 into S3
#[derive(Parser, Debug)]
#[command(name = "unpackr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (falls back to $UNPACKR_CONFIG, then defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true, env = "UNPACKR_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve Lambda invocations (default)
    Serve,

    /// Run one extraction and print the response envelope
    Extract {
        /// Source object, e.g. s3://incoming/batch.tar.gz
        #[arg(long)]
        source: String,

        /// Destination prefix, e.g. s3://extracted/batch/
        #[arg(long)]
        destination: String,

        #[arg(long)]
        source_region: Option<String>,

        #[arg(long)]
        destination_region: Option<String>,

        /// Print Prometheus metrics after the job
        #[arg(long)]
        print_metrics: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut config = Config::resolve(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    logging::init_subscriber(&config.logging.level, config.logging.json)?;
    info!("Starting Unpackr v{}", unpackr::VERSION);

    let store = S3Store::from_env(&config.s3).await;
    let extractor = Extractor::new(Arc::new(store), config.extract.clone());
    let handler = Handler::new(extractor, config.s3.default_region.clone());

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let handler = &handler;
            let metrics_enabled = config.metrics.enabled;
            run(service_fn(move |event: Request| async move {
                let response = handler.handle_http(event).await;
                if metrics_enabled {
                    tracing::debug!(metrics = %metrics::render(), "Invocation metrics");
                }
                response
            }))
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Extract {
            source,
            destination,
            source_region,
            destination_region,
            print_metrics,
        } => {
            let response = handler
                .handle(ExtractRequest {
                    source_uri: Some(source),
                    destination_uri: Some(destination),
                    source_region,
                    destination_region,
                })
                .await;

            println!("{}", serde_json::to_string_pretty(&response.body)?);
            if print_metrics && config.metrics.enabled {
                print!("{}", metrics::render());
            }

            Ok(if response.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
