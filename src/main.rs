//! CLI entry point for the playlist downloader.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use playlist_core::{
    DownloadDelegate, DownloadOrchestrator, DownloadRequest, HlsManifestParser, HttpTransport,
};
use tracing::{debug, info};

mod cli;
mod progress;

use cli::Args;
use progress::{JsonDelegate, ProgressBarDelegate, SilentDelegate};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let orchestrator = DownloadOrchestrator::new(
        Arc::new(HttpTransport::new()),
        Arc::new(HlsManifestParser::new()),
    );

    let request = if args.manifest {
        DownloadRequest::manifest(&args.url, &args.output)
    } else {
        DownloadRequest::single_file(&args.url, &args.output)
    };

    let delegate: Arc<dyn DownloadDelegate> = if args.json {
        Arc::new(JsonDelegate)
    } else if args.quiet {
        Arc::new(SilentDelegate)
    } else {
        Arc::new(ProgressBarDelegate::new())
    };

    let handle = orchestrator.start(request, delegate)?;
    let path = handle.wait().await?;

    info!(path = %path.display(), "download complete");
    if !args.quiet && !args.json {
        println!("{}", path.display());
    }
    Ok(())
}
