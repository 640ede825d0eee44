// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! shotsort: AI screenshot renamer & organizer
//!
//! Watches for new screenshots, renames each one to describe its content and
//! moves it into one of the configured category folders.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use shotsort::classifier::{Classifier, OpenAiClient};
use shotsort::config::{AppConfig, Detail, RunOptions, Settings};
use shotsort::pipeline::Pipeline;
use shotsort::queue::WorkQueue;
use shotsort::relocator::Relocator;
use shotsort::watcher::{scan_existing, watch_into_queue, FileWatcher};

/// Rename and organize screenshots by their contents with the help of AI
#[derive(Parser, Debug)]
#[command(name = "shotsort")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(
    about = "Rename and organize Mac screenshots by their contents with the help of AI",
    long_about = None
)]
struct Cli {
    /// What image resolution to use for inference
    #[arg(long, value_enum, default_value = "low")]
    detail: Detail,

    /// Choose supported API provider - openai or ollama
    #[arg(long, default_value = "ollama")]
    provider: String,

    /// Path to save renamed images to (default: <watchdir>/Screenshots)
    #[arg(long, value_name = "FOLDER_PATH")]
    outdir: Option<PathBuf>,

    /// Folder to watch screenshots from (default: ~/Desktop)
    #[arg(long, value_name = "FOLDER_PATH")]
    watchdir: Option<PathBuf>,

    /// Process already existing screenshots
    #[arg(long)]
    retroactive: bool,

    /// Watch for new screenshots
    #[arg(long)]
    watch: bool,

    /// Path to user configuration file (JSON format)
    #[arg(short, long, default_value = "shotsort.config.json")]
    config: PathBuf,

    /// Skip the model availability check on startup
    #[arg(long)]
    skip_health_check: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            provider: self.provider.clone(),
            detail: self.detail,
            out_dir: self.outdir.clone(),
            watch_dir: self.watchdir.clone(),
            retroactive: self.retroactive,
            watch: self.watch,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config);
    let settings = Settings::resolve(config, cli.run_options(), |name| std::env::var(name).ok())?;

    run(Arc::new(settings), cli.skip_health_check).await
}

async fn run(settings: Arc<Settings>, skip_health_check: bool) -> anyhow::Result<()> {
    let relocator = Relocator::from_settings(&settings);
    relocator
        .prepare()
        .with_context(|| format!("Cannot prepare output folder {:?}", settings.out_dir))?;

    let client = Arc::new(
        OpenAiClient::from_settings(&settings).context("Failed to create HTTP client")?,
    );

    if !skip_health_check {
        let model = &settings.provider_config.model;
        match client.model_available().await {
            Ok(true) => info!("Model '{}' available ({})", model, settings.provider),
            Ok(false) => {
                warn!("Model '{}' not found at {}", model, settings.provider_config.base_url)
            }
            Err(e) => warn!("Could not reach {}: {}", settings.provider, e),
        }
    }

    let classifier = Classifier::from_settings(client, &settings);
    let queue = WorkQueue::start(Arc::new(Pipeline::new(classifier, relocator)));
    let mut drain_signal = queue.drain_signal();

    // Started before the scan so nothing lands in the gap between the two
    let watcher = if settings.watch {
        let watcher = FileWatcher::new(&settings.watch_dir)
            .with_context(|| format!("Cannot watch {:?}", settings.watch_dir))?;
        Some(watcher)
    } else {
        None
    };

    if settings.retroactive {
        let existing = scan_existing(&settings.watch_dir)
            .await
            .with_context(|| format!("Cannot read {:?}", settings.watch_dir))?;

        if existing.is_empty() && !settings.watch {
            info!("No screenshot was found. Use --watch for continuous monitoring.");
            return Ok(());
        }

        info!("Found {} existing screenshot(s)", existing.len());
        for path in existing {
            queue.push(path);
        }
    }

    let Some(watcher) = watcher else {
        queue.drained().await;
        info!("All screenshots have been processed.");
        return Ok(());
    };

    tokio::spawn(async move {
        while drain_signal.next().await.is_ok() {
            info!("All screenshots have been processed.");
        }
    });

    info!("Waiting for screenshots. Press Ctrl+C to stop.");

    tokio::select! {
        _ = watch_into_queue(watcher, queue, settings.stability) => {}
        _ = shutdown_signal() => {}
    }

    info!("shotsort stopped.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["shotsort", "--watch"]).unwrap();
        assert!(cli.watch);
        assert!(!cli.retroactive);
        assert_eq!(cli.detail, Detail::Low);
        assert_eq!(cli.provider, "ollama");
        assert_eq!(cli.config, PathBuf::from("shotsort.config.json"));
        assert!(cli.outdir.is_none());
    }

    #[test]
    fn test_cli_full_options() {
        let cli = Cli::try_parse_from([
            "shotsort", "--retroactive", "--detail", "high", "--provider", "openai",
            "--outdir", "/tmp/out", "--watchdir", "/tmp/desk",
        ])
        .unwrap();

        let opts = cli.run_options();
        assert!(opts.retroactive);
        assert!(!opts.watch);
        assert_eq!(opts.detail, Detail::High);
        assert_eq!(opts.provider, "openai");
        assert_eq!(opts.out_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(opts.watch_dir, Some(PathBuf::from("/tmp/desk")));
    }

    #[test]
    fn test_cli_rejects_unknown_detail() {
        assert!(Cli::try_parse_from(["shotsort", "--watch", "--detail", "ultra"]).is_err());
    }
}
