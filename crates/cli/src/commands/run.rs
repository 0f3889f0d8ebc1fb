//! `run` command implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dispatcher::{DispatcherBuilder, DispatcherConfig, FileCursorStore, IngestionDispatcher};
use tracing::{info, warn};

use super::load_config;
use crate::cli::RunArgs;
use crate::error::CliError;

/// Execute the `run` command
pub async fn run_adapter(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), profile = %args.profile, "Loading configuration");
    let config = load_config(&args.config)?;

    if !config.adapter_profiles.contains_key(&args.profile) {
        return Err(CliError::unknown_profile(&args.profile, config.adapter_profiles.keys()).into());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let mut builder = DispatcherBuilder::new(config, &args.profile).with_config(DispatcherConfig {
        worker_count: args.workers,
        ..Default::default()
    });
    if let Some(path) = &args.cursor_file {
        let store = FileCursorStore::open(path)
            .with_context(|| format!("Failed to open cursor file {}", path.display()))?;
        info!(path = %path.display(), "Persisting stream cursors");
        builder = builder.with_cursor_store(Arc::new(store));
    }
    let dispatcher = Arc::new(builder.build().context("Failed to activate profile")?);

    info!(
        profile = %dispatcher.profile_name(),
        provider = %dispatcher.provider_name(),
        "Starting dispatcher..."
    );
    let started = Instant::now();

    let runner = Arc::clone(&dispatcher);
    let mut task = tokio::task::spawn_blocking(move || -> dispatcher::Result<()> {
        runner.start_all_connections()?;
        runner.process_data_queue_threaded();
        Ok(())
    });

    let timeout = async {
        match args.timeout {
            0 => std::future::pending::<()>().await,
            secs => tokio::time::sleep(Duration::from_secs(secs)).await,
        }
    };

    tokio::select! {
        result = &mut task => {
            // Only reachable when activation failed before the workers ran
            result
                .map_err(|e| CliError::dispatcher_execution(e.to_string()))?
                .context("Dispatcher stopped")?;
            return Ok(());
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping dispatcher...");
        }
        _ = timeout => {
            info!(timeout_secs = args.timeout, "Timeout reached, stopping dispatcher...");
        }
    }

    let stopper = Arc::clone(&dispatcher);
    tokio::task::spawn_blocking(move || {
        stopper.stop_all_connections();
        stopper.shut_down();
    })
    .await
    .map_err(|e| CliError::dispatcher_execution(e.to_string()))?;

    task.await
        .map_err(|e| CliError::dispatcher_execution(e.to_string()))?
        .context("Dispatcher failed")?;

    print_summary(&dispatcher, started.elapsed());
    info!("monitor adapter finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_summary(dispatcher: &IngestionDispatcher, elapsed: Duration) {
    let metrics = dispatcher.metrics();

    println!("\n=== Run Summary ===");
    println!("Profile: {}", dispatcher.profile_name());
    println!("Duration: {:.2}s", elapsed.as_secs_f64());
    println!(
        "Messages: {} received, {} processed, {} filtered, {} failed",
        metrics.received_count,
        metrics.processed_count,
        metrics.filtered_count,
        metrics.failure_count
    );
    println!("Records acted: {}", metrics.records_count);

    println!("\nStreams:");
    for handle in dispatcher.handles() {
        println!(
            "  - {} ({}) state={} cursor={}",
            handle.name(),
            handle.transport(),
            handle.state(),
            handle.cursor().as_deref().unwrap_or("-")
        );
    }

    println!("\n{}", dispatcher.stats_summary());
}
