//! Tailboard binary: a live dashboard over experiment logs.
//!
//! This is the main entry point that wires the log store, the polling
//! engine, and the artifact and media renderers together. It loads
//! configuration, opens one cursor per watched run, and polls until
//! Ctrl-C or until every source has used up its record budget.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `tailboard.yaml` (or `TAILBOARD_CONFIG`)
//! 3. Resolve the run logs to watch
//! 4. Open a cursor and run state per log
//! 5. Create the artifact and media renderers
//! 6. Assemble the scheduler
//! 7. Install the Ctrl-C shutdown handler
//! 8. Run the polling loop
//! 9. Log the result

mod command_media;
mod error;
mod file_renderer;
mod progress_callback;
mod sources;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tailboard_core::scheduler::log_run_end;
use tailboard_core::{
    Aggregator, DashboardConfig, MediaRenderer, Scheduler, ShutdownSignal,
    UnavailableMediaRenderer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::command_media::CommandMediaRenderer;
use crate::error::AppError;
use crate::file_renderer::FileRenderer;
use crate::progress_callback::ProgressLog;

/// Rounds between info-level heartbeats.
const HEARTBEAT_ROUNDS: u64 = 1_000;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the polling loop fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("tailboard starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        log_dir = %config.sources.log_dir.display(),
        env = config.sources.env,
        interval_ms = config.polling.interval_ms,
        max_events = config.polling.max_events,
        max_steps = config.polling.max_steps,
        output_dir = %config.output.dir.display(),
        "Configuration loaded"
    );

    // 3. Resolve the runs to watch.
    let runs = sources::resolve_runs(&config)?;
    info!(runs = runs.len(), "Runs resolved");

    // 4. Open cursors.
    let pollers = sources::build_pollers(&config, &runs)?;

    // 5. Create renderers.
    let mut renderer = FileRenderer::new(&config.output.dir);
    let mut media: Box<dyn MediaRenderer> = match &config.media.command {
        Some(program) => {
            info!(program, "Agent videos rendered by external command");
            Box::new(CommandMediaRenderer::new(
                program.clone(),
                config.media.args.clone(),
            ))
        }
        None => {
            info!("No media command configured, agent videos unavailable");
            Box::new(UnavailableMediaRenderer)
        }
    };

    // 6. Assemble the scheduler.
    let mut scheduler = Scheduler::new(
        pollers,
        Aggregator::new(config.polling.action_names.clone()),
        Duration::from_millis(config.polling.interval_ms),
    )
    .map_err(AppError::from)?;

    // 7. Stop cleanly on Ctrl-C.
    let shutdown = Arc::new(ShutdownSignal::new());
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping");
                    shutdown.request_stop();
                }
                Err(e) => {
                    warn!(error = %e, "failed to listen for Ctrl-C, stop with SIGKILL");
                }
            }
        });
    }

    // 8. Run the polling loop.
    let mut callback = ProgressLog::new(HEARTBEAT_ROUNDS);
    let result = scheduler
        .run(&mut renderer, media.as_mut(), &shutdown, &mut callback)
        .await
        .map_err(AppError::from)?;

    // 9. Log results.
    log_run_end(&result);

    info!(
        end_reason = ?result.end_reason,
        events_applied = result.events_applied,
        "tailboard shutdown complete"
    );

    Ok(())
}

/// Load configuration from `TAILBOARD_CONFIG`, or `tailboard.yaml` in the
/// working directory. A missing file means defaults.
fn load_config() -> Result<DashboardConfig, AppError> {
    let config_path = std::env::var("TAILBOARD_CONFIG")
        .map_or_else(|_| PathBuf::from("tailboard.yaml"), PathBuf::from);
    if !config_path.exists() {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    Ok(DashboardConfig::load_or_default(&config_path)?)
}
