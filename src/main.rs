// headsup - demo binary for the terminal dashboard engine
//
// Architecture:
// - Dashboard (engine): render, tick and input workers over one screen lock
// - Logging: tracing events land in the scrollback; optional JSON log files
// - Demo: a producer thread generating a fake service log

mod cli;
mod demo;

use anyhow::{Context, Result};
use headsup::config::{Config, LogRotation};
use headsup::engine::{Dashboard, Shutdown};
use headsup::DashboardLayer;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    // Handle CLI commands first (config --show, --reset, --edit, --path)
    let Some(args) = cli::handle_cli() else {
        return Ok(());
    };

    // Ensure config template exists (helps users discover options)
    Config::ensure_config_exists();

    let mut config = Config::from_env();
    if args.frame {
        config.window_frame = true;
        if config.frame_title.is_empty() {
            config.frame_title = "headsup".to_string();
        }
    }

    let produced = Arc::new(AtomicU64::new(0));
    let dashboard = demo::declare(Dashboard::builder(config.clone()), produced.clone())
        .build()
        .context("Failed to declare dashboard")?;
    let dashboard = Arc::new(dashboard);

    // Log events go into the scrollback so they never garble the screen.
    // File logging optionally writes JSON lines alongside.
    //
    // Precedence: RUST_LOG env var > config file > default "info"
    let default_filter = format!("headsup={},demo={}", config.logging.level, config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    // The guard must be kept alive for the duration of the program to ensure logs flush
    let _file_guard: Option<tracing_appender::non_blocking::WorkerGuard> =
        if config.logging.file_enabled {
            if let Err(e) = std::fs::create_dir_all(&config.logging.file_dir) {
                eprintln!(
                    "Warning: Could not create log directory {:?}: {}",
                    config.logging.file_dir, e
                );
                tracing_subscriber::registry()
                    .with(filter)
                    .with(DashboardLayer::new(dashboard.writer()))
                    .init();
                None
            } else {
                let file_appender = match config.logging.file_rotation {
                    LogRotation::Hourly => tracing_appender::rolling::hourly(
                        &config.logging.file_dir,
                        &config.logging.file_prefix,
                    ),
                    LogRotation::Daily => tracing_appender::rolling::daily(
                        &config.logging.file_dir,
                        &config.logging.file_prefix,
                    ),
                    LogRotation::Never => tracing_appender::rolling::never(
                        &config.logging.file_dir,
                        &config.logging.file_prefix,
                    ),
                };

                // Writes happen on a background thread
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(DashboardLayer::new(dashboard.writer()))
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(non_blocking)
                            .with_ansi(false),
                    )
                    .init();
                Some(guard)
            }
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(DashboardLayer::new(dashboard.writer()))
                .init();
            None
        };

    dashboard.start().context("Failed to start dashboard")?;
    tracing::info!("Press ? for help, {} to quit", config.quit_key);

    let stop = Arc::new(Shutdown::new());
    let producer = demo::spawn_producer(dashboard.clone(), args, produced, stop.clone())
        .context("Failed to start demo producer")?;

    dashboard.wait_for_close();

    stop.trigger();
    if producer.join().is_err() {
        eprintln!("Demo producer panicked");
    }
    Ok(())
}
