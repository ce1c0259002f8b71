// SPDX-FileCopyrightText: 2026 Fanline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fanline - a subscription aggregator delivering upstream content into
//! Telegram chats.
//!
//! Binary entry point: loads the configuration document given as the one
//! positional argument, wires storage, media, platform client, sources,
//! and the engine, then runs until SIGINT/SIGTERM or `/halt`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use fanline_config::load_config_from_path;
use fanline_core::{ChatClient, ChatId, FanlineError, SubscriptionStore};
use fanline_engine::Engine;
use fanline_media::MediaManager;
use fanline_sources::{DvachClient, RedditClient, RedditSource, ThreadSource};
use fanline_storage::SqliteStore;
use fanline_telegram::TelegramChat;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fanline - subscription aggregator for Telegram.
#[derive(Parser, Debug)]
#[command(name = "fanline", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration document (TOML).
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fanline: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: &Path) -> Result<(), FanlineError> {
    let config = load_config_from_path(config_path)
        .map_err(|e| FanlineError::Config(e.to_string()))?;
    init_tracing(&config.log.level)?;

    if config.storage.driver != "sqlite" {
        return Err(FanlineError::Config(format!(
            "unknown storage driver: {}",
            config.storage.driver
        )));
    }
    let store: Arc<dyn SubscriptionStore> =
        Arc::new(SqliteStore::open(&config.storage.datasource).await?);

    let media = Arc::new(MediaManager::new(&config.media, reqwest::Client::new()));

    let mut telegram = TelegramChat::new(&config.telegram)?;
    telegram.connect();
    let chat: Arc<dyn ChatClient> = Arc::new(telegram);

    let dvach_client = Arc::new(DvachClient::new(&config.dvach)?);
    let reddit_client = Arc::new(RedditClient::new(&config.reddit)?);

    let shutdown = shutdown_on_signal();
    let aliases = config
        .aliases
        .iter()
        .map(|(name, id)| (name.clone(), ChatId(*id)))
        .collect();

    let engine = Engine::builder(store, chat)
        .source(Arc::new(ThreadSource::new(
            dvach_client,
            Arc::clone(&media),
        )))
        .source(Arc::new(RedditSource::new(
            reddit_client,
            Arc::clone(&media),
        )))
        .aliases(aliases)
        .admin_id(config.admin_id)
        .poll_interval(config.update_interval())
        .shutdown(shutdown)
        .build();

    engine.init().await?;
    info!("fanline started");

    // Blocks until shutdown is requested or the listener closes.
    engine.run_commands().await;
    engine.halt();

    info!("draining media pipeline");
    media.shutdown().await;
    info!("fanline exited");
    Ok(())
}

fn init_tracing(level: &str) -> Result<(), FanlineError> {
    let filter = EnvFilter::try_new(level)
        .map_err(|e| FanlineError::Config(format!("invalid log level '{level}': {e}")))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Returns a [`CancellationToken`] cancelled on the first stop signal; the
/// chat drivers and the command loop all watch this one token, as does
/// `/halt`.
fn shutdown_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let signalled = token.clone();
    tokio::spawn(async move {
        wait_for_stop_signal().await;
        signalled.cancel();
    });
    token
}

#[cfg(unix)]
async fn wait_for_stop_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupt received, stopping feeds"),
                _ = sigterm.recv() => info!("termination requested, stopping feeds"),
            }
        }
        Err(e) => {
            // No SIGTERM stream; Ctrl+C alone still stops the process.
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received, stopping feeds");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_stop_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("interrupt received, stopping feeds");
}
