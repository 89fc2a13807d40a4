//! CLI entrypoint for mqtt-gpt-relay
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use relay_application::{InboundDispatcher, InMemorySessionStore, RelayContext};
use relay_infrastructure::{
    ConfigLoader, ConfigOverrides, FileConfig, JsonlTranscriptLogger, MqttBroker, OpenAiProvider,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(());
    }

    let _guard = init_logging(&cli);

    let overrides = ConfigOverrides {
        broker_url: cli.url.clone(),
        proxy: cli.proxy.clone(),
        api_key: cli.key.clone(),
    };
    let config = ConfigLoader::load(cli.config.as_ref(), &overrides)
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;
    config.validate().context("invalid configuration")?;

    info!("Starting mqtt-gpt-relay");
    run(cli, config).await
}

/// Install the stderr subscriber and, with `--log-dir`, a daily-rolling file.
///
/// `RUST_LOG` replaces the level derived from `-v` when set.
fn init_logging(cli: &Cli) -> Option<WorkerGuard> {
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter());

    match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "mqtt-gpt-relay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter());
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr_layer).init();
            None
        }
    }
}

async fn run(cli: Cli, config: FileConfig) -> Result<()> {
    let relay_config = config.relay_config();
    std::fs::create_dir_all(&relay_config.audio_dir).with_context(|| {
        format!(
            "failed to create audio directory {}",
            relay_config.audio_dir.display()
        )
    })?;

    // === Dependency Injection ===
    let provider =
        Arc::new(OpenAiProvider::new(config.openai_config()).context("failed to build HTTP client")?);
    let (broker, publisher) = MqttBroker::connect(config.broker_settings())
        .await
        .context("failed to connect to broker")?;
    let store = Arc::new(InMemorySessionStore::new(config.session_policy()));

    let mut ctx = RelayContext::new(provider, Arc::new(publisher), store)
        .with_classifier(config.classifier())
        .with_config(relay_config);
    if let Some(path) = &cli.transcript {
        match JsonlTranscriptLogger::open(path) {
            Some(logger) => {
                info!(path = %logger.path().display(), "Writing transcript");
                ctx = ctx.with_transcript(Arc::new(logger));
            }
            None => warn!(path = %path.display(), "Transcript disabled"),
        }
    }

    let shutdown = CancellationToken::new();
    let stop_broker = CancellationToken::new();
    let (dispatcher, sender) = InboundDispatcher::new(Arc::new(ctx));
    let dispatcher = tokio::spawn(dispatcher.with_shutdown(shutdown.clone()).run());
    let mut broker = tokio::spawn(broker.run(sender, stop_broker.clone()));

    // The broker loop only returns early if its task panics.
    let broker_exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutting down");
            None
        }
        result = &mut broker => Some(result),
    };

    shutdown.cancel();
    if let Err(e) = dispatcher.await {
        warn!(error = %e, "Dispatcher task failed");
    }
    // Stop the broker only after the dispatcher has published its last replies.
    stop_broker.cancel();
    let result = match broker_exit {
        Some(result) => result,
        None => broker.await,
    };
    result.context("broker task failed")?;

    info!("Stopped");
    Ok(())
}
