//! shelfcast: deliver a local ebook collection into a chat channel, and
//! backfill whatever the channel is missing.

mod error;

use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use shelfcast_config::Config;
use shelfcast_delivery::{BatchControl, Deliverer, Executor, Ledger, Notifier, RetryPolicy};
use shelfcast_inventory::LocalInventory;
use shelfcast_transport::MessengerHandle;
use shelfcast_transport::telegram::TelegramMessenger;
use shelfcast_workflow::{ChatQueues, Dispatcher, Services};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "shelfcast", version, about = "Deliver a local ebook collection into a chat channel")]
struct Cli {
    /// Configuration file [default: config.toml in the platform config directory]
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset (e.g. `debug` or `shelfcast_delivery=trace`)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll for operator events until someone sends /stop.
    Run,
    /// Print the resolved configuration with the bot token masked.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    match cli.command {
        Command::CheckConfig => {
            println!("{:#?}", config.redacted());
            Ok(())
        },
        Command::Run => run(config).await,
    }
}

async fn run(config: Config) -> Result<()> {
    let token = config.bot.token.as_deref().ok_or_else(|| exn::Exn::from(ErrorKind::MissingToken))?;
    let cwd = std::env::current_dir().or_raise(|| ErrorKind::WorkingDirectory)?;
    let paths = &config.paths;

    let inventory = LocalInventory::new(
        "local",
        cwd.join(&paths.sidecars),
        cwd.join(&paths.artifacts),
        paths.sidecar_extension.as_str(),
        paths.artifact_extension.as_str(),
    )
    .or_raise(|| ErrorKind::Inventory)?;
    let telegram = Arc::new(
        TelegramMessenger::new(token, Duration::from_secs(config.bot.poll_timeout_secs))
            .or_raise(|| ErrorKind::Transport)?,
    );
    let messenger: MessengerHandle = telegram.clone();

    let control = Arc::new(BatchControl::default());
    let executor = Arc::new(Executor::new(RetryPolicy::from(&config.retry), control, messenger.clone()));
    let notifier = Notifier::new(executor, messenger);
    let ledger = Arc::new(Ledger::new(cwd.join(&paths.ledger)));
    let deliverer = Deliverer::new(Arc::new(inventory), notifier, ledger, &config.delivery);
    let services = Services {
        deliverer: Arc::new(deliverer),
        selection: config.selection.clone(),
        remote_index: cwd.join(&paths.remote_index),
    };
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(services)));
    let queues = ChatQueues::new(dispatcher.clone());

    tracing::info!(
        sidecars = %paths.sidecars.display(),
        artifacts = %paths.artifacts.display(),
        "Polling for operator events"
    );
    let mut tasks = JoinSet::new();
    while !dispatcher.is_stopped() {
        let events = match telegram.poll().await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = ?e, "Polling failed");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            },
        };
        for event in events {
            queues.submit(event, &mut tasks).await;
        }
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Event handler panicked");
            }
        }
        // Give a freshly spawned /stop a chance to land before polling again.
        tokio::task::yield_now().await;
    }

    tracing::info!(in_flight = tasks.len(), "Stopping; waiting for in-flight work");
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "Event handler panicked");
        }
    }
    tracing::info!("Stopped");
    Ok(())
}
