#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;

mod bot;
mod config;
mod db;
mod error;
mod messages;
mod monitor;
mod parser;
mod registry;
mod schema;
mod server;
mod sidekick;
mod store;
mod subscription;
mod telegram;

use bot::Bot;
use monitor::Monitor;
use registry::Registry;
use sidekick::{SidekickClient, StatusSource};
use store::{MemoryStore, RoomStore};
use subscription::SubscriptionManager;
use telegram::{Notifier, Telegram};

#[derive(Debug, StructOpt)]
struct Opt {
    /// path to the dhall configuration file
    #[structopt(long, default_value = "sidekickbot.dhall")]
    config: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    let config = config::Config::from_path(&opt.config)
        .with_context(|| format!("cannot read config at {}", &opt.config))?;

    // per-operation connections make a shared sqlite :memory: db useless,
    // hand that case to the in-process store instead
    let store: Arc<dyn RoomStore> = if config.db_path == ":memory:" {
        log::warn!("using the in-memory store, monitored rooms will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        let db_path = config.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db::establish_connection(&db_path)?;
            db::run_migrations(&conn)
        })
        .await??;
        Arc::new(db::SqliteStore::new(&config.db_path))
    };

    let registry = Registry::new(store);
    let sidekick = SidekickClient::new(&config.api_base_url);
    let source: Arc<dyn StatusSource> = Arc::new(sidekick.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(Telegram::new(config.telegram_bot_token.0.clone()));

    let subscriptions = SubscriptionManager::new(registry.clone(), source.clone());
    let bot = Bot::new(subscriptions.clone(), notifier.clone());
    let monitor = Monitor::new(
        registry,
        source,
        notifier,
        Duration::from_secs(config.poll_interval_secs),
        config.max_concurrent_checks,
    );
    let state = server::AppState {
        bot,
        subscriptions,
        sidekick,
    };

    log::info!(
        "starting, polling every {}s with at most {} checks in flight",
        config.poll_interval_secs,
        config.max_concurrent_checks
    );

    tokio::try_join!(
        run_monitor(&monitor),
        run_server(&config, state),
    )?;

    Ok(())
}

// async closures are unstable, so create these functions in order to
// add the anyhow::Context bit
async fn run_monitor(monitor: &Monitor) -> Result<()> {
    monitor.run().await.context("Status monitor crashed")
}

async fn run_server(config: &config::Config, state: server::AppState) -> Result<()> {
    server::run(&config.webhook_bind, config.webhook_port, state)
        .await
        .context("Webhook server crashed")
}
