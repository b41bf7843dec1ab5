mod classifier;
mod config;
mod consumer;
mod domain;
mod export;
mod postfix;
mod queue;
mod store;
#[cfg(test)]
mod testutil;
mod validator;

use dotenv::dotenv;
use log::{debug, error, info};
use sqlx::mysql::MySqlPoolOptions;
use thiserror::Error;

use crate::config::{Config, ConfigError, RunMode};
use crate::consumer::QueueConsumer;
use crate::export::{ExportError, TransportExporter};
use crate::queue::{QueueError, SqsQueue};
use crate::store::{BanStore, BounceStore, MySqlBanStore, MySqlBounceStore, StoreError};

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("database connection failed: {0}")]
    Connect(#[from] sqlx::Error),
    #[error("postfix reload failed: {0}")]
    Reload(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match Config::parse(&args) {
        Ok(config) => config,
        Err(ConfigError::HelpRequested) => {
            print_usage();
            return;
        }
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            std::process::exit(2);
        }
    };

    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", default_log_filter(config.quiet));
    }
    env_logger::init();

    debug!(
        "Running with mode={:?} region={} domain={} store={} db={} bounces={} banned={} secret=<redacted>",
        config.mode,
        config.region,
        config.mail_domain,
        config.store_host,
        config.database,
        config.bounces_collection,
        config.banned_collection,
    );

    if let Err(err) = run(&config).await {
        error!("{err}");
        std::process::exit(1);
    }
}

/// Default log filter when RUST_LOG is unset: debug so the startup
/// parameter line is visible, warn in quiet/cron mode.
fn default_log_filter(quiet: bool) -> &'static str {
    if quiet {
        "warn"
    } else {
        "debug"
    }
}

fn print_usage() {
    let brief = "Usage: ses-bounce-handler [options]";
    println!("{}", Config::options().usage(brief));
}

async fn run(config: &Config) -> Result<(), RunError> {
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url())
        .await?;

    let bounces = MySqlBounceStore::new(pool.clone(), &config.bounces_collection);
    bounces.ensure_schema().await?;
    let bans = MySqlBanStore::new(pool, &config.banned_collection);
    bans.ensure_schema().await?;

    let mut new_bans = 0;
    if config.mode.polls() {
        let queue = SqsQueue::connect(
            &config.region,
            &config.access_key,
            &config.secret_key,
            &config.queue_name(),
        )
        .await?;
        let consumer = QueueConsumer::new(&queue, Some(&bounces as &dyn BounceStore), &bans);
        new_bans = consumer.run().await?;
    }

    if config.mode.exports() {
        // In postfix-only mode the export is unconditional; otherwise it
        // only runs when the drain actually added bans.
        if new_bans > 0 || config.mode == RunMode::Postfix {
            info!("Got total {} bans, updating the transport ban list.", new_bans);
            let path = postfix::blocklist_path();
            info!("Writing banned database to {}", path.display());
            TransportExporter::new(&bans).export(&path).await?;

            if postfix::is_deployment_live() {
                postfix::reload_transport_map()?;
            }
        } else {
            info!("No new bans added, not updating the transport map.");
        }
    }

    Ok(())
}
