use std::sync::OnceLock;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub mod amount;
pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod rpc;
pub mod signing;
pub mod subscription;
pub mod transaction;
pub mod types;
pub mod wallets;

pub mod test_helpers;

pub use client::GameStateClient;
pub use config::{
    ClientConfig,
    ContractConfig,
};
pub use error::{
    ClientError,
    Result,
};

const LOG_DIR_ENV: &str = "ZOMBIE_HOUSE_LOG_DIR";
const LOG_FILE_PREFIX: &str = "zombie-house.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// level; `ZOMBIE_HOUSE_LOG_DIR` adds a daily rolling log file.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = std::env::var(LOG_DIR_ENV).ok().map(|dir| {
        let dir = shellexpand::tilde(&dir).into_owned();
        let appender = rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        fmt::layer().with_ansi(false).with_writer(writer)
    });
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init();
}
