use std::sync::Arc;

use clap::Parser;

use crate::config::Config;
use crate::error::Result;
use crate::notify::{LoggingNotifier, Notifier, WebhookNotifier};
use crate::prober::{Prober, TcpTimeProber};

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod logger;
pub mod notify;
pub mod persistence;
pub mod prober;
pub mod server;
pub mod wire;

/// Parses CLI flags, loads durable state, and runs the connection server
/// until the process is killed. The only clean exit is a fatal persistence
/// error, which aborts via `std::process::exit` rather than returning, so
/// this only returns `Err` for startup failures (bad flags, an unreadable or
/// corrupt state file, a port already in use).
pub fn run() -> Result<()> {
    let config = Config::parse();
    logger::init();
    log::info!("rsvpd starting with config: {config:?}");

    let model = server::engine_actor::load_initial_model(&config.statefile)?;

    let notifier: Arc<dyn Notifier> = if config.chat_webhook.is_some() || config.mail_webhook.is_some() {
        Arc::new(WebhookNotifier::new(config.chat_webhook.clone(), config.mail_webhook.clone()))
    } else {
        Arc::new(LoggingNotifier)
    };
    let prober: Arc<dyn Prober> = Arc::new(TcpTimeProber);

    let system = actix_rt::System::new();
    system.block_on(server::run(config, model, notifier, prober))
}
