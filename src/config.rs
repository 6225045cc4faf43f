//! Command-line configuration. A plain `clap::Parser` derive covering the
//! flags and defaults the daemon has always shipped with.

use std::path::PathBuf;

use clap::Parser;

/// Arbitrates exclusive, time-bounded reservations of hosts and resources.
#[derive(Debug, Parser)]
#[command(name = "rsvpd", version, about)]
pub struct Config {
    /// Path to the logging configuration file (unused by this crate's logger,
    /// which is configured via `RUST_LOG`; kept for CLI compatibility).
    #[arg(long = "config", default_value = "/etc/rsvpd/log.conf")]
    pub config: PathBuf,

    /// Path to the durable state file.
    #[arg(long = "statefile", default_value = "hosts.state")]
    pub statefile: PathBuf,

    /// TCP port to listen on.
    #[arg(long = "port", default_value_t = 1752)]
    pub port: u16,

    /// Seconds between liveness probe passes; also the connection server's
    /// poll timeout in the reference implementation.
    #[arg(long = "pingdelay", default_value_t = 60)]
    pub pingdelay: u64,

    /// Whether to run the expiry-notification loop.
    #[arg(long = "notifyExpired", default_value_t = true, action = clap::ArgAction::Set)]
    pub notify_expired: bool,

    /// Webhook URL for best-effort chat notifications.
    #[arg(long = "chat-webhook")]
    pub chat_webhook: Option<String>,

    /// Webhook URL for best-effort mail notifications.
    #[arg(long = "mail-webhook")]
    pub mail_webhook: Option<String>,
}
