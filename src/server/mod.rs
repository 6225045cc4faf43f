//! The connection server: a `TcpListener` accept loop spawned on the same
//! `actix_rt` `LocalSet` as the [`EngineActor`], handing each accepted socket
//! to its own [`TcpSession`] actor.

pub mod engine_actor;
pub mod session;

use std::sync::Arc;

use actix::prelude::*;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::domain::model::Model;
use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::prober::Prober;

pub use engine_actor::EngineActor;
pub use session::TcpSession;

pub async fn run(config: Config, model: Model, notifier: Arc<dyn Notifier>, prober: Arc<dyn Prober>) -> Result<()> {
    let engine = EngineActor::new(
        model,
        config.statefile.clone(),
        notifier,
        prober,
        std::time::Duration::from_secs(config.pingdelay),
        config.notify_expired,
    )
    .start();

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await.map_err(Error::Io)?;
    log::info!("rsvpd listening on port {}", config.port);

    loop {
        let (stream, peer) = listener.accept().await.map_err(Error::Io)?;
        log::info!("accepted connection from {peer}");
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("failed to set TCP_NODELAY for {peer}: {e}");
        }
        TcpSession::new(engine.clone(), stream);
    }
}
