//! The single-writer actor that owns the `Model` exclusively. Every
//! mutation, whether a client request or a background pass, runs through
//! this actor's mailbox, so no lock is needed: the actix single-threaded
//! executor guarantees only one handler body runs at a time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use actix::prelude::*;

use crate::domain::engine::{self, Channel};
use crate::domain::model::Model;
use crate::error::Result;
use crate::notify::Notifier;
use crate::persistence;
use crate::prober::Prober;
use crate::wire::params::Params;
use crate::wire::response::Response;

/// Silence threshold for the liveness loop.
pub const DEFAULT_DEAD_TIME: i64 = 120;
/// Re-notification interval for the expiry loop (6 hours).
pub const DEFAULT_NOTIFY_INTERVAL: i64 = 6 * 60 * 60;

pub fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

pub struct EngineActor {
    pub model: Model,
    pub state_path: PathBuf,
    pub notifier: Arc<dyn Notifier>,
    pub prober: Arc<dyn Prober>,
    pub ping_delay: Duration,
    pub notify_expired: bool,
    pub dead_time: i64,
    pub notify_interval: i64,
}

impl EngineActor {
    pub fn new(model: Model, state_path: PathBuf, notifier: Arc<dyn Notifier>, prober: Arc<dyn Prober>, ping_delay: Duration, notify_expired: bool) -> Self {
        EngineActor {
            model,
            state_path,
            notifier,
            prober,
            ping_delay,
            notify_expired,
            dead_time: DEFAULT_DEAD_TIME,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
        }
    }

    /// Persist or abort: a persistence failure is fatal so the process
    /// supervisor restarts it.
    fn persist_or_abort(&self) {
        if let Err(e) = persistence::save(&self.state_path, &self.model) {
            log::error!("fatal: failed to persist state file {}: {e}", self.state_path.display());
            std::process::exit(1);
        }
    }

    fn start_liveness_pass(&mut self, ctx: &mut Context<Self>) {
        let prober = self.prober.clone();
        let names: Vec<String> =
            self.model.hosts.values().filter(|h| !engine::host_is_resource(&self.model, h)).map(|h| h.name.clone()).collect();
        let cycle_start = now_secs();

        let fut = async move {
            let mut reachable = Vec::new();
            for name in &names {
                if prober.resolve(name).await {
                    reachable.push(name.clone());
                } else {
                    log::warn!("name resolution failed for {name}, skipping probe");
                }
            }
            let acked = prober.probe(&reachable).await;
            (acked, cycle_start)
        };

        ctx.spawn(fut.into_actor(self).map(|(acked, cycle_start), act, _ctx| {
            let revived = engine::apply_ping_results(&mut act.model, &acked, cycle_start);
            let dead = engine::mark_dead_hosts(&mut act.model, now_secs(), act.dead_time);
            for h in &revived {
                log::info!("revived {h} after a successful probe");
            }
            for h in &dead {
                log::warn!("marked {h} dead: no response for over {}s", act.dead_time);
            }
            if !revived.is_empty() || !dead.is_empty() {
                act.persist_or_abort();
            }
        }));
    }

    fn run_expiry_pass(&mut self) {
        let now = now_secs();
        let events = engine::scan_expired_reservations(&mut self.model, now, self.notify_interval);
        if events.is_empty() {
            return;
        }
        self.persist_or_abort();

        let notifier = self.notifier.clone();
        for event in events {
            let notifier = notifier.clone();
            actix::spawn(async move {
                let subject = format!("reservation on {} has expired", event.host);
                let body = format!("your reservation on {} has expired and may be reclaimed", event.host);
                if let Err(e) = notifier.notify_chat(&event.user, &subject, &body).await {
                    log::warn!("chat notification to {} failed: {e}", event.user);
                }
                if event.first {
                    if let Err(e) = notifier.notify_mail("rsvpd", &event.user, &subject, &body).await {
                        log::warn!("mail notification to {} failed: {e}", event.user);
                    }
                }
            });
        }
    }
}

impl Actor for EngineActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.run_interval(self.ping_delay, |act, ctx| act.start_liveness_pass(ctx));
        if self.notify_expired {
            ctx.run_interval(Duration::from_secs(1), |act, _ctx| act.run_expiry_pass());
        }
    }
}

/// A fully parsed client request, addressed to the engine's mailbox.
#[derive(Message)]
#[rtype(result = "Response")]
pub struct DispatchRequest {
    pub cmd: String,
    pub params: Params,
}

impl Handler<DispatchRequest> for EngineActor {
    type Result = Response;

    fn handle(&mut self, msg: DispatchRequest, _ctx: &mut Self::Context) -> Self::Result {
        match crate::dispatch::dispatch(&mut self.model, &msg.cmd, &msg.params, now_secs()) {
            Ok(success) => {
                self.persist_or_abort();
                dispatch_notifications(&self.notifier, &success.notifications);
                Response::success(success.message, success.data)
            }
            Err(e) => Response::from(e),
        }
    }
}

fn dispatch_notifications(notifier: &Arc<dyn Notifier>, notifications: &[engine::Notification]) {
    for note in notifications {
        let notifier = notifier.clone();
        let note = note.clone();
        actix::spawn(async move {
            let result = match note.channel {
                Channel::Chat => notifier.notify_chat(&note.user, &note.subject, &note.body).await,
                Channel::Mail => notifier.notify_mail("rsvpd", &note.user, &note.subject, &note.body).await,
            };
            if let Err(e) = result {
                log::warn!("notification to {} failed: {e}", note.user);
            }
        });
    }
}

pub fn load_initial_model(state_path: &PathBuf) -> Result<Model> {
    let mut model = persistence::load(state_path)?;
    crate::domain::init::ensure_default_classes(&mut model);
    Ok(model)
}
