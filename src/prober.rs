//! Liveness primitives: `canon(string) -> string` and the `Prober`
//! abstraction over `resolve`/`probe`. `TcpTimeProber` resolves via the
//! system resolver and treats a completed TCP connect to the `time` service
//! (port 37) within the 5s window as acknowledgment of liveness, equivalent
//! in effect to a raw SYN scan for a daemon that only needs a reachability
//! bit per host (see DESIGN.md).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// TCP `time` service port used for the reachability probe.
pub const TIME_SERVICE_PORT: u16 = 37;

/// Collection window for a probe pass.
pub const PROBE_WINDOW: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Prober: Send + Sync {
    async fn resolve(&self, name: &str) -> bool;
    async fn probe(&self, names: &[String]) -> HashSet<String>;
}

/// The default `Prober`: a real DNS lookup plus a TCP connect race to port 37
/// on each name, collecting whichever complete inside `PROBE_WINDOW`.
pub struct TcpTimeProber;

#[async_trait]
impl Prober for TcpTimeProber {
    async fn resolve(&self, name: &str) -> bool {
        let canonical = canon(name);
        tokio::net::lookup_host((canonical.as_str(), TIME_SERVICE_PORT)).await.map(|mut it| it.next().is_some()).unwrap_or(false)
    }

    async fn probe(&self, names: &[String]) -> HashSet<String> {
        let attempts = names.iter().map(|name| async move {
            let canonical = canon(name);
            let addr = (canonical.as_str(), TIME_SERVICE_PORT);
            match timeout(PROBE_WINDOW, TcpStream::connect(addr)).await {
                Ok(Ok(_stream)) => Some(name.clone()),
                Ok(Err(e)) => {
                    log::debug!("probe of {name} refused/unreachable: {e}");
                    None
                }
                Err(_) => {
                    log::debug!("probe of {name} timed out after {PROBE_WINDOW:?}");
                    None
                }
            }
        });
        futures::future::join_all(attempts).await.into_iter().flatten().collect()
    }
}

/// Hostname canonicalization: lowercase and strip a single trailing dot. The
/// conventional behavior for a DNS-adjacent helper of this shape (see
/// DESIGN.md).
pub fn canon(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}
