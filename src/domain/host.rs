use serde::{Deserialize, Serialize};

/// Sentinel `user` value meaning "this host is dead".
pub const DEATH: &str = "DEATH";

/// A named host or resource and its reservation record.
///
/// `classes` holds class *names*; they are resolved through the registry on
/// every access rather than aliasing the `Class` values themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub classes: Vec<String>,

    pub user: Option<String>,
    pub expiry: i64,
    pub msg: String,
    pub key: Option<String>,

    pub next_user: Option<String>,
    pub next_expiry: i64,
    pub next_msg: String,

    pub old_user: Option<String>,
    pub old_expiry: i64,
    pub old_msg: String,

    pub last_ping_time: i64,
    pub next_notify: i64,
}

impl Host {
    pub fn new(name: impl Into<String>, classes: Vec<String>, now: i64) -> Self {
        Host {
            name: name.into(),
            classes,
            user: None,
            expiry: 0,
            msg: String::new(),
            key: None,
            next_user: None,
            next_expiry: 0,
            next_msg: String::new(),
            old_user: None,
            old_expiry: 0,
            old_msg: String::new(),
            last_ping_time: now,
            next_notify: 0,
        }
    }

    pub fn is_reserved(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_dead(&self) -> bool {
        self.user.as_deref() == Some(DEATH)
    }

    pub fn has_next_user(&self) -> bool {
        self.next_user.is_some()
    }

    pub fn clear_reservation(&mut self) {
        self.user = None;
        self.expiry = 0;
        self.msg.clear();
        self.key = None;
    }

    pub fn clear_next_user(&mut self) {
        self.next_user = None;
        self.next_expiry = 0;
        self.next_msg.clear();
    }

    /// Promote the queued next user (if any) into the current reservation,
    /// clearing the queue slot and the bearer key. Returns the promoted user's
    /// name so the caller can issue a best-effort notification.
    pub fn promote_next_user(&mut self) -> Option<String> {
        let next_user = self.next_user.take()?;
        self.user = Some(next_user.clone());
        self.expiry = self.next_expiry;
        self.msg = std::mem::take(&mut self.next_msg);
        self.next_expiry = 0;
        self.key = None;
        Some(next_user)
    }

    /// Snapshot the live reservation fields into the `old_*` slots and mark
    /// the host dead.
    pub fn mark_dead(&mut self, reason: impl Into<String>) {
        self.old_user = self.user.clone();
        self.old_expiry = self.expiry;
        self.old_msg = self.msg.clone();
        self.user = Some(DEATH.to_string());
        self.expiry = 0;
        self.msg = reason.into();
    }

    /// Restore the snapshot taken by `mark_dead`.
    pub fn revive(&mut self) {
        self.user = self.old_user.take();
        self.expiry = self.old_expiry;
        self.msg = std::mem::take(&mut self.old_msg);
        self.old_expiry = 0;
    }
}

/// A name token valid for a host: `[\w.]+`.
pub fn is_valid_host_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Hosts in the default reserve class (`FARM`) sort after hosts not in it;
/// within a tie, hosts matching `(prefix)-(number)` sort by numeric suffix;
/// otherwise by name.
pub fn host_sort_key(host: &Host) -> (bool, Option<(String, u64)>, String) {
    use crate::domain::class::FARM_CLASS;

    let in_farm = host.classes.iter().any(|c| c == FARM_CLASS);
    let numeric = numbered_suffix(&host.name);
    (in_farm, numeric, host.name.clone())
}

fn numbered_suffix(name: &str) -> Option<(String, u64)> {
    let dash = name.rfind('-')?;
    let (prefix, rest) = name.split_at(dash);
    let number = &rest[1..];
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    number.parse::<u64>().ok().map(|n| (prefix.to_string(), n))
}

/// Sort hosts by `host_sort_key` in place.
pub fn sort_hosts(hosts: &mut [Host]) {
    hosts.sort_by(|a, b| {
        let (a_farm, a_num, a_name) = host_sort_key(a);
        let (b_farm, b_num, b_name) = host_sort_key(b);
        a_farm
            .cmp(&b_farm)
            .then_with(|| match (&a_num, &b_num) {
                (Some((ap, an)), Some((bp, bn))) => ap.cmp(bp).then_with(|| an.cmp(bn)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a_name.cmp(&b_name))
    });
}
