//! The reservation engine: every operation that mutates the host/class
//! registries, and the invariants every reserving operation must enforce.
//! Pure logic over a `&mut Model`, with no I/O, async, or notification
//! transport, so it is trivially unit-testable. The caller (the `EngineActor`
//! in `server`) persists the model after a successful call and best-effort
//! delivers the `Notification`s a call returns.

use rand::seq::SliceRandom;
use serde_json::{Value, json};

use crate::domain::class::{self, Class};
use crate::domain::class_expr::{self, ClassExpr};
use crate::domain::host::{self, Host};
use crate::domain::model::Model;
use crate::error::{EngineError, EngineResult};
use crate::prober::canon;

/// A channel a best-effort notification should go out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Chat,
    Mail,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub channel: Channel,
    pub user: String,
    pub subject: String,
    pub body: String,
}

/// The successful outcome of an engine operation.
#[derive(Debug, Clone)]
pub struct EngineSuccess {
    pub message: String,
    pub data: Value,
    pub notifications: Vec<Notification>,
}

impl EngineSuccess {
    fn msg(message: impl Into<String>) -> Self {
        EngineSuccess { message: message.into(), data: Value::Null, notifications: Vec::new() }
    }

    fn with_data(message: impl Into<String>, data: Value) -> Self {
        EngineSuccess { message: message.into(), data, notifications: Vec::new() }
    }
}

const FORBIDDEN_USER: &str = "root";

fn validate_user(user: &str) -> EngineResult<()> {
    if user.is_empty() {
        return Err(EngineError::permanent("user must not be empty"));
    }
    if user == FORBIDDEN_USER {
        return Err(EngineError::permanent("user 'root' may not hold reservations"));
    }
    Ok(())
}

/// `expire` must be a non-negative integer; 0 means "forever".
fn validate_expire(expire: i64) -> EngineResult<()> {
    if expire < 0 {
        return Err(EngineError::permanent("expire must be a non-negative integer"));
    }
    Ok(())
}

fn is_resource_class(class: &Class) -> bool {
    class.resource
}

pub(crate) fn host_is_resource(model: &Model, host: &Host) -> bool {
    host.classes.iter().filter_map(|c| model.class(c)).any(is_resource_class)
}

// ---------------------------------------------------------------------------
// Class management
// ---------------------------------------------------------------------------

pub fn add_class(model: &mut Model, name: &str, description: &str, members: &[String]) -> EngineResult<EngineSuccess> {
    if model.classes.contains_key(name) {
        return Err(EngineError::permanent(format!("class {name} already exists")));
    }
    if !class::is_valid_class_name(name) {
        return Err(EngineError::permanent(format!("invalid class name: {name}")));
    }
    for member in members {
        let m = model.class(member).ok_or_else(|| EngineError::permanent(format!("no such class: {member}")))?;
        if m.is_composite() {
            return Err(EngineError::permanent(format!("{member} is itself composite and cannot be a member")));
        }
        if m.resource {
            return Err(EngineError::permanent(format!("{member} is a resource class and cannot be a member")));
        }
    }
    model.classes.insert(name.to_string(), Class::composite(name, description, members.to_vec()));
    Ok(EngineSuccess::msg(format!("added class {name}")))
}

/// Resource classes must have no members.
pub fn add_resource_class(model: &mut Model, name: &str, description: &str) -> EngineResult<EngineSuccess> {
    if model.classes.contains_key(name) {
        return Err(EngineError::permanent(format!("class {name} already exists")));
    }
    if !class::is_valid_class_name(name) {
        return Err(EngineError::permanent(format!("invalid class name: {name}")));
    }
    model.classes.insert(name.to_string(), Class::new(name, description, true));
    Ok(EngineSuccess::msg(format!("added resource class {name}")))
}

/// Cascading delete: `ALL` may never be deleted; the class is stripped from
/// every host and from every composite's member list; if it was a resource
/// class every host carrying it is deleted outright and named in the success
/// message.
pub fn del_class(model: &mut Model, name: &str) -> EngineResult<EngineSuccess> {
    if name == class::ALL_CLASS {
        return Err(EngineError::permanent("the ALL class cannot be deleted"));
    }
    let removed = model.classes.remove(name).ok_or_else(|| EngineError::permanent(format!("no such class: {name}")))?;

    for c in model.classes.values_mut() {
        c.members.retain(|m| m != name);
    }

    let mut deleted_resources = Vec::new();
    if removed.resource {
        let doomed: Vec<String> = model.hosts.values().filter(|h| h.classes.iter().any(|c| c == name)).map(|h| h.name.clone()).collect();
        for d in &doomed {
            model.hosts.remove(d);
        }
        deleted_resources = doomed;
    } else {
        for h in model.hosts.values_mut() {
            h.classes.retain(|c| c != name);
        }
    }

    let mut message = format!("deleted class {name}");
    if !deleted_resources.is_empty() {
        message = format!("{message}; also deleted resources: {}", deleted_resources.join(", "));
    }
    Ok(EngineSuccess::msg(message))
}

// ---------------------------------------------------------------------------
// Host / resource management
// ---------------------------------------------------------------------------

/// Adds a host or resource under `name`, canonicalizing it first. The
/// requested classes must exist, be atomic, and share one flavor: all
/// resource (at most one) or all non-resource.
pub fn add_host_or_resource(model: &mut Model, name: &str, classes: Option<Vec<String>>, now: i64) -> EngineResult<EngineSuccess> {
    let name = canon(name);
    let name = name.as_str();
    if model.hosts.contains_key(name) {
        return Err(EngineError::permanent(format!("host {name} already exists")));
    }
    if !host::is_valid_host_name(name) {
        return Err(EngineError::permanent(format!("invalid host name: {name}")));
    }

    let classes = match classes {
        Some(c) if !c.is_empty() => c,
        _ => vec![class::ALL_CLASS.to_string()],
    };

    let mut resolved = Vec::with_capacity(classes.len());
    for cname in &classes {
        let c = model.class(cname).ok_or_else(|| EngineError::permanent(format!("no such class: {cname}")))?;
        if c.is_composite() {
            return Err(EngineError::permanent(format!("{cname} is a composite class and cannot be assigned to a host")));
        }
        resolved.push(c);
    }
    check_flavor_consistency(&resolved)?;

    model.hosts.insert(name.to_string(), Host::new(name, classes, now));
    Ok(EngineSuccess::msg(format!("added host {name}")))
}

fn check_flavor_consistency(classes: &[&Class]) -> EngineResult<()> {
    let resource_count = classes.iter().filter(|c| c.resource).count();
    let non_resource_count = classes.len() - resource_count;
    if resource_count > 1 {
        return Err(EngineError::permanent("a host may belong to at most one resource class"));
    }
    if resource_count > 0 && non_resource_count > 0 {
        return Err(EngineError::permanent("a host's classes must be all-resource or all-non-resource"));
    }
    Ok(())
}

pub fn del_host(model: &mut Model, name: &str) -> EngineResult<EngineSuccess> {
    model.hosts.remove(name).ok_or_else(|| EngineError::permanent(format!("no such host: {name}")))?;
    Ok(EngineSuccess::msg(format!("deleted host {name}")))
}

/// Composite classes may never be added to a host directly; the resulting
/// class set must still satisfy the flavor-consistency invariant.
pub fn modify_host(
    model: &mut Model,
    host_name: &str,
    add_classes: &[String],
    del_classes: &[String],
) -> EngineResult<EngineSuccess> {
    for cname in add_classes {
        let c = model.class(cname).ok_or_else(|| EngineError::permanent(format!("no such class: {cname}")))?;
        if c.is_composite() {
            return Err(EngineError::permanent(format!("{cname} is a composite class and cannot be added to a host")));
        }
    }

    let mut resulting: Vec<String> = {
        let h = model.host(host_name).ok_or_else(|| EngineError::permanent(format!("no such host: {host_name}")))?;
        h.classes.clone()
    };
    resulting.retain(|c| !del_classes.contains(c));
    for cname in add_classes {
        if !resulting.contains(cname) {
            resulting.push(cname.clone());
        }
    }
    let resolved: Vec<&Class> = resulting.iter().filter_map(|c| model.class(c)).collect();
    check_flavor_consistency(&resolved)?;

    let h = model.host_mut(host_name).unwrap();
    h.classes = resulting;
    Ok(EngineSuccess::msg(format!("modified host {host_name}")))
}

// ---------------------------------------------------------------------------
// Reservation lifecycle
// ---------------------------------------------------------------------------

pub struct ReserveParams<'a> {
    pub user: &'a str,
    pub expire: i64,
    pub msg: &'a str,
    pub key: Option<&'a str>,
}

/// `as_resource` is the caller's declared intent (the `resource` flag on
/// `rsvp_host`, or always-true for `release_resource`'s sibling `add_resource`
/// path) and must match whether the host actually is a resource.
pub fn reserve_host_by_name(model: &mut Model, host_name: &str, params: ReserveParams, as_resource: bool) -> EngineResult<EngineSuccess> {
    validate_user(params.user)?;
    validate_expire(params.expire)?;

    let is_resource = {
        let h = model.host(host_name).ok_or_else(|| EngineError::permanent(format!("no such host: {host_name}")))?;
        host_is_resource(model, h)
    };
    if is_resource != as_resource {
        let kind = if is_resource { "a resource" } else { "not a resource" };
        return Err(EngineError::permanent(format!("{host_name} is {kind}; use the matching reservation command")));
    }

    let h = model.host_mut(host_name).unwrap();
    if h.is_reserved() {
        return Err(EngineError::temporary(format!("{host_name} is already reserved by {}", h.user.as_deref().unwrap_or(""))));
    }

    h.user = Some(params.user.to_string());
    h.expiry = params.expire;
    h.msg = params.msg.to_string();
    h.key = params.key.map(|k| k.to_string());
    Ok(EngineSuccess::msg(format!("reserved {host_name}")))
}

/// Candidates are sorted in selection order, the same host ordering used for
/// listing, which already puts hosts outside the default reserve class (and
/// lower-numbered hosts) first, and the first `numhosts` are taken, unless
/// `randomize` asks for a shuffle instead. The names of the reserved hosts are
/// returned in the reverse of that selection order.
pub fn reserve_hosts_by_class(
    model: &mut Model,
    class_expr_str: &str,
    numhosts: &str,
    params: ReserveParams,
    randomize: bool,
) -> EngineResult<EngineSuccess> {
    validate_user(params.user)?;
    validate_expire(params.expire)?;

    if numhosts.is_empty() || !numhosts.chars().all(|c| c.is_ascii_digit()) {
        return Err(EngineError::permanent(format!("numhosts must be a positive integer: {numhosts}")));
    }
    let n: usize = numhosts.parse().map_err(|_| EngineError::permanent("numhosts out of range"))?;
    if n == 0 {
        return Err(EngineError::permanent("numhosts must be positive"));
    }

    let expr = class_expr::resolve(model, class_expr_str)?;

    let mut candidates: Vec<Host> = model
        .hosts
        .values()
        .filter(|h| !h.is_reserved() && !host_is_resource(model, h) && class_expr::contains_host(&expr, h))
        .cloned()
        .collect();
    drop(expr);

    if randomize {
        candidates.shuffle(&mut rand::rng());
    } else {
        host::sort_hosts(&mut candidates);
    }

    if candidates.len() < n {
        return Err(EngineError::temporary(format!("not enough free hosts to get {n}, have {} free", candidates.len())));
    }

    let selected: Vec<&Host> = candidates.iter().take(n).collect();
    let names: Vec<String> = selected.iter().map(|h| h.name.clone()).collect();

    for name in &names {
        let h = model.host_mut(name).unwrap();
        h.user = Some(params.user.to_string());
        h.expiry = params.expire;
        h.msg = params.msg.to_string();
        h.key = params.key.map(|k| k.to_string());
    }

    let mut reversed = names.clone();
    reversed.reverse();
    Ok(EngineSuccess::with_data(format!("reserved {n} hosts from class expression {class_expr_str}"), json!(reversed)))
}

fn owns_reservation(host: &Host, user: &str) -> bool {
    host.is_reserved() && !host.is_dead() && host.user.as_deref() == Some(user)
}

/// Shared release logic for both `release_rsvp` and `release_resource`.
/// Requires the original `key` or `force`; promotes a queued next user if one
/// is set, otherwise clears the reservation outright.
fn release(model: &mut Model, host_name: &str, user: &str, msg: &str, key: Option<&str>, force: bool) -> EngineResult<EngineSuccess> {
    let h = model.host_mut(host_name).ok_or_else(|| EngineError::permanent(format!("no such host: {host_name}")))?;
    if !owns_reservation(h, user) {
        return Err(EngineError::permanent(format!("{host_name} is not reserved by {user}")));
    }
    if !force {
        match (&h.key, key) {
            (Some(expected), Some(given)) if expected == given => {}
            (None, _) => {}
            (Some(expected), _) => {
                return Err(EngineError::permanent(format!("Wrong key provided to release host {host_name}: expected '{expected}'")));
            }
        }
    }
    let _ = msg;

    if h.has_next_user() {
        let promoted = h.promote_next_user().expect("has_next_user just checked");
        let notifications = vec![Notification {
            channel: Channel::Chat,
            user: promoted.clone(),
            subject: format!("{host_name} reserved for you"),
            body: format!("{host_name} was released by {user} and is now reserved for you"),
        }];
        let mut success = EngineSuccess::msg(format!("released {host_name} and reserved it for {promoted}"));
        success.notifications = notifications;
        Ok(success)
    } else {
        h.clear_reservation();
        Ok(EngineSuccess::msg(format!("released {host_name}")))
    }
}

pub fn release_reservation(model: &mut Model, host_name: &str, user: &str, msg: &str, key: Option<&str>, force: bool) -> EngineResult<EngineSuccess> {
    {
        let h = model.host(host_name).ok_or_else(|| EngineError::permanent(format!("no such host: {host_name}")))?;
        if host_is_resource(model, h) {
            return Err(EngineError::permanent(format!("{host_name} is a resource; use release_resource")));
        }
    }
    release(model, host_name, user, msg, key, force)
}

pub fn release_resource(model: &mut Model, host_name: &str, user: &str, msg: &str, key: Option<&str>, force: bool) -> EngineResult<EngineSuccess> {
    {
        let h = model.host(host_name).ok_or_else(|| EngineError::permanent(format!("no such host: {host_name}")))?;
        if !host_is_resource(model, h) {
            return Err(EngineError::permanent(format!("{host_name} is not a resource; use release_rsvp")));
        }
    }
    release(model, host_name, user, msg, key, force)
}

/// Only the reserving user may renew; `msg` is left untouched unless a
/// non-empty replacement is given.
pub fn renew_reservation(model: &mut Model, host_name: &str, user: &str, expire: i64, msg: &str) -> EngineResult<EngineSuccess> {
    validate_expire(expire)?;
    let h = model.host_mut(host_name).ok_or_else(|| EngineError::permanent(format!("no such host: {host_name}")))?;
    if !owns_reservation(h, user) {
        return Err(EngineError::permanent(format!("{host_name} is not reserved by {user}")));
    }
    h.expiry = expire;
    if !msg.is_empty() {
        h.msg = msg.to_string();
    }
    Ok(EngineSuccess::msg(format!("renewed {host_name}")))
}

/// Succeeds iff the host exists and is reserved by the caller.
pub fn verify_reservation(model: &Model, host_name: &str, user: &str) -> EngineResult<EngineSuccess> {
    let h = model.host(host_name).ok_or_else(|| EngineError::permanent(format!("no such host: {host_name}")))?;
    if owns_reservation(h, user) {
        Ok(EngineSuccess::msg(format!("{host_name} is reserved by {user}")))
    } else {
        Err(EngineError::permanent(format!("{host_name} is not reserved by {user}")))
    }
}

pub fn get_current_user(model: &Model, host_name: &str) -> EngineResult<EngineSuccess> {
    let h = model.host(host_name).ok_or_else(|| EngineError::permanent(format!("no such host: {host_name}")))?;
    Ok(EngineSuccess::with_data(format!("current user of {host_name}"), json!(h.user)))
}

/// Only the reserving user may queue a successor for someone else; anyone may
/// queue *themselves*, provided no other next user is already queued and they
/// are not already the current user.
pub fn add_next_user(model: &mut Model, host_name: &str, user: &str, expire: i64, msg: &str) -> EngineResult<EngineSuccess> {
    validate_user(user)?;
    validate_expire(expire)?;
    let h = model.host_mut(host_name).ok_or_else(|| EngineError::permanent(format!("no such host: {host_name}")))?;
    if !h.is_reserved() {
        return Err(EngineError::permanent(format!("{host_name} is not reserved")));
    }
    if h.has_next_user() {
        return Err(EngineError::permanent(format!("{host_name} already has a queued next user")));
    }
    if h.user.as_deref() == Some(user) {
        return Err(EngineError::permanent(format!("{user} already holds the reservation on {host_name}")));
    }
    h.next_user = Some(user.to_string());
    h.next_expiry = expire;
    h.next_msg = msg.to_string();
    Ok(EngineSuccess::msg(format!("queued {user} as next user of {host_name}")))
}

/// Only the reserving user may delete the next user queued on their own
/// reservation.
pub fn del_next_user(model: &mut Model, host_name: &str, user: &str) -> EngineResult<EngineSuccess> {
    let h = model.host_mut(host_name).ok_or_else(|| EngineError::permanent(format!("no such host: {host_name}")))?;
    if !owns_reservation(h, user) {
        return Err(EngineError::permanent(format!("{host_name} is not reserved by {user}")));
    }
    if !h.has_next_user() {
        return Err(EngineError::permanent(format!("{host_name} has no queued next user")));
    }
    h.clear_next_user();
    Ok(EngineSuccess::msg(format!("cleared next user of {host_name}")))
}

/// By name, a non-dead host is a permanent error; with `all`, non-dead hosts
/// are silently skipped.
pub fn revive_host(model: &mut Model, host_name: Option<&str>, all: bool) -> EngineResult<EngineSuccess> {
    if all {
        let mut revived = Vec::new();
        for h in model.hosts.values_mut() {
            if h.is_dead() {
                h.revive();
                revived.push(h.name.clone());
            }
        }
        Ok(EngineSuccess::msg(format!("revived {} hosts: {}", revived.len(), revived.join(", "))))
    } else {
        let name = host_name.ok_or_else(|| EngineError::permanent("host is required unless all is set"))?;
        let h = model.host_mut(name).ok_or_else(|| EngineError::permanent(format!("no such host: {name}")))?;
        if !h.is_dead() {
            return Err(EngineError::permanent(format!("{name} is not dead")));
        }
        h.revive();
        Ok(EngineSuccess::msg(format!("revived {name}")))
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Data shape: `[name, description_or_" ", resource, ...members]`.
pub fn list_classes(model: &Model, class_filter: Option<&str>) -> EngineResult<EngineSuccess> {
    let mut classes: Vec<&Class> = match class_filter {
        Some(name) => vec![model.class(name).ok_or_else(|| EngineError::permanent(format!("no such class: {name}")))?],
        None => model.classes.values().collect(),
    };
    classes.sort();

    let rows: Vec<Value> = classes
        .into_iter()
        .map(|c| {
            let description = if c.description.is_empty() { " ".to_string() } else { c.description.clone() };
            let mut row = vec![json!(c.name), json!(description), json!(c.resource)];
            row.extend(c.members.iter().map(|m| json!(m)));
            Value::Array(row)
        })
        .collect();
    Ok(EngineSuccess::with_data("classes", Value::Array(rows)))
}

pub struct ListHostsParams<'a> {
    pub class: Option<&'a str>,
    pub user: Option<&'a str>,
    pub verbose: bool,
    pub next: bool,
    pub host_regexp: Option<&'a str>,
}

/// Filters are applied before the projection named by `verbose`/`next`;
/// resources are excluded from the default listing unless a `class` or `user`
/// filter was given.
pub fn list_hosts(model: &Model, params: ListHostsParams) -> EngineResult<EngineSuccess> {
    let expr = match params.class {
        Some(expr) => Some(class_expr::resolve(model, expr)?),
        None => None,
    };

    let regexp = match params.host_regexp {
        Some(pattern) => Some(regex::Regex::new(pattern).map_err(|e| EngineError::permanent(format!("invalid hostRegexp: {e}")))?),
        None => None,
    };

    let default_listing = params.class.is_none() && params.user.is_none();

    let mut hosts: Vec<Host> = model
        .hosts
        .values()
        .filter(|h| {
            if default_listing && host_is_resource(model, h) {
                return false;
            }
            if let Some(expr) = &expr {
                if !class_expr::contains_host(expr, h) {
                    return false;
                }
            }
            if let Some(user) = params.user {
                if h.user.as_deref() != Some(user) {
                    return false;
                }
            }
            if let Some(re) = &regexp {
                if !re.is_match(&h.name) {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect();
    host::sort_hosts(&mut hosts);

    let rows: Vec<Value> = hosts
        .into_iter()
        .map(|h| {
            if params.verbose {
                json!([h.name, h.user, h.classes.join(", ")])
            } else if params.next {
                json!([h.name, h.user, h.next_user, h.next_expiry, h.next_msg])
            } else {
                json!([h.name, h.user, h.expiry, h.msg])
            }
        })
        .collect();
    Ok(EngineSuccess::with_data("hosts", Value::Array(rows)))
}

// ---------------------------------------------------------------------------
// Background passes
// ---------------------------------------------------------------------------

/// Applies one probe pass's acknowledgments: every acknowledged host's
/// `lastPingTime` is advanced to the cycle start, and any that were dead are
/// revived. Returns the names revived, for logging.
pub fn apply_ping_results(model: &mut Model, acked: &std::collections::HashSet<String>, cycle_start: i64) -> Vec<String> {
    let mut revived = Vec::new();
    for h in model.hosts.values_mut() {
        if acked.contains(&h.name) {
            h.last_ping_time = cycle_start;
            if h.is_dead() {
                h.revive();
                revived.push(h.name.clone());
            }
        }
    }
    revived
}

/// Marks silent hosts dead: non-resource, non-reserved, not already dead,
/// pinged at least once, and silent for longer than `dead_time`. Returns the
/// names marked dead, for logging.
pub fn mark_dead_hosts(model: &mut Model, now: i64, dead_time: i64) -> Vec<String> {
    let resource_classes: std::collections::HashSet<String> = model.classes.values().filter(|c| c.resource).map(|c| c.name.clone()).collect();
    let reason = format!("Lost contact at: {}", format_localtime(now));

    let mut marked = Vec::new();
    for h in model.hosts.values_mut() {
        let is_resource = h.classes.iter().any(|c| resource_classes.contains(c));
        if is_resource || h.is_reserved() || h.is_dead() {
            continue;
        }
        if h.last_ping_time > 0 && now - h.last_ping_time > dead_time {
            h.mark_dead(reason.clone());
            marked.push(h.name.clone());
        }
    }
    marked
}

/// The outcome of the expiry scan for one host: a best-effort chat
/// notification always, plus a mail notification the first time a given
/// host's expiry is observed (i.e. when `nextNotify` was still 0).
pub struct ExpiryEvent {
    pub host: String,
    pub user: String,
    pub first: bool,
}

/// Scans every reserved, past-expiry host and rate-limits notifications via
/// `nextNotify`. Never mutates `user` or `expiry`, and never releases the
/// reservation; only `nextNotify` changes.
pub fn scan_expired_reservations(model: &mut Model, now: i64, notify_interval: i64) -> Vec<ExpiryEvent> {
    let mut events = Vec::new();
    for h in model.hosts.values_mut() {
        if !h.is_reserved() || h.expiry == 0 || h.expiry > now {
            continue;
        }
        if h.next_notify > now {
            continue;
        }
        let first = h.next_notify == 0;
        h.next_notify = now + notify_interval;
        if !h.is_dead() {
            if let Some(user) = h.user.clone() {
                events.push(ExpiryEvent { host: h.name.clone(), user, first });
            }
        }
    }
    events
}

fn format_localtime(epoch: i64) -> String {
    use chrono::TimeZone;
    chrono::Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch.to_string())
}
