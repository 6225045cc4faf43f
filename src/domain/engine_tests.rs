//! Scenario and invariant tests for the reservation engine. Each test is
//! named after the literal-value scenario or invariant it covers.

use super::class::{ALL_CLASS, FARM_CLASS};
use super::engine::*;
use super::init::ensure_default_classes;
use super::model::Model;

fn model_with_defaults() -> Model {
    let mut m = Model::new();
    ensure_default_classes(&mut m);
    m
}

fn reserve(expire: i64, msg: &str, key: Option<&str>) -> ReserveParams<'static> {
    ReserveParams { user: "alice", expire, msg, key }
}

// S1: add_class, list_classes shape, duplicate rejection.
#[test]
fn s1_add_class_then_duplicate_is_rejected() {
    let mut m = model_with_defaults();
    let res = add_class(&mut m, "web", "web tier", &[]).unwrap();
    assert_eq!(res.message, "added class web");

    let listing = list_classes(&m, Some("web")).unwrap();
    let rows = listing.data.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], serde_json::json!(["web", "web tier", false]));

    let err = add_class(&mut m, "web", "again", &[]).unwrap_err();
    assert!(!err.temporary);
    assert!(err.message.contains("already exists"));
}

// S2: resource flow: wrong path rejected, correct path succeeds, release by wrong user fails.
#[test]
fn s2_resource_reservation_requires_the_resource_flag() {
    let mut m = model_with_defaults();
    add_resource_class(&mut m, "switch", "").unwrap();
    add_host_or_resource(&mut m, "sw1", Some(vec!["switch".to_string()]), 0).unwrap();

    let err = reserve_host_by_name(&mut m, "sw1", reserve(0, "x", None), false).unwrap_err();
    assert!(!err.temporary);
    assert!(err.message.contains("resource"));

    reserve_host_by_name(&mut m, "sw1", reserve(0, "x", None), true).unwrap();

    let err = release_resource(&mut m, "sw1", "bob", "", None, false).unwrap_err();
    assert!(err.message.contains("not reserved by bob"));

    release_resource(&mut m, "sw1", "alice", "", None, false).unwrap();
    assert!(!m.host("sw1").unwrap().is_reserved());
}

// S3: class reservation under contention.
#[test]
fn s3_rsvp_class_hands_out_exactly_n_then_errors_temporary_when_exhausted() {
    let mut m = model_with_defaults();
    for name in ["h1", "h2", "h3"] {
        add_host_or_resource(&mut m, name, Some(vec![FARM_CLASS.to_string()]), 0).unwrap();
    }

    let res = reserve_hosts_by_class(&mut m, "FARM", "2", reserve(0, "", None), false).unwrap();
    let names = res.data.as_array().unwrap();
    assert_eq!(names.len(), 2);

    let err = reserve_hosts_by_class(
        &mut m,
        "FARM",
        "2",
        ReserveParams { user: "bob", expire: 0, msg: "", key: None },
        false,
    )
    .unwrap_err();
    assert!(err.temporary);
    assert_eq!(err.message, "not enough free hosts to get 2, have 1 free");
}

#[test]
fn s3_rsvp_class_never_partially_reserves() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", Some(vec![FARM_CLASS.to_string()]), 0).unwrap();

    let err = reserve_hosts_by_class(&mut m, "FARM", "2", reserve(0, "", None), false).unwrap_err();
    assert!(err.temporary);
    assert!(!m.host("h1").unwrap().is_reserved(), "a failed class reservation must reserve nothing");
}

// S4: next-user handoff.
#[test]
fn s4_release_with_a_queued_next_user_hands_off_ownership() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "alice", expire: 0, msg: "", key: Some("k") }, false).unwrap();

    add_next_user(&mut m, "h1", "bob", 0, "mine").unwrap();
    let res = release_reservation(&mut m, "h1", "alice", "", Some("k"), false).unwrap();
    assert_eq!(res.message, "released h1 and reserved it for bob");
    assert_eq!(res.notifications.len(), 1);

    let current = get_current_user(&m, "h1").unwrap();
    assert_eq!(current.data, serde_json::json!("bob"));
    assert!(!m.host("h1").unwrap().has_next_user());
}

// S5: liveness: mark_dead / revive round trip through the engine's revive_host.
#[test]
fn s5_revive_restores_a_host_marked_dead_with_no_prior_reservation() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    m.host_mut("h1").unwrap().mark_dead("Lost contact at: now");

    let res = revive_host(&mut m, Some("h1"), false).unwrap();
    assert_eq!(res.message, "revived h1");
    assert!(!m.host("h1").unwrap().is_reserved());
}

// S6: wrong key / force release.
#[test]
fn s6_wrong_key_is_rejected_force_overrides() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "alice", expire: 0, msg: "", key: Some("k") }, false).unwrap();

    let err = release_reservation(&mut m, "h1", "alice", "", Some("wrong"), false).unwrap_err();
    assert!(!err.temporary);
    assert_eq!(err.message, "Wrong key provided to release host h1: expected 'k'");

    release_reservation(&mut m, "h1", "alice", "", Some("wrong"), true).unwrap();
}

// Invariant 1: ALL/FARM always exist, ALL cannot be deleted.
#[test]
fn invariant_all_and_farm_always_exist_and_all_is_undeletable() {
    let mut m = model_with_defaults();
    assert!(m.class(ALL_CLASS).is_some());
    assert!(m.class(FARM_CLASS).is_some());

    let err = del_class(&mut m, ALL_CLASS).unwrap_err();
    assert!(!err.temporary);
    assert!(m.class(ALL_CLASS).is_some());
}

// Invariant 2/3: flavor consistency and composite membership restrictions.
#[test]
fn invariant_host_classes_cannot_mix_resource_and_non_resource() {
    let mut m = model_with_defaults();
    add_resource_class(&mut m, "switch", "").unwrap();
    let err = add_host_or_resource(&mut m, "h1", Some(vec![ALL_CLASS.to_string(), "switch".to_string()]), 0).unwrap_err();
    assert!(!err.temporary);
}

#[test]
fn invariant_composite_class_rejects_a_resource_member() {
    let mut m = model_with_defaults();
    add_resource_class(&mut m, "switch", "").unwrap();
    let err = add_class(&mut m, "mixed", "", &["switch".to_string()]).unwrap_err();
    assert!(err.message.contains("resource"));
}

#[test]
fn invariant_composite_class_rejects_a_composite_member() {
    let mut m = model_with_defaults();
    add_class(&mut m, "inner", "", &[]).unwrap();
    add_class(&mut m, "outer", "", &["inner".to_string()]).unwrap();
    let err = add_class(&mut m, "outermost", "", &["outer".to_string()]).unwrap_err();
    assert!(err.message.contains("composite"));
}

// Invariant 5: reserve/release round trip leaves the host unreserved.
#[test]
fn invariant_reserve_then_release_leaves_host_unreserved() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "alice", expire: 0, msg: "", key: Some("k") }, false).unwrap();
    release_reservation(&mut m, "h1", "alice", "", Some("k"), false).unwrap();
    assert!(!m.host("h1").unwrap().is_reserved());
}

// Invariant 6: reserve-release-reserve is idempotent on identity.
#[test]
fn invariant_reserve_release_reserve_preserves_host_identity() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", Some(vec![ALL_CLASS.to_string()]), 0).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "alice", expire: 0, msg: "", key: Some("k") }, false).unwrap();
    release_reservation(&mut m, "h1", "alice", "", Some("k"), false).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "bob", expire: 0, msg: "", key: None }, false).unwrap();

    let h = m.host("h1").unwrap();
    assert_eq!(h.name, "h1");
    assert_eq!(h.classes, vec![ALL_CLASS.to_string()]);
}

// Invariant 8: verify_rsvp tracks attribution precisely.
#[test]
fn invariant_verify_rsvp_succeeds_only_for_the_attributed_user() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "alice", expire: 0, msg: "", key: None }, false).unwrap();

    assert!(verify_reservation(&m, "h1", "alice").is_ok());
    assert!(verify_reservation(&m, "h1", "bob").is_err());

    release_reservation(&mut m, "h1", "alice", "", None, false).unwrap();
    assert!(verify_reservation(&m, "h1", "alice").is_err());
}

#[test]
fn reserving_an_already_reserved_host_is_a_temporary_error() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "alice", expire: 0, msg: "", key: None }, false).unwrap();

    let err = reserve_host_by_name(&mut m, "h1", ReserveParams { user: "bob", expire: 0, msg: "", key: None }, false).unwrap_err();
    assert!(err.temporary);
}

#[test]
fn root_may_not_hold_a_reservation() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    let err = reserve_host_by_name(&mut m, "h1", ReserveParams { user: "root", expire: 0, msg: "", key: None }, false).unwrap_err();
    assert!(!err.temporary);
}

#[test]
fn del_class_cascades_to_member_lists_and_deletes_its_resources() {
    let mut m = model_with_defaults();
    add_resource_class(&mut m, "switch", "").unwrap();
    add_host_or_resource(&mut m, "sw1", Some(vec!["switch".to_string()]), 0).unwrap();
    add_class(&mut m, "tagged", "", &[]).unwrap();
    add_host_or_resource(&mut m, "h1", Some(vec!["tagged".to_string()]), 0).unwrap();

    let res = del_class(&mut m, "tagged").unwrap();
    assert!(m.class("tagged").is_none());
    assert!(!m.host("h1").unwrap().classes.contains(&"tagged".to_string()));
    assert!(res.message.contains("deleted class tagged"));

    let res = del_class(&mut m, "switch").unwrap();
    assert!(m.host("sw1").is_none());
    assert!(res.message.contains("sw1"));
}

#[test]
fn add_next_user_rejects_a_second_queue_entry_and_self_replacement() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "alice", expire: 0, msg: "", key: None }, false).unwrap();

    add_next_user(&mut m, "h1", "bob", 0, "").unwrap();
    let err = add_next_user(&mut m, "h1", "carol", 0, "").unwrap_err();
    assert!(err.message.contains("already"));

    let err = add_next_user(&mut m, "h1", "alice", 0, "").unwrap_err();
    assert!(err.message.contains("already holds"));
}

// S5 (full): the liveness loop's two halves: marking dead, then reviving.
#[test]
fn mark_dead_hosts_flags_a_silent_non_resource_host() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    m.host_mut("h1").unwrap().last_ping_time = 0;
    m.host_mut("h1").unwrap().last_ping_time = 1000;

    let marked = mark_dead_hosts(&mut m, 1000 + 121, 120);
    assert_eq!(marked, vec!["h1".to_string()]);
    assert!(m.host("h1").unwrap().is_dead());
}

#[test]
fn mark_dead_hosts_skips_resources_reserved_and_already_dead_hosts() {
    let mut m = model_with_defaults();
    add_resource_class(&mut m, "switch", "").unwrap();
    add_host_or_resource(&mut m, "sw1", Some(vec!["switch".to_string()]), 1000).unwrap();
    add_host_or_resource(&mut m, "reserved", None, 1000).unwrap();
    reserve_host_by_name(&mut m, "reserved", ReserveParams { user: "alice", expire: 0, msg: "", key: None }, false).unwrap();

    let marked = mark_dead_hosts(&mut m, 1000 + 121, 120);
    assert!(marked.is_empty());
}

#[test]
fn apply_ping_results_revives_a_dead_host_that_answered() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    m.host_mut("h1").unwrap().mark_dead("Lost contact at: earlier");

    let mut acked = std::collections::HashSet::new();
    acked.insert("h1".to_string());
    let revived = apply_ping_results(&mut m, &acked, 5000);

    assert_eq!(revived, vec!["h1".to_string()]);
    assert!(!m.host("h1").unwrap().is_dead());
    assert_eq!(m.host("h1").unwrap().last_ping_time, 5000);
}

// Expiry-notification loop.
#[test]
fn scan_expired_reservations_rate_limits_and_flags_the_first_notification() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "alice", expire: 100, msg: "", key: None }, false).unwrap();

    let events = scan_expired_reservations(&mut m, 200, 21600);
    assert_eq!(events.len(), 1);
    assert!(events[0].first);
    assert_eq!(events[0].user, "alice");

    let events = scan_expired_reservations(&mut m, 250, 21600);
    assert!(events.is_empty(), "must be rate-limited until nextNotify elapses");

    let events = scan_expired_reservations(&mut m, 200 + 21600 + 1, 21600);
    assert_eq!(events.len(), 1);
    assert!(!events[0].first);
}

#[test]
fn scan_expired_reservations_never_mutates_user_or_expiry() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "alice", expire: 100, msg: "", key: None }, false).unwrap();

    scan_expired_reservations(&mut m, 200, 21600);
    let h = m.host("h1").unwrap();
    assert_eq!(h.user.as_deref(), Some("alice"));
    assert_eq!(h.expiry, 100);
}

#[test]
fn scan_expired_reservations_ignores_hosts_with_no_expiry() {
    let mut m = model_with_defaults();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();
    reserve_host_by_name(&mut m, "h1", ReserveParams { user: "alice", expire: 0, msg: "", key: None }, false).unwrap();

    let events = scan_expired_reservations(&mut m, 1_000_000, 21600);
    assert!(events.is_empty());
}

#[test]
fn list_hosts_excludes_resources_from_the_default_listing() {
    let mut m = model_with_defaults();
    add_resource_class(&mut m, "switch", "").unwrap();
    add_host_or_resource(&mut m, "sw1", Some(vec!["switch".to_string()]), 0).unwrap();
    add_host_or_resource(&mut m, "h1", None, 0).unwrap();

    let res = list_hosts(&m, ListHostsParams { class: None, user: None, verbose: false, next: false, host_regexp: None }).unwrap();
    let rows = res.data.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], serde_json::json!("h1"));

    let res = list_hosts(&m, ListHostsParams { class: Some("switch"), user: None, verbose: false, next: false, host_regexp: None }).unwrap();
    assert_eq!(res.data.as_array().unwrap().len(), 1);
}
