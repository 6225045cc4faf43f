//! Invariant: a successful mutator's on-disk state file, if reloaded,
//! produces a model byte-equivalent (modulo mapping ordering) to the
//! in-memory model at response time.

use rsvpd::dispatch;
use rsvpd::domain::init::ensure_default_classes;
use rsvpd::domain::model::Model;
use rsvpd::persistence;
use rsvpd::wire::params::Params;

fn params(value: serde_json::Value) -> Params {
    value.as_object().unwrap().clone()
}

#[test]
fn reloaded_state_matches_the_in_memory_model_after_a_batch_of_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts.state");

    let mut model = Model::new();
    ensure_default_classes(&mut model);

    dispatch::dispatch(&mut model, "add_class", &params(serde_json::json!({"class": "web", "members": [], "description": "web tier"})), 0)
        .unwrap();
    dispatch::dispatch(&mut model, "add_host", &params(serde_json::json!({"host": "h1", "classes": ["web"]})), 0).unwrap();
    dispatch::dispatch(
        &mut model,
        "rsvp_host",
        &params(serde_json::json!({"host": "h1", "user": "alice", "expire": 0, "msg": "x", "key": "k"})),
        0,
    )
    .unwrap();
    persistence::save(&path, &model).unwrap();

    let reloaded = persistence::load(&path).unwrap();

    assert_eq!(reloaded.classes.len(), model.classes.len());
    assert_eq!(reloaded.hosts.len(), model.hosts.len());
    for (name, host) in &model.hosts {
        let reloaded_host = reloaded.hosts.get(name).expect("host must survive the round trip");
        assert_eq!(reloaded_host.user, host.user);
        assert_eq!(reloaded_host.expiry, host.expiry);
        assert_eq!(reloaded_host.key, host.key);
        assert_eq!(reloaded_host.classes, host.classes);
    }
    for (name, class) in &model.classes {
        let reloaded_class = reloaded.classes.get(name).expect("class must survive the round trip");
        assert_eq!(reloaded_class.description, class.description);
        assert_eq!(reloaded_class.resource, class.resource);
        assert_eq!(reloaded_class.members, class.members);
    }
}

#[test]
fn startup_with_no_state_file_still_gets_the_default_classes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.state");

    let mut model = persistence::load(&path).unwrap();
    ensure_default_classes(&mut model);

    assert!(model.classes.contains_key("ALL"));
    assert!(model.classes.contains_key("FARM"));
}
