//! The dispatcher: a static command table mapping a command name to its
//! declared required/optional parameter keys, validated *before* any handler
//! runs. Unknown commands and validation failures never reach the
//! reservation engine.

use serde_json::Value;

use crate::domain::engine::{self, EngineSuccess, ListHostsParams, ReserveParams};
use crate::domain::model::Model;
use crate::error::EngineError;
use crate::wire::params::{self, Params};

pub struct CommandSpec {
    pub name: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

/// The command table. `list_classes`'s `class` filter is implemented as
/// optional rather than required: see DESIGN.md for why. The S1 literal-value
/// scenario invokes it with no parameters and expects the full listing, which
/// only makes sense if `class` is optional (matching `list_hosts`'s `class`).
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "add_class", required: &["class", "members", "description"], optional: &[] },
    CommandSpec { name: "add_host", required: &["host"], optional: &["classes"] },
    CommandSpec { name: "add_resource", required: &["resource", "class"], optional: &[] },
    CommandSpec { name: "add_resource_class", required: &["class", "description"], optional: &[] },
    CommandSpec { name: "add_next_user", required: &["host", "user", "expire", "msg"], optional: &[] },
    CommandSpec { name: "del_class", required: &["class"], optional: &[] },
    CommandSpec { name: "del_host", required: &["host"], optional: &[] },
    CommandSpec { name: "del_next_user", required: &["host", "user"], optional: &[] },
    CommandSpec { name: "get_current_user", required: &["host"], optional: &[] },
    CommandSpec { name: "list_hosts", required: &["verbose"], optional: &["class", "user", "next", "hostRegexp"] },
    CommandSpec { name: "list_classes", required: &[], optional: &["class"] },
    CommandSpec { name: "modify_host", required: &["host", "user", "addClasses", "delClasses"], optional: &[] },
    CommandSpec { name: "release_resource", required: &["resource", "user", "msg"], optional: &["key", "force"] },
    CommandSpec { name: "release_rsvp", required: &["host", "user", "msg"], optional: &["key", "force"] },
    CommandSpec { name: "renew_rsvp", required: &["host", "user", "expire", "msg"], optional: &[] },
    CommandSpec { name: "revive_host", required: &["host", "all"], optional: &[] },
    CommandSpec { name: "rsvp_class", required: &["class", "numhosts", "user", "expire", "msg"], optional: &["key", "randomize"] },
    CommandSpec { name: "rsvp_host", required: &["host", "user", "expire", "msg"], optional: &["key", "resource"] },
    CommandSpec { name: "verify_rsvp", required: &["host", "user"], optional: &[] },
];

fn find(cmd: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| c.name == cmd)
}

/// Validate that every required key is present and non-null, and that no
/// unknown key was supplied.
pub fn validate(cmd: &str, params: &Params) -> Result<&'static CommandSpec, EngineError> {
    let spec = find(cmd).ok_or_else(|| EngineError::permanent(format!("unknown command: {cmd}")))?;

    for key in spec.required {
        match params.get(*key) {
            Some(Value::Null) | None => return Err(EngineError::permanent(format!("missing required parameter: {key}"))),
            _ => {}
        }
    }

    let allowed = spec.required.len() + params.keys().filter(|k| spec.optional.contains(&k.as_str())).count();
    if params.len() != allowed {
        let known: Vec<&str> = spec.required.iter().chain(spec.optional.iter()).copied().collect();
        let unknown: Vec<&str> = params.keys().filter(|k| !known.contains(&k.as_str())).map(|k| k.as_str()).collect();
        return Err(EngineError::permanent(format!("unknown parameter(s) for {cmd}: {}", unknown.join(", "))));
    }

    Ok(spec)
}

/// Dispatch a validated request to the reservation engine. `now` is the
/// current wall-clock time, used only by `add_host`/`add_resource` to
/// initialize `lastPingTime`.
pub fn dispatch(model: &mut Model, cmd: &str, params: &Params, now: i64) -> Result<EngineSuccess, EngineError> {
    validate(cmd, params)?;

    match cmd {
        "add_class" => {
            let class = params::str_param(params, "class")?;
            let description = params::str_param(params, "description")?;
            let members = params::str_list_param(params, "members")?;
            engine::add_class(model, class, description, &members)
        }
        "add_resource_class" => {
            let class = params::str_param(params, "class")?;
            let description = params::str_param(params, "description")?;
            engine::add_resource_class(model, class, description)
        }
        "add_host" => {
            let host = params::str_param(params, "host")?;
            let classes = params::opt_str_list_param(params, "classes")?;
            engine::add_host_or_resource(model, host, classes, now)
        }
        "add_resource" => {
            let resource = params::str_param(params, "resource")?;
            let class = params::str_param(params, "class")?;
            engine::add_host_or_resource(model, resource, Some(vec![class.to_string()]), now)
        }
        "del_class" => {
            let class = params::str_param(params, "class")?;
            engine::del_class(model, class)
        }
        "del_host" => {
            let host = params::str_param(params, "host")?;
            engine::del_host(model, host)
        }
        "modify_host" => {
            let host = params::str_param(params, "host")?;
            let add_classes = params::str_list_param(params, "addClasses")?;
            let del_classes = params::str_list_param(params, "delClasses")?;
            engine::modify_host(model, host, &add_classes, &del_classes)
        }
        "rsvp_host" => {
            let host = params::str_param(params, "host")?;
            let user = params::str_param(params, "user")?;
            let expire = params::int_param(params, "expire")?;
            let msg = params::str_param(params, "msg")?;
            let key = params::opt_str_param(params, "key")?;
            let as_resource = params::bool_param(params, "resource");
            engine::reserve_host_by_name(model, host, ReserveParams { user, expire, msg, key }, as_resource)
        }
        "rsvp_class" => {
            let class = params::str_param(params, "class")?;
            let numhosts = params::raw_str_param(params, "numhosts")?;
            let user = params::str_param(params, "user")?;
            let expire = params::int_param(params, "expire")?;
            let msg = params::str_param(params, "msg")?;
            let key = params::opt_str_param(params, "key")?;
            let randomize = params::bool_param(params, "randomize");
            engine::reserve_hosts_by_class(model, class, &numhosts, ReserveParams { user, expire, msg, key }, randomize)
        }
        "release_rsvp" => {
            let host = params::str_param(params, "host")?;
            let user = params::str_param(params, "user")?;
            let msg = params::str_param(params, "msg")?;
            let key = params::opt_str_param(params, "key")?;
            let force = params::bool_param(params, "force");
            engine::release_reservation(model, host, user, msg, key, force)
        }
        "release_resource" => {
            let resource = params::str_param(params, "resource")?;
            let user = params::str_param(params, "user")?;
            let msg = params::str_param(params, "msg")?;
            let key = params::opt_str_param(params, "key")?;
            let force = params::bool_param(params, "force");
            engine::release_resource(model, resource, user, msg, key, force)
        }
        "renew_rsvp" => {
            let host = params::str_param(params, "host")?;
            let user = params::str_param(params, "user")?;
            let expire = params::int_param(params, "expire")?;
            let msg = params::str_param(params, "msg")?;
            engine::renew_reservation(model, host, user, expire, msg)
        }
        "verify_rsvp" => {
            let host = params::str_param(params, "host")?;
            let user = params::str_param(params, "user")?;
            engine::verify_reservation(model, host, user)
        }
        "get_current_user" => {
            let host = params::str_param(params, "host")?;
            engine::get_current_user(model, host)
        }
        "add_next_user" => {
            let host = params::str_param(params, "host")?;
            let user = params::str_param(params, "user")?;
            let expire = params::int_param(params, "expire")?;
            let msg = params::str_param(params, "msg")?;
            engine::add_next_user(model, host, user, expire, msg)
        }
        "del_next_user" => {
            let host = params::str_param(params, "host")?;
            let user = params::str_param(params, "user")?;
            engine::del_next_user(model, host, user)
        }
        "revive_host" => {
            // `host` is a required key even in `all` mode, where the engine
            // ignores it in favor of reviving every dead host.
            let host = params::str_param(params, "host")?;
            let all = params::bool_param(params, "all");
            engine::revive_host(model, Some(host), all)
        }
        "list_classes" => {
            let class = params::opt_str_param(params, "class")?;
            engine::list_classes(model, class)
        }
        "list_hosts" => {
            let class = params::opt_str_param(params, "class")?;
            let user = params::opt_str_param(params, "user")?;
            let verbose = params::bool_param(params, "verbose");
            let next = params::bool_param(params, "next");
            let host_regexp = params::opt_str_param(params, "hostRegexp")?;
            engine::list_hosts(model, ListHostsParams { class, user, verbose, next, host_regexp })
        }
        other => Err(EngineError::permanent(format!("unhandled command: {other}"))),
    }
}
