//! Exercises the wire codec and dispatcher together, the way a connection
//! actor would: decode a framed request, dispatch it against the model,
//! encode the response, and decode it back.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use rsvpd::dispatch;
use rsvpd::domain::init::ensure_default_classes;
use rsvpd::domain::model::Model;
use rsvpd::wire::codec::{ResponseFrame, WireCodec};
use rsvpd::wire::response::Response;

#[test]
fn json_mode_request_dispatches_and_encodes_a_success_response() {
    let mut model = Model::new();
    ensure_default_classes(&mut model);

    let mut codec = WireCodec::new();
    let payload = r#"{"cmd":"rsvp_host","params":{"host":"h1","user":"alice","expire":0,"msg":""}}"#;
    let mut buf = BytesMut::from(format!("json {}\n{}", payload.len(), payload).as_bytes());

    dispatch::dispatch(&mut model, "add_host", &serde_json::json!({"host": "h1"}).as_object().unwrap().clone(), 0).unwrap();

    let request = codec.decode(&mut buf).unwrap().expect("a complete request");
    assert_eq!(request.cmd, "rsvp_host");

    let outcome = dispatch::dispatch(&mut model, &request.cmd, &request.params, 0);
    let response = match outcome {
        Ok(success) => Response::success(success.message, success.data),
        Err(e) => Response::from(e),
    };

    let mut out = BytesMut::new();
    codec.encode(ResponseFrame { cmd: request.cmd.clone(), response }, &mut out).unwrap();
    let rendered = String::from_utf8(out.to_vec()).unwrap();

    let (header, body) = rendered.split_once('\n').unwrap();
    assert!(header.starts_with("rsvp_host "));
    let len: usize = header.trim_start_matches("rsvp_host ").parse().unwrap();
    assert_eq!(body.len(), len);

    let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(parsed["type"], "success");
    assert_eq!(parsed["message"], "reserved h1");
}

#[test]
fn dumper_mode_request_round_trips_through_dispatch() {
    use rsvpd::wire::dumper;

    let mut model = Model::new();
    ensure_default_classes(&mut model);
    dispatch::dispatch(&mut model, "add_host", &serde_json::json!({"host": "h1"}).as_object().unwrap().clone(), 0).unwrap();

    let mut codec = WireCodec::new();
    let hex = dumper::encode(&serde_json::json!({"host": "h1", "user": "alice", "expire": 0, "msg": "x"}));
    let mut buf = BytesMut::from(format!("rsvp_host {hex}\n").as_bytes());

    let request = codec.decode(&mut buf).unwrap().unwrap();
    let outcome = dispatch::dispatch(&mut model, &request.cmd, &request.params, 0).unwrap();
    assert_eq!(outcome.message, "reserved h1");

    let response = Response::success(outcome.message, outcome.data);
    let mut out = BytesMut::new();
    codec.encode(ResponseFrame { cmd: request.cmd, response }, &mut out).unwrap();
    let rendered = String::from_utf8(out.to_vec()).unwrap();
    assert!(rendered.ends_with("DONE\n"));
}
