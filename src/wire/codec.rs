//! Per-connection framing: dumper mode (the default) frames one request per
//! `\n`-terminated line; a line matching `^json\s*(\d+)$` switches
//! the connection, stickily, to length-prefixed JSON mode for the rest of its
//! life. Modeled on the teacher's `DistSystemCodec` (a `LengthDelimitedCodec` +
//! `bincode` pairing) with the framing and serialization swapped out for this
//! protocol's two encodings.

use std::io;

use bytes::BytesMut;
use regex::Regex;
use serde_json::{Map, Value};
use tokio_util::codec::{Decoder, Encoder};

use crate::wire::dumper;
use crate::wire::response::Response;

/// A fully parsed request, ready for the dispatcher.
#[derive(Debug, Clone)]
pub struct Request {
    pub cmd: String,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Dumper,
    Json,
}

enum DecodeState {
    AwaitingLine,
    AwaitingJsonBody(usize),
}

pub struct WireCodec {
    mode: Mode,
    state: DecodeState,
    json_line_re: Regex,
}

impl WireCodec {
    pub fn new() -> Self {
        WireCodec { mode: Mode::Dumper, state: DecodeState::AwaitingLine, json_line_re: Regex::new(r"^json\s*(\d+)$").unwrap() }
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for WireCodec {
    type Item = Request;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                DecodeState::AwaitingLine => {
                    let Some(newline) = src.iter().position(|&b| b == b'\n') else { return Ok(None) };
                    let line_bytes = src.split_to(newline + 1);
                    let line = String::from_utf8_lossy(&line_bytes[..newline]).trim().to_string();

                    if let Some(caps) = self.json_line_re.captures(&line) {
                        let len: usize = caps[1].parse().unwrap_or(0);
                        self.mode = Mode::Json;
                        self.state = DecodeState::AwaitingJsonBody(len);
                        continue;
                    }

                    if line.is_empty() {
                        continue;
                    }

                    match decode_dumper_line(&line) {
                        Ok(req) => return Ok(Some(req)),
                        Err(e) => {
                            log::warn!("dropping unparseable dumper request: {e}");
                            continue;
                        }
                    }
                }
                DecodeState::AwaitingJsonBody(len) => {
                    if src.len() < len {
                        return Ok(None);
                    }
                    let body = src.split_to(len);
                    self.state = DecodeState::AwaitingLine;
                    let req: JsonRequest = serde_json::from_slice(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    return Ok(Some(Request { cmd: req.cmd, params: req.params }));
                }
            }
        }
    }
}

#[derive(serde::Deserialize)]
struct JsonRequest {
    cmd: String,
    #[serde(default)]
    params: Map<String, Value>,
}

fn decode_dumper_line(line: &str) -> Result<Request, dumper::DumperError> {
    let (cmd, hex_body) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let params = dumper::decode(hex_body.trim())?;
    Ok(Request { cmd: cmd.to_string(), params })
}

/// Encodes a `Response` for whichever mode this connection is currently in.
/// Mode is sticky once a connection has switched to JSON.
pub struct ResponseFrame {
    pub cmd: String,
    pub response: Response,
}

impl Encoder<ResponseFrame> for WireCodec {
    type Error = io::Error;

    fn encode(&mut self, item: ResponseFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match self.mode {
            Mode::Dumper => {
                let value = serde_json::to_value(&item.response).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                let hex_str = dumper::encode(&value);
                dst.extend_from_slice(format!("{} {}\n", item.cmd, hex_str).as_bytes());
                dst.extend_from_slice(b"DONE\n");
            }
            Mode::Json => {
                let json = serde_json::to_string(&item.response).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                dst.extend_from_slice(format!("{} {}\n", item.cmd, json.len()).as_bytes());
                dst.extend_from_slice(json.as_bytes());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_json_mode_request_across_two_lines() {
        let mut codec = WireCodec::new();
        let payload = r#"{"cmd":"rsvp_host","params":{"host":"h1","user":"alice","expire":0,"msg":""}}"#;
        let mut buf = BytesMut::from(format!("json {}\n{}", payload.len(), payload).as_bytes());

        let first = codec.decode(&mut buf).unwrap();
        assert!(first.is_some());
        let req = first.unwrap();
        assert_eq!(req.cmd, "rsvp_host");
        assert_eq!(req.params["host"], Value::String("h1".to_string()));
    }

    #[test]
    fn waits_for_the_full_json_body_before_decoding() {
        let mut codec = WireCodec::new();
        let payload = r#"{"cmd":"list_classes","params":{}}"#;
        let header = format!("json {}\n", payload.len());
        let mut buf = BytesMut::from(header.as_bytes());
        buf.extend_from_slice(&payload.as_bytes()[..payload.len() - 5]);

        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&payload.as_bytes()[payload.len() - 5..]);
        let req = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(req.cmd, "list_classes");
    }

    #[test]
    fn sticks_in_json_mode_once_switched() {
        let mut codec = WireCodec::new();
        let payload = r#"{"cmd":"list_classes","params":{}}"#;
        let mut buf = BytesMut::from(format!("json {}\n{}", payload.len(), payload).as_bytes());
        codec.decode(&mut buf).unwrap();
        assert_eq!(codec.mode, Mode::Json);
    }

    #[test]
    fn drops_unparseable_dumper_lines_and_keeps_reading() {
        let mut codec = WireCodec::new();
        let mut buf = BytesMut::from(b"rsvp_host not-valid-hex\n".as_slice());
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn decodes_a_dumper_mode_line() {
        let mut codec = WireCodec::new();
        let hex_str = dumper::encode(&serde_json::json!({"host": "h1", "user": "alice", "expire": 0, "msg": ""}));
        let mut buf = BytesMut::from(format!("rsvp_host {hex_str}\n").as_bytes());
        let req = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(req.cmd, "rsvp_host");
        assert_eq!(req.params["host"], Value::String("h1".to_string()));
    }
}
