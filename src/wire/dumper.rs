//! The legacy "dumper" encoding: a hex-encoded ASCII dump of a Perl hash
//! produced by a dynamic-language serializer. We never `eval` anything, only
//! decode a small whitelist grammar (flat string/number scalars and string
//! arrays, one level deep) and log+drop anything outside it.
//!
//! Grammar: `{'key' => 'value', 'key2' => ['a', 'b'], 'key3' => 3, ...}`.
//! Responses to a dumper-mode connection are encoded with the same grammar,
//! our own minimal, internally-consistent rendition, not a byte-for-byte
//! replica of the original `Data::Dumper` output.

use std::fmt::Write as _;

use serde_json::{Map, Value};

#[derive(Debug)]
pub struct DumperError(pub String);

impl std::fmt::Display for DumperError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dumper decode error: {}", self.0)
    }
}
impl std::error::Error for DumperError {}

/// Decode a hex-encoded ASCII dump into a JSON-ish params object.
pub fn decode(hex_str: &str) -> Result<Map<String, Value>, DumperError> {
    let bytes = hex::decode(hex_str.trim()).map_err(|e| DumperError(format!("not valid hex: {e}")))?;
    let text = String::from_utf8(bytes).map_err(|e| DumperError(format!("not valid utf8: {e}")))?;
    parse_hash(text.trim())
}

/// Encode a flat JSON object back into the whitelist grammar, then hex it.
pub fn encode(value: &Value) -> String {
    let text = render(value);
    hex::encode(text.as_bytes())
}

fn parse_hash(text: &str) -> Result<Map<String, Value>, DumperError> {
    let inner = text
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| DumperError("expected a top-level {...} hash".to_string()))?;

    let mut map = Map::new();
    for entry in split_top_level(inner, ',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (key_raw, value_raw) =
            entry.split_once("=>").ok_or_else(|| DumperError(format!("expected 'key' => value in entry: {entry}")))?;
        let key = parse_scalar_string(key_raw.trim())?;
        let value = parse_value(value_raw.trim())?;
        map.insert(key, value);
    }
    Ok(map)
}

fn parse_value(text: &str) -> Result<Value, DumperError> {
    if text.starts_with('[') {
        let inner = text
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(|| DumperError(format!("malformed array: {text}")))?;
        let items = split_top_level(inner, ',')
            .into_iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(parse_scalar)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(items))
    } else {
        parse_scalar(text)
    }
}

fn parse_scalar(text: &str) -> Result<Value, DumperError> {
    if text.starts_with('\'') || text.starts_with('"') {
        Ok(Value::String(parse_scalar_string(text)?))
    } else if let Ok(n) = text.parse::<i64>() {
        Ok(Value::Number(n.into()))
    } else {
        Err(DumperError(format!("unsupported scalar shape: {text}")))
    }
}

fn parse_scalar_string(text: &str) -> Result<String, DumperError> {
    for quote in ['\'', '"'] {
        if let Some(s) = text.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return Ok(s.to_string());
        }
    }
    Err(DumperError(format!("expected a quoted scalar: {text}")))
}

/// Split on a separator that is not nested inside `[...]` or quotes.
fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut current = String::new();

    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '[' => depth += 1,
                ']' => depth -= 1,
                _ if c == sep && depth == 0 => {
                    parts.push(std::mem::take(&mut current));
                    continue;
                }
                _ => {}
            },
        }
        current.push(c);
    }
    parts.push(current);
    parts
}

fn render(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut out = String::from("{");
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "'{}' => {}", escape(k), render(v));
            }
            out.push('}');
            out
        }
        Value::Array(items) => {
            let mut out = String::from("[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&render(item));
            }
            out.push(']');
            out
        }
        Value::String(s) => format!("'{}'", escape(s)),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Null => "''".to_string(),
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_flat_hash() {
        let hex_str = hex::encode("{'host' => 'h1', 'expire' => 0, 'msg' => 'x'}");
        let params = decode(&hex_str).unwrap();
        assert_eq!(params["host"], Value::String("h1".to_string()));
        assert_eq!(params["expire"], Value::Number(0.into()));
        assert_eq!(params["msg"], Value::String("x".to_string()));
    }

    #[test]
    fn decodes_an_array_value() {
        let hex_str = hex::encode("{'members' => ['a', 'b', 'c']}");
        let params = decode(&hex_str).unwrap();
        assert_eq!(params["members"], serde_json::json!(["a", "b", "c"]));
    }

    #[test]
    fn rejects_nested_hashes() {
        let hex_str = hex::encode("{'inner' => {'a' => 1}}");
        assert!(decode(&hex_str).is_err());
    }

    #[test]
    fn encode_decode_round_trips_through_the_whitelist_grammar() {
        let original = serde_json::json!({"cmd": "rsvp_host", "ok": true});
        let hex_str = encode(&original);
        let decoded = decode(&hex_str).unwrap();
        assert_eq!(decoded["cmd"], Value::String("rsvp_host".to_string()));
    }
}
