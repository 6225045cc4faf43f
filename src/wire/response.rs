use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// The two response kinds a request can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "ERROR")]
    Error,
}

/// Every request produces exactly one `Response`. `temporary` is only
/// meaningful on an error and serializes as `0`/`1` to match the legacy wire
/// examples rather than a JSON boolean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "type")]
    pub kind: ResponseType,
    pub message: String,
    pub data: Value,
    #[serde(with = "bool_as_int")]
    pub temporary: bool,
}

impl Response {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Response { kind: ResponseType::Success, message: message.into(), data, temporary: false }
    }

    pub fn error(message: impl Into<String>, temporary: bool) -> Self {
        Response { kind: ResponseType::Error, message: message.into(), data: Value::Null, temporary }
    }
}

impl From<EngineError> for Response {
    fn from(e: EngineError) -> Self {
        Response::error(e.message, e.temporary)
    }
}

mod bool_as_int {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(if *value { 1 } else { 0 })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}
