use crate::Result;
use serde_json::{Map, Value};

pub struct JsonSerializer;

impl JsonSerializer {
    pub fn serialize(data: &Map<String, Value>) -> Result<Vec<u8>> {
        serde_json::to_vec(data).map_err(Into::into)
    }

    /// Message key bytes for a caller-supplied key.
    ///
    /// Strings are sent verbatim, `null` means no key, anything else is sent
    /// as its JSON text.
    pub fn encode_key(key: &Value) -> Option<Vec<u8>> {
        match key {
            Value::Null => None,
            Value::String(s) => Some(s.as_bytes().to_vec()),
            other => Some(other.to_string().into_bytes()),
        }
    }
}
