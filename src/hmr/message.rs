//! WebSocket message formats.
//!
//! ```text
//! server → client   {"type":"connected"}
//!                   {"id":7,"src":"http://127.0.0.1:5173/weft-eval:3","args":[]}
//!                   {"type":"<custom>", ...}
//! client → server   {"type":"result","id":7,"result":...}
//!                   {"type":"<custom>", ...}
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

/// Sent once after the handshake.
pub fn connected() -> String {
    r#"{"type":"connected"}"#.to_string()
}

/// Ask a client to import `src` and call its default export with `args`.
#[derive(Debug, Serialize)]
pub struct EvaluateRequest<'a> {
    pub id: u64,
    pub src: &'a str,
    pub args: &'a [Value],
}

impl EvaluateRequest<'_> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A custom event pushed to clients: `{"type": kind, ...payload}`.
pub fn custom(kind: &str, payload: &Value) -> String {
    let mut object = match payload {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => Map::from_iter([("data".to_string(), other.clone())]),
    };
    object.insert("type".to_string(), Value::String(kind.to_string()));
    Value::Object(object).to_string()
}

/// A message received from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Answer to an [`EvaluateRequest`].
    Result {
        id: u64,
        result: Value,
        error: Option<String>,
    },
    /// Any other typed message, routed to listeners.
    Custom { kind: String, payload: Value },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or("missing `type`")?
            .to_string();

        if kind != "result" {
            return Ok(Self::Custom {
                kind,
                payload: value,
            });
        }

        let id = value
            .get("id")
            .and_then(Value::as_u64)
            .ok_or("result without numeric `id`")?;
        Ok(Self::Result {
            id,
            result: value.get("result").cloned().unwrap_or(Value::Null),
            error: value
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_evaluate_request_shape() {
        let args = [json!(1), json!("a")];
        let text = EvaluateRequest {
            id: 3,
            src: "http://h/weft-eval:3",
            args: &args,
        }
        .to_json();
        assert_eq!(text, r#"{"id":3,"src":"http://h/weft-eval:3","args":[1,"a"]}"#);
    }

    #[test]
    fn test_parse_result() {
        let msg = ClientMessage::parse(r#"{"type":"result","id":4,"result":{"ok":true}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Result {
                id: 4,
                result: json!({"ok": true}),
                error: None
            }
        );
    }

    #[test]
    fn test_parse_custom() {
        let msg = ClientMessage::parse(r#"{"type":"page","path":"/a"}"#).unwrap();
        let ClientMessage::Custom { kind, payload } = msg else {
            panic!("expected custom message");
        };
        assert_eq!(kind, "page");
        assert_eq!(payload["path"], "/a");
    }

    #[test]
    fn test_parse_malformed() {
        assert!(ClientMessage::parse("{not json").is_err());
        assert!(ClientMessage::parse(r#"{"id":1}"#).is_err());
        assert!(ClientMessage::parse(r#"{"type":"result"}"#).is_err());
    }

    #[test]
    fn test_custom_payload_merged() {
        let text = custom("theme", &json!({"dark": true}));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "theme", "dark": true}));
        let value: Value = serde_json::from_str(&custom("ping", &Value::Null)).unwrap();
        assert_eq!(value, json!({"type": "ping"}));
    }
}
