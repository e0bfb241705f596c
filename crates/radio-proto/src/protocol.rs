//! mpv JSON IPC wire format.
//!
//! One message per line:
//!
//! ```text
//! → {"command":["get_property","volume"],"request_id":7}
//! ← {"request_id":7,"error":"success","data":50.0}
//! ```
//!
//! Lines without a `request_id` are unsolicited player events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `error` value the player uses for a successful command.
pub const SUCCESS: &str = "success";

/// Player properties read or written by this program.
pub mod property {
    pub const VOLUME: &str = "volume";
    pub const MUTE: &str = "mute";
    pub const AUDIO_BITRATE: &str = "audio-bitrate";
    pub const AUDIO_CODEC_NAME: &str = "audio-codec-name";
    pub const DEMUXER_CACHE_DURATION: &str = "demuxer-cache-duration";
    pub const PAUSED_FOR_CACHE: &str = "paused-for-cache";
    pub const CACHE_BUFFERING_STATE: &str = "cache-buffering-state";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub command: Vec<Value>,
    pub request_id: u64,
}

impl ControlRequest {
    pub fn new(name: &str, args: Vec<Value>, request_id: u64) -> Self {
        let mut command = Vec::with_capacity(args.len() + 1);
        command.push(Value::String(name.to_string()));
        command.extend(args);
        Self {
            command,
            request_id,
        }
    }

    pub fn get_property(name: &str, request_id: u64) -> Self {
        Self::new("get_property", vec![Value::from(name)], request_id)
    }

    pub fn set_property(name: &str, value: Value, request_id: u64) -> Self {
        Self::new("set_property", vec![Value::from(name), value], request_id)
    }

    /// Serialise as a single newline-terminated line.
    pub fn encode(&self) -> anyhow::Result<String> {
        let mut raw = serde_json::to_string(self)?;
        raw.push('\n');
        Ok(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    #[serde(default)]
    pub request_id: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ControlResponse {
    pub fn is_success(&self) -> bool {
        self.error.as_deref() == Some(SUCCESS)
    }

    /// Parse one line from the control channel.  Returns `None` for
    /// unsolicited events (no `request_id`) and for undecodable input.
    pub fn decode(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let resp: Self = serde_json::from_str(trimmed).ok()?;
        resp.request_id.is_some().then_some(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_encoding() {
        let req = ControlRequest::set_property(property::VOLUME, json!(55), 3);
        let line = req.encode().unwrap();
        assert!(line.ends_with('\n'));
        let parsed: Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(parsed, json!({"command": ["set_property", "volume", 55], "request_id": 3}));
    }

    #[test]
    fn test_decode_response() {
        let resp = ControlResponse::decode(r#"{"request_id":9,"error":"success","data":"mp3"}"#).unwrap();
        assert_eq!(resp.request_id, Some(9));
        assert!(resp.is_success());
        assert_eq!(resp.data, Some(json!("mp3")));
    }

    #[test]
    fn test_decode_error_response() {
        let resp =
            ControlResponse::decode(r#"{"request_id":2,"error":"property unavailable","data":null}"#)
                .unwrap();
        assert!(!resp.is_success());
        assert_eq!(resp.data, None);
    }

    #[test]
    fn test_events_and_garbage_are_not_responses() {
        assert!(ControlResponse::decode(r#"{"event":"playback-restart"}"#).is_none());
        assert!(ControlResponse::decode("not json").is_none());
        assert!(ControlResponse::decode("   ").is_none());
    }
}
