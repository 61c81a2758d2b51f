//! Request/reply and pub/sub wire formats.
//!
//! Requests arrive as JSON objects with a `type` field and type-specific payload
//! fields; replies are arbitrary JSON values. Deliberately permissive: a malformed or
//! unrecognized `type` must produce `{"error": "not recognized"}`, not a decode
//! failure, so requests are parsed into a loosely-typed [`InboundMessage`] rather than
//! a strict enum.

use ring_store::TimeWindow;
use serde_json::Value;

/// The opaque client-return routing envelope a transport attaches to a request so a
/// reply can be routed back to its originator.
pub type ClientAddress = Vec<u8>;

/// A decoded inbound request. Field access is lenient by design — absent or
/// wrong-typed fields surface as `None`, letting the responder reply with a
/// recognized-but-malformed error rather than panicking.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub address: ClientAddress,
    body: Value,
}

impl InboundMessage {
    pub fn parse(address: ClientAddress, payload: &[u8]) -> Option<Self> {
        let body = serde_json::from_slice(payload).ok()?;
        Some(Self { address, body })
    }

    pub fn kind(&self) -> Option<&str> {
        self.body.get("type")?.as_str()
    }

    pub fn parameters(&self) -> Vec<String> {
        self.body
            .get("parameters")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn timewindow(&self) -> Option<TimeWindow> {
        let arr = self.body.get("timewindow")?.as_array()?;
        let end_offset = arr.first()?.as_f64()?;
        let duration = arr.get(1)?.as_f64()?;
        Some(TimeWindow::new(end_offset, duration))
    }

    pub fn command(&self) -> Option<&str> {
        self.body.get("command")?.as_str()
    }
}

/// Replies consist of arbitrary JSON; this is a thin alias for readability at call
/// sites.
pub type Reply = Value;

/// `{"error": "not recognized"}`, the reply for any unrecognized request type.
pub fn not_recognized() -> Reply {
    serde_json::json!({ "error": "not recognized" })
}

/// Frames a message for the publisher socket as `"<nodename>;<payload>"`.
pub fn frame_publication(nodename: &str, payload: &str) -> String {
    format!("{nodename};{payload}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metric_request_fields() {
        let payload = br#"{"type":"metric","address":"ignored","parameters":["mean:ch1"],"timewindow":[0,4]}"#;
        let msg = InboundMessage::parse(vec![1, 2, 3], payload).unwrap();
        assert_eq!(msg.kind(), Some("metric"));
        assert_eq!(msg.parameters(), vec!["mean:ch1".to_string()]);
        let tw = msg.timewindow().unwrap();
        assert_eq!((tw.end_offset, tw.duration), (0.0, 4.0));
    }

    #[test]
    fn missing_type_yields_none() {
        let msg = InboundMessage::parse(vec![], br#"{"foo":"bar"}"#).unwrap();
        assert_eq!(msg.kind(), None);
    }

    #[test]
    fn malformed_json_fails_to_parse() {
        assert!(InboundMessage::parse(vec![], b"not json").is_none());
    }

    #[test]
    fn publication_framing_matches_wire_format() {
        assert_eq!(frame_publication("eeg01", "payload"), "eeg01;payload");
    }
}
