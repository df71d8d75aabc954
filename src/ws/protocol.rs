//! Wire frame parsing (spec §6 "Wire protocol"). Standard Nostr frames are
//! parsed by hand rather than via `nostr::ClientMessage` because `REQ`
//! filters here carry vendor extensions (`int#`, `sort`, `cursor`,
//! `verification`, `search`) the upstream type doesn't model.

use nostr::{Event, JsonUtil, RelayMessage, SubscriptionId};
use serde_json::Value;

use crate::error::{RelayError, Result};

pub enum ClientFrame {
    Event(Box<Event>),
    Req { sub_id: String, filters: Vec<Value> },
    Close { sub_id: String },
}

pub fn parse_frame(text: &str) -> Result<ClientFrame> {
    let value: Value = serde_json::from_str(text).map_err(|e| RelayError::InvalidFilter(format!("malformed JSON: {e}")))?;
    let arr = value.as_array().ok_or_else(|| RelayError::InvalidFilter("frame must be a JSON array".into()))?;
    let tag = arr.first().and_then(|v| v.as_str()).ok_or_else(|| RelayError::InvalidFilter("frame missing message type".into()))?;

    match tag {
        "EVENT" => {
            let event_value = arr.get(1).ok_or_else(|| RelayError::InvalidFilter("EVENT missing payload".into()))?;
            let event: Event = serde_json::from_value(event_value.clone())
                .map_err(|e| RelayError::InvalidFilter(format!("malformed event: {e}")))?;
            Ok(ClientFrame::Event(Box::new(event)))
        }
        "REQ" => {
            let sub_id = arr
                .get(1)
                .and_then(|v| v.as_str())
                .ok_or_else(|| RelayError::InvalidFilter("REQ missing subscription id".into()))?
                .to_string();
            let filters = arr[2..].to_vec();
            if filters.is_empty() {
                return Err(RelayError::InvalidFilter("REQ requires at least one filter".into()));
            }
            Ok(ClientFrame::Req { sub_id, filters })
        }
        "CLOSE" => {
            let sub_id = arr
                .get(1)
                .and_then(|v| v.as_str())
                .ok_or_else(|| RelayError::InvalidFilter("CLOSE missing subscription id".into()))?
                .to_string();
            Ok(ClientFrame::Close { sub_id })
        }
        other => Err(RelayError::InvalidFilter(format!("unrecognized message type {other}"))),
    }
}

pub fn ok_frame(event_id: nostr::EventId, accepted: bool, reason: &str) -> String {
    RelayMessage::ok(event_id, accepted, reason).as_json()
}

pub fn event_frame(sub_id: &str, event: &Event) -> String {
    RelayMessage::event(SubscriptionId::new(sub_id), event.clone()).as_json()
}

pub fn eose_frame(sub_id: &str) -> String {
    RelayMessage::eose(SubscriptionId::new(sub_id)).as_json()
}

pub fn closed_frame(sub_id: &str, reason: &str) -> String {
    RelayMessage::closed(SubscriptionId::new(sub_id), reason).as_json()
}

pub fn notice_frame(message: &str) -> String {
    RelayMessage::notice(message).as_json()
}

pub fn vcursor_frame(sub_id: &str, cursor: &str) -> String {
    serde_json::to_string(&serde_json::json!(["NOTICE", "VCURSOR", { "sub": sub_id, "cursor": cursor }]))
        .expect("vcursor frame always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_close_frame() {
        let frame = parse_frame(r#"["CLOSE","sub1"]"#).unwrap();
        match frame {
            ClientFrame::Close { sub_id } => assert_eq!(sub_id, "sub1"),
            _ => panic!("expected Close"),
        }
    }

    #[test]
    fn parses_req_with_multiple_filters() {
        let text = serde_json::to_string(&json!(["REQ", "sub1", {"kinds": [1]}, {"kinds": [34236]}])).unwrap();
        let frame = parse_frame(&text).unwrap();
        match frame {
            ClientFrame::Req { sub_id, filters } => {
                assert_eq!(sub_id, "sub1");
                assert_eq!(filters.len(), 2);
            }
            _ => panic!("expected Req"),
        }
    }

    #[test]
    fn rejects_req_with_no_filters() {
        let text = serde_json::to_string(&json!(["REQ", "sub1"])).unwrap();
        assert!(parse_frame(&text).is_err());
    }

    #[test]
    fn rejects_unrecognized_message_type() {
        assert!(parse_frame(r#"["BOGUS"]"#).is_err());
    }
}
