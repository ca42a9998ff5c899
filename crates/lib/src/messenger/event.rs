//! Webhook POST body: `{ "object": "page", "entry": [ { "messaging": [ ... ] } ] }`.

use crate::error::PipelineError;
use serde::Deserialize;
use serde_json::Value;

/// Discriminator value for page subscriptions.
pub const PAGE_OBJECT: &str = "page";

/// One element of an entry's `messaging` array. Decoded on its own so a bad sibling
/// cannot take the rest of the batch down with it.
#[derive(Debug, Deserialize)]
pub struct MessagingEvent {
    #[serde(default)]
    pub sender: Option<Participant>,
    #[serde(default)]
    pub recipient: Option<Participant>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
pub struct Participant {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
}

/// One messaging event reduced to what the reply pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// End customer (page-scoped id).
    pub sender_id: String,
    /// Page the message arrived on.
    pub recipient_id: String,
    pub text: Option<String>,
    pub is_echo: bool,
}

impl InboundEvent {
    /// Text to answer, or None for echoes and non-text events.
    pub fn actionable_text(&self) -> Option<&str> {
        if self.is_echo {
            return None;
        }
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Parse a webhook body into its messaging events.
///
/// Unparseable JSON or an `object` other than `"page"` is [`PipelineError::MalformedEvent`].
/// Past that check every event stands alone: one that fails to decode or lacks
/// sender/recipient ids is logged and dropped. Echoes and text-less events are returned
/// so the caller can count what it skips.
pub fn parse_payload(body: &[u8]) -> Result<Vec<InboundEvent>, PipelineError> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| PipelineError::MalformedEvent(e.to_string()))?;
    match payload.get("object").and_then(Value::as_str) {
        Some(PAGE_OBJECT) => {}
        Some(other) => {
            return Err(PipelineError::MalformedEvent(format!(
                "unexpected object type {:?}",
                other
            )))
        }
        None => {
            return Err(PipelineError::MalformedEvent(
                "missing object type".to_string(),
            ))
        }
    }

    let mut events = Vec::new();
    let entries = payload.get("entry").and_then(Value::as_array);
    for entry in entries.into_iter().flatten() {
        let messaging = entry.get("messaging").and_then(Value::as_array);
        for raw in messaging.into_iter().flatten() {
            let ev = match MessagingEvent::deserialize(raw) {
                Ok(ev) => ev,
                Err(e) => {
                    log::warn!("webhook: dropping undecodable messaging event: {}", e);
                    continue;
                }
            };
            let (Some(sender), Some(recipient)) = (ev.sender, ev.recipient) else {
                log::debug!("webhook: dropping messaging event without sender/recipient");
                continue;
            };
            let (text, is_echo) = match ev.message {
                Some(m) => (m.text, m.is_echo),
                None => (None, false),
            };
            events.push(InboundEvent {
                sender_id: sender.id,
                recipient_id: recipient.id,
                text,
                is_echo,
            });
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batched_entries() {
        let body = br#"{
            "object": "page",
            "entry": [
                { "id": "P1", "time": 1, "messaging": [
                    { "sender": {"id": "U1"}, "recipient": {"id": "P1"}, "timestamp": 1,
                      "message": {"mid": "m1", "text": "What is your return window?"} },
                    { "sender": {"id": "P1"}, "recipient": {"id": "U1"},
                      "message": {"mid": "m2", "text": "30 days", "is_echo": true} }
                ]},
                { "id": "P2", "messaging": [
                    { "sender": {"id": "U2"}, "recipient": {"id": "P2"}, "delivery": {"mids": []} }
                ]},
                { "id": "P3" }
            ]
        }"#;
        let events = parse_payload(body).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].sender_id, "U1");
        assert_eq!(events[0].recipient_id, "P1");
        assert_eq!(events[0].actionable_text(), Some("What is your return window?"));
        assert!(events[1].is_echo);
        assert_eq!(events[1].actionable_text(), None);
        assert_eq!(events[2].text, None);
        assert_eq!(events[2].actionable_text(), None);
    }

    #[test]
    fn rejects_other_object_types() {
        let err = parse_payload(br#"{"object":"instagram","entry":[]}"#).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedEvent(_)));
        let err = parse_payload(br#"{"entry":[]}"#).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedEvent(_)));
        let err = parse_payload(b"not json").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedEvent(_)));
        let err = parse_payload(br#"{"object":7,"entry":[]}"#).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedEvent(_)));
    }

    #[test]
    fn drops_events_without_ids() {
        let events = parse_payload(
            br#"{"object":"page","entry":[{"messaging":[{"message":{"text":"hi"}}]}]}"#,
        )
        .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn bad_event_does_not_sink_its_batch() {
        let body = br#"{
            "object": "page",
            "entry": [
                { "id": "P1", "messaging": [
                    { "sender": {"id": "U1"}, "recipient": {"id": "P1"},
                      "message": {"mid": "m1", "text": "Do you ship abroad?"} },
                    { "sender": {"id": "U2"}, "recipient": {"id": "P1"},
                      "message": {"mid": "m2", "text": "hello", "is_echo": null} },
                    { "sender": {"id": 42}, "recipient": {"id": "P1"},
                      "message": {"mid": "m3", "text": "numeric sender"} }
                ]},
                { "id": "P2", "messaging": "not-a-list" },
                { "id": "P3", "messaging": [
                    { "sender": {"id": "U3"}, "recipient": {"id": "P3"},
                      "message": {"mid": "m4", "text": "Open on Sunday?"} }
                ]}
            ]
        }"#;
        let events = parse_payload(body).unwrap();
        let senders: Vec<&str> = events.iter().map(|e| e.sender_id.as_str()).collect();
        assert_eq!(senders, vec!["U1", "U3"]);
        assert_eq!(events[0].actionable_text(), Some("Do you ship abroad?"));
        assert_eq!(events[1].recipient_id, "P3");
    }

    #[test]
    fn non_list_entry_yields_no_events() {
        let events = parse_payload(br#"{"object":"page","entry":{"id":"P1"}}"#).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn blank_text_is_not_actionable() {
        let ev = InboundEvent {
            sender_id: "U1".into(),
            recipient_id: "P1".into(),
            text: Some("  ".into()),
            is_echo: false,
        };
        assert_eq!(ev.actionable_text(), None);
    }
}
