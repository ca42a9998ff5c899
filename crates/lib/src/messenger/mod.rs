//! Messenger platform channel: webhook payload types and the Send API client.
//!
//! Inbound events arrive as batched page entries on the gateway's webhook; replies go
//! out through [`MessageSender`], one call per event.

mod event;
mod send;

pub use event::{
    parse_payload, EventMessage, InboundEvent, MessagingEvent, Participant, PAGE_OBJECT,
};
pub use send::{GraphSender, MessageSender, OutboundMessage, SendError};
