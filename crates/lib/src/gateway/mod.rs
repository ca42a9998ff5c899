//! Gateway: HTTP server for the messaging platform webhook.
//!
//! Single port serves the health probe, the subscription handshake and event ingestion.
//! Ingestion only parses and enqueues; the reply pipeline runs behind the dispatch queue.

mod server;

pub use server::{router, run_gateway, GatewayState, VerifyParams};
