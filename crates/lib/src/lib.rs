//! Assist core library — tenants, answer generation, messenger channel and the webhook
//! gateway used by the `assist` CLI.

pub mod answer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod init;
pub mod interactions;
pub mod llm;
pub mod messenger;
pub mod pipeline;
pub mod tenants;
