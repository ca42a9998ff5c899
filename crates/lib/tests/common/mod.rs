//! Shared helpers for integration tests: in-process fakes and a local server on a free port.

#![allow(dead_code)]

use assist::llm::{ChatMessage, CompletionBackend, LlmError};
use assist::messenger::{MessageSender, OutboundMessage, SendError};
use assist::tenants::{StoreError, Tenant, TenantDirectory, TenantStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Serve `app` on 127.0.0.1 with an OS-assigned port; returns the base URL.
pub async fn spawn_app(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind free port");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

/// Poll `check` every 20ms for up to 5s.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..250 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

/// Tenant directory that counts lookups.
pub struct CountingStore {
    pub inner: TenantDirectory,
    pub calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(tenants: Vec<Tenant>) -> Self {
        Self {
            inner: TenantDirectory::in_memory(tenants),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantStore for CountingStore {
    async fn find_by_platform_id(&self, platform_id: &str) -> Result<Vec<Tenant>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_platform_id(platform_id).await
    }
}

/// Answers by quoting the business context back, streamed a few bytes at a time.
pub struct ContextEchoBackend {
    pub calls: AtomicUsize,
}

impl ContextEchoBackend {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for ContextEchoBackend {
    async fn complete_stream(
        &self,
        messages: Vec<ChatMessage>,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let system = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let context = system
            .split("\"\"\"\n")
            .nth(1)
            .and_then(|s| s.split("\n\"\"\"").next())
            .unwrap_or("")
            .to_string();
        let output = serde_json::json!({ "answer": context }).to_string();
        let chars: Vec<char> = output.chars().collect();
        for piece in chars.chunks(4) {
            let s: String = piece.iter().collect();
            on_chunk(&s);
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

/// Answers a fixed JSON reply, but only once the test opens the gate.
pub struct GatedBackend {
    pub gate: tokio::sync::Semaphore,
}

impl GatedBackend {
    pub fn closed() -> Self {
        Self {
            gate: tokio::sync::Semaphore::new(0),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(64);
    }
}

#[async_trait]
impl CompletionBackend for GatedBackend {
    async fn complete_stream(
        &self,
        _messages: Vec<ChatMessage>,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), LlmError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;
        on_chunk(r#"{"answer":"We are open 9-5."}"#);
        Ok(())
    }
}

/// Sender that keeps every message.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
