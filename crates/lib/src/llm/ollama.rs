//! Ollama API client (http://127.0.0.1:11434 by default).
//! Streaming chat (NDJSON) with JSON-formatted output.

use crate::llm::{CompletionBackend, LlmError};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Client for Ollama HTTP API, bound to one model.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// "json" constrains the model to emit a JSON document.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamEvent {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, model: impl Into<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// POST /api/chat with stream: true. Parses NDJSON and calls on_chunk for each content delta; returns the accumulated content.
    pub async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: true,
            format: Some("json".to_string()),
        };
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        let mut stream = res.bytes_stream();
        let mut buffer = Vec::new();
        let mut content = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);
            while let Some(i) = buffer.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = buffer.drain(..i).collect();
                buffer.drain(..1);
                if handle_line(&line_bytes, &mut content, on_chunk)? {
                    return Ok(content);
                }
            }
        }
        // Final line without trailing newline.
        handle_line(&buffer, &mut content, on_chunk)?;
        Ok(content)
    }
}

/// Decode one NDJSON line. Returns true when the event marks the end of the stream.
fn handle_line(
    line_bytes: &[u8],
    content: &mut String,
    on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
) -> Result<bool, LlmError> {
    let line = String::from_utf8_lossy(line_bytes);
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }
    let event: ChatStreamEvent = match serde_json::from_str(line) {
        Ok(e) => e,
        Err(_) => {
            log::debug!("ollama: skipping unparseable stream line");
            return Ok(false);
        }
    };
    if let Some(err) = event.error {
        return Err(LlmError::Api(err));
    }
    if let Some(ref msg) = event.message {
        if !msg.content.is_empty() {
            on_chunk(&msg.content);
            content.push_str(&msg.content);
        }
    }
    Ok(event.done)
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    async fn complete_stream(
        &self,
        messages: Vec<ChatMessage>,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), LlmError> {
        self.chat_stream(messages, on_chunk).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = OllamaClient::new(Some("http://gpu-box:11434/".into()), "llama3.2:latest");
        assert_eq!(c.base_url, "http://gpu-box:11434");
        assert_eq!(c.model, "llama3.2:latest");
    }

    #[test]
    fn request_asks_for_json_format() {
        let body = ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user("hi")],
            stream: true,
            format: Some("json".into()),
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["format"], "json");
        assert_eq!(v["messages"][0]["role"], "user");
    }

    #[test]
    fn handle_line_forwards_content_and_done() {
        let mut content = String::new();
        let mut seen = Vec::new();
        let mut cb = |s: &str| seen.push(s.to_string());
        let done = handle_line(
            br#"{"message":{"role":"assistant","content":"{\"ans"},"done":false}"#,
            &mut content,
            &mut cb,
        )
        .unwrap();
        assert!(!done);
        let done = handle_line(br#"{"done":true}"#, &mut content, &mut cb).unwrap();
        assert!(done);
        assert_eq!(content, "{\"ans");
        assert_eq!(seen, vec!["{\"ans".to_string()]);
    }

    #[test]
    fn handle_line_surfaces_stream_error() {
        let mut content = String::new();
        let mut cb = |_: &str| {};
        let err = handle_line(br#"{"error":"model not found"}"#, &mut content, &mut cb);
        assert!(matches!(err, Err(LlmError::Api(m)) if m == "model not found"));
    }
}
