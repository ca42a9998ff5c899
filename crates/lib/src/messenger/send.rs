//! Send API: POST a text reply to a customer via the Graph API.

use async_trait::async_trait;

/// A reply to one customer, scoped to the page it is sent from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient_id: String,
    pub page_id: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("page access token not configured")]
    MissingCredential,
    #[error("send request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("send api error: {0}")]
    Api(String),
}

/// Delivers replies to the platform.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError>;
}

/// Graph API Send endpoint client: `{base}/{version}/{page_id}/messages?access_token=...`.
pub struct GraphSender {
    base_url: String,
    version: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl GraphSender {
    pub fn new(
        base_url: impl Into<String>,
        version: impl Into<String>,
        access_token: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            version: version.into().trim_matches('/').to_string(),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self, page_id: &str) -> String {
        format!("{}/{}/{}/messages", self.base_url, self.version, page_id)
    }
}

#[async_trait]
impl MessageSender for GraphSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(SendError::MissingCredential)?;
        let body = serde_json::json!({
            "recipient": { "id": message.recipient_id },
            "message": { "text": message.text },
        });
        // The token rides in the query string; strip URLs from errors so it never reaches logs.
        let res = self
            .client
            .post(self.messages_url(&message.page_id))
            .query(&[("access_token", token)])
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Request(e.without_url()))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| SendError::Request(e.without_url()))?;
        if !status.is_success() {
            return Err(SendError::Api(format!("{} {}", status, text)));
        }
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(&text) {
            if let Some(err) = v.get("error") {
                return Err(SendError::Api(err.to_string()));
            }
        }
        Ok(())
    }
}
