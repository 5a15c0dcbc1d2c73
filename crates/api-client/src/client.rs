use std::time::Duration;

use anyhow::{bail, Result};

use basechat_api_types::*;

/// Typed HTTP client for the knowledge-base chat service.
///
/// One high-level method per remote operation. Requests are single-shot:
/// the session layer recovers from failures in state, it never retries
/// transparently.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiClient {
    /// Create a new client with the given base URL and timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
        })
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    pub fn set_auth(&mut self, token: String) {
        self.auth_token = Some(token);
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.with_auth(self.client.get(self.url(path)))
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth_token.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    // ── Chat ──────────────────────────────────────────────────────────────

    /// Send a question. An absent `conversation_id` in the request asks the
    /// server to create a new conversation and return its id.
    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let resp = self
            .with_auth(self.client.post(self.url("/chat")))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Conversations ─────────────────────────────────────────────────────

    pub async fn list_conversations(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<ConversationSummary>> {
        let resp = self
            .get("/chat/conversations")
            .query(&[("knowledge_base_id", knowledge_base_id)])
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn conversation_messages(&self, id: &str) -> Result<Vec<ChatMessageResponse>> {
        let resp = self
            .get(&format!("/chat/conversations/{id}/messages"))
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn rename_conversation(
        &self,
        id: &str,
        title: Option<&str>,
    ) -> Result<ConversationSummary> {
        let resp = self
            .with_auth(
                self.client
                    .patch(self.url(&format!("/chat/conversations/{id}"))),
            )
            .json(&RenameConversationRequest {
                title: title.map(str::to_string),
            })
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<DeleteConversationResponse> {
        let resp = self
            .with_auth(
                self.client
                    .delete(self.url(&format!("/chat/conversations/{id}"))),
            )
            .send()
            .await?;
        parse_response(resp).await
    }

    /// Delete one message; with `pair = true` the server also removes the
    /// paired turn and reports both ids back.
    pub async fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        pair: bool,
    ) -> Result<DeleteMessageResponse> {
        let resp = self
            .with_auth(self.client.delete(self.url(&format!(
                "/chat/conversations/{conversation_id}/messages/{message_id}"
            ))))
            .query(&[("pair", pair)])
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Documents ─────────────────────────────────────────────────────────

    pub async fn document_status(&self, id: &str) -> Result<DocumentStatusSnapshot> {
        let resp = self
            .get(&format!("/documents/{id}/status"))
            .send()
            .await?;
        parse_response(resp).await
    }
}

/// Parse an HTTP response: return the deserialized body on 2xx,
/// or an error containing the status and body text.
async fn parse_response<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{status}: {body}");
    }
    Ok(resp.json().await?)
}
