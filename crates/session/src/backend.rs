use anyhow::Result;

use basechat_api_client::ApiClient;
use basechat_api_types::{
    ChatMessageResponse, ChatRequest, ChatResponse, ConversationSummary,
    DeleteConversationResponse, DeleteMessageResponse, DocumentStatusSnapshot,
};

/// Transport seam for the session engine.
///
/// The engine talks to the remote service exclusively through this trait, so
/// tests can substitute a scripted in-memory backend for the HTTP client.
#[allow(async_fn_in_trait)]
pub trait ChatBackend {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    async fn list_conversations(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<ConversationSummary>>;

    async fn conversation_messages(&self, id: &str) -> Result<Vec<ChatMessageResponse>>;

    async fn rename_conversation(
        &self,
        id: &str,
        title: Option<&str>,
    ) -> Result<ConversationSummary>;

    async fn delete_conversation(&self, id: &str) -> Result<DeleteConversationResponse>;

    async fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        pair: bool,
    ) -> Result<DeleteMessageResponse>;

    async fn document_status(&self, id: &str) -> Result<DocumentStatusSnapshot>;
}

impl ChatBackend for ApiClient {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        ApiClient::chat(self, req).await
    }

    async fn list_conversations(
        &self,
        knowledge_base_id: &str,
    ) -> Result<Vec<ConversationSummary>> {
        ApiClient::list_conversations(self, knowledge_base_id).await
    }

    async fn conversation_messages(&self, id: &str) -> Result<Vec<ChatMessageResponse>> {
        ApiClient::conversation_messages(self, id).await
    }

    async fn rename_conversation(
        &self,
        id: &str,
        title: Option<&str>,
    ) -> Result<ConversationSummary> {
        ApiClient::rename_conversation(self, id, title).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<DeleteConversationResponse> {
        ApiClient::delete_conversation(self, id).await
    }

    async fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        pair: bool,
    ) -> Result<DeleteMessageResponse> {
        ApiClient::delete_message(self, conversation_id, message_id, pair).await
    }

    async fn document_status(&self, id: &str) -> Result<DocumentStatusSnapshot> {
        ApiClient::document_status(self, id).await
    }
}
