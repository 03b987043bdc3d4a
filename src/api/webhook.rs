use super::{ChatBackend, ChatError, ChatResult};
use crate::docs::parse_document_list;
use crate::session::SessionId;
use crate::types::DocumentRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

pub const LIST_DOCUMENTS_COMMAND: &str = "!list_documents";

#[derive(Clone, Debug)]
pub struct WebhookClient {
    client: Client,
    endpoint: String,
}

impl WebhookClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, chat_input: &str, session_id: &SessionId) -> ChatResult<WebhookReply> {
        tracing::debug!(endpoint = %self.endpoint, session_id = %session_id, "posting chat input");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&WebhookRequest {
                chat_input,
                session_id: session_id.as_str(),
            })
            .send()
            .await
            .inspect_err(|err| tracing::error!(error = %err, "webhook request failed"))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(%status, "webhook returned an error status");
            return Err(ChatError::Transport {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let raw: Value = serde_json::from_str(&body)?;
        Ok(WebhookReply::from_value(raw))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookRequest<'a> {
    chat_input: &'a str,
    session_id: &'a str,
}

/// A successful webhook response.
#[derive(Clone, Debug, PartialEq)]
pub struct WebhookReply {
    /// The assistant text, when the body carried a non-empty string `output`.
    pub output: Option<String>,
    pub raw: Value,
}

impl WebhookReply {
    pub fn from_value(raw: Value) -> Self {
        let output = raw
            .get("output")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        Self { output, raw }
    }
}

#[async_trait]
impl ChatBackend for WebhookClient {
    async fn send_message(&self, text: &str, session_id: &SessionId) -> ChatResult<WebhookReply> {
        self.post(text, session_id).await
    }

    async fn list_documents(&self, session_id: &SessionId) -> ChatResult<Vec<DocumentRecord>> {
        let reply = self.post(LIST_DOCUMENTS_COMMAND, session_id).await?;
        Ok(reply
            .output
            .as_deref()
            .map(parse_document_list)
            .unwrap_or_default())
    }
}
