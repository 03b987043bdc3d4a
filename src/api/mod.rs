/// Transport to the webhook backend
///
/// Every request is a JSON POST of `{chatInput, sessionId}` to one endpoint.
/// Normal turns carry the user's text; the document list is requested by
/// sending the sentinel [`LIST_DOCUMENTS_COMMAND`] instead.
///
/// # Usage
///
/// ```rust,no_run
/// use ragchat::api::{ChatBackend, WebhookClient};
/// use ragchat::session::SessionId;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = WebhookClient::new("https://n8n.example.com/webhook/rag");
/// let session = SessionId::generate();
/// let reply = client.send_message("What is in the handbook?", &session).await?;
/// println!("{}", reply.output.unwrap_or_default());
/// # Ok(())
/// # }
/// ```
mod webhook;

use crate::session::SessionId;
use crate::types::DocumentRecord;
use async_trait::async_trait;

pub use webhook::{LIST_DOCUMENTS_COMMAND, WebhookClient, WebhookReply};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Network failure, or the endpoint answered outside the 2xx range.
    #[error("{}", transport_message(.status, .message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Malformed response body: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

fn transport_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP error {code}: {message}"),
        None => format!("Transport error: {message}"),
    }
}

impl ChatError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Transport { status, .. } => *status,
            ChatError::MalformedResponse(_) => None,
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

/// The two request shapes the backend understands.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send_message(&self, text: &str, session_id: &SessionId) -> ChatResult<WebhookReply>;

    async fn list_documents(&self, session_id: &SessionId) -> ChatResult<Vec<DocumentRecord>>;
}
