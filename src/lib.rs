//! Chat client for a webhook-based RAG backend.
//!
//! Relays user text to the webhook, keeps a bounded and persisted
//! conversation history, and lists the documents the backend knows about.

pub mod api;
pub mod chat;
pub mod config;
pub mod docs;
pub mod render;
pub mod session;
pub mod storage;
pub mod types;

pub use api::{ChatBackend, ChatError, WebhookClient, WebhookReply};
pub use chat::{ChatController, PendingTurn, TurnOutcome};
pub use config::Config;
pub use docs::parse_document_list;
pub use session::{History, SessionContext, SessionId, StorageKeys};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use types::{ChatMessage, DocumentKind, DocumentRecord, Role};
