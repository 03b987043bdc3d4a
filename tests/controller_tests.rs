//! Integration tests for the chat controller
//!
//! Uses a scripted backend so turns, resets and late replies are deterministic

use async_trait::async_trait;
use ragchat::api::{ChatBackend, ChatError, ChatResult, WebhookReply};
use ragchat::chat::{CONNECTION_ERROR_MESSAGE, NO_OUTPUT_MESSAGE};
use ragchat::{
    ChatController, ChatMessage, DocumentRecord, KeyValueStore, MemoryStore, SessionId,
    StorageError, StorageKeys, TurnOutcome,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct ScriptedBackend {
    replies: Arc<Mutex<VecDeque<ChatResult<WebhookReply>>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedBackend {
    fn reply_with(self, result: ChatResult<WebhookReply>) -> Self {
        self.replies.lock().unwrap().push_back(result);
        self
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

fn output(text: &str) -> ChatResult<WebhookReply> {
    Ok(WebhookReply::from_value(json!({ "output": text })))
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn send_message(&self, text: &str, session_id: &SessionId) -> ChatResult<WebhookReply> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), session_id.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| output("default"))
    }

    async fn list_documents(&self, session_id: &SessionId) -> ChatResult<Vec<DocumentRecord>> {
        self.calls
            .lock()
            .unwrap()
            .push(("!list_documents".to_string(), session_id.to_string()));
        Ok(vec![DocumentRecord {
            id: "doc-1".into(),
            title: "Report.pdf".into(),
            url: "http://x/1".into(),
        }])
    }
}

fn controller(backend: ScriptedBackend) -> ChatController<ScriptedBackend, MemoryStore> {
    ChatController::new(backend, MemoryStore::new(), StorageKeys::default(), 50)
        .expect("memory store never fails")
}

fn history_of(controller: &ChatController<ScriptedBackend, MemoryStore>) -> Vec<ChatMessage> {
    controller.session().history().iter().cloned().collect()
}

#[tokio::test]
async fn test_submit_records_user_and_assistant_turns() {
    let backend = ScriptedBackend::default().reply_with(output("Hi there"));
    let mut chat = controller(backend.clone());

    let outcome = chat.submit("  Hello  ").await.expect("storage ok");

    assert!(matches!(outcome, Some(TurnOutcome::Reply(ref text)) if text == "Hi there"));
    assert_eq!(
        history_of(&chat),
        vec![ChatMessage::user("Hello"), ChatMessage::assistant("Hi there")]
    );
    assert_eq!(
        backend.calls(),
        vec![("Hello".to_string(), chat.session().id().to_string())]
    );
    assert!(!chat.is_busy());
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let backend = ScriptedBackend::default();
    let mut chat = controller(backend.clone());

    assert!(chat.submit("   ").await.expect("storage ok").is_none());
    assert!(backend.calls().is_empty());
    assert!(history_of(&chat).is_empty());
}

#[tokio::test]
async fn test_reply_without_output_records_nothing() {
    let backend = ScriptedBackend::default()
        .reply_with(Ok(WebhookReply::from_value(json!({"status": "ok"}))));
    let mut chat = controller(backend);

    let outcome = chat.submit("Hello").await.expect("storage ok").unwrap();

    assert!(matches!(outcome, TurnOutcome::NoOutput));
    assert_eq!(outcome.notice(), Some(NO_OUTPUT_MESSAGE));
    assert_eq!(history_of(&chat), vec![ChatMessage::user("Hello")]);
}

#[tokio::test]
async fn test_empty_output_counts_as_no_output() {
    let backend = ScriptedBackend::default()
        .reply_with(Ok(WebhookReply::from_value(json!({"output": ""}))));
    let mut chat = controller(backend);

    let outcome = chat.submit("hi").await.expect("storage ok").unwrap();

    assert!(matches!(outcome, TurnOutcome::NoOutput));
    assert_eq!(outcome.notice(), Some(NO_OUTPUT_MESSAGE));
    assert_eq!(history_of(&chat), vec![ChatMessage::user("hi")]);
}

#[test]
fn test_empty_output_field_is_not_recorded() {
    let mut chat = controller(ScriptedBackend::default());
    let pending = chat.begin_turn("hi").expect("storage ok").unwrap();

    let reply = WebhookReply {
        output: Some(String::new()),
        raw: json!({"output": ""}),
    };
    let outcome = chat.finish_turn(pending, Ok(reply)).expect("storage ok");

    assert!(matches!(outcome, TurnOutcome::NoOutput));
    assert_eq!(history_of(&chat), vec![ChatMessage::user("hi")]);
    assert!(!chat.is_busy());
}

#[tokio::test]
async fn test_transport_failure_is_surfaced() {
    let backend = ScriptedBackend::default().reply_with(Err(ChatError::Transport {
        status: Some(503),
        message: "unavailable".into(),
    }));
    let mut chat = controller(backend);

    let outcome = chat.submit("Hello").await.expect("storage ok").unwrap();

    match &outcome {
        TurnOutcome::Failed(err) => assert_eq!(err.status(), Some(503)),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(outcome.notice(), Some(CONNECTION_ERROR_MESSAGE));
    assert!(!chat.is_busy());
}

#[test]
fn test_busy_controller_rejects_second_turn() {
    let mut chat = controller(ScriptedBackend::default());

    let first = chat.begin_turn("one").expect("storage ok");
    assert!(first.is_some());
    assert!(chat.is_busy());
    assert!(chat.begin_turn("two").expect("storage ok").is_none());
    assert_eq!(history_of(&chat), vec![ChatMessage::user("one")]);
}

#[test]
fn test_reply_after_reset_is_superseded() {
    let mut chat = controller(ScriptedBackend::default());
    let pending = chat.begin_turn("slow question").expect("storage ok").unwrap();
    let old_session = pending.session_id().clone();

    chat.reset().expect("reset");
    assert_ne!(chat.session().id(), &old_session);
    assert!(!chat.is_busy());

    let outcome = chat
        .finish_turn(pending, output("late answer"))
        .expect("storage ok");

    assert!(matches!(outcome, TurnOutcome::Superseded));
    assert_eq!(outcome.notice(), None);
    assert!(history_of(&chat).is_empty());
}

#[test]
fn test_superseded_reply_does_not_clear_new_busy_turn() {
    let mut chat = controller(ScriptedBackend::default());
    let stale = chat.begin_turn("before reset").expect("storage ok").unwrap();
    chat.reset().expect("reset");
    let current = chat.begin_turn("after reset").expect("storage ok").unwrap();

    let outcome = chat.finish_turn(stale, output("stale")).expect("storage ok");
    assert!(matches!(outcome, TurnOutcome::Superseded));
    assert!(chat.is_busy());

    let outcome = chat.finish_turn(current, output("fresh")).expect("storage ok");
    assert!(matches!(outcome, TurnOutcome::Reply(ref text) if text == "fresh"));
    assert_eq!(
        history_of(&chat),
        vec![ChatMessage::user("after reset"), ChatMessage::assistant("fresh")]
    );
}

#[tokio::test]
async fn test_list_documents_uses_current_session() {
    let backend = ScriptedBackend::default();
    let chat = controller(backend.clone());

    let documents = chat.list_documents().await.expect("scripted");

    assert_eq!(documents.len(), 1);
    assert_eq!(
        backend.calls(),
        vec![("!list_documents".to_string(), chat.session().id().to_string())]
    );
}

#[test]
fn test_reset_persists_new_session() {
    let store = MemoryStore::new();
    let keys = StorageKeys::default();
    let mut chat = ChatController::new(ScriptedBackend::default(), store, keys.clone(), 50)
        .expect("memory store never fails");
    let before = chat.session().id().clone();

    chat.reset().expect("reset");

    assert_ne!(chat.session().id(), &before);
    assert!(chat.session().history().is_empty());
    assert_eq!(
        chat.store().get(&keys.session_id).expect("read"),
        Some(chat.session().id().to_string())
    );
}

/// Memory store whose writes can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk full".into()));
        }
        self.inner.set(key, value)
    }
}

#[test]
fn test_failed_reset_still_supersedes_pending_turn() {
    let mut chat = ChatController::new(
        ScriptedBackend::default(),
        FlakyStore::default(),
        StorageKeys::default(),
        50,
    )
    .expect("memory store never fails");
    let pending = chat.begin_turn("slow question").expect("storage ok").unwrap();
    let session_before = chat.session().id().clone();

    chat.store().fail_writes.store(true, Ordering::SeqCst);
    assert!(chat.reset().is_err());
    assert!(!chat.is_busy());

    chat.store().fail_writes.store(false, Ordering::SeqCst);
    let outcome = chat
        .finish_turn(pending, output("late answer"))
        .expect("storage ok");

    assert!(matches!(outcome, TurnOutcome::Superseded));
    assert_eq!(chat.session().id(), &session_before);
    let history: Vec<ChatMessage> = chat.session().history().iter().cloned().collect();
    assert_eq!(history, vec![ChatMessage::user("slow question")]);
}
