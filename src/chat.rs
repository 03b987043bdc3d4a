//! Conversation controller.
//!
//! Owns the session context together with the busy flag and a generation
//! counter. A turn is split in two halves so the network call can run
//! detached from the controller: [`ChatController::begin_turn`] records the
//! user's message and hands back a [`PendingTurn`];
//! [`ChatController::finish_turn`] applies the result, unless a reset
//! happened in between, in which case the result is reported as
//! [`TurnOutcome::Superseded`] and dropped.

use crate::api::{ChatBackend, ChatError, ChatResult, WebhookReply};
use crate::session::{SessionContext, SessionId, StorageKeys};
use crate::storage::{KeyValueStore, StorageError};
use crate::types::{ChatMessage, DocumentRecord};

pub const WELCOME_MESSAGE: &str =
    "Hello! I'm your document assistant. Ask me anything about the documents in the database.";
pub const NO_OUTPUT_MESSAGE: &str = "Sorry, I encountered an error processing your request.";
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Sorry, I encountered an error connecting to the service.";

/// A submitted turn waiting for its reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTurn {
    generation: u64,
    session_id: SessionId,
    input: String,
}

impl PendingTurn {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn input(&self) -> &str {
        &self.input
    }
}

#[derive(Debug)]
pub enum TurnOutcome {
    /// The assistant answered; the reply was added to the history.
    Reply(String),
    /// The backend answered without an `output` text.
    NoOutput,
    Failed(ChatError),
    /// The session was reset while the call was in flight.
    Superseded,
}

impl TurnOutcome {
    /// The system line a front end shows for outcomes that carry no reply.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            TurnOutcome::NoOutput => Some(NO_OUTPUT_MESSAGE),
            TurnOutcome::Failed(_) => Some(CONNECTION_ERROR_MESSAGE),
            TurnOutcome::Reply(_) | TurnOutcome::Superseded => None,
        }
    }
}

pub struct ChatController<B, S> {
    backend: B,
    store: S,
    session: SessionContext,
    busy: bool,
    generation: u64,
}

impl<B, S> ChatController<B, S>
where
    B: ChatBackend,
    S: KeyValueStore,
{
    pub fn new(
        backend: B,
        store: S,
        keys: StorageKeys,
        max_history: usize,
    ) -> Result<Self, StorageError> {
        let session = SessionContext::load(&store, keys, max_history)?;
        Ok(Self {
            backend,
            store,
            session,
            busy: false,
            generation: 0,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Records the user's message and marks the controller busy.
    ///
    /// Returns `None` for blank input or while another turn is pending.
    pub fn begin_turn(&mut self, input: &str) -> Result<Option<PendingTurn>, StorageError> {
        let input = input.trim();
        if input.is_empty() || self.busy {
            return Ok(None);
        }

        self.session.record(&self.store, ChatMessage::user(input))?;
        self.busy = true;
        Ok(Some(PendingTurn {
            generation: self.generation,
            session_id: self.session.id().clone(),
            input: input.to_string(),
        }))
    }

    pub fn finish_turn(
        &mut self,
        pending: PendingTurn,
        result: ChatResult<WebhookReply>,
    ) -> Result<TurnOutcome, StorageError> {
        if pending.generation != self.generation {
            tracing::warn!(session_id = %pending.session_id, "dropping reply for a reset session");
            return Ok(TurnOutcome::Superseded);
        }

        self.busy = false;
        match result {
            Ok(WebhookReply {
                output: Some(text), ..
            }) if !text.is_empty() => {
                self.session
                    .record(&self.store, ChatMessage::assistant(text.as_str()))?;
                Ok(TurnOutcome::Reply(text))
            }
            Ok(_) => Ok(TurnOutcome::NoOutput),
            Err(err) => {
                tracing::error!(error = %err, "chat turn failed");
                Ok(TurnOutcome::Failed(err))
            }
        }
    }

    /// Runs a full turn against the backend. `None` when the input was
    /// rejected by [`ChatController::begin_turn`].
    pub async fn submit(&mut self, input: &str) -> Result<Option<TurnOutcome>, StorageError> {
        let Some(pending) = self.begin_turn(input)? else {
            return Ok(None);
        };
        let result = self
            .backend
            .send_message(pending.input(), pending.session_id())
            .await;
        self.finish_turn(pending, result).map(Some)
    }

    pub async fn list_documents(&self) -> ChatResult<Vec<DocumentRecord>> {
        self.backend.list_documents(self.session.id()).await
    }

    /// New session id, empty history. Pending turns become superseded,
    /// even when persisting the new session fails.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.generation += 1;
        self.busy = false;
        self.session.reset(&self.store)
    }
}
