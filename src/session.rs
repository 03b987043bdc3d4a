use crate::storage::{KeyValueStore, StorageError};
use crate::types::ChatMessage;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

pub const DEFAULT_SESSION_KEY: &str = "rag_session_id";
pub const DEFAULT_HISTORY_KEY: &str = "rag_chat_history";
pub const DEFAULT_MAX_HISTORY: usize = 50;

const SESSION_PREFIX: &str = "session_";
const SESSION_TOKEN_LEN: usize = 26;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque token identifying the conversation to the backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let token: String = (0..SESSION_TOKEN_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        Self(format!("{SESSION_PREFIX}{token}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Names of the two persisted values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeys {
    pub session_id: String,
    pub chat_history: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            session_id: DEFAULT_SESSION_KEY.to_string(),
            chat_history: DEFAULT_HISTORY_KEY.to_string(),
        }
    }
}

/// Conversation turns, oldest first, never longer than `max_len`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct History {
    turns: VecDeque<ChatMessage>,
    max_len: usize,
}

impl History {
    pub fn new(max_len: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_len: max_len.max(1),
        }
    }

    pub fn from_turns(turns: impl IntoIterator<Item = ChatMessage>, max_len: usize) -> Self {
        let mut history = Self::new(max_len);
        for turn in turns {
            history.push(turn);
        }
        history
    }

    pub fn push(&mut self, turn: ChatMessage) {
        self.turns.push_back(turn);
        while self.turns.len() > self.max_len {
            self.turns.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.turns.back()
    }

    fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string(&self.turns)?)
    }
}

/// The session id and history of the active conversation.
///
/// Created at startup from the store, replaced on reset. Every mutation is
/// written back through the store it was loaded from.
#[derive(Clone, Debug)]
pub struct SessionContext {
    id: SessionId,
    history: History,
    keys: StorageKeys,
}

impl SessionContext {
    pub fn load(
        store: &dyn KeyValueStore,
        keys: StorageKeys,
        max_history: usize,
    ) -> Result<Self, StorageError> {
        let id = match store.get(&keys.session_id)? {
            Some(stored) if !stored.trim().is_empty() => SessionId::from(stored.trim()),
            _ => {
                let id = SessionId::generate();
                store.set(&keys.session_id, id.as_str())?;
                tracing::debug!(session_id = %id, "created new session");
                id
            }
        };

        let turns = match store.get(&keys.chat_history)? {
            Some(raw) => serde_json::from_str::<Vec<ChatMessage>>(&raw).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "discarding unreadable chat history");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Ok(Self {
            id,
            history: History::from_turns(turns, max_history),
            keys,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Appends a turn and persists the history.
    pub fn record(
        &mut self,
        store: &dyn KeyValueStore,
        turn: ChatMessage,
    ) -> Result<(), StorageError> {
        self.history.push(turn);
        store.set(&self.keys.chat_history, &self.history.to_json()?)
    }

    /// Starts over with a fresh session id and an empty history.
    ///
    /// The in-memory context only changes once both values are stored.
    pub fn reset(&mut self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        let mut id = SessionId::generate();
        while id == self.id {
            id = SessionId::generate();
        }
        let empty = History::new(self.history.max_len());

        store.set(&self.keys.session_id, id.as_str())?;
        store.set(&self.keys.chat_history, &empty.to_json()?)?;
        self.id = id;
        self.history = empty;
        tracing::debug!(session_id = %self.id, "session reset");
        Ok(())
    }
}
