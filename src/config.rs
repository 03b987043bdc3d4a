use crate::session::{DEFAULT_MAX_HISTORY, StorageKeys};
use anyhow::{Context, Result, anyhow};
use std::env;
use std::path::PathBuf;

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub endpoint: String,
    pub max_history: usize,
    pub storage_keys: StorageKeys,
    pub storage_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let endpoint = read("RAGCHAT_ENDPOINT").ok_or_else(|| {
            anyhow!("No webhook configured. Set RAGCHAT_ENDPOINT to the chat webhook URL.")
        })?;

        let max_history = match read("RAGCHAT_MAX_HISTORY") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("RAGCHAT_MAX_HISTORY is not a number: {raw}"))?,
            None => DEFAULT_MAX_HISTORY,
        };
        if max_history == 0 {
            return Err(anyhow!("RAGCHAT_MAX_HISTORY must be at least 1"));
        }

        let defaults = StorageKeys::default();
        let storage_keys = StorageKeys {
            session_id: read("RAGCHAT_SESSION_KEY").unwrap_or(defaults.session_id),
            chat_history: read("RAGCHAT_HISTORY_KEY").unwrap_or(defaults.chat_history),
        };

        Ok(Self {
            endpoint,
            max_history,
            storage_keys,
            storage_dir: read("RAGCHAT_STORAGE_DIR").map(PathBuf::from),
        })
    }
}
