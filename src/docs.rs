//! Parsing of the backend's reply to the document list command.
//!
//! The backend answers `!list_documents` with model-written text. Documents
//! follow an `Available documents:` header, one entry per paragraph, each
//! carrying a markdown link and an `id:` token:
//!
//! ```text
//! Available documents:
//!
//! **[Report.pdf](https://drive/1)** id: doc-1
//!
//! [Notes](https://drive/2)
//! id: doc-2
//! ```
//!
//! Entries that don't carry both parts are skipped.

use crate::types::DocumentRecord;
use once_cell::sync::Lazy;
use regex::Regex;

pub const DOCUMENT_LIST_MARKER: &str = "Available documents:";

static ENTRY_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static BOLD_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*\[(.*?)\]\((.*?)\)\*\*").unwrap());
static PLAIN_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.*?)\]\((.*?)\)").unwrap());
static DOCUMENT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"id:\s*(\S+)").unwrap());

/// Extracts document records from a list reply. Never fails: text without
/// the marker yields an empty list.
pub fn parse_document_list(text: &str) -> Vec<DocumentRecord> {
    let Some((_, section)) = text.split_once(DOCUMENT_LIST_MARKER) else {
        return Vec::new();
    };

    ENTRY_SEPARATOR
        .split(section.trim())
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(parse_entry)
        .collect()
}

fn parse_entry(entry: &str) -> Option<DocumentRecord> {
    // Bold links are tried first so `**` never leaks into the title.
    let link = BOLD_LINK
        .captures(entry)
        .or_else(|| PLAIN_LINK.captures(entry))?;
    let id = DOCUMENT_ID.captures(entry)?;

    Some(DocumentRecord {
        id: id[1].trim().to_string(),
        title: link[1].trim().to_string(),
        url: link[2].trim().to_string(),
    })
}
