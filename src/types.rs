use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        f.write_str(name)
    }
}

/// One turn of the conversation, as persisted in the history array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A document the backend reported in its reply to the list command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub url: String,
}

impl DocumentRecord {
    pub fn kind(&self) -> DocumentKind {
        DocumentKind::from_title(&self.title)
    }

    pub fn has_link(&self) -> bool {
        self.url.starts_with("http")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Word,
    Spreadsheet,
    Text,
    Generic,
}

impl DocumentKind {
    /// Classifies by the text after the last `.` in the title.
    pub fn from_title(title: &str) -> Self {
        let extension = title.rsplit('.').next().unwrap_or_default().to_lowercase();
        match extension.as_str() {
            "pdf" => DocumentKind::Pdf,
            "doc" | "docx" => DocumentKind::Word,
            "xls" | "xlsx" | "csv" => DocumentKind::Spreadsheet,
            "txt" | "md" => DocumentKind::Text,
            _ => DocumentKind::Generic,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Word => "doc",
            DocumentKind::Spreadsheet => "sheet",
            DocumentKind::Text => "text",
            DocumentKind::Generic => "file",
        }
    }
}
