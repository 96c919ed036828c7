use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_TEXT_CHARS;
use crate::time::Timestamp;

/// Stable identity assigned by the collaborator at submission time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdeaId(pub u64);

impl fmt::Display for IdeaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One submitted entry. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Idea {
    pub id: IdeaId,
    pub author: String,
    pub text: String,
    pub submitted_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdeaError {
    EmptyText,
    TextTooLong { chars: usize },
}

impl fmt::Display for IdeaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdeaError::EmptyText => write!(f, "idea text is empty"),
            IdeaError::TextTooLong { chars } => {
                write!(f, "idea text is {chars} chars, limit is {MAX_TEXT_CHARS}")
            }
        }
    }
}

impl std::error::Error for IdeaError {}

impl Idea {
    /// Build an idea, trimming both fields. Text must be non-empty and at
    /// most [`MAX_TEXT_CHARS`] chars; author may be empty.
    pub fn new(
        id: IdeaId,
        author: impl Into<String>,
        text: impl Into<String>,
        submitted_at: Timestamp,
    ) -> Result<Self, IdeaError> {
        let text = text.into().trim().to_string();
        let author = author.into().trim().to_string();
        if text.is_empty() {
            return Err(IdeaError::EmptyText);
        }
        let chars = text.chars().count();
        if chars > MAX_TEXT_CHARS {
            return Err(IdeaError::TextTooLong { chars });
        }
        Ok(Self {
            id,
            author,
            text,
            submitted_at,
        })
    }

    /// Display order: submission time, ties broken by id.
    pub fn display_key(&self) -> (Timestamp, IdeaId) {
        (self.submitted_at, self.id)
    }

    /// Whether `other` carries the same content, ignoring whitespace
    /// differences introduced by re-delivery.
    pub fn same_content(&self, other: &Idea) -> bool {
        self.id == other.id
            && normalize_whitespace(&self.text) == normalize_whitespace(&other.text)
            && normalize_whitespace(&self.author) == normalize_whitespace(&other.author)
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
