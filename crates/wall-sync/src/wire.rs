//! JSON shapes exchanged with the ideas collaborator.
//!
//! Decoding is per unit: one bad idea in a collection is dropped and
//! counted, the rest survive.

use serde::Deserialize;
use serde_json::Value;
use wall_core::{Idea, IdeaId, Timestamp, Update};

use crate::error::{Result, SyncError};

#[derive(Debug, Deserialize)]
pub struct WireIdea {
    pub id: u64,
    #[serde(default)]
    pub author: Option<String>,
    pub text: String,
    #[serde(alias = "submitted_at", alias = "submittedAt")]
    pub created_at: String,
}

impl WireIdea {
    pub fn into_idea(self) -> Result<Idea> {
        let submitted_at = Timestamp::parse_iso8601(&self.created_at).ok_or_else(|| {
            SyncError::Malformed(format!(
                "idea {}: bad timestamp {:?}",
                self.id, self.created_at
            ))
        })?;
        Idea::new(
            IdeaId(self.id),
            self.author.unwrap_or_default(),
            self.text,
            submitted_at,
        )
        .map_err(|e| SyncError::Malformed(format!("idea {}: {e}", self.id)))
    }
}

pub fn parse_idea(value: Value) -> Result<Idea> {
    serde_json::from_value::<WireIdea>(value)?.into_idea()
}

/// A decoded collection. `rejected` counts entries that had to be dropped.
#[derive(Debug, Default)]
pub struct ParsedIdeas {
    pub ideas: Vec<Idea>,
    pub rejected: usize,
}

impl ParsedIdeas {
    pub fn is_complete(&self) -> bool {
        self.rejected == 0
    }
}

/// Decode a collection: a bare array, or an object with an `ideas` array.
pub fn parse_ideas(value: Value) -> Result<ParsedIdeas> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("ideas") {
            Some(Value::Array(items)) => items,
            _ => return Err(SyncError::Malformed("expected an ideas array".into())),
        },
        other => {
            return Err(SyncError::Malformed(format!(
                "expected an ideas array, got {}",
                json_type(&other)
            )));
        }
    };

    let mut parsed = ParsedIdeas::default();
    for item in items {
        match parse_idea(item) {
            Ok(idea) => parsed.ideas.push(idea),
            Err(e) => {
                tracing::debug!("dropping idea: {e}");
                parsed.rejected += 1;
            }
        }
    }
    Ok(parsed)
}

/// Decode header text from `{"header": ...}`, `{"text": ...}` or a bare
/// string.
pub fn parse_header(value: &Value) -> Result<String> {
    let text = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map
            .get("header")
            .or_else(|| map.get("text"))
            .and_then(Value::as_str),
        _ => None,
    };
    text.map(str::to_string)
        .ok_or_else(|| SyncError::Malformed(format!("expected header text, got {value}")))
}

/// One event from the push subscription.
#[derive(Clone, Debug, PartialEq)]
pub enum PushEvent {
    Hello {
        ideas: Vec<Idea>,
        header: Option<String>,
        rejected: usize,
    },
    IdeaAdded(Idea),
    HeaderChanged(String),
    /// Well-formed envelope of a type this wall does not handle.
    Unknown(String),
}

impl PushEvent {
    pub fn into_update(self) -> Option<Update> {
        match self {
            PushEvent::Hello { ideas, header, .. } => Some(Update::Hello { ideas, header }),
            PushEvent::IdeaAdded(idea) => Some(Update::IdeaAdded(idea)),
            PushEvent::HeaderChanged(text) => Some(Update::HeaderChanged(text)),
            PushEvent::Unknown(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Decode `{"type": ..., "data": ...}`.
pub fn parse_event(raw: &str) -> Result<PushEvent> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    match envelope.kind.as_str() {
        "hello" => {
            let header = envelope
                .data
                .get("header")
                .and_then(|h| parse_header(h).ok());
            let parsed = match envelope.data.get("ideas") {
                Some(ideas) => parse_ideas(ideas.clone())?,
                None => ParsedIdeas::default(),
            };
            Ok(PushEvent::Hello {
                ideas: parsed.ideas,
                header,
                rejected: parsed.rejected,
            })
        }
        "idea.new" => parse_idea(envelope.data).map(PushEvent::IdeaAdded),
        "header.set" => parse_header(&envelope.data).map(PushEvent::HeaderChanged),
        other => Ok(PushEvent::Unknown(other.to_string())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
