use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;

/// One line of an OpenClaw session transcript, as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type", default)]
    pub entry_type: String,
    /// Only `message` entries are decoded further; other entry types carry
    /// payloads of their own shape under this key.
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<ContentValue>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentBlock {
    Bare(String),
    Typed(TypedBlock),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TypedBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Unknown,
}

/// Who produced a message. Only assistant turns carry a model and a cost.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    User,
    Assistant {
        model: Option<String>,
        cost: Option<f64>,
    },
}

impl Role {
    pub fn is_user(&self) -> bool {
        matches!(self, Role::User)
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            Role::User => None,
            Role::Assistant { model, .. } => model.as_deref(),
        }
    }

    pub fn cost(&self) -> Option<f64> {
        match self {
            Role::User => None,
            Role::Assistant { cost, .. } => *cost,
        }
    }
}

/// A normalized conversation turn from one session.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub session_id: String,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub provider: Option<String>,
    pub stop_reason: Option<String>,
    pub text: String,
}

/// A discoverable session log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub session_id: String,
    pub agent_id: String,
    pub deleted: bool,
    pub source_location: PathBuf,
}

impl SessionDescriptor {
    /// Returns the first 8 characters of the session id
    pub fn short_id(&self) -> &str {
        short_session_id(&self.session_id)
    }
}

pub fn short_session_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Byte position inside one session log, just past the last complete line consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCursor {
    pub session_id: String,
    pub offset: u64,
}
