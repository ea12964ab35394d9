//! Shared data model types used across controllers, pipeline, cache and db

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, EnumString};

use crate::agent::ReasoningStep;
use crate::locale::Language;

/// Query complexity tier assigned during analysis.
///
/// Drives whether the synthesis stage runs; unknown values decode to
/// `Simple` so a creative model answer degrades instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Moderate,
    Complex,
}

impl<'de> Deserialize<'de> for Complexity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Complexity::from_str(raw.trim().to_lowercase().as_str()).unwrap_or_default())
    }
}

/// One turn of a conversation as fed back into the model prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub tools_used: Vec<String>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>, language: Language) -> Self {
        ChatTurn {
            role: "user".to_string(),
            content: content.into(),
            language,
            tools_used: Vec::new(),
        }
    }

    pub fn assistant(
        content: impl Into<String>,
        language: Language,
        tools_used: Vec<String>,
    ) -> Self {
        ChatTurn {
            role: "assistant".to_string(),
            content: content.into(),
            language,
            tools_used,
        }
    }
}

/// Conversation summary row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Full chat message row as returned by the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub role: String,
    pub content: String,
    pub language: Language,
    pub tools_used: Vec<String>,
    pub created_at: String,
}

/// Insert payload for a chat message.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub conversation_id: String,
    pub user_id: String,
    pub role: String,
    pub content: String,
    pub language: Language,
    pub tools_used: Vec<String>,
}

/// Response-cache value: the subset of a pipeline result worth replaying
/// for an identical question inside the cache TTL. The reasoning trace is
/// included so a hit answers with the same shape as a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedReply {
    pub message: String,
    pub language: Language,
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub reasoning_steps: Vec<ReasoningStep>,
    pub complexity_level: Complexity,
    pub confidence: f64,
}
