pub mod cerebras;

pub use cerebras::CerebrasClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl ToString for MessageRole {
    fn to_string(&self) -> String {
        match self {
            MessageRole::System => "system".to_string(),
            MessageRole::User => "user".to_string(),
            MessageRole::Assistant => "assistant".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Chat-completion seam used by every pipeline stage that talks to the
/// model. Production uses [`CerebrasClient`]; tests inject scripted
/// implementations.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Generate a completion for the given messages. Transport and API
    /// errors surface as `Err`; malformed but successful responses are the
    /// caller's problem.
    async fn generate(&self, messages: Vec<Message>) -> Result<String, String>;

    /// Identifier reported in `tools_used` when a request needed no tools.
    fn model_id(&self) -> &str;
}
