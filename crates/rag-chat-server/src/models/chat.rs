use serde::{Deserialize, Serialize};

// ===== CORE MODELS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Upper-case label used when rendering transcripts for the summarizer.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

/// One message of the caller-owned conversation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One retrieved unit of grounding text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnippet {
    pub id: String,
    pub text: String,
    pub tags: Vec<String>,
    pub score: f32,
}

/// Output of a single chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurnResult {
    pub answer: String,
    pub updated_summary: Option<String>,
}

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub recent_messages: Option<Vec<ConversationTurn>>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionChatRequest {
    pub question: String,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub updated_summary: Option<String>,
}

impl From<ChatTurnResult> for ChatResponse {
    fn from(result: ChatTurnResult) -> Self {
        Self {
            answer: result.answer,
            updated_summary: result.updated_summary,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionChatResponse {
    pub session_id: String,
    pub answer: String,
    pub updated_summary: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GreetingResponse {
    pub message: String,
}
