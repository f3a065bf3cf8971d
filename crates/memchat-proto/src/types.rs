use serde::{Deserialize, Serialize};

/// Default user id when a request does not carry one.
pub const GUEST_USER: &str = "guest";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the dialogue transcript.
///
/// Fields are private so an entry can only be built through [`ConversationMessage::new`],
/// which rejects blank text.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConversationMessage")]
pub struct ConversationMessage {
    role: Role,
    text: String,
}

#[derive(Deserialize)]
struct RawConversationMessage {
    role: Role,
    text: String,
}

impl TryFrom<RawConversationMessage> for ConversationMessage {
    type Error = String;

    fn try_from(raw: RawConversationMessage) -> Result<Self, Self::Error> {
        ConversationMessage::new(raw.role, raw.text)
            .ok_or_else(|| format!("empty {} message", raw.role.as_str()))
    }
}

impl ConversationMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self { role, text })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Body of a chat request, shared by the socket and the HTTP fallback.
///
/// `message`, `text` and `content` are aliases; the first present one wins.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ChatRequest {
    /// Request in the shape the client sends: both aliases filled.
    pub fn outgoing(text: &str, user_id: &str) -> Self {
        Self {
            message: Some(text.to_string()),
            text: Some(text.to_string()),
            content: None,
            user_id: Some(user_id.to_string()),
        }
    }

    /// Decode a raw body. Anything that is not a JSON object is an empty request.
    pub fn from_body(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    /// Trimmed message text, `None` when every alias is absent or blank.
    pub fn message_text(&self) -> Option<&str> {
        let raw = self
            .message
            .as_deref()
            .or(self.text.as_deref())
            .or(self.content.as_deref())?;
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(GUEST_USER)
    }
}

/// `200` body of the HTTP fallback.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReplyBody {
    pub reply: String,
}

/// Error body of the HTTP fallback.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
