use memchat_proto::{ConversationMessage, Role};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::fault::PipelineFault;
use super::model_service::ModelClient;

/// Reply used whenever the model cannot produce text. It is a normal reply, not an error.
pub const FALLBACK_REPLY: &str =
    "I can receive your message, but the model response is unavailable right now.";

const SYSTEM_LINE: &str = "You are a helpful assistant.";

/// Where reply text may live in a model response.
#[derive(Debug, Clone, Copy)]
enum ReplyField {
    /// Top-level string field.
    Field(&'static str),
    /// First element of an array at a JSON pointer.
    FirstElement(&'static str),
}

/// Probed in order; the first non-blank string wins.
const REPLY_FIELDS: [ReplyField; 4] = [
    ReplyField::Field("response"),
    ReplyField::Field("text"),
    ReplyField::Field("output_text"),
    ReplyField::FirstElement("/result/response"),
];

impl ReplyField {
    fn probe<'a>(&self, response: &'a Value) -> Option<&'a str> {
        let candidate = match self {
            ReplyField::Field(name) => response.get(*name)?,
            ReplyField::FirstElement(pointer) => response.pointer(pointer)?.as_array()?.first()?,
        };
        candidate.as_str().filter(|text| !text.trim().is_empty())
    }
}

/// Pull reply text out of a loosely-shaped model response.
pub fn extract_reply(response: &Value) -> Option<&str> {
    REPLY_FIELDS.iter().find_map(|field| field.probe(response))
}

pub struct ReplyGenerator {
    model: Arc<dyn ModelClient>,
    max_tokens: usize,
    include_history: bool,
}

impl ReplyGenerator {
    pub fn new(model: Arc<dyn ModelClient>, max_tokens: usize, include_history: bool) -> Self {
        Self {
            model,
            max_tokens,
            include_history,
        }
    }

    /// Prompt for `message`. `history` holds the turns before it and is only
    /// rendered when history is enabled.
    pub fn build_prompt(
        &self,
        history: &[ConversationMessage],
        context: &str,
        message: &str,
    ) -> String {
        let mut prompt = String::from(SYSTEM_LINE);
        prompt.push('\n');

        if !context.is_empty() {
            prompt.push_str("Relevant memories:\n");
            prompt.push_str(context);
            prompt.push('\n');
        }

        if self.include_history {
            for turn in history {
                let speaker = match turn.role() {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                prompt.push_str(&format!("{}: {}\n", speaker, turn.text()));
            }
        }

        prompt.push_str(&format!("User: {}\nAssistant:", message));
        prompt
    }

    /// Always yields a reply; model failures turn into [`FALLBACK_REPLY`].
    pub async fn generate(
        &self,
        history: &[ConversationMessage],
        context: &str,
        message: &str,
    ) -> String {
        let prompt = self.build_prompt(history, context, message);
        debug!(prompt_len = prompt.len(), has_context = !context.is_empty(), "Generating reply");

        match self.model.complete(&prompt, self.max_tokens).await {
            Ok(response) => match extract_reply(&response) {
                Some(text) => text.to_string(),
                None => {
                    let fault = PipelineFault::model("response carried no reply text");
                    warn!(error = %fault, "Using fallback reply");
                    FALLBACK_REPLY.to_string()
                }
            },
            Err(e) => {
                let fault = PipelineFault::model(e);
                warn!(error = %fault, "Model invocation failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
