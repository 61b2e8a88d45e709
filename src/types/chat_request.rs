use serde::Serialize;

use crate::types::Turn;

/// The body of a `/chat/completions` request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    /// The model to use.
    pub model: &'a str,

    /// The full conversation, system turn first.
    pub messages: &'a [Turn],

    /// Whether the response should be streamed as server-sent events.
    pub stream: bool,

    /// Upper bound on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}
